//! Storage subsystem
//!
//! Hands finished archives to their final destination.
//!
//! Components:
//! - `storage_trait`: the `ArchiveSink` trait the session manager writes through.
//! - `file_storage`: filesystem-backed implementation writing into one directory.

pub mod file_storage;
pub mod storage_trait;

pub use file_storage::FileStorage;
pub use storage_trait::ArchiveSink;
