//! Stored-mode ZIP archive assembly.
//!
//! Components:
//! - `writer`: little-endian cursor that tracks its own position.
//! - `builder`: lays out local headers, the central directory and the
//!   end-of-central-directory record.
//! - `manifest`: the `packets/requests.json` metadata document.

pub mod builder;
pub mod manifest;
pub mod writer;

pub use builder::{build, ArchiveEntry};
pub use manifest::{archive_name, packets_manifest, PACKETS_MANIFEST_PATH};
