//! Storage Trait
//!
//! This module defines the `ArchiveSink` trait, the persistence boundary for
//! finished capture archives.

use std::path::PathBuf;

use crate::error_handling::types::StorageError;

/// Destination for finished archives.
///
/// Implementors persist one complete archive per call; a failure means the
/// archive was not stored at all.
pub trait ArchiveSink: Send + Sync {
    /// Persists `bytes` under `file_name` and returns where it landed.
    fn save_archive(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError>;
}
