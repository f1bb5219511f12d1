use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::ArchiveSink;

/// Writes archives into a single output directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create output dir {}: {}", base_path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl ArchiveSink for FileStorage {
    fn save_archive(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.base_path.join(file_name);
        let mut f = File::create(&path).map_err(|e| {
            error!("Failed to create archive {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        f.write_all(bytes).map_err(|e| {
            error!("Failed to write archive {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        f.sync_all().map_err(|e| {
            error!("Failed to flush archive {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("Saved {} byte archive to {}", bytes.len(), path.display());
        Ok(path)
    }
}
