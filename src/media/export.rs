use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{RoomError, RoomResult};

/// Writes finished recordings to a directory under a given file name
#[derive(Debug, Clone)]
pub struct BlobExporter {
    dir: PathBuf,
}

impl BlobExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` as `file_name`, replacing any previous export
    pub async fn export(&self, data: &[u8], file_name: &str) -> RoomResult<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RoomError::Export(format!("invalid file name: {}", file_name)))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RoomError::Export(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.dir.join(name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| RoomError::Export(format!("{}: {}", path.display(), e)))?;

        info!("Exported {} bytes to {}", data.len(), path.display());

        Ok(path)
    }
}
