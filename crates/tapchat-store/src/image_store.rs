//! The flat `Pictures` folder.
//!
//! Writes go to a hidden staging file in the same folder and are then
//! renamed over the target, so `exists`/`read` never observe a partially
//! written image. The folder itself is created lazily on first write.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use tapchat_shared::constants::{PICTURES_FOLDER, STAGING_PREFIX};
use tapchat_shared::types::validate_image_name;
use tapchat_shared::Message;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
pub struct ImageStore {
    pictures_dir: PathBuf,
}

impl ImageStore {
    /// Store rooted at `<data_dir>/Pictures`. Nothing is touched on disk
    /// until the first write.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            pictures_dir: data_dir.as_ref().join(PICTURES_FOLDER),
        }
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.pictures_dir
    }

    /// Full path of the file backing `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_image_name(name)?;
        Ok(self.pictures_dir.join(name))
    }

    /// Create the pictures folder. Safe to call repeatedly.
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.pictures_dir).await?;
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> bool {
        let Ok(path) = self.path_of(name) else {
            return false;
        };
        fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Whether `message` has a displayable image. Derived solely from the
    /// file being present; a set `image_name` or an in-memory buffer alone
    /// does not count.
    pub async fn has_image(&self, message: &Message) -> bool {
        match message.image_name() {
            Some(name) => self.exists(name).await,
            None => false,
        }
    }

    /// Write `data` under `name`, replacing any existing file.
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        let write_failure = |source: std::io::Error| StoreError::StorageWriteFailure {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(&self.pictures_dir)
            .await
            .map_err(write_failure)?;

        let dir = self.pictures_dir.clone();
        let target = path.clone();
        let owned = data.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut staging = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(&dir)?;
            staging.write_all(&owned)?;
            staging.as_file().sync_all()?;
            staging.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| write_failure(std::io::Error::other(e)))?
        .map_err(write_failure)?;

        debug!(
            name = %name,
            size = data.len(),
            digest = %blake3::hash(data),
            "Stored image"
        );
        Ok(())
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!(name = %name, size = data.len(), "Read image");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Log where images are kept. Called once by the client on startup.
    pub fn log_location(&self) {
        info!(path = %self.pictures_dir.display(), "Image store location");
    }
}
