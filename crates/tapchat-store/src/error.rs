use thiserror::Error;

use tapchat_shared::error::ImageNameError;

/// Errors produced by the image store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The image could not be fully written. Nothing was replaced.
    #[error("Failed to write image {name}: {source}")]
    StorageWriteFailure {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// No file exists under the requested name.
    #[error("Image not found: {0}")]
    NotFound(String),

    /// The name cannot be used as a flat file inside the pictures folder.
    #[error("Invalid image name: {0}")]
    InvalidName(#[from] ImageNameError),

    /// Generic I/O error (e.g. creating the pictures folder).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
