use thiserror::Error;

use tapchat_media::CodecError;
use tapchat_store::StoreError;

/// Failure reported by the external transport. Opaque to this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport failure: {0}")]
pub struct TransportError(pub String);

/// Failure while moving an image between capture, buffer and store.
/// Never fatal to the message carrying the image.
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Image buffer present without an image name")]
    MissingImageName,

    #[error("Image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active connection")]
    NotConnected,

    #[error("Nothing to send: text is empty and no image is attached")]
    EmptyDraft,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Image staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Session is closed")]
    Closed,
}
