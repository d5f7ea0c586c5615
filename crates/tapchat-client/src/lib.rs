//! # tapchat-client
//!
//! Conversation core for tapchat: stages photo attachments through the
//! image store, runs the chat session over an external transport and
//! archives the conversation when the session ends.

pub mod comm;
pub mod config;
pub mod error;
pub mod events;
pub mod loopback;
pub mod session;
pub mod transfer;

use tracing_subscriber::{fmt, EnvFilter};

pub use comm::{CaptureOutcome, Communication, ConnectionEvent};
pub use config::ClientConfig;
pub use error::{SessionError, StagingError, TransportError};
pub use events::{EndReason, SessionNotification, SessionSummary};
pub use session::{begin_session, SessionHandle};
pub use transfer::{BufferRetention, ImageStage, TransferOrchestrator};

/// Install the global tracing subscriber. Honours `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("tapchat=debug,tapchat_client=debug,tapchat_store=info,tapchat_media=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
