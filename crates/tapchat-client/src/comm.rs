//! Seams to the collaborators this crate does not own: the transport that
//! moves bytes between the two devices, and the photo picker.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use tapchat_shared::Message;

use crate::error::TransportError;

/// Signals raised by the transport.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The link to the peer dropped. No payload.
    Interrupted,
    /// A wire payload arrived from the peer, still encoded.
    MessageReceived(Bytes),
}

/// The connection to the other device.
///
/// Subscribing hands out a receiver; dropping it is the unsubscribe. The
/// receiver is unbounded so no payload is lost while the session is busy
/// staging an image.
#[async_trait]
pub trait Communication: Send + Sync {
    fn is_connected(&self) -> bool;

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionEvent>;

    /// Deliver `message` to the peer, including any in-memory image buffer.
    async fn send_message(&self, message: &Message) -> Result<(), TransportError>;

    fn disconnect(&self);
}

/// Completion of the photo picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Raw picture stream, in whatever format the picker produced.
    Chosen(Vec<u8>),
    Cancelled,
}
