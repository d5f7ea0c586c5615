//! The chat message exchanged between two peers.
//!
//! A message optionally carries a photo. The photo is identified by
//! `image_name`, which doubles as the wire field and the local file name.
//! `image_bytes` only lives in memory while the image is being staged:
//! between encode/decode and the moment it is flushed to the image store.

use serde::Serialize;

/// Direction of a message, in to this device or out to the other device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A single chat message.
///
/// `direction` is fixed at creation and `archived` only ever moves from
/// `false` to `true`, so both are private behind accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub(crate) direction: Direction,
    /// Sender's display name.
    pub sender_name: String,
    /// Message body. May be empty when an image is attached.
    pub text: String,
    pub(crate) archived: bool,
    pub(crate) image_name: Option<String>,
    #[serde(skip)]
    pub(crate) image_bytes: Option<Vec<u8>>,
}

impl Message {
    pub fn new(direction: Direction, sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            direction,
            sender_name: sender_name.into(),
            text: text.into(),
            archived: false,
            image_name: None,
            image_bytes: None,
        }
    }

    pub fn outbound(sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Direction::Outbound, sender_name, text)
    }

    /// Build the local inbound entity from a payload decoded off the wire.
    ///
    /// The peer encodes from its own point of view, so the decoded
    /// direction is replaced. Everything else carries over untouched.
    pub fn received(decoded: Message) -> Self {
        Self {
            direction: Direction::Inbound,
            ..decoded
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    /// Mark the message as belonging to a closed session.
    ///
    /// Returns `true` if this call performed the transition; archiving an
    /// already archived message is a no-op.
    pub fn archive(&mut self) -> bool {
        if self.archived {
            return false;
        }
        self.archived = true;
        true
    }

    pub fn image_name(&self) -> Option<&str> {
        self.image_name.as_deref()
    }

    pub fn image_bytes(&self) -> Option<&[u8]> {
        self.image_bytes.as_deref()
    }

    /// Attach an encoded image under `name`, replacing any previous one.
    pub fn attach_image(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.image_name = Some(name.into());
        self.image_bytes = Some(bytes);
    }

    /// Release the in-memory buffer, keeping `image_name`.
    pub fn take_image_bytes(&mut self) -> Option<Vec<u8>> {
        self.image_bytes.take()
    }

    /// Drop the attachment entirely (name and buffer).
    pub fn detach_image(&mut self) {
        self.image_name = None;
        self.image_bytes = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_defaults() {
        let m = Message::outbound("Alice", "hi");
        assert_eq!(m.direction(), Direction::Outbound);
        assert!(!m.is_archived());
        assert!(m.image_name().is_none());
        assert!(m.image_bytes().is_none());
    }

    #[test]
    fn test_archive_is_idempotent() {
        let mut m = Message::outbound("Alice", "hi");
        assert!(m.archive());
        assert!(!m.archive());
        assert!(m.is_archived());
    }

    #[test]
    fn test_received_flips_direction_only() {
        let mut sent = Message::outbound("Alice", "look");
        sent.attach_image("abc.jpg", vec![1, 2, 3]);

        let got = Message::received(sent.clone());
        assert_eq!(got.direction(), Direction::Inbound);
        assert_eq!(got.sender_name, sent.sender_name);
        assert_eq!(got.image_name(), Some("abc.jpg"));
        assert_eq!(got.image_bytes(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_take_bytes_keeps_name() {
        let mut m = Message::outbound("Alice", "");
        m.attach_image("abc.jpg", vec![9; 4]);

        assert_eq!(m.take_image_bytes(), Some(vec![9; 4]));
        assert!(m.image_bytes().is_none());
        assert_eq!(m.image_name(), Some("abc.jpg"));

        m.detach_image();
        assert!(m.image_name().is_none());
    }

    #[test]
    fn test_serialized_view_skips_buffer() {
        let mut m = Message::outbound("Alice", "hi");
        m.attach_image("abc.jpg", vec![1, 2, 3, 4]);

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["image_name"], "abc.jpg");
        assert!(json.get("image_bytes").is_none());
    }
}
