//! Image staging between the photo picker, the message buffer, the wire
//! and the image store.
//!
//! An outbound image moves through [`ImageStage`]:
//!
//! ```text
//! None -> Captured -> Encoded -> Sent -> Persisted
//! ```
//!
//! There is a single capture slot. Capturing again before sending
//! overwrites the slot and discards the previous picture.
//!
//! Codec and storage failures never cost the message its text: the image
//! is dropped, the failure logged, and the message goes on without it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tapchat_media::{DisplayImage, ImageCodec};
use tapchat_shared::constants::TEMP_IMAGE_NAME;
use tapchat_shared::types::{generate_image_name, validate_received_image_name};
use tapchat_shared::Message;
use tapchat_store::ImageStore;

use crate::comm::CaptureOutcome;
use crate::error::StagingError;

/// Where the image of the in-progress outbound message stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageStage {
    #[default]
    None,
    /// Raw capture sits in the temp slot of the store.
    Captured { temp_name: String },
    /// Message holds the transfer buffer; a local copy has been written.
    Encoded { image_name: String },
    /// Transport accepted the message.
    Sent { image_name: String },
    /// Buffer released; the stored file is the only copy.
    Persisted { image_name: String },
}

impl ImageStage {
    /// A capture is waiting to go out with the next send.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Captured { .. })
    }

    pub fn image_name(&self) -> Option<&str> {
        match self {
            Self::Encoded { image_name }
            | Self::Sent { image_name }
            | Self::Persisted { image_name } => Some(image_name),
            Self::None | Self::Captured { .. } => None,
        }
    }

    /// Record that the transport accepted the message.
    pub fn sent(self) -> Self {
        match self {
            Self::Encoded { image_name } => Self::Sent { image_name },
            other => other,
        }
    }
}

/// What to do with `image_bytes` after it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRetention {
    /// Clear the buffer; the file becomes the only copy.
    Release,
    /// Keep the buffer, used while an outbound image still has to be sent.
    Keep,
}

/// Sequences capture, encode, persist and cleanup for message images.
#[derive(Clone)]
pub struct TransferOrchestrator {
    store: ImageStore,
    codec: Arc<dyn ImageCodec>,
}

impl TransferOrchestrator {
    pub fn new(store: ImageStore, codec: Arc<dyn ImageCodec>) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Put a picker result into the temp slot.
    ///
    /// Returns `true` if the stage now holds a capture. A cancelled picker
    /// leaves the stage as it was.
    pub async fn stage_capture(
        &self,
        stage: &mut ImageStage,
        outcome: CaptureOutcome,
    ) -> Result<bool, StagingError> {
        let raw = match outcome {
            CaptureOutcome::Chosen(raw) => raw,
            CaptureOutcome::Cancelled => {
                debug!("Capture cancelled");
                return Ok(false);
            }
        };

        self.store.write(TEMP_IMAGE_NAME, &raw).await?;

        if stage.is_pending() {
            info!("New capture replaces the pending one");
        }
        *stage = ImageStage::Captured {
            temp_name: TEMP_IMAGE_NAME.to_string(),
        };
        debug!(size = raw.len(), "Capture staged");
        Ok(true)
    }

    /// Encode the stored file `source_name` into `message` under a freshly
    /// generated image name. Returns that name.
    pub async fn encode_into(
        &self,
        message: &mut Message,
        source_name: &str,
    ) -> Result<String, StagingError> {
        let source = self.store.read(source_name).await?;

        let codec = Arc::clone(&self.codec);
        let encoded =
            tokio::task::spawn_blocking(move || codec.encode_to_buffer(&source)).await??;

        let image_name = generate_image_name();
        message.attach_image(image_name.clone(), encoded);
        Ok(image_name)
    }

    /// Flush `image_bytes` to the store under `image_name`.
    ///
    /// Returns `false` when there was no buffer to flush. With
    /// [`BufferRetention::Release`] the buffer is cleared once the write
    /// succeeded; on failure it is left for the caller to decide.
    pub async fn persist(
        &self,
        message: &mut Message,
        retention: BufferRetention,
    ) -> Result<bool, StagingError> {
        let Some(bytes) = message.image_bytes() else {
            return Ok(false);
        };
        let name = message
            .image_name()
            .ok_or(StagingError::MissingImageName)?;

        self.store.write(name, bytes).await?;

        if retention == BufferRetention::Release {
            message.take_image_bytes();
        }
        Ok(true)
    }

    /// Attach the pending capture to an outbound message.
    ///
    /// Encodes the temp slot into the message buffer and keeps a local
    /// copy so the sender can still view the picture. If encoding fails
    /// the message loses its attachment and goes out as text only.
    pub async fn prepare_outbound(&self, message: &mut Message, stage: ImageStage) -> ImageStage {
        let ImageStage::Captured { temp_name } = stage else {
            return ImageStage::None;
        };

        let image_name = match self.encode_into(message, &temp_name).await {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "Image encode failed, sending text only");
                message.detach_image();
                return ImageStage::None;
            }
        };

        if let Err(e) = self.persist(message, BufferRetention::Keep).await {
            warn!(
                image_name = %image_name,
                error = %e,
                "Failed to keep local copy of outbound image"
            );
        }

        ImageStage::Encoded { image_name }
    }

    /// Release the outbound buffer once the send attempt is over.
    pub fn complete_outbound(&self, message: &mut Message, stage: ImageStage) -> ImageStage {
        match stage {
            ImageStage::Encoded { image_name } | ImageStage::Sent { image_name } => {
                message.take_image_bytes();
                ImageStage::Persisted { image_name }
            }
            other => other,
        }
    }

    /// Stage the image of a freshly received message.
    ///
    /// Writes the buffer under the message's image name and clears it. On
    /// failure the buffer is dropped anyway and the message is surfaced
    /// without an image. A name that is not a plain file name, or that
    /// belongs to a local file such as the capture slot, drops the whole
    /// attachment. Returns whether the image is now stored.
    pub async fn accept_inbound(&self, message: &mut Message) -> bool {
        let rejected = message
            .image_name()
            .and_then(|name| validate_received_image_name(name).err());
        if let Some(e) = rejected {
            warn!(error = %e, "Dropping received image");
            message.detach_image();
            return false;
        }

        match self.persist(message, BufferRetention::Release).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    image_name = message.image_name().unwrap_or("<none>"),
                    error = %e,
                    "Failed to store received image"
                );
                message.take_image_bytes();
                false
            }
        }
    }

    pub async fn has_image(&self, message: &Message) -> bool {
        self.store.has_image(message).await
    }

    /// Load the stored image of `message` for display, if it has one.
    pub async fn display_image(
        &self,
        message: &Message,
    ) -> Result<Option<DisplayImage>, StagingError> {
        let Some(name) = message.image_name() else {
            return Ok(None);
        };
        if !self.store.exists(name).await {
            return Ok(None);
        }

        let data = self.store.read(name).await?;
        let codec = Arc::clone(&self.codec);
        let image = tokio::task::spawn_blocking(move || codec.decode_from_buffer(&data)).await??;
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tapchat_media::{CodecError, JpegCodec};
    use tempfile::TempDir;

    fn test_orchestrator() -> (TransferOrchestrator, TempDir) {
        let dir = TempDir::new().unwrap();
        let orchestrator =
            TransferOrchestrator::new(ImageStore::new(dir.path()), Arc::new(JpegCodec::new()));
        (orchestrator, dir)
    }

    fn create_test_png() -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(16, 9, |x, y| Rgb([(x * 15) as u8, (y * 25) as u8, 60]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        buf
    }

    async fn captured(orchestrator: &TransferOrchestrator, raw: Vec<u8>) -> ImageStage {
        let mut stage = ImageStage::None;
        assert!(orchestrator
            .stage_capture(&mut stage, CaptureOutcome::Chosen(raw))
            .await
            .unwrap());
        stage
    }

    #[tokio::test]
    async fn test_outbound_file_matches_encoded_buffer() {
        let (orchestrator, _dir) = test_orchestrator();
        let png = create_test_png();
        let expected = JpegCodec::new().encode_to_buffer(&png).unwrap();

        let stage = captured(&orchestrator, png).await;
        let mut m = Message::outbound("Alice", "look");
        let stage = orchestrator.prepare_outbound(&mut m, stage).await;

        let name = stage.image_name().unwrap().to_string();
        assert_eq!(m.image_name(), Some(name.as_str()));
        assert_eq!(m.image_bytes(), Some(expected.as_slice()));
        assert_eq!(orchestrator.store().read(&name).await.unwrap(), expected);

        let stage = orchestrator.complete_outbound(&mut m, stage.sent());
        assert_eq!(stage, ImageStage::Persisted { image_name: name });
        assert!(m.image_bytes().is_none());
        assert!(orchestrator.has_image(&m).await);
    }

    #[tokio::test]
    async fn test_encode_failure_sends_text_only() {
        let (orchestrator, _dir) = test_orchestrator();
        let stage = captured(&orchestrator, b"not an image".to_vec()).await;

        let mut m = Message::outbound("Alice", "caption");
        let stage = orchestrator.prepare_outbound(&mut m, stage).await;

        assert_eq!(stage, ImageStage::None);
        assert_eq!(m.text, "caption");
        assert!(m.image_name().is_none());
        assert!(m.image_bytes().is_none());
    }

    #[tokio::test]
    async fn test_second_capture_overwrites_slot() {
        let (orchestrator, _dir) = test_orchestrator();
        let mut stage = captured(&orchestrator, b"first".to_vec()).await;

        orchestrator
            .stage_capture(&mut stage, CaptureOutcome::Chosen(b"second".to_vec()))
            .await
            .unwrap();

        assert!(stage.is_pending());
        assert_eq!(
            orchestrator.store().read(TEMP_IMAGE_NAME).await.unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn test_cancelled_capture_keeps_stage() {
        let (orchestrator, _dir) = test_orchestrator();
        let mut stage = ImageStage::None;
        let staged = orchestrator
            .stage_capture(&mut stage, CaptureOutcome::Cancelled)
            .await
            .unwrap();

        assert!(!staged);
        assert_eq!(stage, ImageStage::None);
        assert!(!orchestrator.store().exists(TEMP_IMAGE_NAME).await);
    }

    #[tokio::test]
    async fn test_prepare_without_capture() {
        let (orchestrator, _dir) = test_orchestrator();
        let mut m = Message::outbound("Alice", "plain");
        let stage = orchestrator.prepare_outbound(&mut m, ImageStage::None).await;

        assert_eq!(stage, ImageStage::None);
        assert_eq!(m, Message::outbound("Alice", "plain"));
    }

    #[tokio::test]
    async fn test_inbound_image_stored_and_cleared() {
        let (orchestrator, _dir) = test_orchestrator();
        let mut sent = Message::outbound("Bob", "");
        sent.attach_image("abc.jpg", vec![1, 2, 3, 4]);
        let mut m = Message::received(sent);

        assert!(!orchestrator.has_image(&m).await);
        assert!(orchestrator.accept_inbound(&mut m).await);

        assert!(m.image_bytes().is_none());
        assert_eq!(m.image_name(), Some("abc.jpg"));
        assert_eq!(
            orchestrator.store().read("abc.jpg").await.unwrap(),
            vec![1, 2, 3, 4]
        );
        assert!(orchestrator.has_image(&m).await);
    }

    #[tokio::test]
    async fn test_inbound_reprocessing_is_idempotent() {
        let (orchestrator, _dir) = test_orchestrator();
        let mut original = Message::outbound("Bob", "again");
        original.attach_image("abc.jpg", vec![7; 4]);

        for _ in 0..2 {
            let mut m = Message::received(original.clone());
            assert!(orchestrator.accept_inbound(&mut m).await);
        }

        let files = std::fs::read_dir(orchestrator.store().pictures_dir())
            .unwrap()
            .count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_inbound_write_failure_surfaces_without_image() {
        let (orchestrator, dir) = test_orchestrator();
        std::fs::write(dir.path().join("Pictures"), b"in the way").unwrap();

        let mut sent = Message::outbound("Bob", "hello");
        sent.attach_image("abc.jpg", vec![1, 2, 3, 4]);
        let mut m = Message::received(sent);

        assert!(!orchestrator.accept_inbound(&mut m).await);
        assert!(m.image_bytes().is_none());
        assert_eq!(m.text, "hello");
        assert!(!orchestrator.has_image(&m).await);
    }

    #[tokio::test]
    async fn test_inbound_buffer_without_name_dropped() {
        let (orchestrator, _dir) = test_orchestrator();
        // tag 6 (image_bytes) appended to a payload that has no tag 5
        let mut payload = Message::outbound("Bob", "hello").encode();
        payload.extend_from_slice(&[0x32, 0x04, 1, 2, 3, 4]);
        let mut m = Message::received(Message::decode(&payload).unwrap());
        assert!(m.image_name().is_none());

        assert!(!orchestrator.accept_inbound(&mut m).await);
        assert!(m.image_bytes().is_none());
    }

    #[tokio::test]
    async fn test_inbound_traversal_name_rejected() {
        let (orchestrator, dir) = test_orchestrator();
        let mut sent = Message::outbound("Mallory", "");
        sent.attach_image("../escape.jpg", vec![1]);
        let mut m = Message::received(sent);

        assert!(!orchestrator.accept_inbound(&mut m).await);
        assert!(!dir.path().join("escape.jpg").exists());
        assert!(m.image_name().is_none());
        assert!(m.image_bytes().is_none());
    }

    #[tokio::test]
    async fn test_inbound_cannot_overwrite_capture_slot() {
        let (orchestrator, _dir) = test_orchestrator();
        let stage = captured(&orchestrator, b"mine".to_vec()).await;

        let mut sent = Message::outbound("Mallory", "look");
        sent.attach_image(TEMP_IMAGE_NAME, b"theirs".to_vec());
        let mut m = Message::received(sent);

        assert!(!orchestrator.accept_inbound(&mut m).await);
        assert_eq!(m.text, "look");
        assert!(m.image_name().is_none());
        assert!(!orchestrator.has_image(&m).await);
        assert!(stage.is_pending());
        assert_eq!(
            orchestrator.store().read(TEMP_IMAGE_NAME).await.unwrap(),
            b"mine"
        );
    }

    /// Codec that blocks the pictures folder while encoding, so the local
    /// copy written right after cannot land.
    struct BlockingStoreCodec {
        pictures_dir: std::path::PathBuf,
    }

    impl ImageCodec for BlockingStoreCodec {
        fn encode_to_buffer(&self, _raw: &[u8]) -> Result<Vec<u8>, CodecError> {
            std::fs::remove_dir_all(&self.pictures_dir).unwrap();
            std::fs::write(&self.pictures_dir, b"in the way").unwrap();
            Ok(vec![1, 2, 3])
        }

        fn decode_from_buffer(&self, data: &[u8]) -> Result<DisplayImage, CodecError> {
            JpegCodec::new().decode_from_buffer(data)
        }
    }

    #[tokio::test]
    async fn test_local_copy_failure_still_sends_image() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path());
        let codec = BlockingStoreCodec {
            pictures_dir: store.pictures_dir().to_path_buf(),
        };
        let orchestrator = TransferOrchestrator::new(store, Arc::new(codec));

        let stage = captured(&orchestrator, create_test_png()).await;
        let mut m = Message::outbound("Alice", "");
        let stage = orchestrator.prepare_outbound(&mut m, stage).await;

        let name = stage.image_name().unwrap().to_string();
        assert!(matches!(stage, ImageStage::Encoded { .. }));
        assert_eq!(m.image_name(), Some(name.as_str()));
        assert_eq!(m.image_bytes(), Some(&[1, 2, 3][..]));
        assert!(!orchestrator.has_image(&m).await);

        let stage = orchestrator.complete_outbound(&mut m, stage.sent());
        assert_eq!(stage, ImageStage::Persisted { image_name: name });
        assert!(m.image_bytes().is_none());
    }

    #[tokio::test]
    async fn test_display_image() {
        let (orchestrator, _dir) = test_orchestrator();
        let stage = captured(&orchestrator, create_test_png()).await;
        let mut m = Message::outbound("Alice", "");
        let stage = orchestrator.prepare_outbound(&mut m, stage).await;
        orchestrator.complete_outbound(&mut m, stage);

        let image = orchestrator.display_image(&m).await.unwrap().unwrap();
        assert_eq!((image.width(), image.height()), (16, 9));

        let plain = Message::outbound("Alice", "no picture");
        assert!(orchestrator.display_image(&plain).await.unwrap().is_none());
    }
}
