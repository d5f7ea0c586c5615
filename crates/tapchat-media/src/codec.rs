use image::codecs::jpeg::JpegEncoder;
use image::RgbaImage;
use tracing::debug;

use tapchat_shared::constants::JPEG_QUALITY;

use crate::error::CodecError;

/// Converts between a source picture and the compressed buffer carried by
/// a message. Implementations are pure but CPU heavy; async callers should
/// run them on a blocking worker.
pub trait ImageCodec: Send + Sync {
    /// Re-encode `source` (any supported format) into the transfer format,
    /// keeping its native pixel dimensions.
    fn encode_to_buffer(&self, source: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decode a stored buffer into a bitmap ready for display.
    fn decode_from_buffer(&self, bytes: &[u8]) -> Result<DisplayImage, CodecError>;
}

/// Decoded RGBA bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayImage {
    pixels: RgbaImage,
}

impl DisplayImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

/// Baseline JPEG codec, quality 90 unless overridden.
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    pub fn new() -> Self {
        Self {
            quality: JPEG_QUALITY,
        }
    }

    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for JpegCodec {
    fn encode_to_buffer(&self, source: &[u8]) -> Result<Vec<u8>, CodecError> {
        let img = image::load_from_memory(source).map_err(CodecError::EncodeFailure)?;
        // JPEG has no alpha channel
        let rgb = img.to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&rgb)
            .map_err(CodecError::EncodeFailure)?;

        debug!(
            width = rgb.width(),
            height = rgb.height(),
            source_len = source.len(),
            encoded_len = buf.len(),
            quality = self.quality,
            "Encoded image for transfer"
        );
        Ok(buf)
    }

    fn decode_from_buffer(&self, bytes: &[u8]) -> Result<DisplayImage, CodecError> {
        let img = image::load_from_memory(bytes).map_err(CodecError::DecodeFailure)?;
        Ok(DisplayImage {
            pixels: img.to_rgba8(),
        })
    }
}
