use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Image encode failed: {0}")]
    EncodeFailure(#[source] image::ImageError),

    #[error("Image decode failed: {0}")]
    DecodeFailure(#[source] image::ImageError),
}
