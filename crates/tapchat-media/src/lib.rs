// Image codec adapter: capture -> transfer JPEG, stored JPEG -> bitmap.

pub mod codec;
pub mod error;

pub use codec::{DisplayImage, ImageCodec, JpegCodec};
pub use error::CodecError;
