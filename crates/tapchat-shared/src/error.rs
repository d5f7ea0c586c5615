use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<prost::DecodeError> for WireError {
    fn from(e: prost::DecodeError) -> Self {
        Self::MalformedPayload(e.to_string())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageNameError {
    #[error("Image name is empty")]
    Empty,

    #[error("Image name too long: {0} bytes")]
    TooLong(usize),

    #[error("Image name must be a single file name: {0}")]
    NotFlat(String),

    #[error("Image name is reserved for local use: {0}")]
    Reserved(String),
}
