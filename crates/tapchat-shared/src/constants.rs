/// Flat folder holding every persisted image, relative to the data directory
pub const PICTURES_FOLDER: &str = "Pictures";

/// Fixed file name of the not-yet-sent capture
pub const TEMP_IMAGE_NAME: &str = "tempImage.jpg";

/// Prefix of the hidden files the image store writes through
pub const STAGING_PREFIX: &str = ".staging-";

/// Extension appended to generated image names
pub const IMAGE_EXTENSION: &str = "jpg";

/// JPEG quality used when re-encoding a capture for transfer (0-100)
pub const JPEG_QUALITY: u8 = 90;

/// Longest accepted image file name in bytes
pub const MAX_IMAGE_NAME_LEN: usize = 255;
