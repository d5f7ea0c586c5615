use uuid::Uuid;

use crate::constants::{IMAGE_EXTENSION, MAX_IMAGE_NAME_LEN, STAGING_PREFIX, TEMP_IMAGE_NAME};
use crate::error::ImageNameError;

// Fresh collision-free image name: random 128-bit token + extension.
pub fn generate_image_name() -> String {
    format!("{}.{}", Uuid::new_v4(), IMAGE_EXTENSION)
}

/// Check that `name` can be used as a file directly inside the pictures
/// folder. Names arrive from the remote peer, so anything that could
/// resolve outside the folder is rejected.
pub fn validate_image_name(name: &str) -> Result<(), ImageNameError> {
    if name.is_empty() {
        return Err(ImageNameError::Empty);
    }
    if name.len() > MAX_IMAGE_NAME_LEN {
        return Err(ImageNameError::TooLong(name.len()));
    }
    if name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(ImageNameError::NotFlat(name.to_string()));
    }
    Ok(())
}

/// Like [`validate_image_name`], but also rejects the names this device
/// keeps for itself: the capture slot and the store's staging files.
pub fn validate_received_image_name(name: &str) -> Result<(), ImageNameError> {
    validate_image_name(name)?;
    if name == TEMP_IMAGE_NAME || name.starts_with(STAGING_PREFIX) {
        return Err(ImageNameError::Reserved(name.to_string()));
    }
    Ok(())
}
