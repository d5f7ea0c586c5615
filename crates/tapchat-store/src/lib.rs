//! # tapchat-store
//!
//! Local persistence for message images.
//!
//! Images live as plain files in a single flat `Pictures` folder under the
//! application data directory. There is no index or manifest: a file
//! existing under an image name is the only record that the image is
//! present.

pub mod image_store;

mod error;

pub use error::{Result, StoreError};
pub use image_store::ImageStore;
