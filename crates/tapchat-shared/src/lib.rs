// Message entity and wire contract shared by every tapchat crate.

pub mod constants;
pub mod error;
pub mod message;
pub mod types;
pub mod wire;

pub use error::WireError;
pub use message::{Direction, Message};
