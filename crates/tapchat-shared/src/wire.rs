//! Binary wire format for [`Message`].
//!
//! Protobuf encoding with fixed tags:
//!
//! | tag | field       | presence |
//! |-----|-------------|----------|
//! | 1   | direction   | required |
//! | 2   | name        | required |
//! | 3   | text        | required |
//! | 4   | archived    | required |
//! | 5   | image_name  | optional |
//! | 6   | image_bytes | optional |
//!
//! Every field is declared with explicit presence so an absent optional
//! field is omitted rather than zero-filled, and an empty `image_bytes`
//! survives the round trip as `Some(vec![])`. Unknown tags are skipped.

use prost::Message as _;

use crate::error::WireError;
use crate::message::{Direction, Message};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum WireDirection {
    In = 0,
    Out = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
struct WireMessage {
    #[prost(enumeration = "WireDirection", optional, tag = "1")]
    direction: Option<i32>,
    #[prost(string, optional, tag = "2")]
    name: Option<String>,
    #[prost(string, optional, tag = "3")]
    text: Option<String>,
    #[prost(bool, optional, tag = "4")]
    archived: Option<bool>,
    #[prost(string, optional, tag = "5")]
    image_name: Option<String>,
    #[prost(bytes = "vec", optional, tag = "6")]
    image_bytes: Option<Vec<u8>>,
}

impl From<Direction> for WireDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Inbound => Self::In,
            Direction::Outbound => Self::Out,
        }
    }
}

impl From<WireDirection> for Direction {
    fn from(d: WireDirection) -> Self {
        match d {
            WireDirection::In => Self::Inbound,
            WireDirection::Out => Self::Outbound,
        }
    }
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, WireError> {
    field.ok_or_else(|| WireError::MalformedPayload(format!("missing required field `{name}`")))
}

impl Message {
    /// Serialize to the wire format. Pure function of the field values.
    pub fn encode(&self) -> Vec<u8> {
        WireMessage {
            direction: Some(WireDirection::from(self.direction) as i32),
            name: Some(self.sender_name.clone()),
            text: Some(self.text.clone()),
            archived: Some(self.archived),
            image_name: self.image_name.clone(),
            image_bytes: self.image_bytes.clone(),
        }
        .encode_to_vec()
    }

    /// Deserialize from the wire format.
    ///
    /// Fails with [`WireError::MalformedPayload`] on truncated input, on a
    /// wire type that does not match a known tag, on a missing required
    /// field, or on an unknown direction value.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let wire = WireMessage::decode(data)?;

        let raw_direction = required(wire.direction, "direction")?;
        let direction = WireDirection::try_from(raw_direction)
            .map_err(|_| WireError::MalformedPayload(format!("unknown direction {raw_direction}")))?;

        Ok(Self {
            direction: direction.into(),
            sender_name: required(wire.name, "name")?,
            text: required(wire.text, "text")?,
            archived: required(wire.archived, "archived")?,
            image_name: wire.image_name,
            image_bytes: wire.image_bytes,
        })
    }
}
