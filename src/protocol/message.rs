//! Message types carried by a frame.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Header key naming the message kind.
pub const TYPE_KEY: &str = "type";
/// Header key carrying the payload length in decimal ASCII.
pub const SIZE_KEY: &str = "size";

/// Kind of a frame, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Heartbeat,
    Image,
    Text,
    #[serde(rename = "wav")]
    Audio,
}

impl MessageKind {
    /// All known kinds.
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Heartbeat,
        MessageKind::Image,
        MessageKind::Text,
        MessageKind::Audio,
    ];

    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::Image => "image",
            MessageKind::Text => "text",
            MessageKind::Audio => "wav",
        }
    }

    /// Whether a frame of this kind is followed by a payload.
    pub fn has_payload(&self) -> bool {
        !matches!(self, MessageKind::Heartbeat)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire name matches no known kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for MessageKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// One decoded frame.
///
/// Built from the header first; `payload` stays `None` until the transport has
/// delivered exactly `declared_size` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub declared_size: usize,
    /// Every header field as received, including `type` and `size`.
    pub raw_header: BTreeMap<String, String>,
    pub payload: Option<Vec<u8>>,
}

impl Message {
    /// Attach the payload, consuming the header-only message.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Payload bytes, empty when none was attached.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }
}
