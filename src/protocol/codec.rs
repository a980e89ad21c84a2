//! Header + payload frame codec.
//!
//! # Responsibilities
//! - Encode a kind and payload into one wire frame
//! - Decode a terminator-delimited header into a [`Message`]
//!
//! The header is compact JSON. Compact JSON escapes every control character,
//! so the CRLF terminator can never appear inside an encoded header.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::protocol::message::{Message, MessageKind, SIZE_KEY, TYPE_KEY};

/// End-of-header marker.
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// Reasons a header is rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("header is not a flat string map: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("header is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("invalid size `{0}`")]
    InvalidSize(String),

    #[error("declared size {size} exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl DecodeError {
    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::UnknownType(_) => "unknown_type",
            DecodeError::InvalidSize(_) => "invalid_size",
            DecodeError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}

/// Build a complete frame: header, terminator, payload.
///
/// Heartbeats always declare size 0 and carry no payload bytes.
pub fn encode(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
    let payload = if kind.has_payload() { payload } else { &[] };

    let mut header = BTreeMap::new();
    header.insert(TYPE_KEY, kind.as_str().to_string());
    header.insert(SIZE_KEY, payload.len().to_string());

    let mut frame = serde_json::to_vec(&header).unwrap_or_default();
    frame.reserve(TERMINATOR.len() + payload.len());
    frame.extend_from_slice(TERMINATOR);
    frame.extend_from_slice(payload);
    frame
}

/// Decode header bytes into a payload-less [`Message`].
///
/// A trailing terminator, if still attached, is ignored.
pub fn decode_header(bytes: &[u8]) -> Result<Message, DecodeError> {
    let bytes = bytes.strip_suffix(TERMINATOR.as_slice()).unwrap_or(bytes);
    let fields: HashMap<String, String> = serde_json::from_slice(bytes)?;

    let kind = fields
        .get(TYPE_KEY)
        .ok_or(DecodeError::MissingField(TYPE_KEY))?;
    let kind: MessageKind = kind
        .parse()
        .map_err(|_| DecodeError::UnknownType(kind.clone()))?;

    let size = fields
        .get(SIZE_KEY)
        .ok_or(DecodeError::MissingField(SIZE_KEY))?;
    let size: usize = size
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidSize(size.clone()))?;

    Ok(Message {
        kind,
        declared_size: if kind.has_payload() { size } else { 0 },
        raw_header: fields.into_iter().collect(),
        payload: None,
    })
}
