//! Worker message codec
//!
//! Workers talk to the scheduler with colon-separated text messages:
//!
//! ```text
//! <type>:<algorithm>:<payload>
//! ```
//!
//! where `type` is the integer discriminant of [`MessageType`]. The payload is
//! everything after the second colon, so solutions containing `:` survive the
//! round trip. Decoding checks only the framing; the algorithm and payload are
//! validated by whoever consumes the message.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;
use crate::types::{ConnectionId, Timestamp};

/// Kind of worker message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Submit a hash to be cracked; payload is the hash
    SubmitHash = 0,
    /// Report the result of a job; payload is the solution or empty
    SolveHash = 1,
}

impl MessageType {
    pub fn discriminant(self) -> u8 {
        self as u8
    }

    pub fn from_discriminant(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageType::SubmitHash),
            1 => Some(MessageType::SolveHash),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::SubmitHash => write!(f, "SubmitHash"),
            MessageType::SolveHash => write!(f, "SolveHash"),
        }
    }
}

/// Encode a message for the wire
pub fn encode(message_type: MessageType, algorithm: &str, payload: &str) -> String {
    format!("{}:{}:{}", message_type.discriminant(), algorithm, payload)
}

/// A decoded worker message, stamped with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_type: MessageType,
    pub algorithm: String,
    pub payload: String,
    pub sender_id: ConnectionId,
    pub received_at: Timestamp,
}

impl Message {
    /// Parse a raw wire message received from `sender_id`
    pub fn decode(
        raw: &str,
        sender_id: ConnectionId,
        received_at: Timestamp,
    ) -> Result<Self, ProtocolError> {
        let mut fields = raw.splitn(3, ':');
        let (Some(kind), Some(algorithm), Some(payload)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ProtocolError::MalformedMessage {
                reason: format!("expected <type>:<algorithm>:<payload>, got {:?}", raw),
            });
        };

        let message_type = kind
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(MessageType::from_discriminant)
            .ok_or_else(|| ProtocolError::MalformedMessage {
                reason: format!("unknown message type {:?}", kind),
            })?;

        Ok(Self {
            message_type,
            algorithm: algorithm.to_string(),
            payload: payload.to_string(),
            sender_id,
            received_at,
        })
    }

    /// Re-encode this message for the wire
    pub fn encode(&self) -> String {
        encode(self.message_type, &self.algorithm, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Result<Message, ProtocolError> {
        Message::decode(raw, ConnectionId::new(), Timestamp::new(0))
    }

    #[test]
    fn test_encode_format() {
        assert_eq!(
            encode(MessageType::SubmitHash, "md5", "a4d80eac9ab26a4a2da04125bc2c096a"),
            "0:md5:a4d80eac9ab26a4a2da04125bc2c096a"
        );
        assert_eq!(encode(MessageType::SolveHash, "md5", ""), "1:md5:");
    }

    #[test]
    fn test_decode_empty_payload() {
        let message = decode("1:sha256:").unwrap();
        assert_eq!(message.message_type, MessageType::SolveHash);
        assert_eq!(message.algorithm, "sha256");
        assert_eq!(message.payload, "");
    }

    #[test]
    fn test_decode_keeps_colons_in_payload() {
        let message = decode("1:md5:pass:word").unwrap();
        assert_eq!(message.payload, "pass:word");
        assert_eq!(message.encode(), "1:md5:pass:word");
    }

    #[test]
    fn test_decode_does_not_validate_algorithm() {
        let message = decode("0:crc32:zz").unwrap();
        assert_eq!(message.algorithm, "crc32");
    }

    #[test]
    fn test_decode_rejects_bad_framing() {
        for raw in ["", "0", "0:md5", "x:md5:abc", "7:md5:abc", "-1:md5:abc"] {
            assert!(
                matches!(decode(raw), Err(ProtocolError::MalformedMessage { .. })),
                "{:?} should be rejected",
                raw
            );
        }
    }
}
