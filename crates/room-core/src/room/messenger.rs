//! Data channel chat messages
//!
//! The wire format is one UTF-8 JSON object per payload:
//! `{"message": "<text>"}`. Nothing else rides along; sender identity
//! comes from transport metadata and timestamps are assigned locally.
//!
//! Ordering: the underlying channel is reliable and ordered per sender,
//! so each participant's messages arrive in the order they sent them.
//! There is no total order across senders.

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, RoomError};
use crate::types::{ChatMessage, ParticipantId};

/// On-the-wire chat payload
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    message: String,
}

/// Encodes outgoing messages and decodes incoming ones, stamping each
/// with the session's next sequence number.
///
/// One counter covers both directions: every message this session
/// observes (sent or received) gets a strictly larger sequence than the
/// one before it. The number never goes on the wire; it exists so
/// ordering can be asserted and displayed.
#[derive(Debug)]
pub(crate) struct Messenger {
    next_sequence: u64,
    max_message_bytes: usize,
}

impl Messenger {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            next_sequence: 0,
            max_message_bytes,
        }
    }

    /// Encode an outgoing message and mint its local echo.
    pub fn outgoing(&mut self, sender: &ParticipantId, text: &str) -> Result<(Bytes, ChatMessage)> {
        if text.len() > self.max_message_bytes {
            return Err(RoomError::MessageTooLarge {
                actual: text.len(),
                max: self.max_message_bytes,
            });
        }

        let payload = serde_json::to_vec(&WireMessage {
            message: text.to_string(),
        })?;

        let message = ChatMessage {
            sender_id: sender.clone(),
            text: text.to_string(),
            sent_at: Utc::now(),
            sequence: self.next_sequence(),
        };
        Ok((Bytes::from(payload), message))
    }

    /// Decode an inbound payload into a message stamped with the next
    /// receipt ordinal. Malformed payloads are an error the caller logs
    /// and drops; they never take the session down.
    pub fn incoming(&mut self, sender: &ParticipantId, payload: &[u8]) -> Result<ChatMessage> {
        let wire: WireMessage = serde_json::from_slice(payload)?;
        Ok(ChatMessage {
            sender_id: sender.clone(),
            text: wire.message,
            sent_at: Utc::now(),
            sequence: self.next_sequence(),
        })
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> ParticipantId {
        ParticipantId::new("p1")
    }

    #[test]
    fn test_wire_shape_is_exactly_message() {
        let mut messenger = Messenger::new(1024);
        let (payload, _) = messenger.outgoing(&sender(), "hi there").unwrap();
        assert_eq!(payload.as_ref(), br#"{"message":"hi there"}"#);
    }

    #[test]
    fn test_sequences_strictly_increase_across_directions() {
        let mut messenger = Messenger::new(1024);
        let them = ParticipantId::new("p2");

        let (_, first) = messenger.outgoing(&sender(), "x").unwrap();
        let second = messenger.incoming(&them, br#"{"message":"y"}"#).unwrap();
        let (_, third) = messenger.outgoing(&sender(), "z").unwrap();

        assert!(first.sequence < second.sequence);
        assert!(second.sequence < third.sequence);
    }

    #[test]
    fn test_incoming_keeps_sender_attribution() {
        let mut messenger = Messenger::new(1024);
        let them = ParticipantId::new("p2");
        let message = messenger.incoming(&them, br#"{"message":"hello"}"#).unwrap();
        assert_eq!(message.sender_id, them);
        assert_eq!(message.text, "hello");
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut messenger = Messenger::new(4);
        let result = messenger.outgoing(&sender(), "too long");
        assert!(matches!(result, Err(RoomError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let mut messenger = Messenger::new(1024);
        assert!(messenger.incoming(&sender(), b"not json").is_err());
        assert!(messenger.incoming(&sender(), br#"{"other":"shape"}"#).is_err());
    }

    #[test]
    fn test_unicode_text_roundtrip() {
        let mut messenger = Messenger::new(1024);
        let (payload, echo) = messenger.outgoing(&sender(), "integral: \u{222B} f dx").unwrap();
        let mut other = Messenger::new(1024);
        let received = other.incoming(&sender(), &payload).unwrap();
        assert_eq!(received.text, echo.text);
    }
}
