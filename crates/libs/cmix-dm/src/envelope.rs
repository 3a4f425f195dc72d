//! Decoded DM network events.
//!
//! Every event the network layer hands over is copied into one of the owned
//! records below before it reaches a handler, so nothing here borrows from the
//! producer's buffers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::InstanceId;

// ── Event kinds ───────────────────────────────────────────────────────────────

/// Discriminant of a [`DmEvent`], decided before any field is inspected.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageReceived,
    TextReceived,
    ReplyReceived,
    ReactionReceived,
    SentStatusUpdated,
    SenderBlocked,
    SenderUnblocked,
    ConversationQueried,
    AllConversationsQueried,
    MessageDeleteRequested,
    GenericEvent,
}

/// What a handler of a given kind hands back to the network layer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFamily {
    /// An `int64` acceptance/sequencing status.
    Status,
    /// A serialized record returned as a `(length, pointer)` buffer.
    Buffer,
    /// A boolean success flag.
    Deleted,
    /// Nothing.
    Unit,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        Self::MessageReceived,
        Self::TextReceived,
        Self::ReplyReceived,
        Self::ReactionReceived,
        Self::SentStatusUpdated,
        Self::SenderBlocked,
        Self::SenderUnblocked,
        Self::ConversationQueried,
        Self::AllConversationsQueried,
        Self::MessageDeleteRequested,
        Self::GenericEvent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageReceived => "message_received",
            Self::TextReceived => "text_received",
            Self::ReplyReceived => "reply_received",
            Self::ReactionReceived => "reaction_received",
            Self::SentStatusUpdated => "sent_status_updated",
            Self::SenderBlocked => "sender_blocked",
            Self::SenderUnblocked => "sender_unblocked",
            Self::ConversationQueried => "conversation_queried",
            Self::AllConversationsQueried => "all_conversations_queried",
            Self::MessageDeleteRequested => "message_delete_requested",
            Self::GenericEvent => "generic_event",
        }
    }

    pub fn reply_family(self) -> ReplyFamily {
        match self {
            Self::MessageReceived
            | Self::TextReceived
            | Self::ReplyReceived
            | Self::ReactionReceived => ReplyFamily::Status,
            Self::ConversationQueried | Self::AllConversationsQueried => ReplyFamily::Buffer,
            Self::MessageDeleteRequested => ReplyFamily::Deleted,
            Self::SentStatusUpdated
            | Self::SenderBlocked
            | Self::SenderUnblocked
            | Self::GenericEvent => ReplyFamily::Unit,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Event records ─────────────────────────────────────────────────────────────

/// A received message of any type, delivered with its raw payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceived {
    pub message_id: Vec<u8>,
    pub nickname: String,
    pub text: Vec<u8>,
    pub partner_key: Vec<u8>,
    pub sender_key: Vec<u8>,
    pub dm_token: i32,
    pub codeset: i32,
    pub timestamp: i64,
    pub round_id: i64,
    pub message_type: i64,
    pub status: i64,
}

/// A received plain-text message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReceived {
    pub message_id: Vec<u8>,
    pub nickname: String,
    pub text: String,
    pub partner_key: Vec<u8>,
    pub sender_key: Vec<u8>,
    pub dm_token: i32,
    pub codeset: i32,
    pub timestamp: i64,
    pub round_id: i64,
    pub status: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyReceived {
    pub message: TextReceived,
    /// Identifier of the message being replied to.
    pub reply_to: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionReceived {
    /// The reaction itself travels as the message text.
    pub message: TextReceived,
    pub reaction_to: Vec<u8>,
}

/// Delivery progress for a message this instance sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentStatusUpdate {
    pub local_uuid: i64,
    pub message_id: Vec<u8>,
    pub timestamp: i64,
    pub round_id: i64,
    pub status: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub message_id: Vec<u8>,
    pub sender_pubkey: Vec<u8>,
}

/// An opaque typed notification whose payload is a JSON document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericEvent {
    pub event_type: i64,
    pub payload: Vec<u8>,
}

impl GenericEvent {
    /// Parse the payload. The router never does this itself.
    pub fn payload_json(&self) -> serde_json::Result<JsonValue> {
        serde_json::from_slice(&self.payload)
    }
}

/// One decoded network event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DmEvent {
    MessageReceived(MessageReceived),
    TextReceived(TextReceived),
    ReplyReceived(ReplyReceived),
    ReactionReceived(ReactionReceived),
    SentStatusUpdated(SentStatusUpdate),
    SenderBlocked { sender_pubkey: Vec<u8> },
    SenderUnblocked { sender_pubkey: Vec<u8> },
    ConversationQueried { sender_pubkey: Vec<u8> },
    AllConversationsQueried,
    MessageDeleteRequested(DeleteRequest),
    GenericEvent(GenericEvent),
}

impl DmEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageReceived(_) => EventKind::MessageReceived,
            Self::TextReceived(_) => EventKind::TextReceived,
            Self::ReplyReceived(_) => EventKind::ReplyReceived,
            Self::ReactionReceived(_) => EventKind::ReactionReceived,
            Self::SentStatusUpdated(_) => EventKind::SentStatusUpdated,
            Self::SenderBlocked { .. } => EventKind::SenderBlocked,
            Self::SenderUnblocked { .. } => EventKind::SenderUnblocked,
            Self::ConversationQueried { .. } => EventKind::ConversationQueried,
            Self::AllConversationsQueried => EventKind::AllConversationsQueried,
            Self::MessageDeleteRequested(_) => EventKind::MessageDeleteRequested,
            Self::GenericEvent(_) => EventKind::GenericEvent,
        }
    }

    /// A short identifier for log lines: the message id where the event has
    /// one, otherwise the sender key.
    pub(crate) fn log_tag(&self) -> String {
        let bytes: &[u8] = match self {
            Self::MessageReceived(m) => &m.message_id,
            Self::TextReceived(m) => &m.message_id,
            Self::ReplyReceived(m) => &m.message.message_id,
            Self::ReactionReceived(m) => &m.message.message_id,
            Self::SentStatusUpdated(m) => &m.message_id,
            Self::SenderBlocked { sender_pubkey }
            | Self::SenderUnblocked { sender_pubkey }
            | Self::ConversationQueried { sender_pubkey } => sender_pubkey,
            Self::AllConversationsQueried => &[],
            Self::MessageDeleteRequested(m) => &m.message_id,
            Self::GenericEvent(_) => &[],
        };
        short_hex(bytes)
    }
}

/// A decoded event addressed to one instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub instance_id: InstanceId,
    pub event: DmEvent,
}

impl EventEnvelope {
    pub fn new(instance_id: InstanceId, event: DmEvent) -> Self {
        Self { instance_id, event }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

fn short_hex(bytes: &[u8]) -> String {
    const PREFIX: usize = 8;
    if bytes.len() > PREFIX {
        format!("{}..", hex::encode(&bytes[..PREFIX]))
    } else {
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_serde_names() {
        for kind in EventKind::ALL {
            let encoded = serde_json::to_string(&kind).expect("serialize kind");
            assert_eq!(encoded, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn event_kind_matches_variant() {
        let event = DmEvent::ConversationQueried { sender_pubkey: vec![1, 2] };
        assert_eq!(event.kind(), EventKind::ConversationQueried);
        assert_eq!(event.kind().reply_family(), ReplyFamily::Buffer);
        assert_eq!(DmEvent::AllConversationsQueried.kind().reply_family(), ReplyFamily::Buffer);
    }

    #[test]
    fn generic_payload_parses_lazily() {
        let event = GenericEvent { event_type: 7, payload: br#"{"a":1}"#.to_vec() };
        let value = event.payload_json().expect("valid json");
        assert_eq!(value["a"], 1);

        let broken = GenericEvent { event_type: 7, payload: b"{".to_vec() };
        assert!(broken.payload_json().is_err());
    }

    #[test]
    fn log_tag_truncates_long_ids() {
        let event = DmEvent::SentStatusUpdated(SentStatusUpdate {
            message_id: vec![0xab; 32],
            ..SentStatusUpdate::default()
        });
        assert_eq!(event.log_tag(), "abababababababab..");
    }
}
