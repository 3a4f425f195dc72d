//! Handler-table generations and the capabilities each one can express.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::envelope::EventKind;

/// Generation of the handler table an application registers.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SchemaGeneration {
    /// Message and sent-status handlers only, a single key per message,
    /// one process-wide handler table.
    V1,
    /// Split partner/sender keys plus blocking and conversation queries,
    /// still one process-wide table.
    V2,
    /// Every event kind, each handler table bound to its own instance.
    #[default]
    V3,
}

impl SchemaGeneration {
    /// Map the integer generation used across the C boundary.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for SchemaGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_raw())
    }
}

/// Bit set of optional router features.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RouterCapabilities(u8);

impl RouterCapabilities {
    pub const NONE: Self = Self(0);
    /// Every event names its target instance.
    pub const INSTANCE_SCOPED: Self = Self(1 << 0);
    /// Messages carry separate partner and sender keys.
    pub const SPLIT_SENDER_KEYS: Self = Self(1 << 1);
    pub const SENDER_BLOCKING: Self = Self(1 << 2);
    pub const CONVERSATION_QUERIES: Self = Self(1 << 3);
    pub const MESSAGE_DELETION: Self = Self(1 << 4);
    pub const EVENT_UPDATES: Self = Self(1 << 5);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn all() -> Self {
        Self::INSTANCE_SCOPED
            .union(Self::SPLIT_SENDER_KEYS)
            .union(Self::SENDER_BLOCKING)
            .union(Self::CONVERSATION_QUERIES)
            .union(Self::MESSAGE_DELETION)
            .union(Self::EVENT_UPDATES)
    }

    pub const fn for_generation(generation: SchemaGeneration) -> Self {
        match generation {
            SchemaGeneration::V1 => Self::NONE,
            SchemaGeneration::V2 => Self::SPLIT_SENDER_KEYS
                .union(Self::SENDER_BLOCKING)
                .union(Self::CONVERSATION_QUERIES),
            SchemaGeneration::V3 => Self::all(),
        }
    }

    pub const fn is_instance_scoped(self) -> bool {
        self.contains(Self::INSTANCE_SCOPED)
    }

    /// Whether a router with these capabilities can deliver `kind` at all.
    pub fn supports(self, kind: EventKind) -> bool {
        match kind {
            EventKind::MessageReceived
            | EventKind::TextReceived
            | EventKind::ReplyReceived
            | EventKind::ReactionReceived
            | EventKind::SentStatusUpdated => true,
            EventKind::SenderBlocked | EventKind::SenderUnblocked => {
                self.contains(Self::SENDER_BLOCKING)
            }
            EventKind::ConversationQueried | EventKind::AllConversationsQueried => {
                self.contains(Self::CONVERSATION_QUERIES)
            }
            EventKind::MessageDeleteRequested => self.contains(Self::MESSAGE_DELETION),
            EventKind::GenericEvent => self.contains(Self::EVENT_UPDATES),
        }
    }
}

impl BitOr for RouterCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
