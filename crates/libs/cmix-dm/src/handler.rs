//! Application handler sets.

use std::fmt;

use serde::Serialize;

use crate::envelope::{
    DeleteRequest, DmEvent, EventKind, GenericEvent, MessageReceived, ReactionReceived,
    ReplyFamily, ReplyReceived, SentStatusUpdate, TextReceived,
};
use crate::InstanceId;

/// The value a handler hands back, one variant per [`ReplyFamily`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "family", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Status(i64),
    Buffer(Vec<u8>),
    Deleted(bool),
    Unit,
}

impl Reply {
    /// The reply an unregistered handler of `kind` produces.
    pub fn neutral(kind: EventKind) -> Self {
        match kind.reply_family() {
            ReplyFamily::Status => Self::Status(0),
            ReplyFamily::Buffer => Self::Buffer(Vec::new()),
            ReplyFamily::Deleted => Self::Deleted(false),
            ReplyFamily::Unit => Self::Unit,
        }
    }

    pub fn family(&self) -> ReplyFamily {
        match self {
            Self::Status(_) => ReplyFamily::Status,
            Self::Buffer(_) => ReplyFamily::Buffer,
            Self::Deleted(_) => ReplyFamily::Deleted,
            Self::Unit => ReplyFamily::Unit,
        }
    }
}

type Handler<E, R> = Box<dyn Fn(InstanceId, &E) -> R + Send + Sync>;
type KeyHandler<R> = Box<dyn Fn(InstanceId, &[u8]) -> R + Send + Sync>;
type QueryAllHandler = Box<dyn Fn(InstanceId) -> Vec<u8> + Send + Sync>;

/// One optional handler per event kind.
///
/// Kinds without a handler fall back to [`Reply::neutral`], so an application
/// only registers what it cares about. Every handler receives the instance id
/// the network layer reported with the event; in instance-scoped routing that
/// is also the instance the set is registered under.
///
/// ```
/// use cmix_dm::HandlerSet;
///
/// let handlers = HandlerSet::new()
///     .on_text_received(|_, msg| {
///         println!("{}: {}", msg.nickname, msg.text);
///         1
///     })
///     .on_conversation_query(|_, _sender| Vec::new());
/// assert!(handlers.handles(cmix_dm::EventKind::TextReceived));
/// ```
#[derive(Default)]
pub struct HandlerSet {
    message_received: Option<Handler<MessageReceived, i64>>,
    text_received: Option<Handler<TextReceived, i64>>,
    reply_received: Option<Handler<ReplyReceived, i64>>,
    reaction_received: Option<Handler<ReactionReceived, i64>>,
    sent_status: Option<Handler<SentStatusUpdate, ()>>,
    sender_blocked: Option<KeyHandler<()>>,
    sender_unblocked: Option<KeyHandler<()>>,
    conversation_query: Option<KeyHandler<Vec<u8>>>,
    all_conversations_query: Option<QueryAllHandler>,
    message_delete: Option<Handler<DeleteRequest, bool>>,
    generic_event: Option<Handler<GenericEvent, ()>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message_received<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &MessageReceived) -> i64 + Send + Sync + 'static,
    {
        self.message_received = Some(Box::new(handler));
        self
    }

    pub fn on_text_received<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &TextReceived) -> i64 + Send + Sync + 'static,
    {
        self.text_received = Some(Box::new(handler));
        self
    }

    pub fn on_reply_received<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &ReplyReceived) -> i64 + Send + Sync + 'static,
    {
        self.reply_received = Some(Box::new(handler));
        self
    }

    pub fn on_reaction_received<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &ReactionReceived) -> i64 + Send + Sync + 'static,
    {
        self.reaction_received = Some(Box::new(handler));
        self
    }

    pub fn on_sent_status<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &SentStatusUpdate) + Send + Sync + 'static,
    {
        self.sent_status = Some(Box::new(handler));
        self
    }

    pub fn on_sender_blocked<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &[u8]) + Send + Sync + 'static,
    {
        self.sender_blocked = Some(Box::new(handler));
        self
    }

    pub fn on_sender_unblocked<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &[u8]) + Send + Sync + 'static,
    {
        self.sender_unblocked = Some(Box::new(handler));
        self
    }

    /// Serialized conversation record for one sender. Return an empty buffer
    /// when the sender is unknown.
    pub fn on_conversation_query<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.conversation_query = Some(Box::new(handler));
        self
    }

    pub fn on_all_conversations_query<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId) -> Vec<u8> + Send + Sync + 'static,
    {
        self.all_conversations_query = Some(Box::new(handler));
        self
    }

    pub fn on_message_delete<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &DeleteRequest) -> bool + Send + Sync + 'static,
    {
        self.message_delete = Some(Box::new(handler));
        self
    }

    pub fn on_generic_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(InstanceId, &GenericEvent) + Send + Sync + 'static,
    {
        self.generic_event = Some(Box::new(handler));
        self
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::MessageReceived => self.message_received.is_some(),
            EventKind::TextReceived => self.text_received.is_some(),
            EventKind::ReplyReceived => self.reply_received.is_some(),
            EventKind::ReactionReceived => self.reaction_received.is_some(),
            EventKind::SentStatusUpdated => self.sent_status.is_some(),
            EventKind::SenderBlocked => self.sender_blocked.is_some(),
            EventKind::SenderUnblocked => self.sender_unblocked.is_some(),
            EventKind::ConversationQueried => self.conversation_query.is_some(),
            EventKind::AllConversationsQueried => self.all_conversations_query.is_some(),
            EventKind::MessageDeleteRequested => self.message_delete.is_some(),
            EventKind::GenericEvent => self.generic_event.is_some(),
        }
    }

    pub fn handled_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL.into_iter().filter(|kind| self.handles(*kind)).collect()
    }

    /// Run the handler for `event`, or produce the neutral reply. The flag is
    /// `true` when no handler was registered for the event's kind.
    pub(crate) fn invoke(&self, instance_id: InstanceId, event: &DmEvent) -> (Reply, bool) {
        fn run<E, R>(
            handler: &Option<Handler<E, R>>,
            instance_id: InstanceId,
            event: &E,
        ) -> Option<R> {
            handler.as_ref().map(|h| h(instance_id, event))
        }
        fn run_key<R>(
            handler: &Option<KeyHandler<R>>,
            instance_id: InstanceId,
            key: &[u8],
        ) -> Option<R> {
            handler.as_ref().map(|h| h(instance_id, key))
        }

        let reply = match event {
            DmEvent::MessageReceived(e) => {
                run(&self.message_received, instance_id, e).map(Reply::Status)
            }
            DmEvent::TextReceived(e) => run(&self.text_received, instance_id, e).map(Reply::Status),
            DmEvent::ReplyReceived(e) => {
                run(&self.reply_received, instance_id, e).map(Reply::Status)
            }
            DmEvent::ReactionReceived(e) => {
                run(&self.reaction_received, instance_id, e).map(Reply::Status)
            }
            DmEvent::SentStatusUpdated(e) => {
                run(&self.sent_status, instance_id, e).map(|()| Reply::Unit)
            }
            DmEvent::SenderBlocked { sender_pubkey } => {
                run_key(&self.sender_blocked, instance_id, sender_pubkey).map(|()| Reply::Unit)
            }
            DmEvent::SenderUnblocked { sender_pubkey } => {
                run_key(&self.sender_unblocked, instance_id, sender_pubkey).map(|()| Reply::Unit)
            }
            DmEvent::ConversationQueried { sender_pubkey } => {
                run_key(&self.conversation_query, instance_id, sender_pubkey).map(Reply::Buffer)
            }
            DmEvent::AllConversationsQueried => {
                self.all_conversations_query.as_ref().map(|h| Reply::Buffer(h(instance_id)))
            }
            DmEvent::MessageDeleteRequested(e) => {
                run(&self.message_delete, instance_id, e).map(Reply::Deleted)
            }
            DmEvent::GenericEvent(e) => {
                run(&self.generic_event, instance_id, e).map(|()| Reply::Unit)
            }
        };

        match reply {
            Some(reply) => (reply, false),
            None => (Reply::neutral(event.kind()), true),
        }
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet").field("handled", &self.handled_kinds()).finish()
    }
}
