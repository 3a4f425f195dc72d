//! Entry points the network layer calls for each decoded DM event.
//!
//! Every entry point copies its arguments into an owned [`EventEnvelope`]
//! before dispatch and always returns a value of its reply family: events
//! that cannot be delivered get the neutral reply.
//!
//! The signatures are the same in every generation and all of them take the
//! instance id first, including block/unblock and the conversation queries
//! whose older handler slots have no id. Routers that are not instance-scoped
//! ignore the id for routing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use cmix_dm::{
    BoundaryError, DeleteRequest, DmEvent, EventEnvelope, EventKind, GenericEvent,
    MessageReceived, ReactionReceived, Reply, ReplyReceived, SentStatusUpdate, TextReceived,
};
use libc::{c_char, c_int, c_long, c_void};

use crate::router::global;
use crate::span::{borrow_span, into_c_buffer, CByteSlice};
use crate::table::to_c_long;

static BOUNDARY_REJECTIONS: AtomicU64 = AtomicU64::new(0);

/// Events rejected before dispatch because an argument span was malformed.
pub fn boundary_rejections() -> u64 {
    BOUNDARY_REJECTIONS.load(Ordering::Relaxed)
}

fn deliver<F>(kind: EventKind, build: F) -> Reply
where
    F: FnOnce() -> Result<EventEnvelope, BoundaryError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let global = match global() {
            Ok(global) => global,
            Err(err) => {
                log::warn!("dropping {kind} event: {err}");
                return Reply::neutral(kind);
            }
        };
        match build() {
            Ok(envelope) => global.router.dispatch(&envelope).wire_reply(kind),
            Err(err) => {
                BOUNDARY_REJECTIONS.fetch_add(1, Ordering::Relaxed);
                log::warn!("rejecting {kind} event: {err}");
                Reply::neutral(kind)
            }
        }
    }));
    outcome.unwrap_or_else(|_| {
        log::error!("{kind} entry point panicked");
        Reply::neutral(kind)
    })
}

fn status_reply(reply: Reply) -> c_long {
    match reply {
        Reply::Status(status) => to_c_long(status),
        _ => 0,
    }
}

fn buffer_reply(reply: Reply) -> CByteSlice {
    let Reply::Buffer(bytes) = reply else {
        return CByteSlice::null();
    };
    into_c_buffer(&bytes).unwrap_or_else(|err| {
        log::error!("cannot return conversation buffer: {err}");
        CByteSlice::null()
    })
}

fn deleted_reply(reply: Reply) -> c_int {
    c_int::from(matches!(reply, Reply::Deleted(true)))
}

/// Borrowed arguments of the text-carrying message entry points.
struct RawText {
    message_id: (*const c_void, c_int),
    nickname: (*const c_char, c_int),
    text: (*const c_char, c_int),
    partner_key: (*const c_void, c_int),
    sender_key: (*const c_void, c_int),
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
}

impl RawText {
    /// # Safety
    ///
    /// Every pointer must satisfy [`borrow_span`] for its length.
    unsafe fn decode(&self) -> Result<TextReceived, BoundaryError> {
        // SAFETY: forwarded from the caller.
        unsafe {
            Ok(TextReceived {
                message_id: borrow_span(self.message_id.0, self.message_id.1, "message_id")?
                    .to_vec(),
                nickname: borrow_span(self.nickname.0.cast(), self.nickname.1, "nickname")?
                    .to_utf8_lossy(),
                text: borrow_span(self.text.0.cast(), self.text.1, "text")?.to_utf8()?,
                partner_key: borrow_span(self.partner_key.0, self.partner_key.1, "partner_key")?
                    .to_vec(),
                sender_key: borrow_span(self.sender_key.0, self.sender_key.1, "sender_key")?
                    .to_vec(),
                dm_token: self.dm_token,
                codeset: self.codeset,
                timestamp: i64::from(self.timestamp),
                round_id: i64::from(self.round_id),
                status: i64::from(self.status),
            })
        }
    }
}

/// A received message of any type.
///
/// # Safety
///
/// Each pointer must be null or point to at least its length in readable
/// bytes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_receive(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_void,
    text_len: c_int,
    partner_key: *mut c_void,
    partner_key_len: c_int,
    sender_key: *mut c_void,
    sender_key_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    msg_type: c_long,
    status: c_long,
) -> c_long {
    let reply = deliver(EventKind::MessageReceived, || {
        // SAFETY: spans are valid per this function's contract.
        let message = unsafe {
            MessageReceived {
                message_id: borrow_span(message_id, message_id_len, "message_id")?.to_vec(),
                nickname: borrow_span(nickname.cast_const().cast(), nickname_len, "nickname")?
                    .to_utf8_lossy(),
                text: borrow_span(text, text_len, "text")?.to_vec(),
                partner_key: borrow_span(partner_key, partner_key_len, "partner_key")?.to_vec(),
                sender_key: borrow_span(sender_key, sender_key_len, "sender_key")?.to_vec(),
                dm_token,
                codeset,
                timestamp: i64::from(timestamp),
                round_id: i64::from(round_id),
                message_type: i64::from(msg_type),
                status: i64::from(status),
            }
        };
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::MessageReceived(message)))
    });
    status_reply(reply)
}

/// A received text message. `text` must be UTF-8.
///
/// # Safety
///
/// As for [`cmix_dm_receive`].
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_receive_text(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_char,
    text_len: c_int,
    partner_key: *mut c_void,
    partner_key_len: c_int,
    sender_key: *mut c_void,
    sender_key_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
) -> c_long {
    let raw = RawText {
        message_id: (message_id.cast_const(), message_id_len),
        nickname: (nickname.cast_const(), nickname_len),
        text: (text.cast_const(), text_len),
        partner_key: (partner_key.cast_const(), partner_key_len),
        sender_key: (sender_key.cast_const(), sender_key_len),
        dm_token,
        codeset,
        timestamp,
        round_id,
        status,
    };
    let reply = deliver(EventKind::TextReceived, || {
        // SAFETY: spans are valid per this function's contract.
        let message = unsafe { raw.decode() }?;
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::TextReceived(message)))
    });
    status_reply(reply)
}

/// A text reply to `reply_to`.
///
/// # Safety
///
/// As for [`cmix_dm_receive`].
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_receive_reply(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    reply_to: *mut c_void,
    reply_to_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_char,
    text_len: c_int,
    partner_key: *mut c_void,
    partner_key_len: c_int,
    sender_key: *mut c_void,
    sender_key_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
) -> c_long {
    let raw = RawText {
        message_id: (message_id.cast_const(), message_id_len),
        nickname: (nickname.cast_const(), nickname_len),
        text: (text.cast_const(), text_len),
        partner_key: (partner_key.cast_const(), partner_key_len),
        sender_key: (sender_key.cast_const(), sender_key_len),
        dm_token,
        codeset,
        timestamp,
        round_id,
        status,
    };
    let reply = deliver(EventKind::ReplyReceived, || {
        // SAFETY: spans are valid per this function's contract.
        let (message, reply_to) = unsafe {
            (raw.decode()?, borrow_span(reply_to, reply_to_len, "reply_to")?.to_vec())
        };
        Ok(EventEnvelope::new(
            dm_instance_id,
            DmEvent::ReplyReceived(ReplyReceived { message, reply_to }),
        ))
    });
    status_reply(reply)
}

/// A reaction to `reaction_to`; the reaction itself is the text.
///
/// # Safety
///
/// As for [`cmix_dm_receive`].
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_receive_reaction(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    reaction_to: *mut c_void,
    reaction_to_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_char,
    text_len: c_int,
    partner_key: *mut c_void,
    partner_key_len: c_int,
    sender_key: *mut c_void,
    sender_key_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
) -> c_long {
    let raw = RawText {
        message_id: (message_id.cast_const(), message_id_len),
        nickname: (nickname.cast_const(), nickname_len),
        text: (text.cast_const(), text_len),
        partner_key: (partner_key.cast_const(), partner_key_len),
        sender_key: (sender_key.cast_const(), sender_key_len),
        dm_token,
        codeset,
        timestamp,
        round_id,
        status,
    };
    let reply = deliver(EventKind::ReactionReceived, || {
        // SAFETY: spans are valid per this function's contract.
        let (message, reaction_to) = unsafe {
            (raw.decode()?, borrow_span(reaction_to, reaction_to_len, "reaction_to")?.to_vec())
        };
        Ok(EventEnvelope::new(
            dm_instance_id,
            DmEvent::ReactionReceived(ReactionReceived { message, reaction_to }),
        ))
    });
    status_reply(reply)
}

/// # Safety
///
/// `message_id` must be null or point to `message_id_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_update_sent_status(
    dm_instance_id: c_int,
    uuid: c_long,
    message_id: *mut c_void,
    message_id_len: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
) {
    deliver(EventKind::SentStatusUpdated, || {
        // SAFETY: valid per this function's contract.
        let message_id = unsafe { borrow_span(message_id, message_id_len, "message_id") }?.to_vec();
        Ok(EventEnvelope::new(
            dm_instance_id,
            DmEvent::SentStatusUpdated(SentStatusUpdate {
                local_uuid: i64::from(uuid),
                message_id,
                timestamp: i64::from(timestamp),
                round_id: i64::from(round_id),
                status: i64::from(status),
            }),
        ))
    });
}

/// # Safety
///
/// `pubkey` must be null or point to `pubkey_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_block_sender(
    dm_instance_id: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
) {
    deliver(EventKind::SenderBlocked, || {
        // SAFETY: valid per this function's contract.
        let sender_pubkey = unsafe { borrow_span(pubkey, pubkey_len, "pubkey") }?.to_vec();
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::SenderBlocked { sender_pubkey }))
    });
}

/// # Safety
///
/// `pubkey` must be null or point to `pubkey_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_unblock_sender(
    dm_instance_id: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
) {
    deliver(EventKind::SenderUnblocked, || {
        // SAFETY: valid per this function's contract.
        let sender_pubkey = unsafe { borrow_span(pubkey, pubkey_len, "pubkey") }?.to_vec();
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::SenderUnblocked { sender_pubkey }))
    });
}

/// The serialized conversation with one sender, empty when unknown. The
/// caller frees a non-null result with `free` or
/// [`cmix_dm_free_buffer`](crate::span::cmix_dm_free_buffer).
///
/// # Safety
///
/// `sender_key` must be null or point to `sender_key_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_get_conversation(
    dm_instance_id: c_int,
    sender_key: *mut c_void,
    sender_key_len: c_int,
) -> CByteSlice {
    let reply = deliver(EventKind::ConversationQueried, || {
        // SAFETY: valid per this function's contract.
        let sender_pubkey =
            unsafe { borrow_span(sender_key, sender_key_len, "sender_key") }?.to_vec();
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::ConversationQueried { sender_pubkey }))
    });
    buffer_reply(reply)
}

/// All conversations, serialized. Freed like [`cmix_dm_get_conversation`]'s result.
#[no_mangle]
pub extern "C" fn cmix_dm_get_conversations(dm_instance_id: c_int) -> CByteSlice {
    let reply = deliver(EventKind::AllConversationsQueried, || {
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::AllConversationsQueried))
    });
    buffer_reply(reply)
}

/// Returns 1 when the message was deleted, 0 otherwise.
///
/// # Safety
///
/// Both pointers must be null or point to their lengths in readable bytes.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_delete_message(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
) -> c_int {
    let reply = deliver(EventKind::MessageDeleteRequested, || {
        // SAFETY: valid per this function's contract.
        let request = unsafe {
            DeleteRequest {
                message_id: borrow_span(message_id, message_id_len, "message_id")?.to_vec(),
                sender_pubkey: borrow_span(pubkey, pubkey_len, "pubkey")?.to_vec(),
            }
        };
        Ok(EventEnvelope::new(dm_instance_id, DmEvent::MessageDeleteRequested(request)))
    });
    deleted_reply(reply)
}

/// A typed notification with a JSON payload.
///
/// # Safety
///
/// `json_data` must be null or point to `json_data_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_event_update(
    dm_instance_id: c_int,
    event_type: c_long,
    json_data: *mut c_void,
    json_data_len: c_int,
) {
    deliver(EventKind::GenericEvent, || {
        // SAFETY: valid per this function's contract.
        let payload = unsafe { borrow_span(json_data, json_data_len, "json_data") }?.to_vec();
        Ok(EventEnvelope::new(
            dm_instance_id,
            DmEvent::GenericEvent(GenericEvent { event_type: i64::from(event_type), payload }),
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_conversions_use_neutral_values_for_other_families() {
        assert_eq!(status_reply(Reply::Status(9)), 9);
        assert_eq!(status_reply(Reply::Unit), 0);
        assert_eq!(deleted_reply(Reply::Deleted(true)), 1);
        assert_eq!(deleted_reply(Reply::Deleted(false)), 0);
        assert_eq!(deleted_reply(Reply::Status(1)), 0);
        assert!(buffer_reply(Reply::Buffer(Vec::new())).is_null());
        assert!(buffer_reply(Reply::Unit).is_null());
    }

    #[test]
    fn text_decoding_is_strict_but_nicknames_are_lossy() {
        let nickname = [b'a', 0xff];
        let bad_text = [0xc3_u8];
        let raw = RawText {
            message_id: (std::ptr::null(), 0),
            nickname: (nickname.as_ptr().cast(), 2),
            text: (bad_text.as_ptr().cast(), 1),
            partner_key: (std::ptr::null(), 0),
            sender_key: (std::ptr::null(), 0),
            dm_token: 0,
            codeset: 0,
            timestamp: 0,
            round_id: 0,
            status: 0,
        };
        // SAFETY: the arrays outlive the call.
        let err = unsafe { raw.decode() }.expect_err("invalid utf-8 text");
        assert!(matches!(err, BoundaryError::MalformedSpan { .. }));

        let good_text = b"ok";
        let raw = RawText { text: (good_text.as_ptr().cast(), 2), ..raw };
        // SAFETY: as above.
        let decoded = unsafe { raw.decode() }.expect("valid text");
        assert_eq!(decoded.nickname, "a\u{fffd}");
        assert_eq!(decoded.text, "ok");
    }
}
