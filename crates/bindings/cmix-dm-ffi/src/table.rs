//! Fixed-layout handler tables and their adaptation to [`HandlerSet`]s.
//!
//! Field order is part of the ABI and never changes within a generation.
//! Every slot is nullable; a null slot leaves the kind on its neutral reply.

use cmix_dm::{HandlerSet, InstanceId, TextReceived};
use libc::{c_char, c_int, c_long, c_void};

use crate::span::{take_c_buffer, CByteSlice};

// ── Instance-aware (current) ──────────────────────────────────────────────────

pub type ReceiveFn = unsafe extern "C" fn(
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
) -> c_long;

pub type ReceiveTextFn = unsafe extern "C" fn(
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
) -> c_long;

/// Shared by replies (`reply_to`) and reactions (`reaction_to`).
pub type ReceiveReferencingFn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    referenced_id: *mut c_void,
    referenced_id_len: c_int,
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
) -> c_long;

pub type UpdateSentStatusFn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    uuid: c_long,
    message_id: *mut c_void,
    message_id_len: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
);

pub type SenderKeyFn =
    unsafe extern "C" fn(dm_instance_id: c_int, pubkey: *mut c_void, pubkey_len: c_int);

pub type GetConversationFn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    sender_key: *mut c_void,
    sender_key_len: c_int,
) -> CByteSlice;

pub type GetConversationsFn = unsafe extern "C" fn(dm_instance_id: c_int) -> CByteSlice;

pub type DeleteMessageFn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
) -> c_int;

pub type EventUpdateFn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    event_type: c_long,
    json_data: *mut c_void,
    json_data_len: c_int,
);

/// Handler table bound to one instance.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
#[allow(non_snake_case)]
pub struct DMReceiverRouterFunctions {
    pub receiveFn: Option<ReceiveFn>,
    pub receiveTextFn: Option<ReceiveTextFn>,
    pub receiveReplyFn: Option<ReceiveReferencingFn>,
    pub receiveReactionFn: Option<ReceiveReferencingFn>,
    pub updateSentStatusFn: Option<UpdateSentStatusFn>,
    pub blockSenderFn: Option<SenderKeyFn>,
    pub unblockSenderFn: Option<SenderKeyFn>,
    pub getConversationFn: Option<GetConversationFn>,
    pub getConversationsFn: Option<GetConversationsFn>,
    pub deleteMessageFn: Option<DeleteMessageFn>,
    pub eventUpdateFn: Option<EventUpdateFn>,
}

// ── Process-global, split keys ────────────────────────────────────────────────

pub type GlobalSenderKeyFn = unsafe extern "C" fn(pubkey: *mut c_void, pubkey_len: c_int);

pub type GlobalGetConversationFn =
    unsafe extern "C" fn(sender_key: *mut c_void, sender_key_len: c_int) -> CByteSlice;

pub type GlobalGetConversationsFn = unsafe extern "C" fn() -> CByteSlice;

/// The one handler table of a process whose blocking and conversation slots
/// carry no instance id.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
#[allow(non_snake_case)]
pub struct DMReceiverCallbackFunctions {
    pub receiveFn: Option<ReceiveFn>,
    pub receiveTextFn: Option<ReceiveTextFn>,
    pub receiveReplyFn: Option<ReceiveReferencingFn>,
    pub receiveReactionFn: Option<ReceiveReferencingFn>,
    pub updateSentStatusFn: Option<UpdateSentStatusFn>,
    pub blockSenderFn: Option<GlobalSenderKeyFn>,
    pub unblockSenderFn: Option<GlobalSenderKeyFn>,
    pub getConversationFn: Option<GlobalGetConversationFn>,
    pub getConversationsFn: Option<GlobalGetConversationsFn>,
}

// ── Process-global, single key ────────────────────────────────────────────────

pub type ReceiveV1Fn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_void,
    text_len: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    msg_type: c_long,
    status: c_long,
) -> c_long;

pub type ReceiveTextV1Fn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_char,
    text_len: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
) -> c_long;

pub type ReceiveReferencingV1Fn = unsafe extern "C" fn(
    dm_instance_id: c_int,
    message_id: *mut c_void,
    message_id_len: c_int,
    referenced_id: *mut c_void,
    referenced_id_len: c_int,
    nickname: *mut c_char,
    nickname_len: c_int,
    text: *mut c_char,
    text_len: c_int,
    pubkey: *mut c_void,
    pubkey_len: c_int,
    dm_token: c_int,
    codeset: c_int,
    timestamp: c_long,
    round_id: c_long,
    status: c_long,
) -> c_long;

/// The oldest table: message and sent-status slots only, one key per message.
/// The partner key is what the single `pubkey` argument carries.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
#[allow(non_snake_case)]
pub struct DMReceiverCallbackFunctionsV1 {
    pub receiveFn: Option<ReceiveV1Fn>,
    pub receiveTextFn: Option<ReceiveTextV1Fn>,
    pub receiveReplyFn: Option<ReceiveReferencingV1Fn>,
    pub receiveReactionFn: Option<ReceiveReferencingV1Fn>,
    pub updateSentStatusFn: Option<UpdateSentStatusFn>,
}

// ── Argument helpers ──────────────────────────────────────────────────────────

/// Pointer/length pair for a buffer the callee only reads.
fn raw(bytes: &[u8]) -> (*mut c_void, c_int) {
    (bytes.as_ptr().cast_mut().cast(), c_len(bytes.len()))
}

fn c_len(len: usize) -> c_int {
    c_int::try_from(len).unwrap_or(c_int::MAX)
}

/// Text handed to C as `char*`: the bytes unchanged plus one trailing NUL.
/// The length excludes the terminator and counts any interior NULs.
struct CText(Vec<u8>);

impl CText {
    fn new(text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        Self(bytes)
    }

    fn ptr(&self) -> *mut c_char {
        self.0.as_ptr().cast_mut().cast()
    }

    fn len(&self) -> c_int {
        c_len(self.0.len() - 1)
    }
}

/// Arguments shared by every text-carrying message slot.
struct TextArgs {
    message_id: (*mut c_void, c_int),
    nickname: CText,
    text: CText,
    partner_key: (*mut c_void, c_int),
    sender_key: (*mut c_void, c_int),
}

impl TextArgs {
    fn new(msg: &TextReceived) -> Self {
        Self {
            message_id: raw(&msg.message_id),
            nickname: CText::new(&msg.nickname),
            text: CText::new(&msg.text),
            partner_key: raw(&msg.partner_key),
            sender_key: raw(&msg.sender_key),
        }
    }
}

pub(crate) fn to_c_long(value: i64) -> c_long {
    c_long::try_from(value).unwrap_or(if value < 0 { c_long::MIN } else { c_long::MAX })
}

fn conversation_reply(buffer: CByteSlice) -> Vec<u8> {
    // SAFETY: the table's contract makes returned buffers malloc'd and ours to free.
    match unsafe { take_c_buffer(buffer) } {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("discarding conversation buffer from application: {err}");
            Vec::new()
        }
    }
}

// ── Adaptation ────────────────────────────────────────────────────────────────

impl DMReceiverRouterFunctions {
    /// Wrap each non-null slot as a handler.
    ///
    /// # Safety
    ///
    /// Every non-null slot must be a function with the declared signature that
    /// stays callable for as long as the handler set is registered. Buffers it
    /// returns must come from `malloc`.
    pub unsafe fn into_handler_set(self) -> HandlerSet {
        let mut handlers = HandlerSet::new();
        if let Some(f) = self.receiveFn {
            handlers = handlers.on_message_received(move |id, msg| {
                let message_id = raw(&msg.message_id);
                let nickname = CText::new(&msg.nickname);
                let text = raw(&msg.text);
                let partner_key = raw(&msg.partner_key);
                let sender_key = raw(&msg.sender_key);
                // SAFETY: every pointer borrows from `msg` or a local that outlives the call.
                let status = unsafe {
                    f(
                        id,
                        message_id.0,
                        message_id.1,
                        nickname.ptr(),
                        nickname.len(),
                        text.0,
                        text.1,
                        partner_key.0,
                        partner_key.1,
                        sender_key.0,
                        sender_key.1,
                        msg.dm_token,
                        msg.codeset,
                        to_c_long(msg.timestamp),
                        to_c_long(msg.round_id),
                        to_c_long(msg.message_type),
                        to_c_long(msg.status),
                    )
                };
                i64::from(status)
            });
        }
        if let Some(f) = self.receiveTextFn {
            handlers = handlers.on_text_received(move |id, msg| {
                let args = TextArgs::new(msg);
                // SAFETY: as above.
                let status = unsafe { call_text(f, id, &args, msg) };
                i64::from(status)
            });
        }
        if let Some(f) = self.receiveReplyFn {
            handlers = handlers.on_reply_received(move |id, reply| {
                let args = TextArgs::new(&reply.message);
                // SAFETY: as above.
                let status =
                    unsafe { call_referencing(f, id, &args, &reply.reply_to, &reply.message) };
                i64::from(status)
            });
        }
        if let Some(f) = self.receiveReactionFn {
            handlers = handlers.on_reaction_received(move |id, reaction| {
                let args = TextArgs::new(&reaction.message);
                // SAFETY: as above.
                let status = unsafe {
                    call_referencing(f, id, &args, &reaction.reaction_to, &reaction.message)
                };
                i64::from(status)
            });
        }
        if let Some(f) = self.updateSentStatusFn {
            handlers = handlers.on_sent_status(move |id, update| {
                // SAFETY: as above.
                unsafe { call_sent_status(f, id, update) }
            });
        }
        if let Some(f) = self.blockSenderFn {
            handlers = handlers.on_sender_blocked(move |id, key| {
                let (key, key_len) = raw(key);
                // SAFETY: `key` borrows from the event for the whole call.
                unsafe { f(id, key, key_len) }
            });
        }
        if let Some(f) = self.unblockSenderFn {
            handlers = handlers.on_sender_unblocked(move |id, key| {
                let (key, key_len) = raw(key);
                // SAFETY: as above.
                unsafe { f(id, key, key_len) }
            });
        }
        if let Some(f) = self.getConversationFn {
            handlers = handlers.on_conversation_query(move |id, key| {
                let (key, key_len) = raw(key);
                // SAFETY: as above.
                conversation_reply(unsafe { f(id, key, key_len) })
            });
        }
        if let Some(f) = self.getConversationsFn {
            handlers = handlers.on_all_conversations_query(move |id| {
                // SAFETY: no arguments beyond the instance id.
                conversation_reply(unsafe { f(id) })
            });
        }
        if let Some(f) = self.deleteMessageFn {
            handlers = handlers.on_message_delete(move |id, request| {
                let (message_id, message_id_len) = raw(&request.message_id);
                let (pubkey, pubkey_len) = raw(&request.sender_pubkey);
                // SAFETY: both buffers borrow from `request` for the whole call.
                unsafe { f(id, message_id, message_id_len, pubkey, pubkey_len) != 0 }
            });
        }
        if let Some(f) = self.eventUpdateFn {
            handlers = handlers.on_generic_event(move |id, event| {
                let (json, json_len) = raw(&event.payload);
                // SAFETY: `json` borrows from the event for the whole call.
                unsafe { f(id, to_c_long(event.event_type), json, json_len) }
            });
        }
        handlers
    }
}

impl DMReceiverCallbackFunctions {
    /// Wrap each non-null slot as a handler.
    ///
    /// # Safety
    ///
    /// Same contract as [`DMReceiverRouterFunctions::into_handler_set`].
    pub unsafe fn into_handler_set(self) -> HandlerSet {
        // SAFETY: forwarded from the caller.
        let mut handlers = unsafe {
            DMReceiverRouterFunctions {
                receiveFn: self.receiveFn,
                receiveTextFn: self.receiveTextFn,
                receiveReplyFn: self.receiveReplyFn,
                receiveReactionFn: self.receiveReactionFn,
                updateSentStatusFn: self.updateSentStatusFn,
                ..DMReceiverRouterFunctions::default()
            }
            .into_handler_set()
        };
        if let Some(f) = self.blockSenderFn {
            handlers = handlers.on_sender_blocked(move |_, key| {
                let (key, key_len) = raw(key);
                // SAFETY: `key` borrows from the event for the whole call.
                unsafe { f(key, key_len) }
            });
        }
        if let Some(f) = self.unblockSenderFn {
            handlers = handlers.on_sender_unblocked(move |_, key| {
                let (key, key_len) = raw(key);
                // SAFETY: as above.
                unsafe { f(key, key_len) }
            });
        }
        if let Some(f) = self.getConversationFn {
            handlers = handlers.on_conversation_query(move |_, key| {
                let (key, key_len) = raw(key);
                // SAFETY: as above.
                conversation_reply(unsafe { f(key, key_len) })
            });
        }
        if let Some(f) = self.getConversationsFn {
            // SAFETY: takes no arguments.
            handlers =
                handlers.on_all_conversations_query(move |_| conversation_reply(unsafe { f() }));
        }
        handlers
    }
}

impl DMReceiverCallbackFunctionsV1 {
    /// Wrap each non-null slot as a handler. Only the partner key reaches
    /// the application.
    ///
    /// # Safety
    ///
    /// Same contract as [`DMReceiverRouterFunctions::into_handler_set`].
    pub unsafe fn into_handler_set(self) -> HandlerSet {
        let mut handlers = HandlerSet::new();
        if let Some(f) = self.receiveFn {
            handlers = handlers.on_message_received(move |id, msg| {
                let message_id = raw(&msg.message_id);
                let nickname = CText::new(&msg.nickname);
                let text = raw(&msg.text);
                let pubkey = raw(&msg.partner_key);
                // SAFETY: every pointer borrows from `msg` or a local that outlives the call.
                let status = unsafe {
                    f(
                        id,
                        message_id.0,
                        message_id.1,
                        nickname.ptr(),
                        nickname.len(),
                        text.0,
                        text.1,
                        pubkey.0,
                        pubkey.1,
                        msg.dm_token,
                        msg.codeset,
                        to_c_long(msg.timestamp),
                        to_c_long(msg.round_id),
                        to_c_long(msg.message_type),
                        to_c_long(msg.status),
                    )
                };
                i64::from(status)
            });
        }
        if let Some(f) = self.receiveTextFn {
            handlers = handlers.on_text_received(move |id, msg| {
                let args = TextArgs::new(msg);
                // SAFETY: as above.
                let status = unsafe {
                    f(
                        id,
                        args.message_id.0,
                        args.message_id.1,
                        args.nickname.ptr(),
                        args.nickname.len(),
                        args.text.ptr(),
                        args.text.len(),
                        args.partner_key.0,
                        args.partner_key.1,
                        msg.dm_token,
                        msg.codeset,
                        to_c_long(msg.timestamp),
                        to_c_long(msg.round_id),
                        to_c_long(msg.status),
                    )
                };
                i64::from(status)
            });
        }
        if let Some(f) = self.receiveReplyFn {
            handlers = handlers.on_reply_received(move |id, reply| {
                let args = TextArgs::new(&reply.message);
                // SAFETY: as above.
                let status = unsafe {
                    call_referencing_v1(f, id, &args, &reply.reply_to, &reply.message)
                };
                i64::from(status)
            });
        }
        if let Some(f) = self.receiveReactionFn {
            handlers = handlers.on_reaction_received(move |id, reaction| {
                let args = TextArgs::new(&reaction.message);
                // SAFETY: as above.
                let status = unsafe {
                    call_referencing_v1(f, id, &args, &reaction.reaction_to, &reaction.message)
                };
                i64::from(status)
            });
        }
        if let Some(f) = self.updateSentStatusFn {
            handlers = handlers.on_sent_status(move |id, update| {
                // SAFETY: as above.
                unsafe { call_sent_status(f, id, update) }
            });
        }
        handlers
    }
}

unsafe fn call_text(
    f: ReceiveTextFn,
    id: InstanceId,
    args: &TextArgs,
    msg: &TextReceived,
) -> c_long {
    // SAFETY: `args` keeps every pointer alive until return.
    unsafe {
        f(
            id,
            args.message_id.0,
            args.message_id.1,
            args.nickname.ptr(),
            args.nickname.len(),
            args.text.ptr(),
            args.text.len(),
            args.partner_key.0,
            args.partner_key.1,
            args.sender_key.0,
            args.sender_key.1,
            msg.dm_token,
            msg.codeset,
            to_c_long(msg.timestamp),
            to_c_long(msg.round_id),
            to_c_long(msg.status),
        )
    }
}

unsafe fn call_referencing(
    f: ReceiveReferencingFn,
    id: InstanceId,
    args: &TextArgs,
    referenced: &[u8],
    msg: &TextReceived,
) -> c_long {
    let (referenced, referenced_len) = raw(referenced);
    // SAFETY: `args` and `referenced` outlive the call.
    unsafe {
        f(
            id,
            args.message_id.0,
            args.message_id.1,
            referenced,
            referenced_len,
            args.nickname.ptr(),
            args.nickname.len(),
            args.text.ptr(),
            args.text.len(),
            args.partner_key.0,
            args.partner_key.1,
            args.sender_key.0,
            args.sender_key.1,
            msg.dm_token,
            msg.codeset,
            to_c_long(msg.timestamp),
            to_c_long(msg.round_id),
            to_c_long(msg.status),
        )
    }
}

unsafe fn call_referencing_v1(
    f: ReceiveReferencingV1Fn,
    id: InstanceId,
    args: &TextArgs,
    referenced: &[u8],
    msg: &TextReceived,
) -> c_long {
    let (referenced, referenced_len) = raw(referenced);
    // SAFETY: `args` and `referenced` outlive the call.
    unsafe {
        f(
            id,
            args.message_id.0,
            args.message_id.1,
            referenced,
            referenced_len,
            args.nickname.ptr(),
            args.nickname.len(),
            args.text.ptr(),
            args.text.len(),
            args.partner_key.0,
            args.partner_key.1,
            msg.dm_token,
            msg.codeset,
            to_c_long(msg.timestamp),
            to_c_long(msg.round_id),
            to_c_long(msg.status),
        )
    }
}

unsafe fn call_sent_status(
    f: UpdateSentStatusFn,
    id: InstanceId,
    update: &cmix_dm::SentStatusUpdate,
) {
    let (message_id, message_id_len) = raw(&update.message_id);
    // SAFETY: `message_id` borrows from `update` for the whole call.
    unsafe {
        f(
            id,
            to_c_long(update.local_uuid),
            message_id,
            message_id_len,
            to_c_long(update.timestamp),
            to_c_long(update.round_id),
            to_c_long(update.status),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmix_dm::{
        CallbackRouter, DmEvent, EventEnvelope, MessageReceived, Reply, RouterCapabilities,
        RouterResult, SchemaGeneration,
    };
    use std::slice;
    use std::sync::Mutex;

    static V1_SEEN: Mutex<Vec<(c_int, Vec<u8>, Vec<u8>)>> = Mutex::new(Vec::new());

    unsafe extern "C" fn v1_receive_text(
        dm_instance_id: c_int,
        _message_id: *mut c_void,
        _message_id_len: c_int,
        _nickname: *mut c_char,
        _nickname_len: c_int,
        text: *mut c_char,
        text_len: c_int,
        pubkey: *mut c_void,
        pubkey_len: c_int,
        _dm_token: c_int,
        _codeset: c_int,
        _timestamp: c_long,
        _round_id: c_long,
        _status: c_long,
    ) -> c_long {
        // SAFETY: the adapter passes live buffers of the stated lengths, and
        // text carries one readable terminator past its length.
        let (key, text) = unsafe {
            let terminator = *text.add(text_len as usize);
            assert_eq!(terminator, 0);
            (
                slice::from_raw_parts(pubkey.cast::<u8>(), pubkey_len as usize).to_vec(),
                slice::from_raw_parts(text.cast::<u8>(), text_len as usize).to_vec(),
            )
        };
        V1_SEEN.lock().unwrap_or_else(|err| err.into_inner()).push((dm_instance_id, key, text));
        77
    }

    unsafe extern "C" fn v1_receive(
        _dm_instance_id: c_int,
        _message_id: *mut c_void,
        _message_id_len: c_int,
        _nickname: *mut c_char,
        _nickname_len: c_int,
        _text: *mut c_void,
        text_len: c_int,
        _pubkey: *mut c_void,
        _pubkey_len: c_int,
        _dm_token: c_int,
        _codeset: c_int,
        _timestamp: c_long,
        _round_id: c_long,
        msg_type: c_long,
        _status: c_long,
    ) -> c_long {
        msg_type * 1000 + c_long::from(text_len)
    }

    #[test]
    fn v1_table_receives_partner_key_as_its_only_key() {
        let table = DMReceiverCallbackFunctionsV1 {
            receiveFn: Some(v1_receive),
            receiveTextFn: Some(v1_receive_text),
            ..DMReceiverCallbackFunctionsV1::default()
        };
        let router = CallbackRouter::for_generation(SchemaGeneration::V1);
        // SAFETY: both slots are the functions above.
        let handlers = unsafe { table.into_handler_set() };
        router.register_implicit(handlers.into()).expect("register");

        let text = EventEnvelope::new(
            12,
            DmEvent::TextReceived(TextReceived {
                text: "hi\0there".to_owned(),
                partner_key: vec![0x0a; 4],
                sender_key: vec![0x0b; 4],
                ..TextReceived::default()
            }),
        );
        assert_eq!(router.dispatch(&text), RouterResult::Delivered(Reply::Status(77)));
        let seen = V1_SEEN.lock().unwrap_or_else(|err| err.into_inner());
        // Interior NULs survive and count toward the length.
        assert_eq!(*seen, vec![(12, vec![0x0a; 4], b"hi\0there".to_vec())]);
        drop(seen);

        let raw_message = EventEnvelope::new(
            12,
            DmEvent::MessageReceived(MessageReceived {
                text: vec![0xff; 5],
                message_type: 3,
                ..MessageReceived::default()
            }),
        );
        assert_eq!(router.dispatch(&raw_message), RouterResult::Delivered(Reply::Status(3005)));
    }

    #[test]
    fn null_slots_leave_kinds_unhandled() {
        // SAFETY: every slot is null.
        let handlers = unsafe { DMReceiverRouterFunctions::default().into_handler_set() };
        assert!(handlers.handled_kinds().is_empty());

        let router = CallbackRouter::new(RouterCapabilities::all());
        router.register(1, handlers.into()).expect("register");
        let query = EventEnvelope::new(1, DmEvent::AllConversationsQueried);
        assert_eq!(router.dispatch(&query), RouterResult::Delivered(Reply::Buffer(Vec::new())));
        assert_eq!(router.stats().defaulted, 1);
    }

    #[test]
    fn long_values_saturate_instead_of_wrapping() {
        assert_eq!(to_c_long(5), 5);
        assert_eq!(to_c_long(-5), -5);
        assert_eq!(i64::from(to_c_long(i64::MAX)), i64::from(c_long::MAX));
    }
}
