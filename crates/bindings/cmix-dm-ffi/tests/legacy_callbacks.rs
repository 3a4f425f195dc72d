//! Process-wide handler tables (generation 2).
//!
//! There is a single implicit table per process, so tests hold `SERIAL`
//! while they replace it.

#![allow(clippy::too_many_arguments)]

use std::ffi::CStr;
use std::ptr;
use std::sync::{Mutex, MutexGuard};

use cmix_dm_ffi::inbound::{
    cmix_dm_block_sender, cmix_dm_delete_message, cmix_dm_event_update, cmix_dm_get_conversation,
    cmix_dm_receive_text,
};
use cmix_dm_ffi::{
    cmix_dm_deregister, cmix_dm_free_buffer, cmix_dm_free_error, cmix_dm_register_router,
    cmix_dm_router_init, cmix_dm_set_callbacks, cmix_dm_set_callbacks_v1, into_c_buffer,
    CByteSlice, DMReceiverCallbackFunctions, DMReceiverCallbackFunctionsV1,
    DMReceiverRouterFunctions, DmError,
};
use libc::{c_char, c_int, c_long, c_void};

static SERIAL: Mutex<()> = Mutex::new(());
static SEEN: Mutex<Vec<(&'static str, c_int)>> = Mutex::new(Vec::new());
static BLOCKED: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

fn setup() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(|err| err.into_inner());
    let _ = env_logger::builder().is_test(true).try_init();
    // SAFETY: null or owned error strings only.
    assert_eq!(unsafe { take_error(cmix_dm_router_init(2)) }, None);
    SEEN.lock().unwrap_or_else(|err| err.into_inner()).clear();
    BLOCKED.lock().unwrap_or_else(|err| err.into_inner()).clear();
    guard
}

unsafe fn take_error(err: DmError) -> Option<String> {
    if err.is_null() {
        return None;
    }
    let message = CStr::from_ptr(err).to_string_lossy().into_owned();
    cmix_dm_free_error(err);
    Some(message)
}

fn seen() -> Vec<(&'static str, c_int)> {
    SEEN.lock().unwrap_or_else(|err| err.into_inner()).clone()
}

fn install(table: DMReceiverCallbackFunctions) {
    // SAFETY: the table's slots are the extern fns below.
    assert_eq!(unsafe { take_error(cmix_dm_set_callbacks(table)) }, None);
}

unsafe fn send_text(reported_id: c_int) -> c_long {
    let text = b"hi";
    let key = [3_u8; 4];
    cmix_dm_receive_text(
        reported_id,
        ptr::null_mut(),
        0,
        ptr::null_mut(),
        0,
        text.as_ptr().cast_mut().cast(),
        2,
        key.as_ptr().cast_mut().cast(),
        4,
        key.as_ptr().cast_mut().cast(),
        4,
        0,
        0,
        0,
        0,
        1,
    )
}

macro_rules! text_recorder {
    ($name:ident, $label:literal, $reply:expr) => {
        unsafe extern "C" fn $name(
            instance_id: c_int,
            _message_id: *mut c_void,
            _message_id_len: c_int,
            _nickname: *mut c_char,
            _nickname_len: c_int,
            _text: *mut c_char,
            _text_len: c_int,
            _partner_key: *mut c_void,
            _partner_key_len: c_int,
            _sender_key: *mut c_void,
            _sender_key_len: c_int,
            _dm_token: c_int,
            _codeset: c_int,
            _timestamp: c_long,
            _round_id: c_long,
            _status: c_long,
        ) -> c_long {
            SEEN.lock().unwrap_or_else(|err| err.into_inner()).push(($label, instance_id));
            $reply
        }
    };
}

text_recorder!(first_text, "first", 11);
text_recorder!(second_text, "second", 22);

unsafe extern "C" fn record_block(pubkey: *mut c_void, pubkey_len: c_int) {
    let key = std::slice::from_raw_parts(pubkey.cast::<u8>(), pubkey_len as usize).to_vec();
    BLOCKED.lock().unwrap_or_else(|err| err.into_inner()).push(key);
}

unsafe extern "C" fn conversation(sender_key: *mut c_void, sender_key_len: c_int) -> CByteSlice {
    let key = std::slice::from_raw_parts(sender_key.cast::<u8>(), sender_key_len as usize);
    into_c_buffer(&[key.len() as u8, key[0]]).expect("malloc conversation")
}

#[test]
fn every_instance_id_reaches_the_single_table() {
    let _serial = setup();
    install(DMReceiverCallbackFunctions { receiveTextFn: Some(first_text), ..Default::default() });

    // SAFETY: spans point into live locals.
    let replies: Vec<c_long> = [3, 99, -1].into_iter().map(|id| unsafe { send_text(id) }).collect();
    assert_eq!(replies, vec![11, 11, 11]);
    assert_eq!(seen(), vec![("first", 3), ("first", 99), ("first", -1)]);
}

#[test]
fn setting_callbacks_again_replaces_the_table() {
    let _serial = setup();
    install(DMReceiverCallbackFunctions { receiveTextFn: Some(first_text), ..Default::default() });
    install(DMReceiverCallbackFunctions { receiveTextFn: Some(second_text), ..Default::default() });

    // SAFETY: spans point into live locals.
    assert_eq!(unsafe { send_text(0) }, 22);
    assert_eq!(seen(), vec![("second", 0)]);
}

#[test]
fn global_slots_receive_keys_without_an_instance_id() {
    let _serial = setup();
    install(DMReceiverCallbackFunctions {
        blockSenderFn: Some(record_block),
        getConversationFn: Some(conversation),
        ..Default::default()
    });
    let key = [0x42_u8; 6];
    // SAFETY: the key outlives both calls; the returned buffer is freed once.
    unsafe {
        cmix_dm_block_sender(12, key.as_ptr().cast_mut().cast(), 6);
        let buffer = cmix_dm_get_conversation(12, key.as_ptr().cast_mut().cast(), 6);
        assert_eq!(buffer.len, 2);
        let bytes = std::slice::from_raw_parts(buffer.data.cast::<u8>(), 2).to_vec();
        cmix_dm_free_buffer(buffer);
        assert_eq!(bytes, vec![6, 0x42]);
    }
    assert_eq!(*BLOCKED.lock().unwrap_or_else(|err| err.into_inner()), vec![key.to_vec()]);
}

#[test]
fn kinds_newer_than_the_table_get_neutral_replies() {
    let _serial = setup();
    install(DMReceiverCallbackFunctions { receiveTextFn: Some(first_text), ..Default::default() });
    let before = cmix_dm_ffi::stats().expect("router initialized");

    let id = b"del";
    let json = b"{}";
    // SAFETY: spans point into live locals.
    unsafe {
        let deleted =
            cmix_dm_delete_message(1, id.as_ptr().cast_mut().cast(), 3, ptr::null_mut(), 0);
        assert_eq!(deleted, 0);
        cmix_dm_event_update(1, 7, json.as_ptr().cast_mut().cast(), 2);
    }

    let after = cmix_dm_ffi::stats().expect("router initialized");
    assert_eq!(after.unsupported, before.unsupported + 2);
    assert!(seen().is_empty());
}

#[test]
fn other_generations_entry_points_are_refused() {
    let _serial = setup();
    // SAFETY: empty tables have no slots to call.
    unsafe {
        let v3 = take_error(cmix_dm_register_router(5, DMReceiverRouterFunctions::default()))
            .expect("instance tables need a v3 router");
        assert!(v3.contains("v3") && v3.contains("v2"), "{v3}");

        let v1 = take_error(cmix_dm_set_callbacks_v1(DMReceiverCallbackFunctionsV1::default()))
            .expect("v1 tables need a v1 router");
        assert!(v1.contains("cmix_dm_set_callbacks_v1"), "{v1}");
    }
}

#[test]
fn deregister_removes_the_process_table_whatever_the_id() {
    let _serial = setup();
    install(DMReceiverCallbackFunctions { receiveTextFn: Some(first_text), ..Default::default() });

    // SAFETY: null or owned error strings; spans point into live locals.
    unsafe {
        assert_eq!(take_error(cmix_dm_deregister(1234)), None);
        assert_eq!(send_text(0), 0);
        assert!(take_error(cmix_dm_deregister(0)).is_some());
    }
    assert!(seen().is_empty());
}

#[test]
fn concurrent_replacement_keeps_a_table_installed() {
    let _serial = setup();
    install(DMReceiverCallbackFunctions { receiveTextFn: Some(first_text), ..Default::default() });

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            std::thread::spawn(move || {
                let slot = if writer % 2 == 0 { first_text } else { second_text };
                let table =
                    DMReceiverCallbackFunctions { receiveTextFn: Some(slot), ..Default::default() };
                // SAFETY: the slot is one of the extern fns above.
                let set = || unsafe { take_error(cmix_dm_set_callbacks(table)) };
                (0..500).filter_map(|_| set()).collect::<Vec<_>>()
            })
        })
        .collect();
    // SAFETY: spans point into live locals.
    let replies: Vec<c_long> = (0..2_000).map(|_| unsafe { send_text(1) }).collect();

    for writer in writers {
        assert_eq!(writer.join().expect("writer thread"), Vec::<String>::new());
    }
    assert!(replies.iter().all(|reply| *reply == 11 || *reply == 22), "neutral reply seen");
}
