use std::ffi::CString;
use std::fmt::Display;
use std::ptr;

use cmix_dm::{BoundaryError, RoutingError, SchemaGeneration};
use libc::{c_char, c_int};
use thiserror::Error;

/// An error crossing the boundary: null on success, otherwise an owned,
/// NUL-terminated message released with [`cmix_dm_free_error`].
pub type DmError = *mut c_char;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FfiError {
    #[error("router is not initialized; call cmix_dm_router_init first")]
    NotInitialized,

    #[error("unknown handler table generation {0}")]
    UnknownGeneration(c_int),

    #[error("router already initialized for {current}, cannot switch to {requested}")]
    AlreadyInitialized { current: SchemaGeneration, requested: SchemaGeneration },

    #[error("{entry_point} needs a {expected} router, this one is {actual}")]
    GenerationMismatch {
        entry_point: &'static str,
        expected: SchemaGeneration,
        actual: SchemaGeneration,
    },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("{0} panicked")]
    Panicked(&'static str),
}

/// Success.
pub(crate) fn no_error() -> DmError {
    ptr::null_mut()
}

/// Convert a result into the boundary's error convention.
pub(crate) fn into_dm_error(result: Result<(), FfiError>) -> DmError {
    match result {
        Ok(()) => no_error(),
        Err(err) => {
            log::warn!("{err}");
            error_string(err)
        }
    }
}

/// An owned C string holding `message`. Never null, never empty.
pub fn error_string(message: impl Display) -> DmError {
    let mut bytes: Vec<u8> = message.to_string().into_bytes();
    bytes.retain(|byte| *byte != 0);
    if bytes.is_empty() {
        bytes.extend_from_slice(b"unknown error");
    }
    CString::new(bytes).unwrap_or_default().into_raw()
}

/// Release an error string returned by this library.
///
/// # Safety
///
/// `error` must be null or a value returned by this library that has not been
/// freed yet.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_free_error(error: DmError) {
    if !error.is_null() {
        // SAFETY: produced by `CString::into_raw` in `error_string`.
        drop(unsafe { CString::from_raw(error) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn messages_are_non_empty_and_nul_free() {
        let err = error_string("bad\0span");
        // SAFETY: just produced, freed below.
        let text = unsafe { CStr::from_ptr(err) }.to_str().expect("utf-8").to_owned();
        assert_eq!(text, "badspan");
        // SAFETY: freed once.
        unsafe { cmix_dm_free_error(err) };

        let err = error_string("");
        // SAFETY: just produced, freed below.
        assert_eq!(unsafe { CStr::from_ptr(err) }.to_bytes(), b"unknown error");
        // SAFETY: freed once.
        unsafe { cmix_dm_free_error(err) };
    }

    #[test]
    fn success_is_null() {
        assert!(into_dm_error(Ok(())).is_null());
        // SAFETY: null is ignored.
        unsafe { cmix_dm_free_error(ptr::null_mut()) };
    }

    #[test]
    fn routing_errors_keep_their_message() {
        let err = into_dm_error(Err(RoutingError::DuplicateInstance { instance_id: 2 }.into()));
        // SAFETY: just produced, freed below.
        let text = unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned();
        assert_eq!(text, "instance 2 is already registered");
        // SAFETY: freed once.
        unsafe { cmix_dm_free_error(err) };
    }
}
