//! `(length, pointer)` buffers.

use std::ptr;
use std::slice;

use cmix_dm::{BoundaryError, ByteSpan};
use libc::{c_int, c_void};

/// A C heap buffer, laid out as the network layer's `GoByteSlice`.
///
/// An empty buffer is `{ 0, NULL }`. A non-empty one was allocated with
/// `malloc` and belongs to whoever received it.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CByteSlice {
    pub len: c_int,
    pub data: *mut c_void,
}

impl CByteSlice {
    pub const fn null() -> Self {
        Self { len: 0, data: ptr::null_mut() }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }
}

impl Default for CByteSlice {
    fn default() -> Self {
        Self::null()
    }
}

/// View `len` bytes at `data` without copying.
///
/// A zero length yields an empty span and `data` is never read, whatever it
/// points to.
///
/// # Safety
///
/// When `len > 0` and `data` is non-null, `data` must point to at least `len`
/// readable bytes that stay valid and unmodified for `'a`.
pub unsafe fn borrow_span<'a>(
    data: *const c_void,
    len: c_int,
    field: &str,
) -> Result<ByteSpan<'a>, BoundaryError> {
    if len == 0 {
        return Ok(ByteSpan::empty());
    }
    let len = usize::try_from(len)
        .map_err(|_| BoundaryError::malformed(format!("{field}: negative length {len}")))?;
    if data.is_null() {
        return Err(BoundaryError::malformed(format!("{field}: null pointer with length {len}")));
    }
    // SAFETY: non-null and covers `len` bytes per the caller's contract.
    Ok(ByteSpan::new(unsafe { slice::from_raw_parts(data.cast::<u8>(), len) }))
}

/// Copy `bytes` into a fresh `malloc` allocation the receiver must `free`.
pub fn into_c_buffer(bytes: &[u8]) -> Result<CByteSlice, BoundaryError> {
    if bytes.is_empty() {
        return Ok(CByteSlice::null());
    }
    let len = c_int::try_from(bytes.len())
        .map_err(|_| BoundaryError::AllocationFailure { size: bytes.len() })?;
    // SAFETY: malloc with a non-zero size; the result is checked for null
    // before the copy, which writes exactly `bytes.len()` bytes into it.
    unsafe {
        let data = libc::malloc(bytes.len());
        if data.is_null() {
            return Err(BoundaryError::AllocationFailure { size: bytes.len() });
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), data.cast::<u8>(), bytes.len());
        Ok(CByteSlice { len, data })
    }
}

/// Copy a buffer returned by application code and free the original.
///
/// # Safety
///
/// `buffer.data` must be null or a live `malloc` allocation of at least
/// `buffer.len` bytes that nothing else uses or frees afterwards.
pub unsafe fn take_c_buffer(buffer: CByteSlice) -> Result<Vec<u8>, BoundaryError> {
    // SAFETY: forwarded from the caller.
    let copied =
        unsafe { borrow_span(buffer.data, buffer.len, "returned buffer") }.map(|s| s.to_vec());
    if !buffer.is_null() {
        // SAFETY: the allocation came from malloc and is released exactly once here.
        unsafe { libc::free(buffer.data) };
    }
    copied
}

/// Release a buffer this library returned.
///
/// # Safety
///
/// `buffer` must come from this library and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn cmix_dm_free_buffer(buffer: CByteSlice) {
    if !buffer.is_null() {
        // SAFETY: allocated with malloc in `into_c_buffer`.
        unsafe { libc::free(buffer.data) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_span_never_touches_the_pointer() {
        let dangling = ptr::NonNull::<c_void>::dangling().as_ptr().cast_const();
        // SAFETY: zero length, the pointer is not read.
        let span = unsafe { borrow_span(dangling, 0, "message_id") }.expect("empty span");
        assert!(span.is_empty());
        // SAFETY: as above, null with zero length.
        let span = unsafe { borrow_span(ptr::null(), 0, "message_id") }.expect("empty span");
        assert!(span.is_empty());
    }

    #[test]
    fn negative_length_and_null_data_are_malformed() {
        let bytes = [1u8, 2, 3];
        // SAFETY: rejected before the pointer is read.
        let negative = unsafe { borrow_span(bytes.as_ptr().cast(), -1, "text") };
        assert!(matches!(negative, Err(BoundaryError::MalformedSpan { .. })));
        // SAFETY: rejected before the pointer is read.
        let null = unsafe { borrow_span(ptr::null(), 3, "text") };
        let err = null.expect_err("null with length");
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn c_buffers_round_trip_through_malloc() {
        let buffer = into_c_buffer(b"conversation").expect("malloc");
        assert_eq!(buffer.len, 12);
        assert!(!buffer.is_null());
        // SAFETY: freshly allocated by into_c_buffer and taken once.
        let copied = unsafe { take_c_buffer(buffer) }.expect("take");
        assert_eq!(copied, b"conversation");
    }

    #[test]
    fn empty_input_gives_a_null_buffer() {
        let buffer = into_c_buffer(&[]).expect("empty");
        assert!(buffer.is_null());
        assert_eq!(buffer.len, 0);
        // SAFETY: null buffers are accepted and not freed.
        assert!(unsafe { take_c_buffer(buffer) }.expect("take").is_empty());
        // SAFETY: null is a no-op.
        unsafe { cmix_dm_free_buffer(buffer) };
    }
}
