//! Borrowed byte views for payloads crossing the network boundary.

use crate::error::BoundaryError;

/// A non-owning view of `len()` bytes.
///
/// The producer keeps the underlying buffer alive for the duration of one
/// call; anything that must outlive the call is copied out with
/// [`ByteSpan::to_vec`] or one of the string conversions. Binary payloads carry
/// no terminator and are read strictly up to their length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ByteSpan<'a> {
    data: &'a [u8],
}

impl<'a> ByteSpan<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub const fn empty() -> Self {
        Self { data: &[] }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Copy the span into a `String`, rejecting invalid UTF-8.
    pub fn to_utf8(&self) -> Result<String, BoundaryError> {
        std::str::from_utf8(self.data)
            .map(str::to_owned)
            .map_err(|err| BoundaryError::malformed(format!("invalid utf-8: {err}")))
    }

    /// Copy the span into a `String`, replacing invalid sequences.
    pub fn to_utf8_lossy(&self) -> String {
        String::from_utf8_lossy(self.data).into_owned()
    }
}

impl<'a> From<&'a [u8]> for ByteSpan<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self::new(value)
    }
}

impl<'a> From<&'a str> for ByteSpan<'a> {
    fn from(value: &'a str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl<'a> From<&'a Vec<u8>> for ByteSpan<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Self::new(value.as_slice())
    }
}
