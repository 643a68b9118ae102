//! Base64 transport for payment headers.
//!
//! Proofs and receipts travel in HTTP headers as base64-encoded JSON. This
//! module provides [`Base64Bytes`], a thin copy-on-write wrapper around the
//! encoded bytes so header values can be borrowed without reallocation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::borrow::Cow;
use std::fmt::Display;

/// Base64-encoded byte data, borrowed or owned.
///
/// # Example
///
/// ```rust
/// use tollgate_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"toll paid");
/// assert_eq!(encoded.decode().unwrap(), b"toll paid");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    /// Encodes raw bytes into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }

    /// Decodes the wrapped base64 bytes back to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the wrapped bytes are not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Decodes and deserializes the wrapped bytes as JSON.
    ///
    /// Returns `None` on invalid base64 or invalid JSON; callers that care
    /// about the distinction should use [`Base64Bytes::decode`] directly.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        let raw = self.decode().ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}
