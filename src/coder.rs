//! Pluggable request body encoders and response decoders.

use serde::{Serialize, de::DeserializeOwned};

use crate::{BoxError, Headers, headers::CONTENT_TYPE};

/// Content type set by [`JsonEncoder`].
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serializes structured request bodies.
pub trait RequestEncoder: Send + Sync + 'static {
    /// Encode `value` into body bytes.
    ///
    /// `headers` already holds the caller's headers; the encoder may add to them
    /// (typically `Content-Type`) but should not override what the caller set.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    fn encode<T: Serialize + ?Sized>(&self, value: &T, headers: &mut Headers) -> Result<Vec<u8>, BoxError>;
}

/// Deserializes response bodies into typed values.
pub trait ResponseDecoder: Send + Sync + 'static {
    /// Decode `body` into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` does not describe a `T`.
    fn decode<T: DeserializeOwned>(&self, body: &[u8], headers: &Headers) -> Result<T, BoxError>;
}

/// JSON request encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl RequestEncoder for JsonEncoder {
    fn encode<T: Serialize + ?Sized>(&self, value: &T, headers: &mut Headers) -> Result<Vec<u8>, BoxError> {
        let body = serde_json::to_vec(value)?;
        if !headers.contains(CONTENT_TYPE) {
            headers.replace_or_add(CONTENT_TYPE, JSON_CONTENT_TYPE)?;
        }
        Ok(body)
    }
}

/// JSON response decoder. Headers are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl ResponseDecoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, body: &[u8], _headers: &Headers) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(body)?)
    }
}
