//! Raw responses and the helpers that unwrap them.

use http::StatusCode;
use serde::de::DeserializeOwned;

use crate::{Error, Headers, Result, coder::ResponseDecoder};

/// A generic string-keyed JSON map.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// The response as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl RawResponse {
    /// Assemble a response from its parts.
    #[must_use]
    pub const fn new(status: StatusCode, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume into the body bytes.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Consume into `(body, headers)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Headers) {
        (self.body, self.headers)
    }

    pub(crate) fn clear_headers(&mut self) {
        self.headers = Headers::new();
    }

    /// Parse the body as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for invalid JSON and [`Error::NotAnObject`] when the
    /// top-level value is not an object.
    pub fn json_map(&self) -> Result<JsonMap> {
        decode_map(&self.body)
    }

    /// Decode the body into `T` with `decoder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] with the decoder's failure.
    pub fn decode<T: DeserializeOwned, D: ResponseDecoder>(&self, decoder: &D) -> Result<T> {
        decoder
            .decode(&self.body, &self.headers)
            .map_err(Error::Decode)
    }

    /// Turn 4xx/5xx responses into [`Error::Http`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] carrying the status and the body text (if UTF-8).
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(Error::Http {
                status: self.status,
                body_text: String::from_utf8(self.body).ok(),
            });
        }
        Ok(self)
    }
}

/// Parse `body` as JSON and require an object at the top level.
///
/// # Errors
///
/// Returns [`Error::Decode`] for invalid JSON and [`Error::NotAnObject`] otherwise.
pub fn decode_map(body: &[u8]) -> Result<JsonMap> {
    match serde_json::from_slice::<serde_json::Value>(body).map_err(Error::decode)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(Error::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::JsonDecoder;
    use serde::Deserialize;

    fn response(body: &str) -> RawResponse {
        RawResponse::new(StatusCode::OK, Headers::new(), body.as_bytes().to_vec())
    }

    #[test]
    fn map_requires_object() {
        let map = response(r#"{"form":{"test":"1"}}"#).json_map().unwrap();
        assert_eq!(map["form"]["test"], "1");

        assert!(matches!(
            response("[1,2,3]").json_map(),
            Err(Error::NotAnObject)
        ));
        assert!(matches!(response("\"text\"").json_map(), Err(Error::NotAnObject)));
        assert!(matches!(
            response("<html></html>").json_map(),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn typed_decode_wraps_failures() {
        #[derive(Debug, Deserialize)]
        struct Echo {
            url: String,
        }

        let echo: Echo = response(r#"{"url":"http://x/get"}"#)
            .decode(&JsonDecoder)
            .unwrap();
        assert_eq!(echo.url, "http://x/get");

        let err = response("{}").decode::<Echo, _>(&JsonDecoder).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn raw_access_skips_parsing() {
        let headers = Headers::try_from([("X-Id", "7")]).unwrap();
        let raw = RawResponse::new(StatusCode::OK, headers, vec![0xff, 0x00]);
        let (body, headers) = raw.into_parts();
        assert_eq!(body, [0xff, 0x00]);
        assert_eq!(headers.get("x-id"), Some("7"));
    }

    #[test]
    fn error_for_status_keeps_successes() {
        assert!(response("ok").error_for_status().is_ok());

        let failed = RawResponse::new(StatusCode::BAD_GATEWAY, Headers::new(), b"upstream".to_vec());
        let err = failed.error_for_status().unwrap_err();
        assert!(matches!(
            err,
            Error::Http { status: StatusCode::BAD_GATEWAY, body_text: Some(ref text) } if text == "upstream"
        ));
    }
}
