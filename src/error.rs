//! Unified error types for netability.
//!
//! Every failure a request can hit is folded into the single [`Error`] type:
//! - request build failures (body serialization, bad header names, bad URLs)
//! - transport failures, passed through opaquely from the [`Transport`](crate::Transport)
//! - response decode failures (invalid JSON, wrong shape)
//! - empty-resource failures from the async bridge
//!
//! Nothing in this crate retries; every error is scoped to the request that produced it.

use http::StatusCode;
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error used for the pluggable collaborators (transport, encoder, decoder).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Result type alias using [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for all netability operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The structured request body could not be serialized.
    ///
    /// Raised before any network attempt is made.
    #[error("failed to build request body: {0}")]
    Build(#[source] BoxError),

    /// A header name contained non-ASCII bytes.
    #[error("header name must be ASCII: {0:?}")]
    InvalidHeaderName(String),

    /// A header could not be represented on the wire.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Name of the offending header
        name: String,
        /// Why the transport rejected it
        reason: String,
    },

    /// A custom request method was not a valid HTTP token.
    #[error("invalid request method: {0:?}")]
    InvalidMethod(String),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A parsed URL could not be represented as an HTTP request target.
    #[error("invalid request URI: {0}")]
    InvalidUri(String),

    /// Network transport layer error (connection failed, bad server response, etc.).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The server answered with a 4xx/5xx status.
    ///
    /// Only produced by [`RawResponse::error_for_status`](crate::RawResponse::error_for_status);
    /// the pipeline itself hands every status back to the caller.
    #[error("HTTP error {status}")]
    Http {
        /// HTTP status code
        status: StatusCode,
        /// Response body as text (if UTF-8)
        body_text: Option<String>,
    },

    /// The response body could not be decoded into the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] BoxError),

    /// The response body was valid JSON but not a JSON object.
    #[error("response body is not a JSON object")]
    NotAnObject,

    /// An asynchronous source finished without a value and without failing.
    #[error("operation completed without producing a value")]
    EmptyResource,

    /// I/O error (reading upload files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a transport failure.
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    /// Wrap a decoder failure.
    pub fn decode(error: impl Into<BoxError>) -> Self {
        Self::Decode(error.into())
    }

    /// Wrap a request body serialization failure.
    pub fn build(error: impl Into<BoxError>) -> Self {
        Self::Build(error.into())
    }

    /// Check if the request failed before reaching the transport.
    pub const fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::Build(_)
                | Self::InvalidHeaderName(_)
                | Self::InvalidHeader { .. }
                | Self::InvalidMethod(_)
                | Self::InvalidUrl(_)
                | Self::InvalidUri(_)
        )
    }

    /// Check if this is a network transport error.
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if the server answered with an error status.
    pub fn is_http_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if status.is_client_error() || status.is_server_error())
    }

    /// Check if the server answered but the body had the wrong shape.
    pub const fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::NotAnObject)
    }

    /// Check if an async source completed without a value.
    pub const fn is_empty_resource(&self) -> bool {
        matches!(self, Self::EmptyResource)
    }

    /// Get the error category.
    ///
    /// Useful for logging.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Build(_) => ErrorKind::Build,
            Self::InvalidHeaderName(_)
            | Self::InvalidHeader { .. }
            | Self::InvalidMethod(_)
            | Self::InvalidUrl(_)
            | Self::InvalidUri(_) => ErrorKind::Request,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::Http,
            Self::Decode(_) | Self::NotAnObject => ErrorKind::Decode,
            Self::EmptyResource => ErrorKind::EmptyResource,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Error category labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request body serialization error
    Build,
    /// Request construction error (headers, URL)
    Request,
    /// Transport/network error
    Transport,
    /// HTTP error status
    Http,
    /// Response decode error
    Decode,
    /// Completion without a value
    EmptyResource,
    /// I/O error
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Request => write!(f, "request"),
            Self::Transport => write!(f, "transport"),
            Self::Http => write!(f, "http"),
            Self::Decode => write!(f, "decode"),
            Self::EmptyResource => write!(f, "empty_resource"),
            Self::Io => write!(f, "io"),
        }
    }
}
