//! # Pluggable HTTP client layer
//! Netability turns method, URL, form data, structured bodies and headers into
//! requests, hands them to a swappable transport, and unwraps the answers.
//! It has a lot of features:
//! - Ordered, case-insensitive header collection
//! - Bracketed form/query encoding for maps, arrays and models
//! - Multipart uploads with MIME detection
//! - Pluggable request encoders and response decoders (JSON by default)
//! - Every operation available by `.await` or by callback
//!
//! # Quick start
//! ```rust,no_run
//! # async fn example() -> netability::Result<()> {
//! use netability::get;
//! let echo = get("http://httpbin.org/get").form_map([("q", "rust")]).json_map().await?;
//! println!("{echo:?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Callbacks
//! ```rust,no_run
//! use netability::post;
//! post("http://httpbin.org/post")
//!     .form_map([("test", "1")])
//!     .json_map()
//!     .on_complete(|result| match result {
//!         Ok(echo) => println!("{}", echo["form"]),
//!         Err(err) => eprintln!("request failed: {err}"),
//!     });
//! ```

mod bridge;
mod client;
mod error;
mod request;
mod response;

pub mod coder;
pub mod form;
pub mod headers;
pub mod method;
pub mod multipart;
pub mod transport;

pub use bridge::{Completion, Resolver};
pub use client::{Client, ClientBuilder, RequestBuilder};
pub use error::{BoxError, Error, ErrorKind, Result};
pub use form::{FormData, FormField, FormValue, ToForm};
pub use headers::Headers;
pub use method::RequestMethod;
pub use multipart::{Multipart, UploadFile};
pub use request::{IntoUrl, OutboundRequest, assemble, assemble_upload};
pub use response::{JsonMap, RawResponse, decode_map};
pub use transport::Transport;

pub use http::{Method, StatusCode};
pub use url::Url;

#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
pub use transport::TcpTransport;

/// A client over the bundled [`TcpTransport`].
#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
#[must_use]
pub fn client() -> Client<TcpTransport> {
    Client::new(TcpTransport::new())
}

/// Start a `GET` request on a fresh [`client()`].
#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
pub fn get(url: impl IntoUrl) -> RequestBuilder<TcpTransport> {
    client().get(url)
}

/// Start a `POST` request on a fresh [`client()`].
#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
pub fn post(url: impl IntoUrl) -> RequestBuilder<TcpTransport> {
    client().post(url)
}

/// Start a `PUT` request on a fresh [`client()`].
#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
pub fn put(url: impl IntoUrl) -> RequestBuilder<TcpTransport> {
    client().put(url)
}

/// Start a `DELETE` request on a fresh [`client()`].
#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
pub fn delete(url: impl IntoUrl) -> RequestBuilder<TcpTransport> {
    client().delete(url)
}
