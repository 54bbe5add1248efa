//! Transports carry an assembled request to the network and back.
//!
//! The crate never talks to the network on its own: every request goes through a
//! [`Transport`] chosen when the [`Client`](crate::Client) is built. The bundled
//! [`TcpTransport`] covers plain HTTP/1.1; anything else (TLS, proxies, test doubles)
//! is a matter of implementing the trait.

use core::future::Future;
use std::sync::Arc;

use crate::{OutboundRequest, RawResponse, Result};

#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
mod tcp;
#[cfg(all(not(target_arch = "wasm32"), feature = "tcp"))]
pub use tcp::TcpTransport;

/// Executes one request and returns whatever the server answered.
///
/// Implementations report every status as a [`RawResponse`]; only failures to get an
/// answer at all become errors, usually [`Error::Transport`](crate::Error::Transport).
pub trait Transport: Send + Sync + 'static {
    /// Send `request` and wait for the complete response.
    fn send(&self, request: OutboundRequest) -> impl Future<Output = Result<RawResponse>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: OutboundRequest) -> impl Future<Output = Result<RawResponse>> + Send {
        T::send(self, request)
    }
}
