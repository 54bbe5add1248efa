//! HTTP/1.1 over `async-net`, spoken by hyper.
//!
//! One connection per request. hyper's connection future is polled alongside
//! the exchange itself, so the transport runs on whatever drives the request
//! and never needs an executor.

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, ready},
    time::Duration,
};
use std::{io, net::SocketAddr};

use async_io::Timer;
use async_net::TcpStream;
use futures_util::{
    AsyncRead, AsyncWrite,
    future::{Either, select},
    pin_mut,
};
use http::{HeaderValue, Method, header::HOST};
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, client::conn::http1, rt::ReadBufCursor};
use thiserror::Error;
use url::{Host, Position, Url};

use crate::{Error, Headers, OutboundRequest, RawResponse, Result, transport::Transport};

/// Transport speaking HTTP/1.1 over a fresh TCP connection per request.
///
/// Only `http://` URLs are accepted; TLS needs a custom [`Transport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport {
    timeout: Option<Duration>,
}

impl TcpTransport {
    /// Transport without a timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Fail requests that take longer than `duration`, connection included.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

#[derive(Debug, Error)]
enum TcpError {
    #[error("unsupported URL scheme {0:?}; only plain http is supported")]
    UnsupportedScheme(String),
    #[error("URL has no host: {0}")]
    MissingHost(String),
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Http(#[from] hyper::Error),
}

impl From<TcpError> for Error {
    fn from(error: TcpError) -> Self {
        Self::transport(error)
    }
}

impl Transport for TcpTransport {
    fn send(&self, request: OutboundRequest) -> impl Future<Output = Result<RawResponse>> + Send {
        let timeout = self.timeout;
        async move {
            let exchange = exchange(request);
            let Some(duration) = timeout else {
                return exchange.await;
            };

            let timer = Timer::after(duration);
            pin_mut!(exchange);
            pin_mut!(timer);
            match select(exchange, timer).await {
                Either::Left((result, _)) => result,
                Either::Right((_, _)) => Err(TcpError::TimedOut(duration).into()),
            }
        }
    }
}

async fn exchange(request: OutboundRequest) -> Result<RawResponse> {
    let OutboundRequest {
        url,
        method,
        headers,
        body,
    } = request;

    if url.scheme() != "http" {
        return Err(TcpError::UnsupportedScheme(url.scheme().to_owned()).into());
    }
    let request = http_request(&url, method, &headers, body)?;
    let stream = connect(&url).await?;
    tracing::trace!(method = %request.method(), %url, "connected");

    let (mut sender, connection) = http1::handshake::<_, Full<Bytes>>(Io(stream))
        .await
        .map_err(TcpError::from)?;
    let response = async move {
        let response = sender.send_request(request).await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok::<_, hyper::Error>((parts, body))
    };

    pin_mut!(response);
    pin_mut!(connection);
    let (parts, body) = match select(response, connection).await {
        Either::Left((result, _)) => result,
        // The server closed the connection; the exchange settles with what it got.
        Either::Right((Ok(()), response)) => response.await,
        Either::Right((Err(err), _)) => Err(err),
    }
    .map_err(TcpError::from)?;

    Ok(RawResponse::new(
        parts.status,
        Headers::from_header_map(&parts.headers),
        body.to_vec(),
    ))
}

async fn connect(url: &Url) -> Result<TcpStream> {
    let port = url.port_or_known_default().unwrap_or(80);
    let stream = match url.host() {
        Some(Host::Domain(domain)) => TcpStream::connect((domain, port)).await,
        Some(Host::Ipv4(ip)) => TcpStream::connect(SocketAddr::from((ip, port))).await,
        Some(Host::Ipv6(ip)) => TcpStream::connect(SocketAddr::from((ip, port))).await,
        None => return Err(TcpError::MissingHost(url.to_string()).into()),
    };
    stream.map_err(|err| TcpError::Io(err).into())
}

// Origin-form target plus a `Host` header unless the caller set one.
fn http_request(
    url: &Url,
    method: Method,
    headers: &Headers,
    body: Vec<u8>,
) -> Result<http::Request<Full<Bytes>>> {
    let mut map = headers.to_header_map()?;
    if !map.contains_key(HOST) {
        let host = HeaderValue::from_str(&url[Position::BeforeHost..Position::AfterPort])
            .map_err(|err| Error::InvalidHeader {
                name: HOST.to_string(),
                reason: err.to_string(),
            })?;
        map.insert(HOST, host);
    }
    let target = http::Uri::try_from(&url[Position::BeforePath..Position::AfterQuery])
        .map_err(|err| Error::InvalidUri(err.to_string()))?;

    let mut request = http::Request::new(Full::new(Bytes::from(body)));
    *request.method_mut() = method;
    *request.uri_mut() = target;
    *request.headers_mut() = map;
    Ok(request)
}

// hyper's I/O traits over a futures-io stream.
struct Io<S>(S);

impl<S: AsyncRead + Unpin> hyper::rt::Read for Io<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        mut buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        let mut chunk = [0; 8 * 1024];
        let len = chunk.len().min(buf.remaining());
        let read = ready!(Pin::new(&mut self.0).poll_read(cx, &mut chunk[..len]))?;
        buf.put_slice(&chunk[..read]);
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> hyper::rt::Write for Io<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_close(cx)
    }
}
