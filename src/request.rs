//! Outbound requests and the assembler that builds them.

use http::Method;
use serde::Serialize;
use url::Url;

use crate::{
    BoxError, Error, Headers, Result,
    coder::RequestEncoder,
    form::{FORM_CONTENT_TYPE, FormData},
    headers::CONTENT_TYPE,
    method::is_read_method,
    multipart::{MimeResolver, Multipart, UploadFile},
};

/// A fully assembled request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Target URL, query included.
    pub url: Url,
    /// Request method.
    pub method: Method,
    /// Caller headers followed by any computed ones.
    pub headers: Headers,
    /// Body bytes; empty for read methods.
    pub body: Vec<u8>,
}

impl OutboundRequest {
    /// Convert into an [`http::Request`] for transports built on the `http` crate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if a header cannot be represented, or
    /// [`Error::InvalidUri`] if the URL is not a valid URI.
    pub fn into_http(self) -> Result<http::Request<Vec<u8>>> {
        let headers = self.headers.to_header_map()?;
        let uri: http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|err: http::uri::InvalidUri| Error::InvalidUri(err.to_string()))?;
        let (mut parts, ()) = http::Request::new(()).into_parts();
        parts.method = self.method;
        parts.uri = uri;
        parts.headers = headers;
        Ok(http::Request::from_parts(parts, self.body))
    }
}

/// Conversion into a parsed [`Url`].
pub trait IntoUrl {
    /// Parse or pass through the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the input does not parse.
    fn into_url(self) -> Result<Url>;
}

impl IntoUrl for Url {
    fn into_url(self) -> Result<Url> {
        Ok(self)
    }
}

impl IntoUrl for &Url {
    fn into_url(self) -> Result<Url> {
        Ok(self.clone())
    }
}

impl IntoUrl for &str {
    fn into_url(self) -> Result<Url> {
        Ok(Url::parse(self)?)
    }
}

impl IntoUrl for String {
    fn into_url(self) -> Result<Url> {
        self.as_str().into_url()
    }
}

impl IntoUrl for &String {
    fn into_url(self) -> Result<Url> {
        self.as_str().into_url()
    }
}

/// Assemble a request from a method, URL, optional form data, optional structured body
/// and optional caller headers.
///
/// - Read methods (`GET`, `HEAD`) put `form` into the URL query and send no body;
///   `body` is ignored.
/// - Other methods encode `body` with `encoder` when present, otherwise send `form`
///   URL-encoded, otherwise send nothing.
///
/// Computed headers are only added when the caller has not set them.
///
/// # Errors
///
/// Returns [`Error::Build`] if `body` cannot be serialized; no request is produced.
pub fn assemble<E, B>(
    encoder: &E,
    method: Method,
    url: Url,
    form: Option<&FormData>,
    body: Option<&B>,
    headers: Option<&Headers>,
) -> Result<OutboundRequest>
where
    E: RequestEncoder,
    B: Serialize + ?Sized,
{
    assemble_with(
        method,
        url,
        form,
        body.map(|body| move |headers: &mut Headers| encoder.encode(body, headers)),
        headers,
    )
}

pub(crate) fn assemble_with<F>(
    method: Method,
    mut url: Url,
    form: Option<&FormData>,
    encode_body: Option<F>,
    headers: Option<&Headers>,
) -> Result<OutboundRequest>
where
    F: FnOnce(&mut Headers) -> Result<Vec<u8>, BoxError>,
{
    let mut headers = headers.cloned().unwrap_or_default();
    let mut body = Vec::new();

    if is_read_method(&method) {
        if let Some(form) = form {
            form.append_to_url(&mut url);
        }
    } else if let Some(encode_body) = encode_body {
        body = encode_body(&mut headers).map_err(|err| {
            tracing::warn!(%url, error = %err, "failed to encode request body");
            Error::Build(err)
        })?;
    } else if let Some(encoded) = form.and_then(FormData::to_body) {
        if !headers.contains(CONTENT_TYPE) {
            headers.add(CONTENT_TYPE, FORM_CONTENT_TYPE)?;
        }
        body = encoded;
    }

    tracing::trace!(%method, %url, body_len = body.len(), "assembled request");
    Ok(OutboundRequest {
        url,
        method,
        headers,
        body,
    })
}

/// Assemble a multipart upload of `files` under `key`, with `form` written as plain fields.
///
/// # Errors
///
/// Currently infallible for valid inputs; returns an error only if a computed header
/// name is rejected.
#[allow(clippy::too_many_arguments)]
pub fn assemble_upload(
    method: Method,
    url: Url,
    key: &str,
    files: &[UploadFile],
    form: Option<&FormData>,
    headers: Option<&Headers>,
    resolver: &dyn MimeResolver,
    boundary: Option<&str>,
) -> Result<OutboundRequest> {
    let mut multipart = boundary.map_or_else(Multipart::new, Multipart::with_boundary);
    if let Some(form) = form {
        multipart.add_form(form);
    }
    multipart.add_files(key, files, resolver);

    let mut headers = headers.cloned().unwrap_or_default();
    if !headers.contains(CONTENT_TYPE) {
        headers.add(CONTENT_TYPE, multipart.content_type())?;
    }
    let (_, body) = multipart.finalize();

    tracing::trace!(%method, %url, files = files.len(), body_len = body.len(), "assembled upload");
    Ok(OutboundRequest {
        url,
        method,
        headers,
        body,
    })
}
