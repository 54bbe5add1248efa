//! The client facade: one raw primitive with typed and map decoding layered on top.

use core::{fmt, future::IntoFuture};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::Method;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    BoxError, Completion, Error, Headers, JsonMap, RawResponse, Result,
    coder::{JsonDecoder, JsonEncoder, RequestEncoder, ResponseDecoder},
    form::{FormData, ToForm},
    method::RequestMethod,
    multipart::{GuessMime, MimeResolver, UploadFile},
    request::{IntoUrl, OutboundRequest, assemble_upload, assemble_with},
    transport::Transport,
};

type EncodeBody<E> = Box<dyn FnOnce(&E, &mut Headers) -> Result<Vec<u8>, BoxError> + Send>;

/// HTTP client over a pluggable [`Transport`].
///
/// Cloning is cheap; clones share the transport and configuration.
///
/// ```no_run
/// # async fn example() -> netability::Result<()> {
/// use netability::{Client, TcpTransport};
///
/// let client = Client::new(TcpTransport::new());
/// let echo = client.get("http://httpbin.org/get").json_map().await?;
/// println!("{echo:?}");
/// # Ok(())
/// # }
/// ```
pub struct Client<T, E = JsonEncoder, D = JsonDecoder> {
    inner: Arc<Inner<T, E, D>>,
}

struct Inner<T, E, D> {
    transport: T,
    encoder: E,
    decoder: D,
    mime: Box<dyn MimeResolver>,
    default_headers: Headers,
    need_response_headers: bool,
}

impl<T, E, D> Clone for Client<T, E, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E, D> fmt::Debug for Client<T, E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("default_headers", &self.inner.default_headers)
            .field("need_response_headers", &self.inner.need_response_headers)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Client<T> {
    /// Client with JSON coding and default settings.
    pub fn new(transport: T) -> Self {
        Self::builder(transport).build()
    }

    /// Start configuring a client around `transport`.
    pub fn builder(transport: T) -> ClientBuilder<T> {
        ClientBuilder {
            transport,
            encoder: JsonEncoder,
            decoder: JsonDecoder,
            mime: Box::new(GuessMime),
            default_headers: Headers::new(),
            need_response_headers: true,
        }
    }
}

impl<T, E, D> Client<T, E, D>
where
    T: Transport,
    E: RequestEncoder,
    D: ResponseDecoder,
{
    /// Send an already assembled request as is.
    ///
    /// This is the primitive every other method funnels into. Non-2xx statuses are
    /// delivered as responses; use [`RawResponse::error_for_status`] to reject them.
    pub fn execute(&self, request: OutboundRequest) -> Completion<RawResponse> {
        let inner = Arc::clone(&self.inner);
        Completion::new(async move {
            let method = request.method.clone();
            let url = request.url.clone();
            tracing::debug!(%method, %url, "sending request");

            let mut response = inner.transport.send(request).await.inspect_err(|err| {
                tracing::debug!(%method, %url, error = %err, "request failed");
            })?;
            tracing::debug!(
                %method,
                %url,
                status = %response.status(),
                body_len = response.body().len(),
                "received response"
            );

            if !inner.need_response_headers {
                response.clear_headers();
            }
            Ok(response)
        })
    }

    /// Start a request with an HTTP method.
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder<T, E, D> {
        RequestBuilder::new(self.clone(), method, url.into_url())
    }

    /// Start a request with a transport-agnostic [`RequestMethod`].
    ///
    /// An invalid custom verb surfaces when the request is sent.
    pub fn network(&self, method: RequestMethod, url: impl IntoUrl) -> RequestBuilder<T, E, D> {
        match Method::try_from(method) {
            Ok(method) => self.request(method, url),
            Err(err) => {
                let mut builder = self.request(Method::GET, url);
                builder.fail(err);
                builder
            }
        }
    }

    /// Start a `GET` request.
    pub fn get(&self, url: impl IntoUrl) -> RequestBuilder<T, E, D> {
        self.request(Method::GET, url)
    }

    /// Start a `POST` request.
    pub fn post(&self, url: impl IntoUrl) -> RequestBuilder<T, E, D> {
        self.request(Method::POST, url)
    }

    /// Start a `PUT` request.
    pub fn put(&self, url: impl IntoUrl) -> RequestBuilder<T, E, D> {
        self.request(Method::PUT, url)
    }

    /// Start a `DELETE` request.
    pub fn delete(&self, url: impl IntoUrl) -> RequestBuilder<T, E, D> {
        self.request(Method::DELETE, url)
    }

    /// Start a multipart `POST` uploading `files` under `key`.
    pub fn upload(
        &self,
        url: impl IntoUrl,
        key: impl Into<String>,
        files: impl IntoIterator<Item = UploadFile>,
    ) -> RequestBuilder<T, E, D> {
        self.post(url).files(key, files)
    }

    /// The configured response decoder.
    pub fn decoder(&self) -> &D {
        &self.inner.decoder
    }
}

/// Configures a [`Client`].
pub struct ClientBuilder<T, E = JsonEncoder, D = JsonDecoder> {
    transport: T,
    encoder: E,
    decoder: D,
    mime: Box<dyn MimeResolver>,
    default_headers: Headers,
    need_response_headers: bool,
}

impl<T, E, D> fmt::Debug for ClientBuilder<T, E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("default_headers", &self.default_headers)
            .field("need_response_headers", &self.need_response_headers)
            .finish_non_exhaustive()
    }
}

impl<T, E, D> ClientBuilder<T, E, D>
where
    T: Transport,
    E: RequestEncoder,
    D: ResponseDecoder,
{
    /// Encode structured bodies with `encoder` instead of JSON.
    #[must_use]
    pub fn request_encoder<E2: RequestEncoder>(self, encoder: E2) -> ClientBuilder<T, E2, D> {
        ClientBuilder {
            transport: self.transport,
            encoder,
            decoder: self.decoder,
            mime: self.mime,
            default_headers: self.default_headers,
            need_response_headers: self.need_response_headers,
        }
    }

    /// Decode typed responses with `decoder` instead of JSON.
    #[must_use]
    pub fn response_decoder<D2: ResponseDecoder>(self, decoder: D2) -> ClientBuilder<T, E, D2> {
        ClientBuilder {
            transport: self.transport,
            encoder: self.encoder,
            decoder,
            mime: self.mime,
            default_headers: self.default_headers,
            need_response_headers: self.need_response_headers,
        }
    }

    /// Resolve upload MIME types with `resolver`.
    #[must_use]
    pub fn mime_resolver(mut self, resolver: impl MimeResolver) -> Self {
        self.mime = Box::new(resolver);
        self
    }

    /// Headers added to every request that does not set them itself.
    #[must_use]
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.default_headers = headers;
        self
    }

    /// Whether responses keep their headers. Defaults to `true`.
    #[must_use]
    pub const fn need_response_headers(mut self, keep: bool) -> Self {
        self.need_response_headers = keep;
        self
    }

    /// Finish configuration.
    pub fn build(self) -> Client<T, E, D> {
        Client {
            inner: Arc::new(Inner {
                transport: self.transport,
                encoder: self.encoder,
                decoder: self.decoder,
                mime: self.mime,
                default_headers: self.default_headers,
                need_response_headers: self.need_response_headers,
            }),
        }
    }
}

/// A request being configured.
///
/// Nothing is encoded until the request is sent; any configuration error is
/// delivered through the returned [`Completion`] before the transport is involved.
#[must_use = "a request does nothing unless sent or awaited"]
pub struct RequestBuilder<T, E = JsonEncoder, D = JsonDecoder> {
    client: Client<T, E, D>,
    method: Method,
    url: Result<Url>,
    error: Option<Error>,
    headers: Headers,
    form: Option<FormData>,
    body: Option<EncodeBody<E>>,
    files: Option<(String, Vec<UploadFile>)>,
    boundary: Option<String>,
}

impl<T, E, D> fmt::Debug for RequestBuilder<T, E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url.as_ref().map(Url::as_str).ok())
            .field("headers", &self.headers)
            .field("form", &self.form)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, E, D> RequestBuilder<T, E, D>
where
    T: Transport,
    E: RequestEncoder,
    D: ResponseDecoder,
{
    fn new(client: Client<T, E, D>, method: Method, url: Result<Url>) -> Self {
        Self {
            client,
            method,
            url,
            error: None,
            headers: Headers::new(),
            form: None,
            body: None,
            files: None,
            boundary: None,
        }
    }

    // Keeps the first error only.
    fn fail(&mut self, error: Error) {
        self.error.get_or_insert(error);
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Err(err) = self.headers.add(name, value) {
            self.fail(err);
        }
        self
    }

    /// Append several headers.
    pub fn headers(mut self, headers: &Headers) -> Self {
        if let Err(err) = self.headers.add_all(headers.iter()) {
            self.fail(err);
        }
        self
    }

    /// Authenticate with a bearer token.
    pub fn bearer_auth(mut self, token: impl fmt::Display) -> Self {
        self.headers.bearer_auth(token);
        self
    }

    /// Authenticate with HTTP basic credentials.
    pub fn basic_auth(mut self, username: impl fmt::Display, password: Option<impl fmt::Display>) -> Self {
        self.headers.basic_auth(username, password);
        self
    }

    /// Attach encoded form data: the query for `GET`/`HEAD`, the body otherwise.
    pub fn form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    /// Attach a dictionary as form data, keys sorted.
    pub fn form_map<I, K, V>(self, map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<crate::FormValue>,
    {
        self.form(FormData::from_map(map))
    }

    /// Attach a model as form data, fields in declaration order.
    pub fn form_model<M: ToForm + ?Sized>(self, model: &M) -> Self {
        self.form(FormData::model(model))
    }

    /// Attach a structured body, encoded by the client's request encoder when sent.
    ///
    /// Ignored for `GET`/`HEAD` and for uploads.
    pub fn body<B: Serialize + Send + 'static>(mut self, body: B) -> Self {
        self.body = Some(Box::new(move |encoder: &E, headers: &mut Headers| {
            encoder.encode(&body, headers)
        }));
        self
    }

    /// Turn the request into a multipart upload of `files` under `key`.
    pub fn files(mut self, key: impl Into<String>, files: impl IntoIterator<Item = UploadFile>) -> Self {
        self.files = Some((key.into(), files.into_iter().collect()));
        self
    }

    /// Use a fixed multipart boundary instead of a random one.
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Assemble the request without sending it.
    ///
    /// Client default headers are merged in first, so computed headers respect them.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error, or [`Error::Build`] if the body cannot
    /// be encoded.
    pub fn build(self) -> Result<(Client<T, E, D>, OutboundRequest)> {
        let Self {
            client,
            method,
            url,
            error,
            mut headers,
            form,
            body,
            files,
            boundary,
        } = self;
        let url = url?;
        if let Some(err) = error {
            return Err(err);
        }
        headers.merge_missing(&client.inner.default_headers);

        let request = if let Some((key, files)) = files {
            assemble_upload(
                method,
                url,
                &key,
                &files,
                form.as_ref(),
                Some(&headers),
                client.inner.mime.as_ref(),
                boundary.as_deref(),
            )?
        } else {
            let encoder = &client.inner.encoder;
            assemble_with(
                method,
                url,
                form.as_ref(),
                body.map(|encode| move |headers: &mut Headers| encode(encoder, headers)),
                Some(&headers),
            )?
        };
        Ok((client, request))
    }

    /// Send and deliver the raw response.
    pub fn send(self) -> Completion<RawResponse> {
        match self.build() {
            Ok((client, request)) => client.execute(request),
            Err(err) => Completion::ready(Err(err)),
        }
    }

    /// Send and parse the body as a JSON object.
    pub fn json_map(self) -> Completion<JsonMap> {
        self.send().map(|response| response.json_map())
    }

    /// Send and decode the body into `R` with the client's response decoder.
    pub fn decode<R: DeserializeOwned + Send + 'static>(self) -> Completion<R> {
        let client = self.client.clone();
        self.send()
            .map(move |response| response.decode(client.decoder()))
    }
}

impl<T, E, D> IntoFuture for RequestBuilder<T, E, D>
where
    T: Transport,
    E: RequestEncoder,
    D: ResponseDecoder,
{
    type Output = Result<RawResponse>;
    type IntoFuture = BoxFuture<'static, Result<RawResponse>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().into_future()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{coder::JSON_CONTENT_TYPE, form::FORM_CONTENT_TYPE, headers::CONTENT_TYPE};
    use http::StatusCode;
    use serde::Deserialize;
    use std::sync::Mutex;

    /// Records requests and answers each with a canned response.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<OutboundRequest>>,
        reply: Option<&'static str>,
    }

    impl Transport for Recorder {
        fn send(&self, request: OutboundRequest) -> impl Future<Output = Result<RawResponse>> + Send {
            let body = self.reply.unwrap_or("{}").as_bytes().to_vec();
            self.seen.lock().unwrap().push(request);
            let headers = Headers::try_from([("X-Served-By", "recorder")]).unwrap();
            async move { Ok(RawResponse::new(StatusCode::OK, headers, body)) }
        }
    }

    fn recorder(reply: &'static str) -> Client<Arc<Recorder>> {
        Client::new(Arc::new(Recorder {
            seen: Mutex::default(),
            reply: Some(reply),
        }))
    }

    fn last_request(client: &Client<Arc<Recorder>>) -> OutboundRequest {
        client.inner.transport.seen.lock().unwrap().pop().unwrap()
    }

    #[async_std::test]
    async fn get_puts_form_in_query() {
        let client = recorder("{}");
        client
            .get("http://host/get?")
            .form_map([("b", "2"), ("a", "1")])
            .await
            .unwrap();

        let request = last_request(&client);
        assert_eq!(request.url.as_str(), "http://host/get?a=1&b=2");
        assert!(request.body.is_empty());
    }

    #[async_std::test]
    async fn post_form_and_json_bodies() {
        let client = recorder("{}");

        client.post("http://host/post").form_map([("test", "1")]).await.unwrap();
        let request = last_request(&client);
        assert_eq!(request.body, b"test=1");
        assert_eq!(request.headers.get(CONTENT_TYPE), Some(FORM_CONTENT_TYPE));

        client
            .post("http://host/post")
            .form_map([("ignored", "1")])
            .body(serde_json::json!({"test": 1}))
            .await
            .unwrap();
        let request = last_request(&client);
        assert_eq!(request.body, br#"{"test":1}"#);
        assert_eq!(request.headers.get(CONTENT_TYPE), Some(JSON_CONTENT_TYPE));
    }

    #[async_std::test]
    async fn default_headers_fill_gaps_only() {
        let transport = Arc::new(Recorder::default());
        let client = Client::builder(Arc::clone(&transport))
            .default_headers(Headers::try_from([("User-Agent", "netability"), ("Accept", "*/*")]).unwrap())
            .build();

        client
            .get("http://host/get")
            .header("accept", "application/json")
            .await
            .unwrap();
        let request = transport.seen.lock().unwrap().pop().unwrap();
        assert_eq!(request.headers.get_all("Accept"), ["application/json"]);
        assert_eq!(request.headers.get("user-agent"), Some("netability"));
    }

    #[async_std::test]
    async fn configuration_errors_skip_the_transport() {
        let client = recorder("{}");

        let err = client.get("http://host/get").header("Schlüssel", "x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderName(_)));

        let err = client.get("::not a url::").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = client
            .network(RequestMethod::Custom("BAD VERB".into()), "http://host/")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMethod(_)));

        assert!(client.inner.transport.seen.lock().unwrap().is_empty());
    }

    #[async_std::test]
    async fn typed_and_map_decoding() {
        #[derive(Debug, Deserialize)]
        struct Echo {
            url: String,
        }

        let client = recorder(r#"{"url":"http://host/get"}"#);
        let echo: Echo = client.get("http://host/get").decode().await.unwrap();
        assert_eq!(echo.url, "http://host/get");

        let map = client.get("http://host/get").json_map().await.unwrap();
        assert_eq!(map["url"], "http://host/get");

        let client = recorder("[1]");
        let err = client.get("http://host/get").json_map().await.unwrap_err();
        assert!(matches!(err, Error::NotAnObject));
    }

    #[test]
    fn callback_delivery_without_an_executor() {
        let client = recorder(r#"{"ok":true}"#);
        let (sender, receiver) = std::sync::mpsc::channel();
        client
            .network(RequestMethod::Set, "http://host/post")
            .json_map()
            .on_complete(move |result| sender.send(result).unwrap());

        let map = receiver.try_recv().unwrap().unwrap();
        assert_eq!(map["ok"], true);
        assert_eq!(last_request(&client).method, Method::POST);
    }

    #[async_std::test]
    async fn response_headers_can_be_dropped() {
        let transport = Arc::new(Recorder::default());
        let keep = Client::new(Arc::clone(&transport));
        let response = keep.get("http://host/").await.unwrap();
        assert_eq!(response.headers().get("x-served-by"), Some("recorder"));

        let lean = Client::builder(transport).need_response_headers(false).build();
        let response = lean.get("http://host/").await.unwrap();
        assert!(response.headers().is_empty());
    }

    #[async_std::test]
    async fn upload_assembles_multipart() {
        let client = recorder("{}");
        client
            .upload("http://host/post", "file", [UploadFile::new("a.json", "{}")])
            .form_map([("note", "hi")])
            .boundary("B")
            .await
            .unwrap();

        let request = last_request(&client);
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.headers.get(CONTENT_TYPE),
            Some("multipart/form-data; boundary=B")
        );
        let body = String::from_utf8(request.body).unwrap();
        assert!(body.contains("Content-Type: application/json"));
        assert!(body.find("name=\"note\"").unwrap() < body.find("name=\"file\"").unwrap());
    }
}
