//! Shared test utilities for running against a local httpbin-like server.
//!
//! The real httpbin service is flaky or rate-limited in CI, so we run a
//! lightweight local replacement that echoes requests the way httpbin does:
//! query arguments, headers, URL-encoded forms, JSON bodies and multipart
//! uploads. Set `NETABILITY_TEST_BASE_URL` to target another server.

use std::{
    io::{Cursor, Read},
    thread,
};

use once_cell::sync::OnceCell;
use serde_json::{Map, Value, json};
use tiny_http::{Header, ListenAddr, Request, Response, Server, StatusCode};
use url::Url;

#[derive(Debug)]
pub struct TestServer {
    base: String,
    // Keep the thread alive for the duration of the tests.
    _thread: thread::JoinHandle<()>,
}

/// Return the base URL for the local test server, falling back to an env var
/// override so the tests can target another server if needed.
pub fn httpbin_base() -> String {
    if let Ok(base) = std::env::var("NETABILITY_TEST_BASE_URL") {
        return base.trim_end_matches('/').to_string();
    }
    test_server().base.clone()
}

/// Build a full URL against the local test server.
pub fn httpbin_uri(path: &str) -> String {
    format!("{}/{}", httpbin_base(), path.trim_start_matches('/'))
}

pub fn test_server() -> &'static TestServer {
    static INSTANCE: OnceCell<TestServer> = OnceCell::new();
    INSTANCE.get_or_init(TestServer::start)
}

impl TestServer {
    fn start() -> Self {
        let server = Server::http("127.0.0.1:0").expect("start test server");
        let addr: ListenAddr = server.server_addr();
        let base = format!("http://{addr}");
        let thread = thread::spawn(move || run_server(&server));

        Self {
            base,
            _thread: thread,
        }
    }
}

fn run_server(server: &Server) {
    for mut request in server.incoming_requests() {
        let mut body = Vec::new();
        let _ = request.as_reader().read_to_end(&mut body);
        let response = handle_request(&request, &body);
        let _ = request.respond(response);
    }
}

fn handle_request(request: &Request, body: &[u8]) -> Response<Cursor<Vec<u8>>> {
    // tiny_http only provides the path/query, so prefix with a dummy scheme/host.
    let url = Url::parse(&format!("http://localhost{}", request.url())).unwrap();
    let path = url.path().to_string();

    match path.as_str() {
        "/get" => json_response(
            StatusCode(200),
            &json!({
                "args": args(&url),
                "headers": headers(request),
                "url": url.as_str(),
            }),
        ),
        "/post" | "/put" | "/delete" | "/patch" => {
            json_response(StatusCode(200), &echo_body(request, &url, body))
        }
        "/json" => json_response(
            StatusCode(200),
            &json!({"slideshow": {"title": "httpbin local", "author": "netability"}}),
        ),
        "/array" => json_response(StatusCode(200), &json!([1, 2, 3])),
        "/html" => text_response(StatusCode(200), "<html><body>not json</body></html>"),
        _ => {
            if let Some(code) = path.strip_prefix("/status/") {
                let status = code.parse::<u16>().unwrap_or(400);
                return text_response(StatusCode(status), format!("status {status}"));
            }
            text_response(StatusCode(404), format!("no route for {path}"))
        }
    }
}

fn echo_body(request: &Request, url: &Url, body: &[u8]) -> Value {
    let content_type = header_value(request, "content-type").unwrap_or_default();
    let mut form = Map::new();
    let mut files = Map::new();
    let mut json_body = Value::Null;

    if content_type.starts_with("application/x-www-form-urlencoded") {
        for (name, value) in url::form_urlencoded::parse(body) {
            form.insert(name.into_owned(), Value::String(value.into_owned()));
        }
    } else if content_type.starts_with("application/json") {
        json_body = serde_json::from_slice(body).unwrap_or(Value::Null);
    } else if let Some(boundary) = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .map(str::to_string)
    {
        for part in multipart_parts(body, &boundary) {
            match part.file_name {
                Some(_) => files.insert(part.name, Value::String(part.content)),
                None => form.insert(part.name, Value::String(part.content)),
            };
        }
    }

    json!({
        "args": args(url),
        "data": String::from_utf8_lossy(body),
        "files": files,
        "form": form,
        "headers": headers(request),
        "json": json_body,
        "method": request.method().as_str(),
        "url": url.as_str(),
    })
}

struct Part {
    name: String,
    file_name: Option<String>,
    content: String,
}

fn multipart_parts(body: &[u8], boundary: &str) -> Vec<Part> {
    let text = String::from_utf8_lossy(body);
    let delimiter = format!("--{boundary}");
    text.split(delimiter.as_str())
        .filter_map(|chunk| {
            let chunk = chunk.strip_prefix("\r\n")?;
            let (head, content) = chunk.split_once("\r\n\r\n")?;
            let disposition = head
                .lines()
                .find(|line| line.to_ascii_lowercase().starts_with("content-disposition"))?;
            Some(Part {
                name: quoted(disposition, "name=")?,
                file_name: quoted(disposition, "filename="),
                content: content.strip_suffix("\r\n").unwrap_or(content).to_string(),
            })
        })
        .collect()
}

// Unquoted value of the `;`-separated parameter starting with `key`.
fn quoted(header: &str, key: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix(key))
        .map(|value| value.trim_matches('"').to_string())
}

fn args(url: &Url) -> Value {
    let mut map = Map::new();
    for (name, value) in url.query_pairs() {
        map.insert(name.into_owned(), Value::String(value.into_owned()));
    }
    Value::Object(map)
}

fn headers(request: &Request) -> Value {
    let mut map = Map::new();
    for header in request.headers() {
        map.insert(
            header.field.to_string(),
            Value::String(header.value.to_string()),
        );
    }
    Value::Object(map)
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.to_string().eq_ignore_ascii_case(name))
        .map(|header| header.value.to_string())
}

fn json_response(status: StatusCode, body: &Value) -> Response<Cursor<Vec<u8>>> {
    let content_type = Header::from_bytes("Content-Type", "application/json").unwrap();
    Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(content_type)
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Cursor<Vec<u8>>> {
    Response::from_string(body.into()).with_status_code(status)
}
