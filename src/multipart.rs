//! `multipart/form-data` bodies for file uploads.

use std::{borrow::Cow, path::Path};

use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::{Result, form::FormData};

/// MIME type used when the extension is unknown.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolves a MIME type from a file extension.
pub trait MimeResolver: Send + Sync + 'static {
    /// MIME type for `extension` (without the leading dot), or `None` if unknown.
    fn resolve(&self, extension: &str) -> Option<String>;

    /// MIME type for `file_name`, falling back to [`OCTET_STREAM`].
    fn mime_type_for(&self, file_name: &str) -> String {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.resolve(ext))
            .unwrap_or_else(|| OCTET_STREAM.to_owned())
    }
}

/// Default resolver backed by the `mime_guess` extension table.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuessMime;

impl MimeResolver for GuessMime {
    fn resolve(&self, extension: &str) -> Option<String> {
        mime_guess::from_ext(extension).first_raw().map(str::to_owned)
    }
}

/// A file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    file_name: String,
    mime_type: Option<String>,
    data: Vec<u8>,
}

impl UploadFile {
    /// Upload in-memory bytes under `file_name`.
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    /// Read the file at `path`; its final path component becomes the file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = async_fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "file".to_owned(), |name| name.to_string_lossy().into_owned());
        Ok(Self::new(file_name, data))
    }

    /// Override the MIME type instead of guessing it from the extension.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// The file name sent in the part header.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The raw file contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn mime_type(&self, resolver: &dyn MimeResolver) -> Cow<'_, str> {
        self.mime_type.as_deref().map_or_else(
            || Cow::Owned(resolver.mime_type_for(&self.file_name)),
            Cow::Borrowed,
        )
    }
}

/// Builder that writes multipart parts straight into the body buffer.
#[derive(Debug)]
pub struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Start a body with a freshly generated boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(default_boundary())
    }

    /// Start a body with a caller-chosen boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    /// The boundary separating parts.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value of the request `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Append a plain text field.
    pub fn add_field(&mut self, key: &str, value: &str) {
        self.open_part(key, None);
        self.body.extend_from_slice(b"\r\n");
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
    }

    /// Append a file part.
    pub fn add_file(&mut self, key: &str, file_name: &str, mime_type: &str, data: &[u8]) {
        self.open_part(key, Some(file_name));
        self.body
            .extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
    }

    /// Append every form pair as a plain field, percent-decoded.
    pub fn add_form(&mut self, form: &FormData) {
        for (name, value) in form.components() {
            let name = percent_decode_str(name).decode_utf8_lossy();
            let value = percent_decode_str(value).decode_utf8_lossy();
            self.add_field(&name, &value);
        }
    }

    /// Append `files` under `key`.
    ///
    /// A single file keeps `key` as is; several files are named `key[0]`, `key[1]`, ...
    pub fn add_files(&mut self, key: &str, files: &[UploadFile], resolver: &dyn MimeResolver) {
        if let [file] = files {
            self.add_file(key, &file.file_name, &file.mime_type(resolver), &file.data);
            return;
        }
        for (index, file) in files.iter().enumerate() {
            self.add_file(
                &format!("{key}[{index}]"),
                &file.file_name,
                &file.mime_type(resolver),
                &file.data,
            );
        }
    }

    /// Close the body, returning `(boundary, body_bytes)`.
    #[must_use]
    pub fn finalize(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--", self.boundary).as_bytes());
        (self.boundary, self.body)
    }

    fn open_part(&mut self, key: &str, file_name: Option<&str>) {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"{}\r\n",
                quote_param(key),
                file_name
                    .map(|name| format!("; filename=\"{}\"", quote_param(name)))
                    .unwrap_or_default()
            )
            .as_bytes(),
        );
    }
}

// Body of a quoted `Content-Disposition` parameter. Quotes and backslashes are
// escaped; line breaks cannot be escaped inside a header, so they are percent-encoded.
fn quote_param(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\r', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut quoted = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\r' => quoted.push_str("%0D"),
            '\n' => quoted.push_str("%0A"),
            ch => quoted.push(ch),
        }
    }
    Cow::Owned(quoted)
}

fn default_boundary() -> String {
    format!("netability-{}", Uuid::new_v4().simple())
}
