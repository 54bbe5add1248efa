//! Ordered, case-insensitive header collection.

use core::fmt;

use base64::Engine;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{Error, Result};

/// Name of the content type header.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Name of the authorization header.
pub const AUTHORIZATION: &str = "Authorization";

/// An ordered multi-map of header names to values.
///
/// Names are matched case-insensitively and must be ASCII; values are stored verbatim.
/// Insertion order is kept and a name may appear more than once (`Set-Cookie`).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a collection from name/value pairs, validating every name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderName`] if any name is not ASCII.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        headers.add_all(pairs)?;
        Ok(headers)
    }

    /// Append a header, keeping any existing entries with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderName`] if `name` is not ASCII. The collection is left untouched.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !name.is_ascii() {
            return Err(Error::InvalidHeaderName(name));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Append every pair in order.
    ///
    /// # Errors
    ///
    /// Stops at the first non-ASCII name and returns [`Error::InvalidHeaderName`].
    pub fn add_all<I, N, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs.into_iter();
        self.entries.reserve(pairs.size_hint().0);
        for (name, value) in pairs {
            self.add(name, value)?;
        }
        Ok(())
    }

    /// Drop every entry named `name` and append a single new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderName`] if `name` is not ASCII, without removing anything.
    pub fn replace_or_add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !name.is_ascii() {
            return Err(Error::InvalidHeaderName(name));
        }
        self.remove(&name);
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Remove every entry whose name matches case-insensitively.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(existing, _)| !name_eq(existing, name));
    }

    /// All values stored under `name`, in insertion order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(existing, _)| name_eq(existing, name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// The first value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| name_eq(existing, name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether any entry is named `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| name_eq(existing, name))
    }

    /// Number of entries, counting duplicates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Add every entry of `other` whose name is not already present here.
    ///
    /// Names already set on `self` win; duplicates within `other` are all carried over.
    pub fn merge_missing(&mut self, other: &Self) {
        let missing: Vec<(String, String)> = other
            .entries
            .iter()
            .filter(|(name, _)| !self.contains(name))
            .cloned()
            .collect();
        self.entries.extend(missing);
    }

    /// Set `Authorization: Bearer <token>` unless an authorization header is present.
    pub fn bearer_auth(&mut self, token: impl fmt::Display) {
        if !self.contains(AUTHORIZATION) {
            self.entries
                .push((AUTHORIZATION.to_owned(), format!("Bearer {token}")));
        }
    }

    /// Set `Authorization: Basic <credentials>` unless an authorization header is present.
    pub fn basic_auth(&mut self, username: impl fmt::Display, password: Option<impl fmt::Display>) {
        if self.contains(AUTHORIZATION) {
            return;
        }
        let credentials = match password {
            Some(password) => format!("{username}:{password}"),
            None => format!("{username}:"),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        self.entries
            .push((AUTHORIZATION.to_owned(), format!("Basic {encoded}")));
    }

    /// Convert into an [`http::HeaderMap`], keeping duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] when a name or value is not a legal HTTP token.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| Error::InvalidHeader {
                    name: name.clone(),
                    reason: err.to_string(),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|err| Error::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }

    /// Collect an [`http::HeaderMap`], decoding values lossily.
    #[must_use]
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let entries = map
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self { entries }
    }
}

// Length is compared first so mismatched names never reach the byte comparison.
fn name_eq(lhs: &str, rhs: &str) -> bool {
    lhs.len() == rhs.len() && lhs.as_bytes().eq_ignore_ascii_case(rhs.as_bytes())
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<N: Into<String>, V: Into<String>, const LEN: usize> TryFrom<[(N, V); LEN]> for Headers {
    type Error = Error;

    fn try_from(pairs: [(N, V); LEN]) -> Result<Self> {
        Self::from_pairs(pairs)
    }
}

impl TryFrom<std::collections::HashMap<String, String>> for Headers {
    type Error = Error;

    fn try_from(map: std::collections::HashMap<String, String>) -> Result<Self> {
        Self::from_pairs(map)
    }
}
