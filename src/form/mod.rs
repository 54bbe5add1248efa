//! URL query and `application/x-www-form-urlencoded` encoding.
//!
//! Values are flattened into `(name, value)` pairs using bracketed paths:
//!
//! | input                           | pairs                         |
//! |---------------------------------|-------------------------------|
//! | `a = {"b": "c"}`                | `a[b]=c`                      |
//! | `a = ["x", "y"]`                | `a[]=x`, `a[]=y`              |
//! | `a = null`                      | `a=NULL`                      |
//! | root `{"b": "c"}` (empty key)   | `b=c`                         |
//!
//! Names and values are percent-encoded with [`escape`], so the brackets appear as
//! `%5B`/`%5D` on the wire. Explicit nulls are written as the literal `NULL` marker,
//! while absent optional fields of a [`ToForm`] model are skipped altogether.

mod value;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use url::Url;

pub use value::FormValue;

use crate::{Error, Result};

/// Content type used for URL-encoded request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Literal written for explicit null values.
pub const NULL_SENTINEL: &str = "NULL";

/// Query-allowed characters minus the RFC 3986 general and sub-delimiters.
///
/// `?` and `/` stay literal (RFC 3986, section 3.4).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'?');

/// Percent-encode a query name or value.
#[must_use]
pub fn escape(input: &str) -> String {
    utf8_percent_encode(input, QUERY_VALUE).to_string()
}

/// Flatten `value` stored under `key` into escaped `(name, value)` pairs.
#[must_use]
pub fn query_components(key: &str, value: &FormValue) -> Vec<(String, String)> {
    let mut components = Vec::new();
    push_components(&mut components, key, value);
    components
}

fn push_components(components: &mut Vec<(String, String)>, key: &str, value: &FormValue) {
    match value {
        FormValue::Object(entries) => {
            for (child, value) in entries {
                if key.is_empty() {
                    push_components(components, child, value);
                } else {
                    push_components(components, &format!("{key}[{child}]"), value);
                }
            }
        }
        FormValue::Array(items) => {
            let key = format!("{key}[]");
            for item in items {
                push_components(components, &key, item);
            }
        }
        FormValue::Null => components.push((escape(key), NULL_SENTINEL.to_owned())),
        FormValue::Scalar(text) => components.push((escape(key), escape(text))),
    }
}

/// A single field reported by a [`ToForm`] model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Field name, used as the root key.
    pub name: String,
    /// Field value; `None` means the field is absent and is not encoded.
    pub value: Option<FormValue>,
}

impl FormField {
    /// A field that is always present.
    pub fn new(name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// A field that is skipped when `value` is `None`.
    pub fn optional<T: Into<FormValue>>(name: impl Into<String>, value: Option<T>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }
}

/// Types that can describe themselves as an ordered list of form fields.
///
/// ```
/// use netability::form::{FormData, FormField, ToForm};
///
/// struct Search {
///     query: String,
///     page: Option<u32>,
/// }
///
/// impl ToForm for Search {
///     fn form_fields(&self) -> Vec<FormField> {
///         vec![
///             FormField::new("query", &self.query),
///             FormField::optional("page", self.page),
///         ]
///     }
/// }
///
/// let form = FormData::model(&Search { query: "rust".into(), page: None });
/// assert_eq!(form.query_string().as_deref(), Some("query=rust"));
/// ```
pub trait ToForm {
    /// Fields in declaration order.
    fn form_fields(&self) -> Vec<FormField>;
}

impl<T: ToForm + ?Sized> ToForm for &T {
    fn form_fields(&self) -> Vec<FormField> {
        (**self).form_fields()
    }
}

/// Encoded query/form data, ready to be appended to a URL or sent as a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    components: Vec<(String, String)>,
}

impl FormData {
    /// Encode a whole dictionary. Top-level keys are sorted ascending.
    pub fn from_map<I, K, V>(map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FormValue>,
    {
        let mut entries: Vec<(String, FormValue)> = map
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        entries.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

        let components = entries
            .iter()
            .flat_map(|(key, value)| query_components(key, value))
            .collect();
        Self { components }
    }

    /// Encode a model, keeping its field order and skipping absent fields.
    pub fn model<T: ToForm + ?Sized>(model: &T) -> Self {
        let components = model
            .form_fields()
            .into_iter()
            .filter_map(|field| field.value.map(|value| (field.name, value)))
            .flat_map(|(name, value)| query_components(&name, &value))
            .collect();
        Self { components }
    }

    /// Encode any serializable value with dictionary semantics.
    ///
    /// The value is converted through [`serde_json::Value`], so top-level keys end up sorted.
    /// A non-object value is encoded under the empty root key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] if the value cannot be serialized.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value).map_err(Error::build)? {
            serde_json::Value::Object(map) => Ok(Self::from_map(map)),
            other => Ok(Self {
                components: query_components("", &other.into()),
            }),
        }
    }

    /// Wrap already-escaped pairs as they are.
    #[must_use]
    pub const fn from_components(components: Vec<(String, String)>) -> Self {
        Self { components }
    }

    /// The escaped `(name, value)` pairs.
    #[must_use]
    pub fn components(&self) -> &[(String, String)] {
        &self.components
    }

    /// Consume into the escaped `(name, value)` pairs.
    #[must_use]
    pub fn into_components(self) -> Vec<(String, String)> {
        self.components
    }

    /// Whether no pairs were produced.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The pairs joined as `name=value&...`, or `None` when there are none.
    #[must_use]
    pub fn query_string(&self) -> Option<String> {
        if self.components.is_empty() {
            return None;
        }
        Some(
            self.components
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("&"),
        )
    }

    /// Append the pairs to the query component of `url`.
    ///
    /// An existing non-empty query is extended with `&`; a bare trailing `?` is filled in.
    /// The fragment, if any, is kept in place.
    pub fn append_to_url(&self, url: &mut Url) {
        let Some(params) = self.query_string() else {
            return;
        };
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{params}"),
            _ => params,
        };
        url.set_query(Some(&query));
    }

    /// The URL-encoded request body, or `None` when there are no pairs.
    #[must_use]
    pub fn to_body(&self) -> Option<Vec<u8>> {
        self.query_string().map(String::into_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;

    fn decoded(components: &[(String, String)]) -> Vec<(String, String)> {
        components
            .iter()
            .map(|(name, value)| {
                (
                    percent_decode_str(name).decode_utf8_lossy().into_owned(),
                    percent_decode_str(value).decode_utf8_lossy().into_owned(),
                )
            })
            .collect()
    }

    #[test]
    fn dictionary_keys_are_sorted() {
        let form = FormData::from_map([("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        assert_eq!(form.query_string().as_deref(), Some("alpha=2&mid=3&zeta=1"));
    }

    #[test]
    fn nested_object_uses_bracketed_path() {
        let value = FormValue::Object(vec![("b".into(), "c".into())]);

        let nested = query_components("a", &value);
        assert_eq!(nested, [("a%5Bb%5D".to_owned(), "c".to_owned())]);
        assert_eq!(decoded(&nested), [("a[b]".to_owned(), "c".to_owned())]);

        let root = query_components("", &value);
        assert_eq!(root, [("b".to_owned(), "c".to_owned())]);
    }

    #[test]
    fn array_elements_share_one_name() {
        let components = query_components("a", &FormValue::from(vec!["x", "y"]));
        assert_eq!(
            decoded(&components),
            [
                ("a[]".to_owned(), "x".to_owned()),
                ("a[]".to_owned(), "y".to_owned()),
            ]
        );
    }

    #[test]
    fn deep_nesting_combines_paths() {
        let value = FormValue::Object(vec![(
            "items".into(),
            FormValue::Array(vec![FormValue::Object(vec![("id".into(), 7.into())])]),
        )]);
        let components = query_components("order", &value);
        assert_eq!(
            decoded(&components),
            [("order[items][][id]".to_owned(), "7".to_owned())]
        );
    }

    #[test]
    fn explicit_null_writes_sentinel() {
        let form = FormData::from_map([("gone", FormValue::Null), ("kept", "1".into())]);
        assert_eq!(form.query_string().as_deref(), Some("gone=NULL&kept=1"));
    }

    #[test]
    fn escape_covers_delimiters_and_round_trips() {
        let raw = ": # [ ] @ ! $ & ' ( ) * + , ; =";
        let escaped = escape(raw);
        for delimiter in [':', '#', '[', ']', '@', '!', '$', '&', '\'', '(', ')', '*', '+', ',', ';', '=', ' '] {
            assert!(!escaped.contains(delimiter), "{delimiter} leaked into {escaped}");
        }
        assert_eq!(percent_decode_str(&escaped).decode_utf8().unwrap(), raw);

        assert_eq!(escape("a/b?c"), "a/b?c");
        assert_eq!(escape("héllo wörld"), "h%C3%A9llo%20w%C3%B6rld");
        assert_eq!(
            percent_decode_str(&escape("héllo wörld")).decode_utf8().unwrap(),
            "héllo wörld"
        );
    }

    struct Profile {
        name: String,
        nickname: Option<String>,
        age: u32,
        tags: Vec<&'static str>,
    }

    impl ToForm for Profile {
        fn form_fields(&self) -> Vec<FormField> {
            vec![
                FormField::new("name", &self.name),
                FormField::optional("nickname", self.nickname.clone()),
                FormField::new("age", self.age),
                FormField::new("tags", self.tags.clone()),
            ]
        }
    }

    #[test]
    fn model_keeps_field_order_and_skips_absent_fields() {
        let profile = Profile {
            name: "Zoe".into(),
            nickname: None,
            age: 30,
            tags: vec!["a"],
        };
        let form = FormData::model(&profile);
        assert_eq!(
            decoded(form.components()),
            [
                ("name".to_owned(), "Zoe".to_owned()),
                ("age".to_owned(), "30".to_owned()),
                ("tags[]".to_owned(), "a".to_owned()),
            ]
        );
        assert!(!form.query_string().unwrap().contains("NULL"));
    }

    #[test]
    fn nested_model_becomes_object() {
        let profile = Profile {
            name: "Ann".into(),
            nickname: Some("A".into()),
            age: 5,
            tags: vec![],
        };
        let form = FormData::from_map([("user", FormValue::model(&profile))]);
        assert_eq!(
            decoded(form.components()),
            [
                ("user[name]".to_owned(), "Ann".to_owned()),
                ("user[nickname]".to_owned(), "A".to_owned()),
                ("user[age]".to_owned(), "5".to_owned()),
            ]
        );
    }

    #[test]
    fn serialize_uses_dictionary_semantics() {
        #[derive(Serialize)]
        struct Query {
            zoom: u8,
            area: &'static str,
        }
        let form = FormData::from_serialize(&Query { zoom: 3, area: "n e" }).unwrap();
        assert_eq!(form.query_string().as_deref(), Some("area=n%20e&zoom=3"));
    }

    #[test]
    fn appends_to_url_respecting_existing_query() {
        let form = FormData::from_map([("test", "1")]);

        let mut url = Url::parse("http://host/get").unwrap();
        form.append_to_url(&mut url);
        assert_eq!(url.as_str(), "http://host/get?test=1");

        let mut url = Url::parse("http://host/get?").unwrap();
        form.append_to_url(&mut url);
        assert_eq!(url.as_str(), "http://host/get?test=1");

        let mut url = Url::parse("http://host/get?page=2#top").unwrap();
        form.append_to_url(&mut url);
        assert_eq!(url.as_str(), "http://host/get?page=2&test=1#top");

        let mut url = Url::parse("http://host/get?").unwrap();
        FormData::default().append_to_url(&mut url);
        assert_eq!(url.as_str(), "http://host/get?");
    }

    #[test]
    fn empty_form_has_no_body() {
        assert!(FormData::default().to_body().is_none());
        assert_eq!(
            FormData::from_map([("k", "v")]).to_body().unwrap(),
            b"k=v".to_vec()
        );
    }
}
