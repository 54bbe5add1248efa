use std::collections::{BTreeMap, HashMap};

use super::ToForm;

/// A value that can be URL-encoded as query or form data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// An explicit null, encoded with the `NULL` sentinel.
    Null,
    /// A leaf value.
    Scalar(String),
    /// A list; every element is encoded under `key[]`.
    Array(Vec<Self>),
    /// Named children, encoded under `key[child]`, in the order given.
    Object(Vec<(String, Self)>),
}

impl FormValue {
    /// Build a scalar from anything printable.
    pub fn scalar(value: impl ToString) -> Self {
        Self::Scalar(value.to_string())
    }

    /// Build an object from the present fields of a model.
    pub fn model<T: ToForm + ?Sized>(model: &T) -> Self {
        Self::Object(
            model
                .form_fields()
                .into_iter()
                .filter_map(|field| field.value.map(|value| (field.name, value)))
                .collect(),
        )
    }

    /// Whether this is [`FormValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<&String> for FormValue {
    fn from(value: &String) -> Self {
        Self::Scalar(value.clone())
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_owned())
    }
}

impl From<char> for FormValue {
    fn from(value: char) -> Self {
        Self::Scalar(value.to_string())
    }
}

macro_rules! scalar_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FormValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_display!(
    bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

impl<T: Into<Self>> From<Option<T>> for FormValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for FormValue {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self> + Clone> From<&[T]> for FormValue {
    fn from(values: &[T]) -> Self {
        Self::Array(values.iter().cloned().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Self>> From<BTreeMap<K, V>> for FormValue {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::Object(
            map.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Keys are sorted, since `HashMap` iteration order is unspecified.
impl<K: Into<String>, V: Into<Self>> From<HashMap<K, V>> for FormValue {
    fn from(map: HashMap<K, V>) -> Self {
        let mut entries: Vec<(String, Self)> = map
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        entries.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
        Self::Object(entries)
    }
}

impl From<serde_json::Value> for FormValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::from(flag),
            serde_json::Value::Number(number) => Self::Scalar(number.to_string()),
            serde_json::Value::String(text) => Self::Scalar(text),
            serde_json::Value::Array(items) => Self::from(items),
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}
