//! Request methods.

use core::fmt;

use http::Method;

use crate::Error;

/// Transport-agnostic request method.
///
/// `Set` is the generic "write" verb and is sent as `POST` over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RequestMethod {
    /// Fetch a resource.
    #[default]
    Get,
    /// Write a resource.
    Set,
    /// Any other verb, passed through unchanged.
    Custom(String),
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Set => f.write_str("SET"),
            Self::Custom(verb) => f.write_str(verb),
        }
    }
}

impl TryFrom<RequestMethod> for Method {
    type Error = Error;

    fn try_from(method: RequestMethod) -> Result<Self, Error> {
        match method {
            RequestMethod::Get => Ok(Self::GET),
            RequestMethod::Set => Ok(Self::POST),
            RequestMethod::Custom(verb) => {
                Self::from_bytes(verb.as_bytes()).map_err(|_| Error::InvalidMethod(verb))
            }
        }
    }
}

/// Whether parameters for `method` belong in the URL rather than the body.
#[must_use]
pub fn is_read_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}
