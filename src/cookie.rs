//! An owned HTTP cookie.

use std::time::{Duration, SystemTime};

/// An HTTP cookie, either sent with a request or received in a response.
///
/// Only `name` and `value` are sent on requests; the remaining attributes are
/// filled in for cookies parsed from `Set-Cookie` response headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<Duration>,
    pub expires: Option<SystemTime>,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    /// Creates a cookie with the given name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

impl From<reqwest::cookie::Cookie<'_>> for Cookie {
    fn from(c: reqwest::cookie::Cookie<'_>) -> Self {
        Self {
            name: c.name().to_string(),
            value: c.value().to_string(),
            path: c.path().map(str::to_string),
            domain: c.domain().map(str::to_string),
            max_age: c.max_age(),
            expires: c.expires(),
            http_only: c.http_only(),
            secure: c.secure(),
        }
    }
}

/// Serializes cookies into a single `Cookie` request header value.
pub(crate) fn to_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses a `Cookie` header value (`a=1; b="x y"`) as produced by a cookie
/// store. Malformed pairs are skipped and quoted values are unwrapped.
pub(crate) fn parse_header(value: &str) -> Vec<Cookie> {
    ::cookie::Cookie::split_parse(value)
        .filter_map(|parsed| parsed.ok())
        .map(|c| Cookie::new(c.name(), c.value_trimmed()))
        .collect()
}
