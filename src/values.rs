//! Key-value containers used to build query strings, forms, headers and JSON
//! payloads.
//!
//! [`Values`] and [`Headers`] map a key to a [`Value`], which is either a
//! string, an integer or an array of those. Both containers keep their keys
//! sorted, so their text forms are reproducible regardless of insertion order.

use crate::codec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A value stored in [`Values`] or [`Headers`].
///
/// Only strings, integers and flat arrays of those have a string projection.
/// Nested arrays are accepted but project to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A string scalar.
    Str(String),
    /// An integer scalar.
    Int(i64),
    /// An array of values, in order.
    Array(Vec<Value>),
}

impl Value {
    /// Returns the normalized string-array projection of this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::Value;
    ///
    /// assert_eq!(Value::from("a").project(), vec!["a"]);
    /// assert_eq!(Value::from(vec![1, 2]).project(), vec!["1", "2"]);
    /// assert_eq!(
    ///     Value::Array(vec![Value::from("x"), Value::from(7)]).project(),
    ///     vec!["x", "7"]
    /// );
    /// ```
    pub fn project(&self) -> Vec<String> {
        match self {
            Value::Array(items) => items.iter().filter_map(Value::scalar).collect(),
            scalar => scalar.scalar().into_iter().collect(),
        }
    }

    fn scalar(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Array(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i64::from(i))
                }
            }
        )*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

// values past `i64::MAX` keep their exact decimal form as a string
macro_rules! wide_int_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    i64::try_from(i).map_or_else(|_| Value::Str(i.to_string()), Value::Int)
                }
            }
        )*
    };
}

wide_int_value!(u64, usize, isize, i128, u128);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// A source of keys and their string projections.
///
/// The request builder accepts anything implementing this trait for query
/// parameters, headers and forms.
pub trait KeyValues {
    /// Returns the keys in ascending order.
    fn keys(&self) -> Vec<String>;

    /// Returns the values associated with `key`, empty if absent.
    fn get(&self, key: &str) -> Vec<String>;
}

impl<T: KeyValues + ?Sized> KeyValues for &T {
    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }

    fn get(&self, key: &str) -> Vec<String> {
        (**self).get(key)
    }
}

impl KeyValues for HashMap<String, String> {
    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = HashMap::keys(self).cloned().collect();
        keys.sort();
        keys
    }

    fn get(&self, key: &str) -> Vec<String> {
        HashMap::get(self, key).cloned().into_iter().collect()
    }
}

impl KeyValues for BTreeMap<String, String> {
    fn keys(&self) -> Vec<String> {
        BTreeMap::keys(self).cloned().collect()
    }

    fn get(&self, key: &str) -> Vec<String> {
        BTreeMap::get(self, key).cloned().into_iter().collect()
    }
}

macro_rules! sorted_map {
    ($name:ident) => {
        impl $name {
            /// Creates an empty container.
            pub fn new() -> Self {
                Self(BTreeMap::new())
            }

            /// Sets `key` to `value` and returns the container, for chaining.
            pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
                self.set(key, value);
                self
            }

            /// Sets `key` to `value`, replacing any existing value.
            pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
                self.0.insert(key.into(), value.into());
            }

            /// Returns the string projection of the value at `key`.
            ///
            /// Missing keys yield an empty vector.
            pub fn get(&self, key: &str) -> Vec<String> {
                self.0.get(key).map(Value::project).unwrap_or_default()
            }

            /// Returns the raw value at `key`.
            pub fn value(&self, key: &str) -> Option<&Value> {
                self.0.get(key)
            }

            /// Removes `key`.
            pub fn del(&mut self, key: &str) {
                self.0.remove(key);
            }

            /// Returns the keys in ascending order.
            pub fn keys(&self) -> impl Iterator<Item = &str> {
                self.0.keys().map(String::as_str)
            }

            /// Returns the number of keys.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Returns `true` if there are no keys.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            fn pairs(&self) -> impl Iterator<Item = (&str, String)> {
                self.0
                    .iter()
                    .flat_map(|(k, v)| v.project().into_iter().map(move |v| (k.as_str(), v)))
            }
        }

        impl KeyValues for $name {
            fn keys(&self) -> Vec<String> {
                self.0.keys().cloned().collect()
            }

            fn get(&self, key: &str) -> Vec<String> {
                $name::get(self, key)
            }
        }

        impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for $name {
            fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
                Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            }
        }
    };
}

/// Query parameters or form values.
///
/// # Examples
///
/// ```
/// use chainreq::Values;
///
/// let v = Values::new()
///     .with("q", "rust")
///     .with("offset", 0)
///     .with("limit", 100);
/// assert_eq!(v.encode(), "limit=100&offset=0&q=rust");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, Value>);

sorted_map!(Values);

impl Values {
    /// Encodes the values as `key=value` pairs joined by `&`, sorted by key.
    ///
    /// Values are not percent-escaped; the request builder escapes them when
    /// they are placed on the wire.
    pub fn encode(&self) -> String {
        self.pairs()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Query parameters.
pub type Params = Values;

/// Form values.
pub type Form = Values;

/// Header values.
///
/// The text form lists one `Canonical-Name: value` line per value, sorted
/// by key and joined by CRLF.
///
/// # Examples
///
/// ```
/// use chainreq::Headers;
///
/// let h = Headers::new()
///     .with("x-trace-id", vec!["a", "b"])
///     .with("accept", "text/html");
/// assert_eq!(h.to_string(), "Accept: text/html\r\nX-Trace-Id: a\r\nX-Trace-Id: b");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Value>);

sorted_map!(Headers);

impl Headers {
    /// Renders the headers as a JSON object.
    ///
    /// Parsing the output back into [`Headers`] yields an equal mapping.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .pairs()
            .map(|(k, v)| format!("{}: {}", canonical_header_key(k), v))
            .collect();
        f.write_str(&lines.join("\r\n"))
    }
}

/// Returns the canonical form of a header name: the first letter and every
/// letter following a hyphen are upper case, the rest lower case.
///
/// Names containing bytes that are not valid token characters are returned
/// unchanged.
pub fn canonical_header_key(key: &str) -> String {
    let valid = key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid {
        return key.to_string();
    }

    let mut upper = true;
    key.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// A JSON object with typed accessors.
///
/// Keys are kept sorted, so the text form is deterministic.
///
/// # Examples
///
/// ```
/// use chainreq::Json;
///
/// let j = Json::new().with("msg", "hello world").with("n", 3);
/// assert_eq!(j.get_str("msg"), Some("hello world"));
/// assert_eq!(j.get_i64("n"), Some(3));
/// assert_eq!(j.get_bool("msg"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json(serde_json::Map<String, serde_json::Value>);

impl Json {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value` and returns the object, for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value at `key`.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Removes `key`.
    pub fn del(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.as_u64()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<serde_json::Value>> {
        self.get(key)?.as_array()
    }

    /// Returns the nested object at `key` as a [`Json`].
    pub fn get_object(&self, key: &str) -> Option<Json> {
        self.get(key)?.as_object().cloned().map(Json)
    }
}

impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::to_json_pretty(&self.0, "\t"))
    }
}
