//! JSON and XML encoding helpers.
//!
//! JSON output always has sorted object keys (`serde_json` maps are ordered).
//! HTML escaping is opt-in, see [`to_json_vec`].

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};
use std::io;

/// Writes `<`, `>`, `&`, U+2028 and U+2029 inside strings as `\uXXXX` escapes.
struct HtmlEscapingFormatter;

impl Formatter for HtmlEscapingFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serializes `value` as compact JSON, optionally escaping HTML-sensitive characters.
pub(crate) fn to_json_vec<T>(value: &T, escape_html: bool) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::with_capacity(128);
    let result = if escape_html {
        value.serialize(&mut Serializer::with_formatter(&mut buf, HtmlEscapingFormatter))
    } else {
        value.serialize(&mut Serializer::with_formatter(&mut buf, CompactFormatter))
    };
    result.map_err(|e| Error::SerializationFailed(e.to_string()))?;
    Ok(buf)
}

/// Serializes `value` as indented JSON, falling back to `{}` on failure.
pub(crate) fn to_json_pretty<T>(value: &T, indent: &str) -> String
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::with_capacity(128);
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| "{}".to_string()),
        Err(_) => "{}".to_string(),
    }
}

pub(crate) fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    quick_xml::se::to_string(value).map_err(|e| Error::SerializationFailed(e.to_string()))
}

pub(crate) fn from_xml<T: DeserializeOwned>(text: &str) -> std::result::Result<T, String> {
    quick_xml::de::from_str(text).map_err(|e| e.to_string())
}
