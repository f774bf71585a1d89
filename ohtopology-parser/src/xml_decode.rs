//! Shared decoding helpers.

use crate::error::{ParseError, ParseResult};
use serde::de::DeserializeOwned;

/// Deserialize an XML document into `T`.
///
/// Leading whitespace and a byte-order mark are tolerated since devices
/// are not consistent about either.
pub fn parse<T: DeserializeOwned>(xml: &str) -> ParseResult<T> {
    let trimmed = xml.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(ParseError::XmlDeserializationFailed(
            "empty document".to_string(),
        ));
    }
    quick_xml::de::from_str(trimmed)
        .map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
}

/// Parse an OpenHome boolean (`true`/`false`/`1`/`0`, ASCII case-insensitive).
pub fn parse_bool(field: &'static str, value: &str) -> ParseResult<bool> {
    let v = value.trim();
    if v == "1" || v.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if v == "0" || v.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ParseError::InvalidValue {
            field,
            value: value.to_string(),
        })
    }
}
