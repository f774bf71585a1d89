//! Error types for payload decoding

use thiserror::Error;

/// Errors that can occur while decoding a Product payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// XML deserialization failed
    #[error("XML deserialization failed: {0}")]
    XmlDeserializationFailed(String),

    /// A field held a value outside its domain
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    /// Missing required element
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),
}

/// Result type alias for decoding operations
pub type ParseResult<T> = Result<T, ParseError>;
