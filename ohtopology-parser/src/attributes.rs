//! Product `Attributes` capability string.
//!
//! The Product service publishes a whitespace separated token list naming
//! the other OpenHome services the device hosts, e.g. `"Info Time Volume"`.

/// Parsed form of the Product `Attributes` property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductAttributes {
    tokens: Vec<String>,
}

impl ProductAttributes {
    /// Split the raw attribute string into tokens. Never fails.
    pub fn parse(raw: &str) -> Self {
        Self {
            tokens: raw.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Whether a whole token equal to `name` is present (case-sensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.tokens.iter().any(|t| t == name)
    }

    /// Whether the device advertises a Volume service.
    pub fn has_volume_control(&self) -> bool {
        self.contains("Volume")
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}
