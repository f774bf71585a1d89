//! A selectable input of a group

use serde::Serialize;

use super::bounded;

/// One entry of a group's source list.
///
/// Has no identity beyond its position in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    name: String,
    #[serde(rename = "type")]
    source_type: String,
    visible: bool,
}

impl Source {
    /// Longest name kept, in bytes
    pub const MAX_NAME_BYTES: usize = 64;
    /// Longest type kept, in bytes
    pub const MAX_TYPE_BYTES: usize = 20;

    /// Create a source; over-long name and type are silently truncated.
    pub fn new(name: &str, source_type: &str, visible: bool) -> Self {
        Self {
            name: bounded(name, Self::MAX_NAME_BYTES),
            source_type: bounded(source_type, Self::MAX_TYPE_BYTES),
            visible,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn update(&mut self, name: &str, source_type: &str, visible: bool) {
        *self = Source::new(name, source_type, visible);
    }
}
