//! Topology data model: groups and their sources

mod group;
mod source;

pub use group::{Group, GroupSnapshot, UserData, WeakGroup};
pub use source::Source;

pub(crate) use group::{GroupHandler, GroupInit, GroupUpdater};

/// Copy `value`, cutting it to at most `max_bytes` bytes.
///
/// The cut lands on the last character boundary that fits, so the result is
/// always valid UTF-8 and the same input always yields the same output.
pub(crate) fn bounded(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}
