//! Error types for the topology layer

use ohtopology_parser::ParseError;
use thiserror::Error;

use crate::proxy::ProxyError;

/// Errors surfaced by the topology layer
#[derive(Error, Debug)]
pub enum TopologyError {
    /// A command of the same kind is still outstanding for this group
    #[error("{command} already in progress")]
    CommandPending { command: &'static str },

    /// Source index outside the group's current source list
    #[error("Source index {index} out of range for {count} sources")]
    InvalidSourceIndex { index: usize, count: usize },

    /// The group's device is being removed or has gone
    #[error("Group is detached from its device")]
    GroupDetached,

    /// The device kind has no such action
    #[error("{command} is not supported by this device")]
    Unsupported { command: &'static str },

    /// Payload decoding failed
    #[error("Malformed payload: {0}")]
    Parse(#[from] ParseError),

    /// Device control-surface failure
    #[error("Device proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// The dispatch thread could not be started
    #[error("Failed to spawn dispatch thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The dispatch thread panicked
    #[error("Dispatch thread panicked")]
    WorkerPanicked,
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, TopologyError>;
