//! Error types for sprig-core

use sprig_router::RouteConflict;
use thiserror::Error;

/// Result type alias for sprig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the sprig framework
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Two patterns terminate on the same trie node
    #[error(transparent)]
    RouteConflict(#[from] RouteConflict),

    /// Registration attempted after the engine was frozen into a dispatcher
    #[error("Engine already built, cannot register {method} {pattern}")]
    Sealed { method: String, pattern: String },

    /// Response payload could not be serialized
    #[error("Response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Listen address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// IO error (native only)
    #[cfg(feature = "native")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
