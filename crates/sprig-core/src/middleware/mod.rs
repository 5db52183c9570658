//! Built-in middleware
//!
//! Middleware are ordinary handlers that call [`Context::next`] to run the
//! rest of the chain.
//!
//! [`Context::next`]: crate::Context::next

pub mod logger;

pub use logger::{logger, logger_with, LoggerConfig};
