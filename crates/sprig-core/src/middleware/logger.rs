//! Request logging middleware
//!
//! Times the rest of the chain and emits one `tracing` event per request.

use crate::Context;
use std::time::Instant;

/// Logger configuration
#[derive(Clone)]
pub struct LoggerConfig {
    /// Log requests that ended with a 4xx/5xx status at WARN instead of INFO
    pub warn_on_error: bool,
    /// Paths that are never logged (exact match)
    pub skip_paths: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            warn_on_error: true,
            skip_paths: Vec::new(),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn_on_error(mut self, warn: bool) -> Self {
        self.warn_on_error = warn;
        self
    }

    pub fn skip_path(mut self, path: impl Into<String>) -> Self {
        self.skip_paths.push(path.into());
        self
    }
}

/// Logger with the default configuration
pub fn logger() -> impl Fn(&mut Context) + Send + Sync + 'static {
    logger_with(LoggerConfig::default())
}

/// Logger with a custom configuration
pub fn logger_with(config: LoggerConfig) -> impl Fn(&mut Context) + Send + Sync + 'static {
    move |ctx: &mut Context| {
        if config.skip_paths.iter().any(|p| p == ctx.path()) {
            ctx.next();
            return;
        }

        let start = Instant::now();
        ctx.next();
        let elapsed = start.elapsed();

        let status = ctx.status_code();
        let method = ctx.method();
        let path = ctx.path();
        if config.warn_on_error && (status.is_client_error() || status.is_server_error()) {
            tracing::warn!(%method, path, status = status.as_u16(), ?elapsed, "request handled");
        } else {
            tracing::info!(%method, path, status = status.as_u16(), ?elapsed, "request handled");
        }
    }
}
