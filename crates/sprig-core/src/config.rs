//! Server configuration
//!
//! Defaults can be overridden from the environment:
//!
//! - `SPRIG_PORT` - listen port (default `3000`)
//! - `SPRIG_HOST` - listen hostname (default `0.0.0.0`)
//! - `SPRIG_WORKERS` - runtime worker threads (default: number of CPUs)
//!
//! Values that fail to parse keep the default.

use crate::{Error, Result};
use std::env;
use std::net::SocketAddr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(port) = lookup("SPRIG_PORT").and_then(|v| v.trim().parse().ok()) {
            config.port = port;
        }
        if let Some(host) = lookup("SPRIG_HOST").filter(|v| !v.trim().is_empty()) {
            config.hostname = host.trim().to_string();
        }
        if let Some(workers) = lookup("SPRIG_WORKERS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            config.workers = workers;
        }
        config
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Socket address to listen on
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.hostname, self.port)
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}:{}: {}", self.hostname, self.port, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.hostname, "0.0.0.0");
        assert!(config.workers >= 1);
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SPRIG_PORT", "9999"),
            ("SPRIG_HOST", "127.0.0.1"),
            ("SPRIG_WORKERS", "2"),
        ]));
        assert_eq!(config.port, 9999);
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.workers, 2);
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:9999");
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SPRIG_PORT", "not-a-port"),
            ("SPRIG_WORKERS", "0"),
        ]));
        assert_eq!(config.port, 3000);
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_invalid_address() {
        let config = ServerConfig::new().hostname("not a host").port(80);
        assert!(matches!(config.addr(), Err(Error::InvalidAddress(_))));
    }
}
