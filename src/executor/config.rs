//! HTTP request execution configuration.
//!
//! This module defines configuration options for HTTP request execution,
//! including timeout, redirect and TLS settings.

use crate::config::{get_config, RunnerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for HTTP request execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timeout in milliseconds used when a request carries `timeout_ms == 0`.
    pub default_timeout_ms: u64,

    /// Whether redirects are followed.
    pub follow_redirects: bool,

    /// Redirect hop limit when following redirects.
    pub max_redirects: u32,

    /// Whether TLS certificates are validated.
    pub validate_ssl: bool,

    /// Headers added unless the request already sets a header with the same name.
    pub default_headers: HashMap<String, String>,
}

impl ExecutionConfig {
    /// Creates an ExecutionConfig with the given default timeout and
    /// otherwise default settings.
    pub fn new(default_timeout_ms: u64) -> Self {
        Self {
            default_timeout_ms,
            ..Self::from_runner_config(&RunnerConfig::default())
        }
    }

    /// Derives execution settings from a runner configuration.
    pub fn from_runner_config(config: &RunnerConfig) -> Self {
        Self {
            default_timeout_ms: config.timeout,
            follow_redirects: config.follow_redirects,
            max_redirects: config.max_redirects,
            validate_ssl: config.validate_ssl,
            default_headers: config.default_headers.clone(),
        }
    }

    /// Creates an ExecutionConfig from the global configuration.
    pub fn from_global_config() -> Self {
        Self::from_runner_config(&get_config())
    }

    /// Effective timeout for a request.
    ///
    /// # Arguments
    ///
    /// * `request_timeout_ms` - The request's own timeout; 0 means "use the default"
    pub fn timeout_for(&self, request_timeout_ms: u64) -> Duration {
        if request_timeout_ms > 0 {
            Duration::from_millis(request_timeout_ms)
        } else {
            Duration::from_millis(self.default_timeout_ms)
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::from_runner_config(&RunnerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_config_new() {
        let config = ExecutionConfig::new(60_000);
        assert_eq!(config.default_timeout_ms, 60_000);
        assert!(config.follow_redirects);
    }

    #[test]
    fn test_execution_config_default() {
        let config = ExecutionConfig::default();
        assert_eq!(config.default_timeout_ms, 30_000);
        assert!(config.validate_ssl);
        assert_eq!(config.max_redirects, 10);
        assert!(config.default_headers.contains_key("User-Agent"));
    }

    #[test]
    fn test_timeout_for() {
        let config = ExecutionConfig::new(45_000);
        assert_eq!(config.timeout_for(0), Duration::from_secs(45));
        assert_eq!(config.timeout_for(250), Duration::from_millis(250));
    }

    #[test]
    fn test_from_runner_config() {
        let runner = RunnerConfig {
            follow_redirects: false,
            validate_ssl: false,
            ..RunnerConfig::default()
        };
        let config = ExecutionConfig::from_runner_config(&runner);
        assert!(!config.follow_redirects);
        assert!(!config.validate_ssl);
    }
}
