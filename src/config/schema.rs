//! Configuration schema for the request runner.
//!
//! This module defines the configuration structure and validation logic for all
//! user-configurable settings: HTTP execution, script sandbox limits, and
//! pipeline policy.

use crate::variables::MissingVariablePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure.
///
/// Missing settings fall back to defaults through the per-field serde
/// default functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Default request timeout in milliseconds.
    ///
    /// Applied when a request carries `timeout_ms == 0`. Defaults to 30000ms.
    /// Must be greater than 0.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Whether to automatically follow HTTP redirects. Defaults to true.
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow. Defaults to 10.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Whether to validate SSL/TLS certificates. Defaults to true.
    ///
    /// **Warning:** Disabling SSL validation can expose you to security risks.
    #[serde(default = "default_validate_ssl", rename = "validateSSL")]
    pub validate_ssl: bool,

    /// Maximum number of entries kept by the in-memory history. Defaults to 1000.
    ///
    /// Must be > 0.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Headers added to every request unless the request already sets them.
    #[serde(default = "default_headers")]
    pub default_headers: HashMap<String, String>,

    /// Wall-clock budget for one script run, in milliseconds. Defaults to 5000ms.
    #[serde(default = "default_script_timeout")]
    pub script_timeout: u64,

    /// Maximum number of engine operations per script run.
    #[serde(default = "default_script_max_steps")]
    pub script_max_steps: u64,

    /// Maximum native stack the script engine may use; bounds recursion depth.
    #[serde(default = "default_script_max_stack_bytes")]
    pub script_max_stack_bytes: usize,

    /// Heap limit for the script engine.
    #[serde(default = "default_script_memory_limit")]
    pub script_memory_limit: usize,

    /// What to do with `{{name}}` templates that no scope can resolve.
    #[serde(default)]
    pub missing_variable_policy: MissingVariablePolicy,

    /// Skip the HTTP call when the pre-request script fails. Defaults to false.
    #[serde(default)]
    pub abort_on_pre_script_error: bool,

    /// Also resolve templates inside auth fields (username, token, ...).
    /// Defaults to false.
    #[serde(default)]
    pub resolve_auth_fields: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            follow_redirects: default_follow_redirects(),
            max_redirects: default_max_redirects(),
            validate_ssl: default_validate_ssl(),
            history_limit: default_history_limit(),
            default_headers: default_headers(),
            script_timeout: default_script_timeout(),
            script_max_steps: default_script_max_steps(),
            script_max_stack_bytes: default_script_max_stack_bytes(),
            script_memory_limit: default_script_memory_limit(),
            missing_variable_policy: MissingVariablePolicy::default(),
            abort_on_pre_script_error: false,
            resolve_auth_fields: false,
        }
    }
}

impl RunnerConfig {
    /// Validates the configuration and returns errors if any settings are invalid.
    ///
    /// # Returns
    ///
    /// `Ok(())` if all settings are valid, or `Err` with a descriptive error message.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.history_limit == 0 {
            return Err("historyLimit must be greater than 0".to_string());
        }

        if self.script_timeout == 0 {
            return Err("scriptTimeout must be greater than 0".to_string());
        }

        if self.script_max_steps == 0 {
            return Err("scriptMaxSteps must be greater than 0".to_string());
        }

        if self.script_max_stack_bytes < MIN_SCRIPT_STACK_BYTES {
            return Err(format!(
                "scriptMaxStackBytes must be at least {}",
                MIN_SCRIPT_STACK_BYTES
            ));
        }

        if self.script_max_stack_bytes > MAX_SCRIPT_STACK_BYTES {
            return Err(format!(
                "scriptMaxStackBytes must be at most {}",
                MAX_SCRIPT_STACK_BYTES
            ));
        }

        if self.script_memory_limit < MIN_SCRIPT_MEMORY_LIMIT {
            return Err(format!(
                "scriptMemoryLimit must be at least {}",
                MIN_SCRIPT_MEMORY_LIMIT
            ));
        }

        Ok(())
    }

    /// Returns the request timeout as a `std::time::Duration`.
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout)
    }

    /// Returns the script timeout as a `std::time::Duration`.
    pub fn script_timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.script_timeout)
    }
}

/// Smallest stack that still leaves room for the script prelude.
pub const MIN_SCRIPT_STACK_BYTES: usize = 64 * 1024;

/// Largest stack a script run may be given. Each run gets its own thread
/// sized from this value, so the engine's check always fires first.
pub const MAX_SCRIPT_STACK_BYTES: usize = 8 * 1024 * 1024;

/// Smallest heap that still fits a fresh engine context.
pub const MIN_SCRIPT_MEMORY_LIMIT: usize = 2 * 1024 * 1024;

// Default value functions for serde

fn default_timeout() -> u64 {
    30000 // 30 seconds in milliseconds
}

fn default_follow_redirects() -> bool {
    true
}

fn default_max_redirects() -> u32 {
    10
}

fn default_validate_ssl() -> bool {
    true
}

fn default_history_limit() -> usize {
    1000
}

fn default_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        "User-Agent".to_string(),
        format!("rest-runner/{}", env!("CARGO_PKG_VERSION")),
    );
    headers
}

fn default_script_timeout() -> u64 {
    5000
}

fn default_script_max_steps() -> u64 {
    50_000_000
}

fn default_script_max_stack_bytes() -> usize {
    512 * 1024
}

fn default_script_memory_limit() -> usize {
    64 * 1024 * 1024
}
