//! Configuration management for the request runner.
//!
//! This module provides configuration loading, validation, and access through a singleton pattern.
//! Configuration is read from a JSON settings object under the "rest-runner" key and filled
//! with defaults for anything left unset.

pub mod schema;

pub use schema::{RunnerConfig, MAX_SCRIPT_STACK_BYTES, MIN_SCRIPT_STACK_BYTES};

use log::warn;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::RwLock;

/// Key under which runner settings live in a settings document.
pub const SETTINGS_KEY: &str = "rest-runner";

/// Global configuration instance.
static CONFIG: Lazy<RwLock<RunnerConfig>> = Lazy::new(|| RwLock::new(RunnerConfig::default()));

/// Loads configuration from a JSON settings value.
///
/// This function reads the "rest-runner" settings, fills missing fields with defaults,
/// validates the result, and updates the global configuration.
///
/// # Arguments
///
/// * `settings_json` - Optional JSON value containing user settings under "rest-runner" key
///
/// # Returns
///
/// `Ok(RunnerConfig)` with the loaded configuration, or `Err` if validation fails.
///
/// # Example
///
/// ```no_run
/// use rest_runner::config::load_config;
/// use serde_json::json;
///
/// let settings = json!({
///     "rest-runner": {
///         "timeout": 60000,
///         "scriptTimeout": 2000
///     }
/// });
///
/// let config = load_config(Some(settings)).unwrap();
/// assert_eq!(config.timeout, 60000);
/// ```
pub fn load_config(settings_json: Option<Value>) -> Result<RunnerConfig, String> {
    let mut config = RunnerConfig::default();

    if let Some(settings) = settings_json {
        if let Some(runner_settings) = settings.get(SETTINGS_KEY) {
            match serde_json::from_value::<RunnerConfig>(runner_settings.clone()) {
                Ok(user_config) => config = user_config,
                Err(e) => {
                    warn!(
                        "Failed to parse {} settings: {}. Using defaults.",
                        SETTINGS_KEY, e
                    );
                }
            }
        }
    }

    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    if let Ok(mut global_config) = CONFIG.write() {
        *global_config = config.clone();
    }

    Ok(config)
}

/// Gets the current global configuration.
///
/// Returns the default configuration if nothing has been loaded yet.
pub fn get_config() -> RunnerConfig {
    CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_else(|_| RunnerConfig::default())
}

/// Updates configuration settings in place.
///
/// The configuration is validated after the update and reverted to
/// defaults if it became invalid.
///
/// # Example
///
/// ```no_run
/// use rest_runner::config::update_config;
///
/// update_config(|config| {
///     config.script_timeout = 1000;
/// });
/// ```
pub fn update_config<F>(updater: F)
where
    F: FnOnce(&mut RunnerConfig),
{
    if let Ok(mut config) = CONFIG.write() {
        updater(&mut config);

        if let Err(e) = config.validate() {
            warn!("Configuration validation failed after update: {}", e);
            *config = RunnerConfig::default();
        }
    }
}

/// Resets the configuration to defaults.
pub fn reset_config() {
    if let Ok(mut config) = CONFIG.write() {
        *config = RunnerConfig::default();
    }
}
