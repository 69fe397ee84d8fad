//! Integration tests module for rest-runner
//!
//! Shared helpers for tests that drive the public API: the reqwest executor
//! against a local wiremock server, the script runner, and the full
//! orchestrator.

pub mod native_executor_test;
pub mod pipeline_test;
pub mod scripting_test;

use rest_runner::executor::{ExecutionConfig, ReqwestExecutor};
use std::collections::HashMap;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test environment (run once)
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Executor with a short timeout and no default headers.
pub fn test_executor(timeout_ms: u64) -> ReqwestExecutor {
    init_test_env();
    let mut config = ExecutionConfig::new(timeout_ms);
    config.default_headers.clear();
    ReqwestExecutor::new(config).expect("client should build")
}

pub fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
