//! Aggregate outcome of one orchestrated request.

use crate::models::{Request, Response};
use crate::scripting::{ScriptExecutionResult, TestResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Message recorded when an orchestration is cancelled.
pub const CANCELLED_MESSAGE: &str = "Request cancelled";

/// Pipeline states, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Created,
    VariablesResolved,
    PreScriptRun,
    Executed,
    PostScriptRun,
    Completed,
}

/// Everything one pipeline run produced.
///
/// Logs, test results and errors are concatenated pre-request first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub request_id: String,

    /// The request as sent, after variable resolution.
    pub resolved_request: Option<Request>,

    /// `None` when the pipeline stopped before the HTTP call.
    pub response: Option<Response>,

    pub logs: Vec<String>,
    pub test_results: Vec<TestResult>,
    pub errors: Vec<String>,
    pub has_script_errors: bool,

    /// Variables written by either script, with their final values.
    pub environment_updates: HashMap<String, String>,

    /// The working environment after both scripts.
    pub environment: HashMap<String, String>,

    /// Last stage reached.
    pub stage: PipelineStage,

    pub cancelled: bool,
    pub duration: Duration,
}

impl OrchestrationResult {
    pub(crate) fn new(request_id: impl Into<String>, environment: HashMap<String, String>) -> Self {
        Self {
            request_id: request_id.into(),
            resolved_request: None,
            response: None,
            logs: Vec::new(),
            test_results: Vec::new(),
            errors: Vec::new(),
            has_script_errors: false,
            environment_updates: HashMap::new(),
            environment,
            stage: PipelineStage::Created,
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    /// Folds a script run into the aggregate and the working environment.
    pub(crate) fn absorb(&mut self, script: ScriptExecutionResult) {
        for (key, value) in script.environment_updates {
            self.environment.insert(key.clone(), value.clone());
            self.environment_updates.insert(key, value);
        }
        self.logs.extend(script.logs);
        self.test_results.extend(script.test_results);
        self.errors.extend(script.errors);
        self.has_script_errors = !self.errors.is_empty();
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
        if !self.errors.iter().any(|e| e == CANCELLED_MESSAGE) {
            self.errors.push(CANCELLED_MESSAGE.to_string());
        }
        self.has_script_errors = true;
    }

    pub fn passed_tests(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    pub fn failed_tests(&self) -> usize {
        self.test_results.len() - self.passed_tests()
    }

    /// True when no test failed (vacuously true without tests).
    pub fn all_tests_passed(&self) -> bool {
        self.failed_tests() == 0
    }
}
