//! Script execution results and failure kinds.

use super::collector::TestResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Why a script run failed.
///
/// Never escapes the sandbox as an `Err`; it is rendered into
/// [`ScriptExecutionResult::errors`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The script could not be parsed.
    Syntax(String),
    /// An exception escaped the script.
    Runtime(String),
    /// The wall-clock budget ran out.
    Timeout(Duration),
    /// The cancellation token fired while the script was running.
    Cancelled,
    /// The script executed more operations than allowed.
    StepLimitExceeded(u64),
    /// The engine's stack limit was hit.
    RecursionLimitExceeded,
    /// The engine could not be set up or failed internally.
    Engine(String),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax(msg) => write!(f, "SyntaxError: {}", msg),
            ScriptError::Runtime(msg) => write!(f, "{}", msg),
            ScriptError::Timeout(limit) => write!(
                f,
                "Script execution timed out after {}ms",
                limit.as_millis()
            ),
            ScriptError::Cancelled => write!(f, "Script execution cancelled"),
            ScriptError::StepLimitExceeded(limit) => {
                write!(f, "Script exceeded the limit of {} operations", limit)
            }
            ScriptError::RecursionLimitExceeded => write!(f, "Maximum recursion depth exceeded"),
            ScriptError::Engine(msg) => write!(f, "Script engine error: {}", msg),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Everything one script run produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptExecutionResult {
    /// `false` when the script failed; failed `pm.test` blocks do not count.
    pub success: bool,

    /// Console output, one entry per call.
    pub logs: Vec<String>,

    pub errors: Vec<String>,

    pub test_results: Vec<TestResult>,

    /// Environment keys written by the script, with their final values.
    pub environment_updates: HashMap<String, String>,

    pub duration: Duration,
}

impl ScriptExecutionResult {
    /// The result of running nothing: successful, empty, zero duration.
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Marks the run as failed with `error`, keeping everything collected so far.
    pub fn fail(&mut self, error: &ScriptError) {
        self.success = false;
        self.errors.push(error.to_string());
    }

    pub fn passed_tests(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    pub fn failed_tests(&self) -> usize {
        self.test_results.len() - self.passed_tests()
    }
}
