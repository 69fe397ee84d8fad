//! Collects `pm.test` outcomes in call order.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single `pm.test` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,

    /// Failure message; `None` when the test passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration: Duration,
}

impl TestResult {
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            duration,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            duration,
        }
    }
}

/// Ordered accumulator for test results produced during one script run.
#[derive(Debug, Default)]
pub struct TestCollector {
    results: Vec<TestResult>,
}

impl TestCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, name: impl Into<String>, duration: Duration) {
        self.results.push(TestResult::passed(name, duration));
    }

    pub fn record_failure(
        &mut self,
        name: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) {
        self.results.push(TestResult::failed(name, error, duration));
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Moves the collected results out, leaving the collector empty.
    pub fn take(&mut self) -> Vec<TestResult> {
        std::mem::take(&mut self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_preserves_order() {
        let mut collector = TestCollector::new();
        collector.record_pass("first", Duration::from_millis(1));
        collector.record_failure("second", "expected 1 to equal 2", Duration::ZERO);
        collector.record_pass("first", Duration::ZERO);

        let names: Vec<_> = collector.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "first"]);
        assert_eq!(
            collector.results()[1].error.as_deref(),
            Some("expected 1 to equal 2")
        );
    }

    #[test]
    fn test_take_empties_collector() {
        let mut collector = TestCollector::new();
        collector.record_pass("a", Duration::ZERO);
        let taken = collector.take();
        assert_eq!(taken.len(), 1);
        assert!(collector.is_empty());
    }

    #[test]
    fn test_result_serialization_skips_missing_error() {
        let json = serde_json::to_value(TestResult::passed("ok", Duration::ZERO)).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["passed"], true);
    }
}
