//! Pre-request and post-response scripting.
//!
//! Scripts are JavaScript executed in an embedded QuickJS sandbox with a
//! Postman-style `pm` object: environment access, read-only variable scopes,
//! request/response projections, `pm.test` / `pm.expect`, `console`, and
//! vault reads. Each run gets a fresh engine on its own thread, sized for the
//! engine's stack limit, and returns a [`ScriptExecutionResult`]; script
//! failures never surface as `Err`.
//!
//! # Example
//!
//! ```no_run
//! use rest_runner::executor::CancellationToken;
//! use rest_runner::models::{HttpMethod, Request};
//! use rest_runner::scripting::{ScriptContext, ScriptRunner};
//! use std::collections::HashMap;
//!
//! # async fn example() {
//! let runner = ScriptRunner::default();
//! let request = Request::new("r1", HttpMethod::GET, "https://api.example.com");
//! let context = ScriptContext::pre_request(&request, HashMap::new());
//!
//! let result = runner
//!     .run_pre_request("pm.environment.set('ts', Date.now())", context, &CancellationToken::new())
//!     .await;
//! assert!(result.environment_updates.contains_key("ts"));
//! # }
//! ```

pub mod api;
pub mod assertions;
pub mod collector;
pub mod result;
pub mod sandbox;

pub use api::{EnvironmentProxy, RequestView, ResponseView, ScriptContext, ScriptPhase};
pub use assertions::{AssertionError, Expectation, NegatedExpectation};
pub use collector::{TestCollector, TestResult};
pub use result::{ScriptError, ScriptExecutionResult};
pub use sandbox::{QuickJsEngine, ScriptEngine, ScriptLimits};

use crate::config::RunnerConfig;
use crate::executor::CancellationToken;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// Runs scripts on a [`ScriptEngine`] with fixed limits.
#[derive(Clone)]
pub struct ScriptRunner {
    engine: Arc<dyn ScriptEngine>,
    limits: ScriptLimits,
}

impl ScriptRunner {
    /// Creates a runner backed by [`QuickJsEngine`].
    pub fn new(limits: ScriptLimits) -> Self {
        Self::with_engine(Arc::new(QuickJsEngine::new()), limits)
    }

    pub fn with_engine(engine: Arc<dyn ScriptEngine>, limits: ScriptLimits) -> Self {
        Self { engine, limits }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(ScriptLimits::from_config(config))
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Runs a script synchronously, blocking the caller until it finishes.
    ///
    /// The engine runs on a scoped thread whose stack is sized from the
    /// limits, never on the caller's stack.
    pub fn execute(
        &self,
        script: &str,
        context: &ScriptContext,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult {
        if script.trim().is_empty() {
            return ScriptExecutionResult::empty();
        }

        let started = Instant::now();
        let outcome = std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name(format!("{}-script", context.phase.event_name()))
                .stack_size(self.limits.thread_stack_bytes())
                .spawn_scoped(scope, || {
                    self.engine
                        .execute(script, context, &self.limits, cancellation)
                })
                .map_err(|e| e.to_string())?
                .join()
                .map_err(|_| WORKER_LOST.to_string())
        });

        outcome.unwrap_or_else(|message| worker_failure(context.phase, message, started))
    }

    /// Runs a pre-request script. `pm.response` is undefined.
    pub async fn run_pre_request(
        &self,
        script: &str,
        mut context: ScriptContext,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult {
        context.phase = ScriptPhase::PreRequest;
        context.response = None;
        self.run_on_thread(script, context, cancellation).await
    }

    /// Runs a post-response script against the response in `context`.
    pub async fn run_post_response(
        &self,
        script: &str,
        mut context: ScriptContext,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult {
        context.phase = ScriptPhase::PostResponse;
        self.run_on_thread(script, context, cancellation).await
    }

    async fn run_on_thread(
        &self,
        script: &str,
        context: ScriptContext,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult {
        if script.trim().is_empty() {
            return ScriptExecutionResult::empty();
        }

        let phase = context.phase;
        let engine = Arc::clone(&self.engine);
        let limits = self.limits.clone();
        let token = cancellation.clone();
        let source = script.to_string();
        let started = Instant::now();

        let stack_size = limits.thread_stack_bytes();
        let (sender, receiver) = oneshot::channel();

        let spawned = std::thread::Builder::new()
            .name(format!("{}-script", phase.event_name()))
            .stack_size(stack_size)
            .spawn(move || {
                let result = engine.execute(&source, &context, &limits, &token);
                let _ = sender.send(result);
            });

        let result = match spawned {
            Ok(_) => match receiver.await {
                Ok(result) => result,
                Err(_) => worker_failure(phase, WORKER_LOST.to_string(), started),
            },
            Err(e) => worker_failure(phase, e.to_string(), started),
        };

        debug!(
            "{} script finished: success={}, tests={}/{}, {}ms",
            phase.event_name(),
            result.success,
            result.passed_tests(),
            result.test_results.len(),
            result.duration.as_millis()
        );
        result
    }
}

const WORKER_LOST: &str = "script worker exited without a result";

fn worker_failure(phase: ScriptPhase, message: String, started: Instant) -> ScriptExecutionResult {
    warn!("{} script worker failed: {}", phase.event_name(), message);
    let mut result = ScriptExecutionResult::empty();
    result.duration = started.elapsed();
    result.fail(&ScriptError::Engine(message));
    result
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}
