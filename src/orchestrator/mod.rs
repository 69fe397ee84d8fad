//! Request orchestration.
//!
//! Sequences one request through the pipeline:
//! variable resolution, pre-request script, HTTP call, post-response script.
//! Each run works on its own copy of the environment and returns the diff
//! produced by scripts in the [`OrchestrationResult`]; persisting it is up to
//! the caller.
//!
//! # Example
//!
//! ```no_run
//! use rest_runner::executor::{CancellationToken, ReqwestExecutor};
//! use rest_runner::models::{HttpMethod, Request};
//! use rest_runner::orchestrator::RequestOrchestrator;
//! use rest_runner::variables::VariableContext;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(ReqwestExecutor::from_global_config()?);
//! let orchestrator = RequestOrchestrator::new(executor);
//!
//! let mut env = HashMap::new();
//! env.insert("base".to_string(), "https://jsonplaceholder.typicode.com".to_string());
//!
//! let request = Request::new("r1", HttpMethod::GET, "{{base}}/todos/1")
//!     .with_post_response_script("pm.test('ok', () => pm.expect(pm.response.code).to.equal(200));");
//!
//! let result = orchestrator
//!     .execute_request(&request, &VariableContext::from_environment(env), &CancellationToken::new())
//!     .await?;
//! println!("{} passed, {} failed", result.passed_tests(), result.failed_tests());
//! # Ok(())
//! # }
//! ```

pub mod result;

pub use result::{OrchestrationResult, PipelineStage, CANCELLED_MESSAGE};

use crate::config::RunnerConfig;
use crate::executor::{CancellationToken, RequestExecutor, RequestHandle, SharedRequestTracker};
use crate::history::{HistoryEntry, HistoryRepository};
use crate::models::{Request, Response};
use crate::scripting::{ScriptContext, ScriptExecutionResult, ScriptRunner};
use crate::variables::{resolve_auth, resolve_request, MissingVariablePolicy, VarError, VariableContext};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Errors that abort an orchestration before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Template resolution failed under [`MissingVariablePolicy::ThrowError`].
    Variable(VarError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Variable(e) => write!(f, "Variable resolution failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Variable(e) => Some(e),
        }
    }
}

impl From<VarError> for PipelineError {
    fn from(e: VarError) -> Self {
        PipelineError::Variable(e)
    }
}

/// Behaviour switches for [`RequestOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    pub missing_variable_policy: MissingVariablePolicy,

    /// Skip the HTTP call and the post-response script when the pre-request
    /// script fails.
    pub abort_on_pre_script_error: bool,

    /// Expand templates inside auth credentials too.
    pub resolve_auth_fields: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            missing_variable_policy: config.missing_variable_policy,
            abort_on_pre_script_error: config.abort_on_pre_script_error,
            resolve_auth_fields: config.resolve_auth_fields,
        }
    }

    pub fn with_policy(mut self, policy: MissingVariablePolicy) -> Self {
        self.missing_variable_policy = policy;
        self
    }
}

/// Drives requests through resolution, scripts and execution.
pub struct RequestOrchestrator {
    executor: Arc<dyn RequestExecutor>,
    scripts: ScriptRunner,
    options: PipelineOptions,
    history: Option<Arc<dyn HistoryRepository>>,
    tracker: Option<SharedRequestTracker>,
}

impl RequestOrchestrator {
    /// Creates an orchestrator with default options and script limits.
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            executor,
            scripts: ScriptRunner::default(),
            options: PipelineOptions::default(),
            history: None,
            tracker: None,
        }
    }

    /// Creates an orchestrator whose options and script limits come from
    /// `config`.
    pub fn from_config(executor: Arc<dyn RequestExecutor>, config: &RunnerConfig) -> Self {
        Self::new(executor)
            .with_options(PipelineOptions::from_config(config))
            .with_script_runner(ScriptRunner::from_config(config))
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_script_runner(mut self, scripts: ScriptRunner) -> Self {
        self.scripts = scripts;
        self
    }

    /// Appends every finished orchestration to `history`.
    pub fn with_history(mut self, history: Arc<dyn HistoryRepository>) -> Self {
        self.history = Some(history);
        self
    }

    /// Registers in-flight orchestrations with `tracker` so they can be
    /// cancelled by id.
    pub fn with_tracker(mut self, tracker: SharedRequestTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Runs `request` through the full pipeline.
    ///
    /// # Errors
    ///
    /// Only [`PipelineError::Variable`], when a template cannot be resolved
    /// under the `ThrowError` policy. Nothing is sent in that case. Script
    /// failures, transport failures and cancellation are reported inside the
    /// returned [`OrchestrationResult`].
    pub async fn execute_request(
        &self,
        request: &Request,
        context: &VariableContext,
        cancellation: &CancellationToken,
    ) -> Result<OrchestrationResult, PipelineError> {
        let started = Instant::now();
        info!(
            "Executing request '{}' ({} {})",
            request.name,
            request.method.as_str(),
            request.url
        );

        let registration = self.register(cancellation);
        let mut result = OrchestrationResult::new(request.id.clone(), context.environment.clone());
        let outcome = self
            .run_stages(request, context, cancellation, &mut result)
            .await;
        self.unregister(registration);
        outcome?;

        result.duration = started.elapsed();
        self.record_history(&result);

        info!(
            "Request '{}' finished at {:?}: tests {}/{}, errors {}, {}ms",
            request.name,
            result.stage,
            result.passed_tests(),
            result.test_results.len(),
            result.errors.len(),
            result.duration.as_millis()
        );
        Ok(result)
    }

    async fn run_stages(
        &self,
        request: &Request,
        context: &VariableContext,
        cancellation: &CancellationToken,
        result: &mut OrchestrationResult,
    ) -> Result<(), PipelineError> {
        let scoped = context.clone().with_cancellation(cancellation.clone());
        let context = &scoped;
        let policy = self.options.missing_variable_policy;
        let mut resolved = resolve_request(request, context, policy)?;
        if self.options.resolve_auth_fields {
            resolved.auth = resolve_auth(&request.auth, context, policy)?;
        }
        result.resolved_request = Some(resolved.clone());
        self.advance(result, PipelineStage::VariablesResolved);

        if cancellation.is_cancelled() {
            result.mark_cancelled();
            return Ok(());
        }

        if let Some(script) = script_source(&resolved.pre_request_script) {
            let script_context = self.script_context(
                ScriptContext::pre_request(&resolved, result.environment.clone()),
                context,
            );
            let pre = self
                .scripts
                .run_pre_request(script, script_context, cancellation)
                .await;
            let pre_failed = !pre.success;
            result.absorb(pre);
            self.advance(result, PipelineStage::PreScriptRun);

            if cancellation.is_cancelled() {
                result.mark_cancelled();
                return Ok(());
            }
            if pre_failed && self.options.abort_on_pre_script_error {
                warn!(
                    "Pre-request script for '{}' failed; skipping request",
                    request.name
                );
                return Ok(());
            }
        } else {
            self.advance(result, PipelineStage::PreScriptRun);
        }

        let response = self.executor.execute(&resolved, cancellation).await;
        result.response = Some(response.clone());
        self.advance(result, PipelineStage::Executed);

        if cancellation.is_cancelled() {
            result.mark_cancelled();
            return Ok(());
        }

        if let Some(script) = script_source(&resolved.post_response_script) {
            let post = self
                .run_post_response(script, &resolved, &response, context, result, cancellation)
                .await;
            result.absorb(post);
            self.advance(result, PipelineStage::PostScriptRun);

            if cancellation.is_cancelled() {
                result.mark_cancelled();
                return Ok(());
            }
        } else {
            self.advance(result, PipelineStage::PostScriptRun);
        }

        self.advance(result, PipelineStage::Completed);
        Ok(())
    }

    async fn run_post_response(
        &self,
        script: &str,
        resolved: &Request,
        response: &Response,
        context: &VariableContext,
        result: &OrchestrationResult,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult {
        let script_context = self.script_context(
            ScriptContext::post_response(resolved, response, result.environment.clone()),
            context,
        );
        self.scripts
            .run_post_response(script, script_context, cancellation)
            .await
    }

    fn script_context(&self, base: ScriptContext, context: &VariableContext) -> ScriptContext {
        base.with_collection_variables(context.collection.clone())
            .with_globals(context.global.clone())
            .with_vault(context.vault.clone())
    }

    fn advance(&self, result: &mut OrchestrationResult, stage: PipelineStage) {
        debug!("Request {}: {:?} -> {:?}", result.request_id, result.stage, stage);
        result.stage = stage;
    }

    fn register(&self, cancellation: &CancellationToken) -> Option<String> {
        let tracker = self.tracker.as_ref()?;
        let mut handle = RequestHandle::new();
        handle.token = cancellation.clone();
        match tracker.register(handle) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to register request for cancellation: {}", e);
                None
            }
        }
    }

    fn unregister(&self, registration: Option<String>) {
        if let (Some(tracker), Some(id)) = (self.tracker.as_ref(), registration) {
            if let Err(e) = tracker.unregister(&id) {
                warn!("Failed to unregister request {}: {}", id, e);
            }
        }
    }

    fn record_history(&self, result: &OrchestrationResult) {
        let (Some(history), Some(request)) = (self.history.as_ref(), result.resolved_request.as_ref()) else {
            return;
        };
        let script_errors = result
            .errors
            .iter()
            .filter(|e| e.as_str() != CANCELLED_MESSAGE)
            .count();
        let entry = HistoryEntry::new(request.clone(), result.response.clone())
            .with_outcome(
                result.passed_tests(),
                result.failed_tests(),
                script_errors,
                result.cancelled,
            )
            .with_duration(result.duration);
        if let Err(e) = history.append(entry) {
            warn!("Failed to record history: {}", e);
        }
    }
}

fn script_source(script: &Option<String>) -> Option<&str> {
    script.as_deref().filter(|s| !s.trim().is_empty())
}
