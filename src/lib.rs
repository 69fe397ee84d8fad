//! Request execution pipeline for API testing.
//!
//! Takes a request definition whose fields may contain `{{variable}}`
//! templates, resolves them against layered variable scopes and a secret
//! vault, runs an optional JavaScript pre-request script, sends the HTTP
//! request, runs an optional post-response script, and aggregates logs, test
//! results, errors and environment changes.
//!
//! # Architecture
//!
//! - **models**: Request and response data structures
//! - **variables**: Template resolution across environment, collection,
//!   global and vault scopes, plus dynamic variables like `{{$guid}}`
//! - **scripting**: Sandboxed JavaScript with a Postman-style `pm` API
//! - **executor**: HTTP execution with timeouts and cancellation
//! - **auth**: Credential attachment and OAuth2 client-credentials tokens
//! - **orchestrator**: Sequences the stages of one request
//! - **environment**, **vault**, **history**: Storage seams with in-memory
//!   implementations
//! - **config**: Runner settings
//!
//! # Pipeline
//!
//! [`RequestOrchestrator::execute_request`] runs:
//! 1. Variable resolution (a new request; the input is never mutated)
//! 2. Pre-request script against the resolved request
//! 3. The HTTP call, always yielding a [`Response`] (status 0 on failure)
//! 4. Post-response script against the response
//! 5. Aggregation into an [`OrchestrationResult`]
//!
//! Script failures never abort the pipeline; only template resolution under
//! the `ThrowError` policy returns an error.
//!
//! # Usage
//!
//! ```no_run
//! use rest_runner::{
//!     CancellationToken, HttpMethod, Request, RequestOrchestrator, ReqwestExecutor,
//!     VariableContext,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = RequestOrchestrator::new(Arc::new(ReqwestExecutor::from_global_config()?));
//! let request = Request::new("health", HttpMethod::GET, "https://api.example.com/health")
//!     .with_post_response_script("pm.test('up', () => pm.response.to.have.status(200));");
//!
//! let result = orchestrator
//!     .execute_request(&request, &VariableContext::new(), &CancellationToken::new())
//!     .await?;
//! assert!(result.all_tests_passed());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod environment;
pub mod executor;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod scripting;
pub mod variables;
pub mod vault;

pub use config::RunnerConfig;
pub use environment::{Environment, EnvironmentStore, InMemoryEnvironmentStore};
pub use executor::{CancellationToken, RequestExecutor, ReqwestExecutor};
pub use history::{HistoryEntry, HistoryRepository, InMemoryHistory};
pub use models::{HttpMethod, Request, Response};
pub use orchestrator::{
    OrchestrationResult, PipelineError, PipelineOptions, PipelineStage, RequestOrchestrator,
};
pub use scripting::{ScriptExecutionResult, ScriptRunner, TestResult};
pub use variables::{MissingVariablePolicy, VarError, VariableContext};
pub use vault::{InMemoryVault, VaultStore};
