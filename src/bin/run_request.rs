//! Command-line runner for a single request.
//!
//! Loads a serialized request (and optionally an environment and runner
//! settings), runs it through the pipeline and prints the result as JSON.
//! Logging goes to stderr and is controlled by `RUST_LOG`.
//!
//! Exit codes: 0 when every test passed, 1 on pipeline or I/O errors,
//! 2 when a test failed or the run was cancelled.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use rest_runner::config::{load_config, SETTINGS_KEY};
use rest_runner::executor::ExecutionConfig;
use rest_runner::variables::find_variable_references;
use rest_runner::{
    CancellationToken, Environment, ReqwestExecutor, Request, RequestOrchestrator, VariableContext,
};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "run-request",
    version,
    about = "Run one API request with its pre-request and post-response scripts"
)]
struct Cli {
    /// Request definition (JSON)
    #[arg(value_name = "REQUEST")]
    request: PathBuf,

    /// Environment file (JSON) providing `{{variables}}`
    #[arg(short, long)]
    env: Option<PathBuf>,

    /// Runner settings (JSON), either bare or under the "rest-runner" key
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write script changes back into the environment file
    #[arg(long, requires = "env")]
    save_env: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = cli.config.as_deref().map(read_settings).transpose()?;
    let config = load_config(settings).map_err(|e| anyhow!(e))?;

    let request: Request = read_json(&cli.request)?;
    let environment: Option<Environment> = cli.env.as_deref().map(read_json).transpose()?;

    let context = VariableContext::from_environment(
        environment
            .as_ref()
            .map(|env| env.variables.clone())
            .unwrap_or_default(),
    );

    let executor = ReqwestExecutor::new(ExecutionConfig::from_runner_config(&config))
        .context("building HTTP client")?;
    let orchestrator = RequestOrchestrator::from_config(Arc::new(executor), &config);

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            ctrl_c.cancel();
        }
    });

    let result = orchestrator
        .execute_request(&request, &context, &cancellation)
        .await?;

    if let Some(resolved) = &result.resolved_request {
        let unresolved = unresolved_templates(resolved);
        if !unresolved.is_empty() {
            warn!("Unresolved variables: {}", unresolved.join(", "));
        }
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    if cli.save_env && !result.environment_updates.is_empty() {
        if let (Some(path), Some(mut env)) = (cli.env.as_deref(), environment) {
            let changed = env.apply_updates(&result.environment_updates);
            fs::write(path, serde_json::to_string_pretty(&env)?)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Saved {} variable(s) to {}", changed, path.display());
        }
    }

    if result.cancelled || !result.all_tests_passed() {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn unresolved_templates(request: &Request) -> Vec<String> {
    let mut names = find_variable_references(&request.url);
    for pair in request.enabled_headers().chain(request.enabled_query_params()) {
        names.extend(find_variable_references(&pair.value));
    }
    if let Some(body) = request.body.raw_content() {
        names.extend(find_variable_references(&body));
    }
    names.sort();
    names.dedup();
    names
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Accepts either a full settings document or the runner section alone.
fn read_settings(path: &Path) -> Result<Value> {
    let value: Value = read_json(path)?;
    if value.get(SETTINGS_KEY).is_some() {
        Ok(value)
    } else {
        let mut document = serde_json::Map::new();
        document.insert(SETTINGS_KEY.to_string(), value);
        Ok(Value::Object(document))
    }
}
