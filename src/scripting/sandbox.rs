//! QuickJS-backed script sandbox.
//!
//! Every run gets a fresh runtime and context. The only capabilities a script
//! has are the `pm` and `console` objects installed by the prelude; those call
//! back into Rust through a private host object that never becomes a global.
//!
//! Limits are enforced by the engine itself: the interrupt handler checks the
//! wall-clock deadline, the cancellation token and an operation budget, the
//! stack limit bounds recursion, and the memory limit bounds allocations.

use super::api::{EnvironmentProxy, RequestView, ResponseView, ScriptContext};
use super::assertions;
use super::collector::TestCollector;
use super::result::{ScriptError, ScriptExecutionResult};
use crate::config::{RunnerConfig, MAX_SCRIPT_STACK_BYTES, MIN_SCRIPT_STACK_BYTES};
use crate::executor::CancellationToken;
use crate::vault::VaultStore;
use log::debug;
use rquickjs::{qjs, CatchResultExt, Coerced, Context, Ctx, Function, Object, Runtime, Value};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PRELUDE: &str = include_str!("prelude.js");

/// QuickJS calls the interrupt handler roughly once per this many operations.
const OPS_PER_INTERRUPT: u64 = 10_000;

/// Resource limits for one script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLimits {
    pub timeout: Duration,
    pub max_steps: u64,
    pub max_stack_bytes: usize,
    pub memory_limit_bytes: usize,
}

impl ScriptLimits {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            timeout: config.script_timeout_duration(),
            max_steps: config.script_max_steps,
            max_stack_bytes: clamp_stack(config.script_max_stack_bytes),
            memory_limit_bytes: config.script_memory_limit,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the engine stack limit, clamped to what a script thread can hold.
    pub fn with_max_stack_bytes(mut self, max_stack_bytes: usize) -> Self {
        self.max_stack_bytes = clamp_stack(max_stack_bytes);
        self
    }

    /// Native stack for the thread that runs one script: the engine limit
    /// plus room for the host frames below the engine.
    pub fn thread_stack_bytes(&self) -> usize {
        self.max_stack_bytes + THREAD_STACK_HEADROOM
    }
}

/// Stack reserved on a script thread beyond the engine limit.
const THREAD_STACK_HEADROOM: usize = 1024 * 1024;

fn clamp_stack(bytes: usize) -> usize {
    bytes.clamp(MIN_SCRIPT_STACK_BYTES, MAX_SCRIPT_STACK_BYTES)
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// Runs one script body against a context.
///
/// Implementations are synchronous and may block; `ScriptRunner` calls them
/// on a thread sized by [`ScriptLimits::thread_stack_bytes`].
pub trait ScriptEngine: Send + Sync {
    fn execute(
        &self,
        source: &str,
        context: &ScriptContext,
        limits: &ScriptLimits,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult;
}

/// [`ScriptEngine`] backed by an embedded QuickJS runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickJsEngine;

impl QuickJsEngine {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AbortReason {
    Timeout,
    Cancelled,
    StepLimit,
}

/// Mutable state shared between the host functions of one run.
struct ScriptHost {
    environment: EnvironmentProxy,
    collection_variables: HashMap<String, String>,
    globals: HashMap<String, String>,
    vault: Option<Arc<dyn VaultStore>>,
    cancellation: CancellationToken,
    logs: Vec<String>,
    tests: TestCollector,
    failure: Option<ScriptError>,
}

impl ScriptHost {
    fn new(context: &ScriptContext, cancellation: CancellationToken) -> Self {
        Self {
            environment: EnvironmentProxy::new(context.environment.clone()),
            collection_variables: context.collection_variables.clone(),
            globals: context.globals.clone(),
            vault: context.vault.clone(),
            cancellation,
            logs: Vec::new(),
            tests: TestCollector::new(),
            failure: None,
        }
    }

    /// `pm.variables` lookup: environment, then collection, then globals.
    fn variable(&self, key: &str) -> Option<String> {
        self.environment
            .get(key)
            .or_else(|| self.collection_variables.get(key))
            .or_else(|| self.globals.get(key))
            .cloned()
    }

    fn unlocked_vault(&self) -> Option<&Arc<dyn VaultStore>> {
        self.vault.as_ref().filter(|v| v.is_unlocked())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptInfo<'a> {
    event_name: &'a str,
    request_name: &'a str,
    request_id: &'a str,
}

#[derive(Serialize)]
struct Projection<'a> {
    request: &'a RequestView,
    response: Option<&'a ResponseView>,
    info: ScriptInfo<'a>,
}

impl<'a> Projection<'a> {
    fn new(context: &'a ScriptContext) -> Self {
        Self {
            request: &context.request,
            response: context.response.as_ref(),
            info: ScriptInfo {
                event_name: context.phase.event_name(),
                request_name: &context.request.name,
                request_id: &context.request.id,
            },
        }
    }
}

impl ScriptEngine for QuickJsEngine {
    fn execute(
        &self,
        source: &str,
        context: &ScriptContext,
        limits: &ScriptLimits,
        cancellation: &CancellationToken,
    ) -> ScriptExecutionResult {
        if source.trim().is_empty() {
            return ScriptExecutionResult::empty();
        }

        let started = Instant::now();
        let host = Rc::new(RefCell::new(ScriptHost::new(context, cancellation.clone())));
        let abort = Rc::new(Cell::new(None));

        let outcome = if cancellation.is_cancelled() {
            Err(ScriptError::Cancelled)
        } else {
            run_script(source, context, limits, cancellation, &host, &abort)
        };

        let mut state = host.borrow_mut();
        let mut result = ScriptExecutionResult {
            success: true,
            logs: std::mem::take(&mut state.logs),
            errors: Vec::new(),
            test_results: state.tests.take(),
            environment_updates: state.environment.updates().clone(),
            duration: started.elapsed(),
        };

        let error = match abort.get() {
            Some(AbortReason::Timeout) => Some(ScriptError::Timeout(limits.timeout)),
            Some(AbortReason::Cancelled) => Some(ScriptError::Cancelled),
            Some(AbortReason::StepLimit) => Some(ScriptError::StepLimitExceeded(limits.max_steps)),
            None => outcome.err().or_else(|| state.failure.take()),
        };

        if let Some(error) = error {
            debug!("{} script failed: {}", context.phase.event_name(), error);
            result.fail(&error);
        }
        result
    }
}

fn run_script(
    source: &str,
    context: &ScriptContext,
    limits: &ScriptLimits,
    cancellation: &CancellationToken,
    host: &Rc<RefCell<ScriptHost>>,
    abort: &Rc<Cell<Option<AbortReason>>>,
) -> Result<(), ScriptError> {
    let engine_error = |e: rquickjs::Error| ScriptError::Engine(e.to_string());

    // Declared before the runtime so it is dropped after it.
    let rejections: Rc<Rejections> = Rc::new(RefCell::new(Vec::new()));
    let runtime = Runtime::new().map_err(engine_error)?;
    runtime.set_memory_limit(limits.memory_limit_bytes);
    runtime.set_max_stack_size(limits.max_stack_bytes);
    runtime.set_interrupt_handler(Some(Box::new(watchdog(
        limits,
        cancellation.clone(),
        Rc::clone(abort),
    ))));

    let js = Context::full(&runtime).map_err(engine_error)?;
    let projection = serde_json::to_string(&Projection::new(context))
        .map_err(|e| ScriptError::Engine(e.to_string()))?;

    let outcome = js.with(|ctx| {
        install_rejection_tracker(&ctx, &rejections);
        let factory = ctx
            .eval::<Function, _>(PRELUDE)
            .catch(&ctx)
            .map_err(|e| ScriptError::Engine(e.to_string()))?;
        let host_object = install_host(&ctx, host)
            .catch(&ctx)
            .map_err(|e| ScriptError::Engine(e.to_string()))?;
        let run = factory
            .call::<_, Function>((host_object, projection))
            .catch(&ctx)
            .map_err(|e| ScriptError::Engine(e.to_string()))?;
        run.call::<_, ()>((source.to_string(),))
            .catch(&ctx)
            .map_err(|e| classify_uncaught(&e.to_string()))
    });

    if outcome.is_ok() {
        let job_error = drain_jobs(&runtime);
        let unhandled = rejections.borrow_mut().drain(..).next().map(|(_, e)| e);
        if let Some(error) = job_error.or(unhandled) {
            let mut state = host.borrow_mut();
            if state.failure.is_none() {
                state.failure = Some(error);
            }
        }
    }
    outcome
}

/// Runs queued promise jobs until the queue is empty or one throws.
fn drain_jobs(runtime: &Runtime) -> Option<ScriptError> {
    loop {
        match runtime.execute_pending_job() {
            Ok(true) => continue,
            Ok(false) => return None,
            Err(exception) => {
                return Some(exception.0.with(|ctx| describe_rejection(&ctx.catch())));
            }
        }
    }
}

/// Rejected promises that have no handler yet, keyed by promise address.
type Rejections = RefCell<Vec<(usize, ScriptError)>>;

fn install_rejection_tracker(ctx: &Ctx<'_>, rejections: &Rc<Rejections>) {
    // SAFETY: `rejections` is created before the runtime in `run_script` and
    // dropped after it, so the opaque pointer is valid for every callback.
    unsafe {
        let runtime = qjs::JS_GetRuntime(ctx.as_raw().as_ptr());
        qjs::JS_SetHostPromiseRejectionTracker(
            runtime,
            Some(track_rejection),
            Rc::as_ptr(rejections) as *mut c_void,
        );
    }
}

unsafe extern "C" fn track_rejection(
    ctx: *mut qjs::JSContext,
    promise: qjs::JSValue,
    reason: qjs::JSValue,
    is_handled: c_int,
    opaque: *mut c_void,
) {
    let rejections = &*(opaque as *const Rejections);
    let key = qjs::JS_VALUE_GET_PTR(promise) as usize;

    if is_handled != 0 {
        if let Ok(mut pending) = rejections.try_borrow_mut() {
            pending.retain(|(candidate, _)| *candidate != key);
        }
        return;
    }

    let Some(ctx) = NonNull::new(ctx) else {
        return;
    };
    let ctx = Ctx::from_raw(ctx);
    let reason = Value::from_raw(ctx, qjs::JS_DupValue(reason));
    let error = describe_rejection(&reason);
    if let Ok(mut pending) = rejections.try_borrow_mut() {
        pending.push((key, error));
    }
}

/// Maps a thrown or rejected value to a script error.
fn describe_rejection(reason: &Value<'_>) -> ScriptError {
    match reason.as_object() {
        Some(object) => {
            let field = |key: &str| {
                object
                    .get::<_, Option<Coerced<String>>>(key)
                    .ok()
                    .flatten()
                    .map(|text| text.0)
            };
            let name = field("name").unwrap_or_else(|| "Error".to_string());
            classify(&name, &field("message").unwrap_or_default())
        }
        None => {
            let text = reason
                .get::<Coerced<String>>()
                .map(|text| text.0)
                .unwrap_or_else(|_| "undefined".to_string());
            ScriptError::Runtime(format!("Uncaught (in promise): {}", text))
        }
    }
}

/// Builds the interrupt handler enforcing deadline, cancellation and step budget.
fn watchdog(
    limits: &ScriptLimits,
    cancellation: CancellationToken,
    abort: Rc<Cell<Option<AbortReason>>>,
) -> impl FnMut() -> bool + 'static {
    let deadline = Instant::now() + limits.timeout;
    let max_steps = limits.max_steps;
    let mut steps: u64 = 0;

    move || {
        if abort.get().is_some() {
            return true;
        }
        steps = steps.saturating_add(OPS_PER_INTERRUPT);

        let reason = if cancellation.is_cancelled() {
            Some(AbortReason::Cancelled)
        } else if Instant::now() >= deadline {
            Some(AbortReason::Timeout)
        } else if steps > max_steps {
            Some(AbortReason::StepLimit)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                abort.set(Some(reason));
                true
            }
            None => false,
        }
    }
}

fn is_stack_overflow(message: &str) -> bool {
    message.contains("stack overflow") || message.contains("Maximum call stack size exceeded")
}

/// Maps an exception caught by the prelude to a failure kind.
fn classify(name: &str, message: &str) -> ScriptError {
    if is_stack_overflow(message) {
        ScriptError::RecursionLimitExceeded
    } else if name == "SyntaxError" {
        ScriptError::Syntax(message.to_string())
    } else {
        ScriptError::Runtime(format!("{}: {}", name, message))
    }
}

/// Maps an exception that escaped the prelude entirely.
fn classify_uncaught(text: &str) -> ScriptError {
    let first_line = text.lines().next().unwrap_or(text).trim();
    if is_stack_overflow(first_line) {
        ScriptError::RecursionLimitExceeded
    } else {
        ScriptError::Runtime(first_line.to_string())
    }
}

/// Values cross from scripts as `{"v": value}`; `{}` stands for `undefined`.
fn unwrap_defined(wrapper: &serde_json::Value) -> Option<serde_json::Value> {
    wrapper.get("v").cloned()
}

/// Creates the host object handed to the prelude.
fn install_host<'js>(ctx: &Ctx<'js>, host: &Rc<RefCell<ScriptHost>>) -> rquickjs::Result<Object<'js>> {
    let object = Object::new(ctx.clone())?;

    let h = Rc::clone(host);
    object.set(
        "envGet",
        Function::new(ctx.clone(), move |key: String| {
            h.borrow().environment.get(&key).cloned()
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "envSet",
        Function::new(ctx.clone(), move |key: String, value: String| {
            h.borrow_mut().environment.set(key, value);
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "envUnset",
        Function::new(ctx.clone(), move |key: String| {
            h.borrow_mut().environment.unset(key);
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "envHas",
        Function::new(ctx.clone(), move |key: String| h.borrow().environment.has(&key))?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "envObject",
        Function::new(ctx.clone(), move || {
            serde_json::to_string(&h.borrow().environment.to_map())
                .unwrap_or_else(|_| "{}".to_string())
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "globalGet",
        Function::new(ctx.clone(), move |key: String| h.borrow().globals.get(&key).cloned())?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "globalHas",
        Function::new(ctx.clone(), move |key: String| {
            h.borrow().globals.contains_key(&key)
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "collectionGet",
        Function::new(ctx.clone(), move |key: String| {
            h.borrow().collection_variables.get(&key).cloned()
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "collectionHas",
        Function::new(ctx.clone(), move |key: String| {
            h.borrow().collection_variables.contains_key(&key)
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "varGet",
        Function::new(ctx.clone(), move |key: String| h.borrow().variable(&key))?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "varHas",
        Function::new(ctx.clone(), move |key: String| {
            h.borrow().variable(&key).is_some()
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "vaultGet",
        Function::new(ctx.clone(), move |name: String| {
            let state = h.borrow();
            state
                .unlocked_vault()
                .and_then(|vault| vault.get_secret_value(&name, &state.cancellation))
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "vaultSecret",
        Function::new(ctx.clone(), move |name: String| {
            let state = h.borrow();
            state
                .unlocked_vault()
                .and_then(|vault| vault.get_by_name(&name))
                .map(|secret| {
                    serde_json::json!({
                        "id": secret.id,
                        "name": secret.name,
                        "value": secret.value,
                        "description": secret.description,
                    })
                    .to_string()
                })
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "vaultUnlocked",
        Function::new(ctx.clone(), move || h.borrow().unlocked_vault().is_some())?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "vaultList",
        Function::new(ctx.clone(), move || {
            let names: Vec<String> = h
                .borrow()
                .unlocked_vault()
                .map(|vault| vault.get_all().into_iter().map(|s| s.name).collect())
                .unwrap_or_default();
            serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "log",
        Function::new(ctx.clone(), move |level: String, message: String| {
            debug!("console.{}: {}", level, message);
            h.borrow_mut().logs.push(message);
        })?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "recordTest",
        Function::new(
            ctx.clone(),
            move |name: String, passed: bool, error: String, elapsed_ms: f64| {
                let duration = Duration::from_millis(elapsed_ms.max(0.0) as u64);
                let mut state = h.borrow_mut();
                if passed {
                    state.tests.record_pass(name, duration);
                } else {
                    state.tests.record_failure(name, error, duration);
                }
            },
        )?,
    )?;

    object.set(
        "assert",
        Function::new(
            ctx.clone(),
            move |op: String, actual_json: String, args_json: String, negated: bool| {
                let actual = serde_json::from_str::<serde_json::Value>(&actual_json)
                    .ok()
                    .and_then(|wrapper| unwrap_defined(&wrapper));
                let args: Vec<Option<serde_json::Value>> =
                    serde_json::from_str::<Vec<serde_json::Value>>(&args_json)
                        .unwrap_or_default()
                        .iter()
                        .map(unwrap_defined)
                        .collect();
                assertions::evaluate(&op, actual.as_ref(), &args, negated)
                    .err()
                    .map(|e| e.message)
            },
        )?,
    )?;

    let h = Rc::clone(host);
    object.set(
        "fail",
        Function::new(ctx.clone(), move |name: String, message: String| {
            let mut state = h.borrow_mut();
            if state.failure.is_none() {
                state.failure = Some(classify(&name, &message));
            }
        })?,
    )?;

    Ok(object)
}
