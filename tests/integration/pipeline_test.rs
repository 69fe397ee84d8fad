//! Full orchestrations: stub executors for pipeline semantics, wiremock for
//! real HTTP round trips.

use super::{init_test_env, test_executor, vars};
use async_trait::async_trait;
use rest_runner::environment::{Environment, EnvironmentStore, InMemoryEnvironmentStore};
use rest_runner::executor::{CancellationToken, RequestExecutor, SharedRequestTracker};
use rest_runner::history::{filter_failures, HistoryRepository, InMemoryHistory};
use rest_runner::models::{HttpMethod, Request, Response};
use rest_runner::orchestrator::{PipelineError, PipelineOptions, PipelineStage, RequestOrchestrator};
use rest_runner::variables::{MissingVariablePolicy, VarError, VariableContext};
use rest_runner::vault::InMemoryVault;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StubExecutor {
    status: u16,
}

#[async_trait]
impl RequestExecutor for StubExecutor {
    async fn execute(&self, _request: &Request, _cancellation: &CancellationToken) -> Response {
        Response::new(self.status, "OK")
    }
}

#[tokio::test]
async fn test_pre_and_post_script_with_stub_executor() {
    init_test_env();
    let orchestrator = RequestOrchestrator::new(Arc::new(StubExecutor { status: 200 }));
    let request = Request::new("r1", HttpMethod::GET, "https://api.test/items")
        .with_pre_request_script("pm.environment.set('x','1')")
        .with_post_response_script(
            "pm.test('ok', ()=> pm.expect(pm.response.code).to.equal(200))",
        );

    let result = orchestrator
        .execute_request(&request, &VariableContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response.as_ref().unwrap().status_code, 200);
    assert_eq!(result.test_results.len(), 1);
    assert!(result.test_results[0].passed);
    assert!(!result.has_script_errors);
    assert_eq!(result.environment_updates["x"], "1");
    assert_eq!(result.stage, PipelineStage::Completed);
}

#[tokio::test]
async fn test_templated_request_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "title": "write tests",
            "completed": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = RequestOrchestrator::new(Arc::new(test_executor(5_000)));
    let request = Request::new("todo", HttpMethod::GET, "{{base}}/todos/{{id}}")
        .with_post_response_script(
            r#"
            const todo = pm.response.json();
            pm.test("status is 200", () => pm.response.to.have.status(200));
            pm.test("has title", () => pm.expect(todo).to.have.property("title"));
            pm.test("not done", () => pm.expect(todo.completed).to.be.false);
            pm.environment.set("lastTitle", todo.title);
            "#,
        );
    let context = VariableContext::from_environment(vars(&[("base", &server.uri()), ("id", "1")]));

    let result = orchestrator
        .execute_request(&request, &context, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.resolved_request.as_ref().unwrap().url,
        format!("{}/todos/1", server.uri())
    );
    assert_eq!(result.passed_tests(), 3, "{:?}", result.test_results);
    assert!(result.all_tests_passed());
    assert_eq!(result.environment_updates["lastTitle"], "write tests");
}

#[tokio::test]
async fn test_request_chaining_through_environment_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc123"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = InMemoryEnvironmentStore::new();
    store.save(Environment::with_variables("dev", vars(&[("base", &server.uri())])));
    let orchestrator = RequestOrchestrator::new(Arc::new(test_executor(5_000)));
    let token = CancellationToken::new();

    let login = Request::new("login", HttpMethod::POST, "{{base}}/login")
        .with_post_response_script("pm.environment.set('token', pm.response.json().token);");
    let env = store.get("dev").unwrap();
    let first = orchestrator
        .execute_request(&login, &VariableContext::from_environment(env.variables), &token)
        .await
        .unwrap();
    assert!(store.apply_updates("dev", &first.environment_updates));

    let me = Request::new("me", HttpMethod::GET, "{{base}}/me")
        .with_header("Authorization", "Bearer {{token}}")
        .with_post_response_script(
            "pm.test('name', () => pm.expect(pm.response.json().name).to.equal('ada'));",
        );
    let env = store.get("dev").unwrap();
    let second = orchestrator
        .execute_request(&me, &VariableContext::from_environment(env.variables), &token)
        .await
        .unwrap();

    assert_eq!(second.response.as_ref().unwrap().status_code, 200);
    assert!(second.all_tests_passed());
}

#[tokio::test]
async fn test_throw_error_policy_stops_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = RequestOrchestrator::new(Arc::new(test_executor(5_000))).with_options(
        PipelineOptions::default().with_policy(MissingVariablePolicy::ThrowError),
    );
    let request = Request::new("r", HttpMethod::GET, format!("{}/{{{{missing}}}}", server.uri()));

    let err = orchestrator
        .execute_request(&request, &VariableContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::Variable(VarError::VariableNotFound("missing".to_string()))
    );
}

#[tokio::test]
async fn test_vault_secrets_in_templates_and_scripts() {
    let server = MockServer::start().await;
    Mock::given(header("x-api-key", "s3cr3t"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let vault = Arc::new(InMemoryVault::unlocked_with([("apiKey", "s3cr3t")]));
    let context = VariableContext::new().with_vault(vault.clone());
    let orchestrator = RequestOrchestrator::new(Arc::new(test_executor(5_000)));
    let request = Request::new("r", HttpMethod::GET, server.uri())
        .with_header("X-Api-Key", "{{vault:apiKey}}")
        .with_pre_request_script("console.log(pm.vault.get('apiKey') !== null)");

    let unlocked = orchestrator
        .execute_request(&request, &context, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(unlocked.response.unwrap().status_code, 200);
    assert_eq!(unlocked.logs, vec!["true"]);

    vault.lock();
    let locked = orchestrator
        .execute_request(
            &request.clone().with_pre_request_script(
                "console.log(pm.vault.get('apiKey'), pm.vault.get(''), pm.vault.isUnlocked())",
            ),
            &context,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(locked.logs, vec!["null null false"]);
    assert!(!locked.has_script_errors);
    assert_eq!(
        locked.resolved_request.unwrap().headers[0].value,
        "{{vault:apiKey}}"
    );
    // the server only answers the real key
    assert_eq!(locked.response.unwrap().status_code, 404);
}

#[tokio::test]
async fn test_cancel_through_tracker() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let tracker = SharedRequestTracker::new();
    let orchestrator = RequestOrchestrator::new(Arc::new(test_executor(10_000)))
        .with_tracker(tracker.clone());
    let request = Request::new("r", HttpMethod::GET, format!("{}/slow", server.uri()))
        .with_post_response_script("console.log('unreachable')");

    let canceller = tracker.clone();
    tokio::spawn(async move {
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if canceller.cancel_most_recent().is_ok() {
                break;
            }
        }
    });

    let started = Instant::now();
    let result = orchestrator
        .execute_request(&request, &VariableContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(result.cancelled);
    assert!(result.errors.contains(&"Request cancelled".to_string()));
    assert!(result.logs.is_empty());
    assert_eq!(tracker.active_count().unwrap(), 0);
}

#[tokio::test]
async fn test_history_records_sanitized_outcomes() {
    let history = Arc::new(InMemoryHistory::new(2));
    let orchestrator = RequestOrchestrator::new(Arc::new(StubExecutor { status: 500 }))
        .with_history(history.clone());

    for i in 0..3 {
        let request = Request::new(format!("r{}", i), HttpMethod::GET, "https://api.test/x")
            .with_header("Authorization", "Bearer secret")
            .with_post_response_script("pm.test('2xx', () => pm.expect(pm.response.code).to.be.below(300));");
        orchestrator
            .execute_request(&request, &VariableContext::new(), &CancellationToken::new())
            .await
            .unwrap();
    }

    let entries = history.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].request.id, "r1");
    assert!(entries.iter().all(|e| e.request.headers.is_empty()));
    assert_eq!(filter_failures(&entries).len(), 2);
}
