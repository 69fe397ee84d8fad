//! Script runner behaviour through the public API.

use super::{init_test_env, vars};
use rest_runner::executor::CancellationToken;
use rest_runner::models::{HttpMethod, Request, Response};
use rest_runner::scripting::{ScriptContext, ScriptLimits, ScriptRunner};
use std::collections::HashMap;
use std::time::{Duration, Instant};

fn request() -> Request {
    Request::new("r1", HttpMethod::POST, "https://api.test/orders")
        .with_name("Create order")
        .with_header("Content-Type", "application/json")
}

fn json_response(status: u16, body: &str) -> Response {
    let mut response = Response::new(status, "OK");
    response.add_header("Content-Type", "application/json");
    response.set_body(body.as_bytes().to_vec());
    response
}

#[tokio::test]
async fn test_empty_script_is_trivial_success() {
    init_test_env();
    let runner = ScriptRunner::default();
    let context = ScriptContext::pre_request(&request(), HashMap::new());
    let result = runner
        .run_pre_request(" \n\t ", context, &CancellationToken::new())
        .await;

    assert!(result.success);
    assert!(result.logs.is_empty());
    assert!(result.errors.is_empty());
    assert!(result.test_results.is_empty());
    assert_eq!(result.duration, Duration::ZERO);
}

#[tokio::test]
async fn test_two_tests_in_call_order() {
    let runner = ScriptRunner::default();
    let context = ScriptContext::post_response(&request(), &json_response(200, "{}"), HashMap::new());
    let result = runner
        .run_post_response(
            r#"
            pm.test("one equals one", () => pm.expect(1).to.equal(1));
            pm.test("one equals two", () => pm.expect(1).to.equal(2));
            "#,
            context,
            &CancellationToken::new(),
        )
        .await;

    assert!(result.success);
    let outcomes: Vec<bool> = result.test_results.iter().map(|t| t.passed).collect();
    assert_eq!(outcomes, vec![true, false]);
    assert_eq!(
        result.test_results[1].error.as_deref(),
        Some("expected 1 to equal 2")
    );
}

#[tokio::test]
async fn test_environment_round_trip() {
    let runner = ScriptRunner::default();
    let context = ScriptContext::pre_request(&request(), vars(&[("existing", "yes")]));
    let result = runner
        .run_pre_request(
            r#"
            pm.environment.set('token', 'abc123');
            console.log(pm.environment.get('token'), pm.environment.get('existing'));
            "#,
            context,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.logs, vec!["abc123 yes"]);
    assert_eq!(result.environment_updates, vars(&[("token", "abc123")]));
}

#[tokio::test]
async fn test_infinite_loop_is_bounded_repeatedly() {
    let runner = ScriptRunner::new(ScriptLimits::default().with_timeout(Duration::from_millis(100)));
    for _ in 0..10 {
        let context = ScriptContext::pre_request(&request(), HashMap::new());
        let started = Instant::now();
        let result = runner
            .run_pre_request("while(true){}", context, &CancellationToken::new())
            .await;

        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }
}

#[tokio::test]
async fn test_request_and_response_views() {
    let runner = ScriptRunner::default();
    let context = ScriptContext::post_response(
        &request(),
        &json_response(201, r#"{"orderId": 42, "items": [1, 2]}"#),
        HashMap::new(),
    )
    .with_collection_variables(vars(&[("region", "eu")]))
    .with_globals(vars(&[("region", "global"), ("tenant", "acme")]));

    let result = runner
        .run_post_response(
            r#"
            pm.test("created", () => pm.response.to.have.status(201));
            pm.test("payload", () => {
                const body = pm.response.json();
                pm.expect(body.orderId).to.be.a("number");
            });
            pm.test("items", () => pm.expect(pm.response.json().items).to.have.length(2));
            pm.test("header", () => pm.expect(pm.response.headers["Content-Type"]).to.include("json"));
            console.log(pm.request.method, pm.request.name, pm.info.eventName);
            console.log(pm.variables.get("region"), pm.variables.get("tenant"));
            "#,
            context,
            &CancellationToken::new(),
        )
        .await;

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.logs, vec!["POST Create order test", "eu acme"]);
    assert_eq!(result.passed_tests(), 4, "{:?}", result.test_results);
}

#[tokio::test]
async fn test_negation_and_flags() {
    let runner = ScriptRunner::default();
    let context = ScriptContext::post_response(&request(), &json_response(200, "[]"), HashMap::new());
    let result = runner
        .run_post_response(
            r#"
            pm.test("not equal", () => pm.expect(1).to.not.equal(2));
            pm.test("empty", () => pm.expect(pm.response.json()).to.be.empty);
            pm.test("ok call", () => pm.expect("x").to.be.ok());
            pm.test("one of", () => pm.expect(pm.response.code).to.be.oneOf([200, 201]));
            pm.test("negated include", () => pm.expect("abc").to.not.include("b"));
            "#,
            context,
            &CancellationToken::new(),
        )
        .await;

    let outcomes: Vec<bool> = result.test_results.iter().map(|t| t.passed).collect();
    assert_eq!(outcomes, vec![true, true, true, true, false]);
    assert_eq!(
        result.test_results[4].error.as_deref(),
        Some("expected 'abc' to not include 'b'")
    );
}

#[tokio::test]
async fn test_uncaught_assertion_fails_script() {
    let runner = ScriptRunner::default();
    let context = ScriptContext::pre_request(&request(), HashMap::new());
    let result = runner
        .run_pre_request(
            "console.log('before'); pm.expect(1).to.equal(2); console.log('after');",
            context,
            &CancellationToken::new(),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.logs, vec!["before"]);
    assert_eq!(result.errors, vec!["AssertionError: expected 1 to equal 2"]);
}

#[tokio::test]
async fn test_runaway_recursion_is_contained() {
    let runner = ScriptRunner::default();
    let context = ScriptContext::pre_request(&request(), HashMap::new());
    let result = runner
        .run_pre_request(
            "function f(n) { return f(n + 1) + 1; } f(0);",
            context,
            &CancellationToken::new(),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.errors, vec!["Maximum recursion depth exceeded"]);
}
