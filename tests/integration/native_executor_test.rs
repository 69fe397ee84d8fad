//! ReqwestExecutor against a local mock server.

use super::test_executor;
use rest_runner::executor::{CancellationToken, ExecutionConfig, RequestExecutor, ReqwestExecutor};
use rest_runner::models::{ApiKeyLocation, AuthConfig, HttpMethod, KeyValuePair, Request, RequestBody};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_with_query_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .and(header("x-trace", "abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_json(json!({"users": ["ada"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut request = Request::new("r1", HttpMethod::GET, format!("{}/users", server.uri()))
        .with_query_param("page", "2")
        .with_header("X-Trace", "abc");
    request.headers.push(KeyValuePair::disabled("X-Skip", "1"));
    request
        .query_params
        .push(KeyValuePair::disabled("skip", "1"));

    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;

    assert_eq!(response.status_code, 200);
    assert!(response.error.is_none());
    assert_eq!(response.json().unwrap()["users"][0], "ada");
    assert_eq!(response.header("Content-Type"), Some("application/json"));
}

#[tokio::test]
async fn test_json_body_sets_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"name":"pen"}"#))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new("r1", HttpMethod::POST, format!("{}/items", server.uri()))
        .with_body(RequestBody::Json {
            content: r#"{"name":"pen"}"#.to_string(),
        });

    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;
    assert_eq!(response.status_code, 201);
}

#[tokio::test]
async fn test_urlencoded_and_multipart_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string("a=1&b=two+words"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"field\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let executor = test_executor(5_000);
    let urlencoded = Request::new("r1", HttpMethod::POST, format!("{}/form", server.uri()))
        .with_body(RequestBody::UrlEncoded {
            fields: vec![
                KeyValuePair::new("a", "1"),
                KeyValuePair::new("b", "two words"),
                KeyValuePair::disabled("c", "3"),
            ],
        });
    let multipart = Request::new("r2", HttpMethod::POST, format!("{}/upload", server.uri()))
        .with_body(RequestBody::FormData {
            fields: vec![KeyValuePair::new("field", "value")],
        });

    let token = CancellationToken::new();
    assert_eq!(executor.execute(&urlencoded, &token).await.status_code, 200);
    assert_eq!(executor.execute(&multipart, &token).await.status_code, 200);
}

#[tokio::test]
async fn test_static_auth_modes() {
    let server = MockServer::start().await;
    Mock::given(path("/basic"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/bearer"))
        .and(header("authorization", "Bearer t0k"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/key-header"))
        .and(header("x-api-key", "k1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/key-query"))
        .and(query_param("api_key", "k2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let executor = test_executor(5_000);
    let token = CancellationToken::new();
    let cases = vec![
        (
            "/basic",
            AuthConfig::Basic {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        ),
        (
            "/bearer",
            AuthConfig::Bearer {
                token: "t0k".to_string(),
            },
        ),
        (
            "/key-header",
            AuthConfig::ApiKey {
                key: "X-Api-Key".to_string(),
                value: "k1".to_string(),
                location: ApiKeyLocation::Header,
            },
        ),
        (
            "/key-query",
            AuthConfig::ApiKey {
                key: "api_key".to_string(),
                value: "k2".to_string(),
                location: ApiKeyLocation::Query,
            },
        ),
    ];

    for (route, auth) in cases {
        let request = Request::new("r", HttpMethod::GET, format!("{}{}", server.uri(), route))
            .with_auth(auth);
        let response = executor.execute(&request, &token).await;
        assert_eq!(response.status_code, 200, "auth for {}", route);
    }
}

#[tokio::test]
async fn test_explicit_authorization_header_wins() {
    let server = MockServer::start().await;
    Mock::given(header("authorization", "Custom xyz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new("r", HttpMethod::GET, server.uri())
        .with_header("Authorization", "Custom xyz")
        .with_auth(AuthConfig::Bearer {
            token: "ignored".to_string(),
        });

    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_oauth2_client_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh", "token_type": "Bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new("r", HttpMethod::GET, format!("{}/secure", server.uri())).with_auth(
        AuthConfig::OAuth2ClientCredentials {
            token_url: format!("{}/token", server.uri()),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scope: None,
        },
    );

    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_oauth2_token_failure_is_error_response() {
    let server = MockServer::start().await;
    Mock::given(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let request = Request::new("r", HttpMethod::GET, format!("{}/secure", server.uri())).with_auth(
        AuthConfig::OAuth2ClientCredentials {
            token_url: format!("{}/token", server.uri()),
            client_id: "id".to_string(),
            client_secret: "wrong".to_string(),
            scope: Some("read".to_string()),
        },
    );

    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;
    assert_eq!(response.status_code, 0);
    assert!(response
        .error
        .as_deref()
        .unwrap()
        .starts_with("Authentication error"));
}

#[tokio::test]
async fn test_http_error_status_is_not_transport_error() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;

    let request = Request::new("r", HttpMethod::GET, format!("{}/missing", server.uri()));
    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;

    assert_eq!(response.status_code, 404);
    assert!(response.is_client_error());
    assert!(response.error.is_none());
    assert_eq!(response.text.as_deref(), Some("nope"));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let request =
        Request::new("r", HttpMethod::GET, format!("{}/slow", server.uri())).with_timeout_ms(100);
    let response = test_executor(5_000)
        .execute(&request, &CancellationToken::new())
        .await;

    assert_eq!(response.status_code, 0);
    assert_eq!(response.error.as_deref(), Some("Request timed out"));
}

#[tokio::test]
async fn test_cancel_in_flight() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let request = Request::new("r", HttpMethod::GET, format!("{}/slow", server.uri()));
    let started = Instant::now();
    let response = test_executor(10_000).execute(&request, &token).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(response.status_code, 0);
    assert_eq!(response.error.as_deref(), Some("Request cancelled"));
}

#[tokio::test]
async fn test_redirects_can_be_disabled() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let request = Request::new("r", HttpMethod::GET, format!("{}/old", server.uri()));
    let token = CancellationToken::new();

    let following = test_executor(5_000).execute(&request, &token).await;
    assert_eq!(following.status_code, 200);

    let mut config = ExecutionConfig::new(5_000);
    config.follow_redirects = false;
    let executor = ReqwestExecutor::new(config).unwrap();
    let not_following = executor.execute(&request, &token).await;
    assert_eq!(not_following.status_code, 302);
    assert!(not_following.is_redirect());
}

#[tokio::test]
async fn test_default_headers_do_not_override_request() {
    let server = MockServer::start().await;
    Mock::given(header("user-agent", "custom/1.0"))
        .and(header("x-team", "qa"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ExecutionConfig::new(5_000);
    config
        .default_headers
        .insert("X-Team".to_string(), "qa".to_string());
    let executor = ReqwestExecutor::new(config).unwrap();

    let request =
        Request::new("r", HttpMethod::GET, server.uri()).with_header("User-Agent", "custom/1.0");
    let response = executor.execute(&request, &CancellationToken::new()).await;
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_connection_refused_is_error_response() {
    let request = Request::new("r", HttpMethod::GET, "http://127.0.0.1:1/");
    let response = test_executor(2_000)
        .execute(&request, &CancellationToken::new())
        .await;

    assert_eq!(response.status_code, 0);
    assert!(response.is_error());
    assert!(response.error.is_some());
}
