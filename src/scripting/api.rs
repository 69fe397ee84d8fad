//! Data handed to a script run: request and response projections, the
//! environment view and the read-only variable scopes.

use crate::models::{Request, Response};
use crate::vault::VaultStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Which side of the HTTP call a script runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptPhase {
    PreRequest,
    PostResponse,
}

impl ScriptPhase {
    /// Value exposed as `pm.info.eventName`.
    pub fn event_name(&self) -> &'static str {
        match self {
            ScriptPhase::PreRequest => "prerequest",
            ScriptPhase::PostResponse => "test",
        }
    }
}

/// Read/write view over environment variables.
///
/// Reads see initial values overlaid with in-run writes; writes land only in
/// the updates map, which becomes the run's environment diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentProxy {
    initial: HashMap<String, String>,
    updates: HashMap<String, String>,
}

impl EnvironmentProxy {
    pub fn new(initial: HashMap<String, String>) -> Self {
        Self {
            initial,
            updates: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.updates.get(key).or_else(|| self.initial.get(key))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.updates.insert(key.into(), value.into());
    }

    /// Clears a variable. It is recorded as an empty-string update.
    pub fn unset(&mut self, key: impl Into<String>) {
        self.updates.insert(key.into(), String::new());
    }

    pub fn has(&self, key: &str) -> bool {
        self.updates.contains_key(key) || self.initial.contains_key(key)
    }

    /// Merged view of all variables.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.initial
            .iter()
            .chain(self.updates.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn updates(&self) -> &HashMap<String, String> {
        &self.updates
    }

    pub fn into_updates(self) -> HashMap<String, String> {
        self.updates
    }
}

/// Body as scripts see it (`pm.request.body`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyView {
    pub mode: String,
    pub raw: String,
}

/// Projection of the request exposed as `pm.request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
    pub id: String,
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyView>,
}

impl RequestView {
    pub fn from_request(request: &Request) -> Self {
        let body = request.body.raw_content().map(|raw| BodyView {
            mode: request.body.mode().to_string(),
            raw,
        });
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            url: request.url.clone(),
            method: request.method.as_str().to_ascii_uppercase(),
            headers: header_object(
                request
                    .enabled_headers()
                    .map(|p| (p.key.as_str(), p.value.as_str())),
            ),
            body,
        }
    }
}

/// Projection of the response exposed as `pm.response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    pub code: u16,
    pub status: String,
    /// Milliseconds.
    pub response_time: u64,
    pub response_size: usize,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseView {
    pub fn from_response(response: &Response) -> Self {
        let body = match &response.text {
            Some(text) => text.clone(),
            None => String::from_utf8_lossy(&response.body).into_owned(),
        };
        Self {
            code: response.status_code,
            status: response.status_text.clone(),
            response_time: response.elapsed.as_millis() as u64,
            response_size: response.size,
            headers: header_object(
                response
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            ),
            body,
            error: response.error.clone(),
        }
    }
}

/// Folds header pairs into an object; repeated names are joined with ", ".
fn header_object<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in pairs {
        headers
            .entry(name.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Everything a single script run can see.
#[derive(Clone)]
pub struct ScriptContext {
    pub phase: ScriptPhase,
    pub request: RequestView,
    /// Present only for post-response runs.
    pub response: Option<ResponseView>,
    pub environment: HashMap<String, String>,
    pub collection_variables: HashMap<String, String>,
    pub globals: HashMap<String, String>,
    pub vault: Option<Arc<dyn VaultStore>>,
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("phase", &self.phase)
            .field("request", &self.request)
            .field("response", &self.response)
            .field("environment", &self.environment)
            .field("collection_variables", &self.collection_variables)
            .field("globals", &self.globals)
            .field("vault", &self.vault.as_ref().map(|_| "<vault>"))
            .finish()
    }
}

impl ScriptContext {
    /// Context for a pre-request run; `pm.response` is undefined.
    pub fn pre_request(request: &Request, environment: HashMap<String, String>) -> Self {
        Self {
            phase: ScriptPhase::PreRequest,
            request: RequestView::from_request(request),
            response: None,
            environment,
            collection_variables: HashMap::new(),
            globals: HashMap::new(),
            vault: None,
        }
    }

    pub fn post_response(
        request: &Request,
        response: &Response,
        environment: HashMap<String, String>,
    ) -> Self {
        Self {
            phase: ScriptPhase::PostResponse,
            response: Some(ResponseView::from_response(response)),
            ..Self::pre_request(request, environment)
        }
    }

    pub fn with_collection_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.collection_variables = variables;
        self
    }

    pub fn with_globals(mut self, globals: HashMap<String, String>) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_vault(mut self, vault: Option<Arc<dyn VaultStore>>) -> Self {
        self.vault = vault;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, KeyValuePair, RequestBody};
    use std::time::Duration;

    #[test]
    fn test_environment_proxy_updates_win() {
        let mut initial = HashMap::new();
        initial.insert("a".to_string(), "1".to_string());
        let mut proxy = EnvironmentProxy::new(initial);

        assert_eq!(proxy.get("a").map(String::as_str), Some("1"));
        proxy.set("a", "2");
        proxy.set("b", "3");
        assert_eq!(proxy.get("a").map(String::as_str), Some("2"));
        assert!(proxy.has("b"));
        assert_eq!(proxy.updates().len(), 2);
    }

    #[test]
    fn test_environment_proxy_unset() {
        let mut initial = HashMap::new();
        initial.insert("token".to_string(), "abc".to_string());
        let mut proxy = EnvironmentProxy::new(initial);
        proxy.unset("token");

        assert_eq!(proxy.get("token").map(String::as_str), Some(""));
        assert_eq!(proxy.into_updates().get("token").map(String::as_str), Some(""));
    }

    #[test]
    fn test_request_view() {
        let mut request = Request::new("r1", HttpMethod::POST, "https://api.test/x")
            .with_name("Create")
            .with_header("Accept", "application/json")
            .with_body(RequestBody::Json {
                content: "{}".to_string(),
            });
        request.headers.push(KeyValuePair::disabled("X-Off", "1"));

        let view = RequestView::from_request(&request);
        assert_eq!(view.method, "POST");
        assert_eq!(view.name, "Create");
        assert_eq!(view.headers.len(), 1);
        assert_eq!(
            view.body,
            Some(BodyView {
                mode: "json".to_string(),
                raw: "{}".to_string()
            })
        );
    }

    #[test]
    fn test_request_view_without_body() {
        let request = Request::new("r1", HttpMethod::GET, "https://api.test/x");
        assert!(RequestView::from_request(&request).body.is_none());
    }

    #[test]
    fn test_response_view_joins_repeated_headers() {
        let mut response = Response::new(200, "OK");
        response.add_header("Set-Cookie", "a=1");
        response.add_header("Set-Cookie", "b=2");
        response.set_body(b"hello".to_vec());
        response.elapsed = Duration::from_millis(42);

        let view = ResponseView::from_response(&response);
        assert_eq!(view.code, 200);
        assert_eq!(view.response_time, 42);
        assert_eq!(view.body, "hello");
        assert_eq!(view.headers["Set-Cookie"], "a=1, b=2");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["responseTime"], 42);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_phase_event_names() {
        assert_eq!(ScriptPhase::PreRequest.event_name(), "prerequest");
        assert_eq!(ScriptPhase::PostResponse.event_name(), "test");
    }
}
