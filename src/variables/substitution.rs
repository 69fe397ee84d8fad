//! Variable substitution engine.
//!
//! This module replaces `{{variable}}` patterns in request text with values from
//! the scoped variable sources of a [`VariableContext`]. Substitution is a single
//! pass: a substituted value is never scanned again, so a value that itself looks
//! like `{{other}}` ends up in the output verbatim.

use super::system::resolve_dynamic_variable;
use crate::executor::CancellationToken;
use crate::vault::VaultStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Cached regex pattern for matching {{variableName}} with optional whitespace.
static VARIABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("Failed to compile variable regex"));

const VAULT_PREFIX: &str = "vault:";
const GLOBAL_PREFIX: &str = "$global.";
const COLLECTION_PREFIX: &str = "$collection.";

/// Errors that can occur during variable resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarError {
    /// No scope had a value for the variable and the policy is `ThrowError`.
    VariableNotFound(String),
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarError::VariableNotFound(name) => write!(f, "Variable not found: {}", name),
        }
    }
}

impl std::error::Error for VarError {}

/// What to do with a template that no scope can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingVariablePolicy {
    /// Keep the `{{name}}` text unchanged.
    #[default]
    LeaveAsIs,
    /// Substitute an empty string.
    ReplaceWithEmpty,
    /// Abort resolution with [`VarError::VariableNotFound`].
    ThrowError,
}

/// Context for variable resolution containing all available variable sources
#[derive(Clone, Default)]
pub struct VariableContext {
    /// Active environment variables (highest precedence)
    pub environment: HashMap<String, String>,

    /// Collection-level variables
    pub collection: HashMap<String, String>,

    /// Global variables (lowest precedence)
    pub global: HashMap<String, String>,

    /// Secret store consulted only by `{{vault:name}}`
    pub vault: Option<Arc<dyn VaultStore>>,

    /// Passed to vault reads; a cancelled token leaves vault templates unresolved.
    pub cancellation: CancellationToken,
}

impl fmt::Debug for VariableContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableContext")
            .field("environment", &self.environment)
            .field("collection", &self.collection)
            .field("global", &self.global)
            .field("vault", &self.vault.as_ref().map(|v| v.is_unlocked()))
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

impl VariableContext {
    /// Creates an empty VariableContext.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with only environment variables.
    pub fn from_environment(environment: HashMap<String, String>) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    pub fn with_collection(mut self, collection: HashMap<String, String>) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_global(mut self, global: HashMap<String, String>) -> Self {
        self.global = global;
        self
    }

    pub fn with_vault(mut self, vault: Arc<dyn VaultStore>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Resolves a template name to its value.
    ///
    /// Lookup order:
    /// 1. `vault:name` - vault only (unresolved if locked or absent)
    /// 2. `$global.name` / `$collection.name` - the pinned scope only
    /// 3. `$name` - dynamic variables
    /// 4. environment, then collection, then global
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(secret_name) = name.strip_prefix(VAULT_PREFIX) {
            return self.lookup_vault(secret_name.trim());
        }

        if let Some(key) = name.strip_prefix(GLOBAL_PREFIX) {
            return self.global.get(key).cloned();
        }

        if let Some(key) = name.strip_prefix(COLLECTION_PREFIX) {
            return self.collection.get(key).cloned();
        }

        if let Some(dynamic) = name.strip_prefix('$') {
            return resolve_dynamic_variable(dynamic);
        }

        self.environment
            .get(name)
            .or_else(|| self.collection.get(name))
            .or_else(|| self.global.get(name))
            .cloned()
    }

    fn lookup_vault(&self, name: &str) -> Option<String> {
        let vault = self.vault.as_ref()?;
        if !vault.is_unlocked() {
            return None;
        }
        vault.get_secret_value(name, &self.cancellation)
    }
}

/// Substitutes all `{{variable}}` patterns in `text` in a single pass.
///
/// # Arguments
///
/// * `text` - The input text containing {{variable}} patterns
/// * `context` - The scoped variable sources
/// * `policy` - Behaviour for templates no scope can resolve
///
/// # Returns
///
/// The substituted text, or `VarError::VariableNotFound` under
/// `MissingVariablePolicy::ThrowError`.
///
/// # Examples
///
/// ```
/// use rest_runner::variables::{resolve, MissingVariablePolicy, VariableContext};
/// use std::collections::HashMap;
///
/// let mut env = HashMap::new();
/// env.insert("base".to_string(), "https://x".to_string());
/// env.insert("id".to_string(), "1".to_string());
/// let context = VariableContext::from_environment(env);
///
/// let url = resolve("{{base}}/todos/{{id}}", &context, MissingVariablePolicy::LeaveAsIs).unwrap();
/// assert_eq!(url, "https://x/todos/1");
/// ```
pub fn resolve(
    text: &str,
    context: &VariableContext,
    policy: MissingVariablePolicy,
) -> Result<String, VarError> {
    // Fast path: if there are no variable markers at all, return original text
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let mut result = String::with_capacity(text.len() + (text.len() / 4));
    let mut last_match_end = 0;

    for cap in VARIABLE_REGEX.captures_iter(text) {
        let (full_match, name) = match (cap.get(0), cap.get(1)) {
            (Some(full), Some(name)) => (full, name.as_str().trim()),
            _ => continue,
        };

        result.push_str(&text[last_match_end..full_match.start()]);

        match context.lookup(name) {
            Some(value) => result.push_str(&value),
            None => match policy {
                MissingVariablePolicy::LeaveAsIs => result.push_str(full_match.as_str()),
                MissingVariablePolicy::ReplaceWithEmpty => {}
                MissingVariablePolicy::ThrowError => {
                    return Err(VarError::VariableNotFound(name.to_string()))
                }
            },
        }

        last_match_end = full_match.end();
    }

    result.push_str(&text[last_match_end..]);
    Ok(result)
}

/// Lists the template names referenced in `text`, in order of appearance,
/// without duplicates.
pub fn find_variable_references(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in VARIABLE_REGEX.captures_iter(text) {
        if let Some(name) = cap.get(1) {
            let name = name.as_str().trim().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
