//! Environment data models.
//!
//! An environment is a named set of variables (e.g. "dev", "staging") used as
//! the highest-precedence scope during variable resolution and exposed to
//! scripts through `pm.environment`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a single environment with its variables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    /// Environment name (e.g., "dev", "staging", "production")
    pub name: String,

    /// Variable key-value pairs for this environment
    #[serde(default)]
    pub variables: HashMap<String, String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Environment {
    /// Creates a new environment with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_variables(name, HashMap::new())
    }

    /// Creates a new environment with name and variables
    pub fn with_variables(name: impl Into<String>, variables: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            variables,
            created_at: now,
            updated_at: now,
        }
    }

    /// Gets a variable value by name
    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Sets a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
        self.updated_at = Utc::now();
    }

    /// Checks if a variable exists
    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Returns the number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Checks if the environment has no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Applies a set of script-produced updates.
    ///
    /// Updates overwrite existing values. An empty-string value is stored as-is,
    /// which is how `pm.environment.unset` is represented.
    ///
    /// # Returns
    ///
    /// The number of variables whose value actually changed.
    pub fn apply_updates(&mut self, updates: &HashMap<String, String>) -> usize {
        let mut changed = 0;
        for (key, value) in updates {
            if self.variables.get(key) != Some(value) {
                self.variables.insert(key.clone(), value.clone());
                changed += 1;
            }
        }
        if changed > 0 {
            self.updated_at = Utc::now();
        }
        changed
    }
}
