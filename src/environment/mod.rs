//! Environment storage.
//!
//! Durable storage of environments is owned by the host application; the
//! pipeline only needs the read/write shape captured by [`EnvironmentStore`].
//! Orchestrations never write to a store themselves: they return the variable
//! diff produced by scripts and the caller decides whether to persist it, which
//! keeps concurrent runs over the same environment from racing.
//!
//! # Example
//!
//! ```
//! use rest_runner::environment::{Environment, EnvironmentStore, InMemoryEnvironmentStore};
//! use std::collections::HashMap;
//!
//! let store = InMemoryEnvironmentStore::new();
//! store.save(Environment::new("dev"));
//!
//! let mut updates = HashMap::new();
//! updates.insert("token".to_string(), "abc".to_string());
//! store.apply_updates("dev", &updates);
//!
//! assert_eq!(store.get("dev").unwrap().get("token"), Some(&"abc".to_string()));
//! ```

pub mod models;

pub use models::Environment;

use dashmap::DashMap;
use std::collections::HashMap;

/// Read/write access to persisted environments.
pub trait EnvironmentStore: Send + Sync {
    /// Gets an environment by name.
    fn get(&self, name: &str) -> Option<Environment>;

    /// Inserts or replaces an environment.
    fn save(&self, environment: Environment);

    /// Lists all environment names, sorted.
    fn list(&self) -> Vec<String>;

    /// Merges script updates into a stored environment.
    ///
    /// # Returns
    ///
    /// `false` if no environment with that name exists.
    fn apply_updates(&self, name: &str, updates: &HashMap<String, String>) -> bool {
        match self.get(name) {
            Some(mut environment) => {
                environment.apply_updates(updates);
                self.save(environment);
                true
            }
            None => false,
        }
    }
}

/// Environment store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryEnvironmentStore {
    environments: DashMap<String, Environment>,
}

impl InMemoryEnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnvironmentStore for InMemoryEnvironmentStore {
    fn get(&self, name: &str) -> Option<Environment> {
        self.environments.get(name).map(|e| e.value().clone())
    }

    fn save(&self, environment: Environment) {
        self.environments
            .insert(environment.name.clone(), environment);
    }

    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.environments.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_get() {
        let store = InMemoryEnvironmentStore::new();
        let mut env = Environment::new("staging");
        env.set("host", "staging.example.com");
        store.save(env);

        let loaded = store.get("staging").unwrap();
        assert_eq!(loaded.get("host"), Some(&"staging.example.com".to_string()));
        assert!(store.get("prod").is_none());
    }

    #[test]
    fn test_list_sorted() {
        let store = InMemoryEnvironmentStore::new();
        store.save(Environment::new("prod"));
        store.save(Environment::new("dev"));
        assert_eq!(store.list(), vec!["dev", "prod"]);
    }

    #[test]
    fn test_apply_updates_missing_environment() {
        let store = InMemoryEnvironmentStore::new();
        assert!(!store.apply_updates("nope", &HashMap::new()));
    }
}
