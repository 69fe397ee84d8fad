//! Secret vault access.
//!
//! The vault is an optional, lockable secret store. The pipeline only ever reads
//! from it, through the narrow [`VaultStore`] trait: `{{vault:name}}` templates in
//! the variable resolver and `pm.vault` inside scripts. Every read degrades to
//! `None` / empty when the vault is locked; nothing here returns an error.
//!
//! Encryption at rest is the concern of whatever backs the trait; the
//! [`InMemoryVault`] provided here keeps plain values in memory and is meant for
//! tests and embedding.

use crate::executor::CancellationToken;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// A named secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    /// Creates a secret with a fresh ID and current timestamps.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            value: value.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read access to a secret store.
///
/// Implementations must never panic or block indefinitely, and must return
/// `None` / an empty list while locked.
pub trait VaultStore: Send + Sync {
    /// Whether secrets can currently be read.
    fn is_unlocked(&self) -> bool;

    /// Looks up a secret value by name.
    fn get_secret_value(&self, name: &str, cancellation: &CancellationToken) -> Option<String>;

    /// Looks up the full secret record by name.
    fn get_by_name(&self, name: &str) -> Option<Secret>;

    /// Returns every secret, or an empty list while locked.
    fn get_all(&self) -> Vec<Secret>;
}

/// Lockable in-memory vault.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    secrets: DashMap<String, Secret>,
    unlocked: AtomicBool,
}

impl InMemoryVault {
    /// Creates an empty, locked vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unlocked vault holding the given name/value pairs.
    pub fn unlocked_with<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vault = Self::new();
        for (name, value) in secrets {
            vault.insert(Secret::new(name, value));
        }
        vault.unlock();
        vault
    }

    /// Adds or replaces a secret. Works while locked.
    pub fn insert(&self, secret: Secret) {
        self.secrets.insert(secret.name.clone(), secret);
    }

    pub fn remove(&self, name: &str) -> Option<Secret> {
        self.secrets.remove(name).map(|(_, secret)| secret)
    }

    pub fn lock(&self) {
        self.unlocked.store(false, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.unlocked.store(true, Ordering::SeqCst);
    }
}

impl VaultStore for InMemoryVault {
    fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    fn get_secret_value(&self, name: &str, cancellation: &CancellationToken) -> Option<String> {
        if cancellation.is_cancelled() {
            return None;
        }
        self.get_by_name(name).map(|secret| secret.value)
    }

    fn get_by_name(&self, name: &str) -> Option<Secret> {
        if !self.is_unlocked() {
            return None;
        }
        self.secrets.get(name).map(|entry| entry.value().clone())
    }

    fn get_all(&self) -> Vec<Secret> {
        if !self.is_unlocked() {
            return Vec::new();
        }
        let mut secrets: Vec<Secret> = self
            .secrets
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        secrets.sort_by(|a, b| a.name.cmp(&b.name));
        secrets
    }
}
