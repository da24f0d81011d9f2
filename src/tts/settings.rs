//! Settings storage contract.
//!
//! Provider credentials and options are persisted by the embedding
//! application, keyed by provider id and field key. The service layer only
//! consumes this get/set contract and never persists anything itself.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Key-value store for provider configuration, keyed by provider + field.
pub trait SettingsStore: Send + Sync {
    fn get(&self, provider_id: &str, key: &str) -> Option<String>;
    fn set(&self, provider_id: &str, key: &str, value: &str);
}

/// In-memory settings store, for tests and headless use.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, provider_id: &str, key: &str) -> Option<String> {
        self.values
            .read()
            .get(&(provider_id.to_string(), key.to_string()))
            .cloned()
    }

    fn set(&self, provider_id: &str, key: &str, value: &str) {
        self.values.write().insert(
            (provider_id.to_string(), key.to_string()),
            value.to_string(),
        );
    }
}
