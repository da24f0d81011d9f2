//! Static catalog of supported TTS providers.
//!
//! The registry is pure and stateless after construction: an ordered list of
//! provider descriptors plus a factory per provider that builds a configured
//! backend from stored settings. Presentation order is the registration
//! order and stable across calls.

use crate::tts::error::{Result, TtsError};
use crate::tts::google::GoogleTts;
use crate::tts::settings::SettingsStore;
use crate::tts::{SettingField, TtsProvider};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Static descriptor of a provider: identity plus configuration schema.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub fields: Vec<SettingField>,
}

/// Field values collected from the settings store for one provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    values: HashMap<String, String>,
}

impl ProviderConfig {
    /// Collect the values of a provider's schema fields from the store.
    pub fn from_store(store: &dyn SettingsStore, info: &ProviderInfo) -> Self {
        let mut values = HashMap::new();
        for field in &info.fields {
            if let Some(value) = store.get(&info.id, &field.key) {
                values.insert(field.key.clone(), value);
            }
        }
        Self { values }
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Get a configured value, treating empty strings as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

type ProviderFactory = Box<dyn Fn(&ProviderConfig) -> Result<Arc<dyn TtsProvider>> + Send + Sync>;

struct RegistryEntry {
    info: ProviderInfo,
    build: ProviderFactory,
}

/// Ordered catalog of providers with their construction functions.
pub struct ProviderRegistry {
    entries: Vec<RegistryEntry>,
}

impl ProviderRegistry {
    /// An empty registry; providers are added with [`Self::register`].
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// The registry of built-in providers.
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        registry.register(GoogleTts::provider_info(), |config| {
            Ok(Arc::new(GoogleTts::from_config(config)?) as Arc<dyn TtsProvider>)
        });
        registry
    }

    /// Append a provider to the catalog.
    pub fn register(
        &mut self,
        info: ProviderInfo,
        build: impl Fn(&ProviderConfig) -> Result<Arc<dyn TtsProvider>> + Send + Sync + 'static,
    ) {
        self.entries.push(RegistryEntry {
            info,
            build: Box::new(build),
        });
    }

    /// Provider descriptors in presentation order.
    pub fn list(&self) -> impl Iterator<Item = &ProviderInfo> {
        self.entries.iter().map(|entry| &entry.info)
    }

    /// Look up a provider descriptor by id.
    pub fn get(&self, id: &str) -> Option<&ProviderInfo> {
        self.entries
            .iter()
            .map(|entry| &entry.info)
            .find(|info| info.id == id)
    }

    /// Build a configured backend for a provider.
    pub fn build(&self, id: &str, config: &ProviderConfig) -> Result<Arc<dyn TtsProvider>> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.info.id == id)
            .ok_or_else(|| TtsError::UnknownProvider(id.to_string()))?;
        (entry.build)(config)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::SettingKind;

    #[test]
    fn test_default_registry_lists_google() {
        let registry = ProviderRegistry::with_default_providers();
        let infos: Vec<_> = registry.list().collect();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, "google_cloud");
        assert_eq!(infos[0].fields[0].kind, SettingKind::Password);

        assert!(registry.get("google_cloud").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_list_order_is_stable() {
        let registry = ProviderRegistry::with_default_providers();
        let first: Vec<String> = registry.list().map(|i| i.id.clone()).collect();
        let second: Vec<String> = registry.list().map(|i| i.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_unknown_provider() {
        let registry = ProviderRegistry::with_default_providers();
        assert!(matches!(
            registry.build("nope", &ProviderConfig::default()),
            Err(TtsError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_config_treats_empty_values_as_absent() {
        let config = ProviderConfig::from_pairs(&[("api_key", "")]);
        assert_eq!(config.get("api_key"), None);

        let config = ProviderConfig::from_pairs(&[("api_key", "k")]);
        assert_eq!(config.get("api_key"), Some("k"));
    }
}
