//! Text-to-speech provider orchestration.
//!
//! Providers are opaque backends behind the [`TtsProvider`] trait: they
//! enumerate voices and synthesize speech, asynchronously, and may fail with
//! a [`ProviderError`]. Everything provider-specific (transport, auth, wire
//! schema) stays inside the backend; the service layer only sees the
//! normalized [`Voice`] and [`AudioClip`] models and the declarative
//! configuration schema rendered by the presentation layer.

pub mod catalog;
pub mod controller;
pub mod error;
pub mod google;
pub mod registry;
pub mod settings;
pub mod ssml;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use catalog::VoiceCatalogCache;
pub use controller::{ControllerEvent, GenerationController};
pub use error::{ProviderError, Result, TtsError};
pub use registry::{ProviderConfig, ProviderInfo, ProviderRegistry};
pub use settings::{MemorySettingsStore, SettingsStore};

/// A voice offered by a provider, scoped to that provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language_code: String,
    pub gender: String,
}

/// Synthesized audio held in memory between generation and embedding or
/// playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Kind of a provider configuration field, interpreted uniformly by the
/// presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Text,
    Password,
}

/// One field of a provider's configuration schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingField {
    pub key: String,
    pub label: String,
    pub kind: SettingKind,
    pub placeholder: String,
}

impl SettingField {
    pub fn new(key: &str, label: &str, kind: SettingKind, placeholder: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            placeholder: placeholder.to_string(),
        }
    }
}

/// Observable state of the generation controller.
///
/// Exactly one state is active at any time; every transition is emitted as a
/// [`ControllerEvent::StateChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    FetchingVoices,
    Generating,
    Playing,
    Error(String),
}

/// Contract every TTS backend implements.
///
/// Both operations perform network I/O and may suspend; neither is ever
/// called while another controller operation is in flight.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Enumerate the voices this provider offers.
    async fn list_voices(&self) -> std::result::Result<Vec<Voice>, ProviderError>;

    /// Synthesize speech for the given text and voice.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        language_code: &str,
    ) -> std::result::Result<AudioClip, ProviderError>;
}
