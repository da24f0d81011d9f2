//! Per-provider voice cache with stale-fetch cancellation.
//!
//! The cache holds at most one provider's voice list. Every fetch is tagged
//! with an epoch taken when it starts; beginning a new fetch (or resetting)
//! advances the epoch, so a fetch that completes after it has been
//! superseded commits nothing and its result is discarded. A successful
//! current fetch replaces the cached list in one assignment under the lock,
//! so readers never observe a partially populated list.

use crate::tts::error::ProviderError;
use crate::tts::{TtsProvider, Voice};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct CacheState {
    provider_id: Option<String>,
    voices: Vec<Voice>,
}

/// Token identifying one fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchToken {
    epoch: u64,
    provider_id: String,
}

/// Cached voice list for the currently selected provider.
#[derive(Default)]
pub struct VoiceCatalogCache {
    state: Mutex<CacheState>,
    epoch: AtomicU64,
}

impl VoiceCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch for a provider, invalidating any fetch still in flight
    /// and clearing the cache.
    pub fn begin_fetch(&self, provider_id: &str) -> FetchToken {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        state.provider_id = Some(provider_id.to_string());
        state.voices = Vec::new();
        debug!("voice fetch {} started for {}", epoch, provider_id);
        FetchToken {
            epoch,
            provider_id: provider_id.to_string(),
        }
    }

    /// Whether a token still identifies the latest fetch.
    pub fn is_current(&self, token: &FetchToken) -> bool {
        self.epoch.load(Ordering::SeqCst) == token.epoch
    }

    /// Run a fetch against the provider backend.
    ///
    /// Returns `Ok(Some(voices))` when this fetch is still current and its
    /// result was committed, `Ok(None)` when it was superseded mid-flight
    /// (the result is discarded, whatever it was), and the provider error
    /// when the current fetch failed.
    pub async fn run_fetch(
        &self,
        token: &FetchToken,
        provider: Arc<dyn TtsProvider>,
    ) -> Result<Option<Vec<Voice>>, ProviderError> {
        let result = provider.list_voices().await;

        if !self.is_current(token) {
            debug!("voice fetch {} superseded, result discarded", token.epoch);
            return Ok(None);
        }

        match result {
            Ok(voices) => {
                let mut state = self.state.lock();
                state.provider_id = Some(token.provider_id.clone());
                state.voices = voices.clone();
                info!("cached {} voices for {}", voices.len(), token.provider_id);
                Ok(Some(voices))
            },
            Err(err) => {
                let mut state = self.state.lock();
                state.voices = Vec::new();
                Err(err)
            },
        }
    }

    /// Fetch and cache the voice list for a provider.
    pub async fn fetch_voices(
        &self,
        provider_id: &str,
        provider: Arc<dyn TtsProvider>,
    ) -> Result<Option<Vec<Voice>>, ProviderError> {
        let token = self.begin_fetch(provider_id);
        self.run_fetch(&token, provider).await
    }

    /// Snapshot of the cached voices.
    pub fn voices(&self) -> Vec<Voice> {
        self.state.lock().voices.clone()
    }

    /// Provider whose voices are cached (or being fetched).
    pub fn provider_id(&self) -> Option<String> {
        self.state.lock().provider_id.clone()
    }

    /// Invalidate any in-flight fetch and clear the cache.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.provider_id = None;
        state.voices = Vec::new();
    }
}
