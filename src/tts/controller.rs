//! Generation controller: the single-flight state machine over provider
//! operations and playback.
//!
//! One controller exists per editing session. All transitions happen under
//! one lock and are emitted as events before the lock is released, so
//! subscribers observe them in application order. Requests arriving outside
//! `Idle` are rejected immediately with a typed error - never queued,
//! never silently dropped. The only exception is `select_provider`, which is
//! also accepted from `FetchingVoices` (superseding the stale fetch) and
//! from `Error` (recovery).
//!
//! Network awaits happen outside the lock; an in-flight generation is never
//! cancelled, while a superseded voice fetch commits nothing.

use crate::tts::catalog::VoiceCatalogCache;
use crate::tts::error::{Result, TtsError};
use crate::tts::registry::{ProviderConfig, ProviderRegistry};
use crate::tts::settings::SettingsStore;
use crate::tts::{AudioClip, GenerationState, TtsProvider, Voice};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Typed state-change notifications consumed by the presentation layer and
/// by tests.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(GenerationState),
    VoicesReady(Vec<Voice>),
    GenerationFinished(Arc<AudioClip>),
    PlaybackStarted(Arc<AudioClip>),
    PlaybackStopped,
    ErrorOccurred(String),
}

struct ActiveProvider {
    id: String,
    provider: Arc<dyn TtsProvider>,
}

/// Serializes synthesis, voice-fetch, and playback requests, and exposes the
/// observable generation state.
pub struct GenerationController {
    registry: ProviderRegistry,
    settings: Arc<dyn SettingsStore>,
    catalog: VoiceCatalogCache,
    state: Mutex<GenerationState>,
    active: Mutex<Option<ActiveProvider>>,
    clip: Mutex<Option<Arc<AudioClip>>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl GenerationController {
    pub fn new(registry: ProviderRegistry, settings: Arc<dyn SettingsStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            registry,
            settings,
            catalog: VoiceCatalogCache::new(),
            state: Mutex::new(GenerationState::Idle),
            active: Mutex::new(None),
            clip: Mutex::new(None),
            events,
        }
    }

    /// Subscribe to controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> GenerationState {
        self.state.lock().clone()
    }

    /// Provider catalog, for rendering the provider picker.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Cached voices of the selected provider.
    pub fn voices(&self) -> Vec<Voice> {
        self.catalog.voices()
    }

    /// Id of the currently selected provider.
    pub fn current_provider(&self) -> Option<String> {
        self.active.lock().as_ref().map(|active| active.id.clone())
    }

    /// The most recently generated clip, if any.
    pub fn last_audio(&self) -> Option<Arc<AudioClip>> {
        self.clip.lock().clone()
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    /// Set the state and emit the change, in one critical section.
    fn set_state(&self, next: GenerationState) {
        let mut state = self.state.lock();
        if *state != next {
            *state = next.clone();
            self.emit(ControllerEvent::StateChanged(next));
        }
    }

    /// Atomically leave `Idle` for an operation state.
    fn begin_from_idle(&self, next: GenerationState) -> Result<()> {
        let mut state = self.state.lock();
        if *state != GenerationState::Idle {
            return Err(TtsError::Busy {
                state: state.clone(),
            });
        }
        *state = next.clone();
        self.emit(ControllerEvent::StateChanged(next));
        Ok(())
    }

    fn fail(&self, message: String) {
        warn!("controller error: {}", message);
        self.set_state(GenerationState::Error(message.clone()));
        self.emit(ControllerEvent::ErrorOccurred(message));
    }

    /// Select a provider and fetch its voice catalog.
    ///
    /// Accepted from `Idle`, `FetchingVoices` (the stale fetch is superseded
    /// and its result discarded), and `Error` (recovery). Rejected while
    /// `Generating` or `Playing`.
    pub async fn select_provider(&self, provider_id: &str) -> Result<()> {
        let info = self
            .registry
            .get(provider_id)
            .ok_or_else(|| TtsError::UnknownProvider(provider_id.to_string()))?
            .clone();

        let config = ProviderConfig::from_store(self.settings.as_ref(), &info);
        let provider = self.registry.build(provider_id, &config)?;

        {
            let mut state = self.state.lock();
            match *state {
                GenerationState::Generating | GenerationState::Playing => {
                    return Err(TtsError::Busy {
                        state: state.clone(),
                    });
                },
                _ => {},
            }
            *state = GenerationState::FetchingVoices;
            self.emit(ControllerEvent::StateChanged(GenerationState::FetchingVoices));
        }

        *self.active.lock() = Some(ActiveProvider {
            id: provider_id.to_string(),
            provider: provider.clone(),
        });
        info!("selected provider {}", provider_id);

        let token = self.catalog.begin_fetch(provider_id);
        match self.catalog.run_fetch(&token, provider).await {
            Ok(Some(voices)) => {
                if self.catalog.is_current(&token) {
                    self.set_state(GenerationState::Idle);
                    self.emit(ControllerEvent::VoicesReady(voices));
                }
                Ok(())
            },
            Ok(None) => Ok(()),
            Err(err) => {
                if self.catalog.is_current(&token) {
                    self.fail(format!("failed to fetch voices: {}", err));
                }
                Err(err.into())
            },
        }
    }

    /// Synthesize speech for the given text; the clip is held in memory for
    /// [`Self::play`] or embedding. Accepted only from `Idle`.
    pub async fn generate(&self, text: &str, voice_id: &str, language_code: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(TtsError::Validation("no text to generate audio from".to_string()));
        }
        if voice_id.is_empty() {
            return Err(TtsError::Validation("no voice selected".to_string()));
        }
        let provider = {
            let active = self.active.lock();
            match active.as_ref() {
                Some(active) => active.provider.clone(),
                None => return Err(TtsError::Validation("no provider selected".to_string())),
            }
        };

        self.begin_from_idle(GenerationState::Generating)?;

        match provider.synthesize(text, voice_id, language_code).await {
            Ok(clip) => {
                let clip = Arc::new(clip);
                *self.clip.lock() = Some(clip.clone());
                self.set_state(GenerationState::Idle);
                self.emit(ControllerEvent::GenerationFinished(clip));
                Ok(())
            },
            Err(err) => {
                self.fail(format!("failed to generate audio: {}", err));
                Err(err.into())
            },
        }
    }

    /// Enter playback of the held clip. Accepted only from `Idle`; the
    /// presentation layer renders the audio and calls [`Self::stop`].
    pub fn play(&self) -> Result<()> {
        let clip = self.clip.lock().clone();

        let mut state = self.state.lock();
        if *state != GenerationState::Idle {
            return Err(TtsError::Busy {
                state: state.clone(),
            });
        }
        let clip =
            clip.ok_or_else(|| TtsError::Validation("no generated audio to play".to_string()))?;

        *state = GenerationState::Playing;
        self.emit(ControllerEvent::StateChanged(GenerationState::Playing));
        self.emit(ControllerEvent::PlaybackStarted(clip));
        Ok(())
    }

    /// Leave playback. A no-op outside `Playing`.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == GenerationState::Playing {
            *state = GenerationState::Idle;
            self.emit(ControllerEvent::StateChanged(GenerationState::Idle));
            self.emit(ControllerEvent::PlaybackStopped);
        }
    }

    /// Explicitly recover from `Error` back to `Idle`.
    pub fn dismiss_error(&self) {
        let mut state = self.state.lock();
        if matches!(*state, GenerationState::Error(_)) {
            *state = GenerationState::Idle;
            self.emit(ControllerEvent::StateChanged(GenerationState::Idle));
        }
    }

    /// Reset for a new editing session (e.g. a newly opened file): back to
    /// `Idle`, held audio dropped, any in-flight voice fetch invalidated.
    pub fn reset(&self) {
        self.catalog.reset();
        *self.clip.lock() = None;
        *self.active.lock() = None;
        self.set_state(GenerationState::Idle);
    }
}
