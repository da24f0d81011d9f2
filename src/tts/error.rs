/// Error types for TTS providers and the generation controller
use crate::tts::GenerationState;
use thiserror::Error;

/// Failure reported by a provider backend.
///
/// Every sub-kind is recoverable: the request can be retried once the user
/// fixes credentials or the network comes back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider timed out: {0}")]
    Timeout(String),
}

/// Errors surfaced by the TTS service layer.
#[derive(Error, Debug)]
pub enum TtsError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Scheduling rejection: the controller only accepts requests while
    /// idle. The underlying operation was never started.
    #[error("request rejected: controller is {state:?}")]
    Busy { state: GenerationState },

    #[error("missing required setting '{key}' for provider '{provider}'")]
    MissingSetting { provider: String, key: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

pub type Result<T> = std::result::Result<T, TtsError>;
