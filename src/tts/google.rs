//! Google Cloud Text-to-Speech backend.
//!
//! REST client over the public v1 endpoints, authenticated with an API key.
//! Narration markup is converted to SSML before synthesis and audio is
//! requested as MP3.

use crate::tts::error::{ProviderError, Result, TtsError};
use crate::tts::registry::{ProviderConfig, ProviderInfo};
use crate::tts::{AudioClip, SettingField, SettingKind, TtsProvider, Voice, ssml};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const VOICES_URL: &str = "https://texttospeech.googleapis.com/v1/voices";
const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Cloud TTS provider.
pub struct GoogleTts {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<GoogleVoice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVoice {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
    #[serde(default)]
    ssml_gender: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl GoogleTts {
    /// Static descriptor for the registry, including the settings schema.
    pub fn provider_info() -> ProviderInfo {
        ProviderInfo {
            id: "google_cloud".to_string(),
            name: "Google Cloud".to_string(),
            fields: vec![SettingField::new(
                "api_key",
                "API Key",
                SettingKind::Password,
                "Enter your Google Cloud API key...",
            )],
        }
    }

    /// Build a configured backend from stored settings.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .get("api_key")
            .ok_or_else(|| TtsError::MissingSetting {
                provider: "google_cloud".to_string(),
                key: "api_key".to_string(),
            })?
            .to_string();

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TtsError::Validation(format!("http client: {}", e)))?;

        Ok(Self { client, api_key })
    }

    fn map_transport_error(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> std::result::Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("google tts request failed: {} {}", status, body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Auth(format!("{}: {}", status, body)))
            },
            _ => Err(ProviderError::Network(format!("{}: {}", status, body))),
        }
    }

    fn display_gender(ssml_gender: &str) -> &'static str {
        match ssml_gender {
            "MALE" => "Male",
            "FEMALE" => "Female",
            "NEUTRAL" => "Neutral",
            _ => "Unknown",
        }
    }
}

#[async_trait]
impl TtsProvider for GoogleTts {
    async fn list_voices(&self) -> std::result::Result<Vec<Voice>, ProviderError> {
        let response = self
            .client
            .get(VOICES_URL)
            .header("X-Goog-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(Self::map_transport_error)?;
        let response = Self::check_status(response).await?;

        let payload: VoicesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let voices = payload
            .voices
            .into_iter()
            .map(|voice| Voice {
                id: voice.name.clone(),
                name: voice.name,
                language_code: voice.language_codes.first().cloned().unwrap_or_default(),
                gender: Self::display_gender(&voice.ssml_gender).to_string(),
            })
            .collect::<Vec<_>>();

        debug!("google tts returned {} voices", voices.len());
        Ok(voices)
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        language_code: &str,
    ) -> std::result::Result<AudioClip, ProviderError> {
        let body = json!({
            "input": { "ssml": ssml::to_ssml(text) },
            "voice": { "languageCode": language_code, "name": voice_id },
            "audioConfig": { "audioEncoding": "MP3" },
        });

        let response = self
            .client
            .post(SYNTHESIZE_URL)
            .header("X-Goog-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;
        let response = Self::check_status(response).await?;

        let payload: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let bytes = BASE64
            .decode(payload.audio_content.as_bytes())
            .map_err(|e| ProviderError::MalformedResponse(format!("audio payload: {}", e)))?;

        debug!("google tts synthesized {} bytes", bytes.len());
        Ok(AudioClip {
            bytes,
            mime: "audio/mpeg".to_string(),
        })
    }
}
