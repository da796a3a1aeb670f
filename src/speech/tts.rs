//! ElevenLabs text-to-speech client.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::{SpeakerConfig, VoiceConfig};
use crate::retry::RetryPolicy;
use crate::service::{check_response, http_client, ServiceError};

/// The environment variable name for the ElevenLabs API key.
pub const ELEVENLABS_API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Default ElevenLabs API base URL.
pub const ELEVENLABS_API_BASE_URL: &str = "https://api.elevenlabs.io";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SERVICE: &str = "ElevenLabs";

/// Per-character timing returned alongside the audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub characters: Vec<String>,
    pub character_start_times_seconds: Vec<f64>,
    pub character_end_times_seconds: Vec<f64>,
}

impl Alignment {
    /// Alignment arrays must line up one-to-one to be usable.
    pub fn is_consistent(&self) -> bool {
        !self.characters.is_empty()
            && self.characters.len() == self.character_start_times_seconds.len()
            && self.characters.len() == self.character_end_times_seconds.len()
    }
}

/// Synthesized speech for one line.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Encoded audio in the configured output format (MP3 by default)
    pub audio: Vec<u8>,
    pub alignment: Option<Alignment>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TimestampedResponse {
    audio_base64: String,
    #[serde(default)]
    alignment: Option<Alignment>,
}

/// Client for the ElevenLabs `with-timestamps` endpoint.
pub struct TtsClient {
    api_key: String,
    base_url: String,
    output_format: String,
    http_client: reqwest::Client,
    retry: RetryPolicy,
}

impl TtsClient {
    /// # Errors
    ///
    /// Returns `ServiceError::MissingApiKey` if the key is absent or empty.
    pub fn new(api_key: Option<String>) -> Result<Self, ServiceError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ServiceError::MissingApiKey {
                env: ELEVENLABS_API_KEY_ENV,
            })?;
        Ok(Self {
            api_key,
            base_url: ELEVENLABS_API_BASE_URL.to_string(),
            output_format: "mp3_44100_128".to_string(),
            http_client: http_client(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)?,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &VoiceConfig) -> Result<Self, ServiceError> {
        let mut client = Self::new(config.api_key.clone())?.with_base_url(config.base_url.clone());
        client.output_format = config.output_format.clone();
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Synthesize `text` in `voice`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::EmptyPrompt` for empty text and
    /// `ServiceError::InvalidResponse` when the audio payload is not valid
    /// base64.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &SpeakerConfig,
    ) -> Result<Synthesis, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyPrompt);
        }

        let url = format!(
            "{}/v1/text-to-speech/{}/with-timestamps",
            self.base_url, voice.voice_id
        );
        let body = SpeechRequest {
            text,
            model_id: &voice.model_id,
        };

        let response: TimestampedResponse = self
            .retry
            .run("text-to-speech", || async {
                let response = self
                    .http_client
                    .post(&url)
                    .query(&[("output_format", self.output_format.as_str())])
                    .header("xi-api-key", &self.api_key)
                    .json(&body)
                    .send()
                    .await?;
                let response = check_response(SERVICE, response).await?;
                Ok::<_, ServiceError>(response.json::<TimestampedResponse>().await?)
            })
            .await?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(response.audio_base64.as_bytes())
            .map_err(|e| ServiceError::InvalidResponse(format!("audio_base64: {}", e)))?;

        let alignment = response.alignment.filter(|a| {
            let ok = a.is_consistent();
            if !ok {
                log::warn!("Ignoring inconsistent character alignment from {}", SERVICE);
            }
            ok
        });

        log::debug!(
            "Synthesized {} bytes for {} ({} chars)",
            audio.len(),
            voice.name,
            text.len()
        );
        Ok(Synthesis { audio, alignment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_consistency() {
        let good = Alignment {
            characters: vec!["h".into(), "i".into()],
            character_start_times_seconds: vec![0.0, 0.1],
            character_end_times_seconds: vec![0.1, 0.2],
        };
        assert!(good.is_consistent());

        let short = Alignment {
            character_end_times_seconds: vec![0.1],
            ..good.clone()
        };
        assert!(!short.is_consistent());
        assert!(!Alignment::default().is_consistent());
    }

    #[test]
    fn test_client_requires_key() {
        assert!(matches!(
            TtsClient::new(Some(String::new())),
            Err(ServiceError::MissingApiKey {
                env: ELEVENLABS_API_KEY_ENV
            })
        ));
    }
}
