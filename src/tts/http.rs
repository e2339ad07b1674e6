//! OpenAI-compatible speech synthesis over HTTP (`POST /v1/audio/speech`).

use crate::config::TtsConfig;
use crate::error::{Result, RevoiceError};
use crate::tts::synthesizer::{Synthesizer, VoiceParams};
use async_trait::async_trait;
use std::time::Duration;

/// Map a rate offset in percent to the endpoint's `speed` multiplier.
pub fn speed_for_rate(rate: i32) -> f32 {
    (1.0 + rate as f32 / 100.0).clamp(0.25, 4.0)
}

pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSynthesizer")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpSynthesizer {
    /// Build from the `tts` config section; the API key is read from `api_key_env`.
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            tracing::debug!(
                var = %config.api_key_env,
                "no synthesis API key set, sending unauthenticated requests"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RevoiceError::Synthesis {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn request_body(&self, text: &str, voice: &VoiceParams) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice.voice,
            "speed": speed_for_rate(voice.rate),
            "response_format": "mp3",
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<Vec<u8>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&self.request_body(text, voice));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| RevoiceError::Synthesis {
            message: format!("TTS request failed: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RevoiceError::Synthesis {
                message: format!("TTS API error ({}): {}", status, error_text.trim()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RevoiceError::Synthesis {
            message: format!("Failed to read TTS response: {}", e),
        })?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_mapping() {
        assert_eq!(speed_for_rate(0), 1.0);
        assert_eq!(speed_for_rate(25), 1.25);
        assert_eq!(speed_for_rate(-50), 0.5);
        assert_eq!(speed_for_rate(-100), 0.25);
        assert_eq!(speed_for_rate(900), 4.0);
    }

    #[test]
    fn test_request_body_fields() {
        let synth = HttpSynthesizer::from_config(&TtsConfig::default()).unwrap();
        let voice = VoiceParams {
            voice: "nova".to_string(),
            rate: 10,
            volume: -20,
        };
        let body = synth.request_body("buenos días", &voice);
        assert_eq!(body["model"], "tts-1");
        assert_eq!(body["input"], "buenos días");
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["response_format"], "mp3");
        assert!((body["speed"].as_f64().unwrap() - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_debug_redacts_key() {
        let mut synth = HttpSynthesizer::from_config(&TtsConfig::default()).unwrap();
        synth.api_key = Some("sk-secret".to_string());
        let debug = format!("{:?}", synth);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("redacted"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_synthesis_error() {
        let config = TtsConfig {
            endpoint: "http://127.0.0.1:9/v1/audio/speech".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let synth = HttpSynthesizer::from_config(&config).unwrap();
        let result = synth.synthesize("hola", &VoiceParams::default()).await;
        assert!(matches!(result, Err(RevoiceError::Synthesis { .. })));
    }
}
