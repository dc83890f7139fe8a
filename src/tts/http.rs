//! Client for the local inference server
//!
//! The server hosts the neural TTS models. A model is loaded on demand
//! (`/v1/models/load`), asked for speech (`/v1/tts`) and released when the
//! cache evicts it (`/v1/models/unload`). Audio comes back as WAV bytes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::media::audio::AudioTrack;
use crate::tts::{ModelLoader, SpeechModel};

/// Build the HTTP client shared by the inference adapters
pub fn build_client(config: &DubConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    Ok(client)
}

#[derive(Debug, Serialize)]
struct LoadRequest<'a> {
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoadResponse {
    sampling_rate: u32,
    #[serde(default)]
    memory_bytes: u64,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model: &'a str,
    speaking_rate: f32,
}

/// [`ModelLoader`] backed by the inference server
#[derive(Clone)]
pub struct HttpSpeechBackend {
    client: Client,
    base_url: String,
}

impl HttpSpeechBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ModelLoader for HttpSpeechBackend {
    async fn load(&self, name: &str) -> Result<Arc<dyn SpeechModel>> {
        let response = self
            .client
            .post(self.url("/v1/models/load"))
            .json(&LoadRequest { model: name })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Synthesis(format!(
                "Failed to load model {} (status {}): {}",
                name, status, body
            )));
        }

        let info: LoadResponse = response.json().await?;
        log::info!(
            "Model {} loaded: {} Hz, {} bytes",
            name,
            info.sampling_rate,
            info.memory_bytes
        );

        Ok(Arc::new(HttpSpeechModel {
            backend: self.clone(),
            name: name.to_string(),
            sampling_rate: info.sampling_rate,
            memory_bytes: info.memory_bytes,
        }))
    }

    async fn unload(&self, model: Arc<dyn SpeechModel>) {
        let result = self
            .client
            .post(self.url("/v1/models/unload"))
            .json(&LoadRequest { model: model.name() })
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                log::info!("Model {} unloaded", model.name());
            }
            Ok(response) => {
                log::warn!(
                    "Server refused to unload model {}: status {}",
                    model.name(),
                    response.status()
                );
            }
            Err(e) => log::warn!("Failed to unload model {}: {}", model.name(), e),
        }
    }
}

/// A model resident on the inference server
pub struct HttpSpeechModel {
    backend: HttpSpeechBackend,
    name: String,
    sampling_rate: u32,
    memory_bytes: u64,
}

#[async_trait]
impl SpeechModel for HttpSpeechModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn memory_bytes(&self) -> u64 {
        self.memory_bytes
    }

    async fn synthesize(&self, text: &str, speaking_rate: f32) -> Result<AudioTrack> {
        log::debug!("Requesting speech from {} for {} chars", self.name, text.chars().count());

        let response = self
            .backend
            .client
            .post(self.backend.url("/v1/tts"))
            .json(&TtsRequest {
                text,
                model: &self.name,
                speaking_rate,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Synthesis(format!(
                "Model {} failed (status {}): {}",
                self.name, status, body
            )));
        }

        let bytes = response.bytes().await?;
        let audio = AudioTrack::from_wav_bytes(&bytes)
            .map_err(|e| DubError::Synthesis(format!("Model {} returned bad audio: {}", self.name, e)))?;

        if audio.sample_rate != self.sampling_rate {
            log::debug!(
                "Model {} announced {} Hz but returned {} Hz",
                self.name,
                self.sampling_rate,
                audio.sample_rate
            );
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let backend = HttpSpeechBackend::new(Client::new(), "http://localhost:7860/");
        assert_eq!(backend.url("/v1/tts"), "http://localhost:7860/v1/tts");
    }

    #[test]
    fn test_load_response_defaults_memory() {
        let info: LoadResponse = serde_json::from_str(r#"{"sampling_rate": 16000}"#).unwrap();
        assert_eq!(info.sampling_rate, 16000);
        assert_eq!(info.memory_bytes, 0);
    }

    #[test]
    fn test_tts_request_shape() {
        let body = serde_json::to_value(TtsRequest {
            text: "hi",
            model: "mms-tha",
            speaking_rate: 1.0,
        })
        .unwrap();
        assert_eq!(body["model"], "mms-tha");
        assert_eq!(body["speaking_rate"], 1.0);
    }
}
