//! Tone conversion through the local inference server

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::voice::ToneConverter;

/// [`ToneConverter`] calling `POST {base}/v1/convert`
pub struct HttpToneConverter {
    client: Client,
    base_url: String,
    model_version: String,
    vad: bool,
}

impl HttpToneConverter {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_version: "v2".to_string(),
            vad: false,
        }
    }

    pub fn from_config(client: Client, config: &DubConfig) -> Self {
        let mut converter = Self::new(client, config.inference_url.clone());
        converter.model_version = config.clone_model_version.clone();
        converter.vad = config.clone_vad;
        converter
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/convert", self.base_url)
    }
}

async fn wav_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DubError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    Ok(Part::bytes(bytes).file_name(name).mime_str("audio/wav")?)
}

#[async_trait]
impl ToneConverter for HttpToneConverter {
    async fn convert(&self, source: &Path, reference: &Path, output: &Path) -> Result<PathBuf> {
        log::debug!(
            "Converting {} towards {}",
            source.display(),
            reference.display()
        );

        let form = Form::new()
            .text("model_version", self.model_version.clone())
            .text("vad", self.vad.to_string())
            .part("source", wav_part(source).await?)
            .part("reference", wav_part(reference).await?);

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| DubError::Cloning(format!("Tone converter unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Cloning(format!(
                "Tone converter failed (status {}): {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DubError::Cloning(format!("Failed to read converted audio: {}", e)))?;
        tokio::fs::write(output, &bytes).await?;

        Ok(output.to_path_buf())
    }
}
