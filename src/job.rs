//! Job descriptions and their user-facing outcome

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};
use crate::media::compose::{MixVolumes, OutputKind};
use crate::voice::has_any_reference;

pub const DUBBING_COMPLETED: &str = "Dubbing completed!";
pub const SPEECH_GENERATED: &str = "Speech generation successful!";
pub const VOICE_CLONED: &str = "Voice cloning successful!";
pub const PODCAST_GENERATED: &str = "Podcast generation successful!";
pub const NO_MODELS_SELECTED: &str = "No models selected";
pub const NO_REFERENCE_VOICES: &str = "No reference voices provided for cloning";

/// Artifact path plus a human-readable status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub output: Option<PathBuf>,
    pub status: String,
}

impl JobOutcome {
    pub fn success(output: PathBuf, status: impl Into<String>) -> Self {
        Self {
            output: Some(output),
            status: status.into(),
        }
    }

    /// Configuration problems are reported as their bare message, every
    /// other failure as `"Error: ..."`
    pub fn failure(error: &DubError) -> Self {
        let status = match error {
            DubError::Configuration(message) => message.clone(),
            other => format!("Error: {}", other),
        };
        Self {
            output: None,
            status,
        }
    }

    pub fn from_result(result: Result<PathBuf>, status: &str) -> Self {
        match result {
            Ok(path) => Self::success(path, status),
            Err(e) => {
                log::error!("{}", e);
                Self::failure(&e)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}

fn any_model_selected(models: &[String]) -> bool {
    models.iter().any(|m| !m.trim().is_empty())
}

/// A subtitle-driven dubbing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DubbingJob {
    pub subtitle_path: PathBuf,
    pub media_path: PathBuf,
    /// Model per speaker id; blank entries mean no model for that speaker
    pub models: Vec<String>,
    /// Reference voice per speaker id
    pub references: Vec<Option<PathBuf>>,
    pub clone: bool,
    pub output_kind: OutputKind,
    pub original_volume: f32,
    pub dubbed_volume: f32,
    pub speaking_rate: f32,
}

impl DubbingJob {
    pub fn new(
        subtitle_path: impl Into<PathBuf>,
        media_path: impl Into<PathBuf>,
        models: Vec<String>,
    ) -> Self {
        let volumes = MixVolumes::default();
        Self {
            subtitle_path: subtitle_path.into(),
            media_path: media_path.into(),
            models,
            references: Vec::new(),
            clone: false,
            output_kind: OutputKind::Audio,
            original_volume: volumes.original,
            dubbed_volume: volumes.dubbed,
            speaking_rate: 1.0,
        }
    }

    pub fn with_references(mut self, references: Vec<Option<PathBuf>>) -> Self {
        self.references = references;
        self
    }

    pub fn with_cloning(mut self, clone: bool) -> Self {
        self.clone = clone;
        self
    }

    pub fn with_output_kind(mut self, output_kind: OutputKind) -> Self {
        self.output_kind = output_kind;
        self
    }

    pub fn with_volumes(mut self, original: f32, dubbed: f32) -> Self {
        self.original_volume = original;
        self.dubbed_volume = dubbed;
        self
    }

    pub fn with_speaking_rate(mut self, speaking_rate: f32) -> Self {
        self.speaking_rate = speaking_rate;
        self
    }

    pub fn volumes(&self) -> MixVolumes {
        MixVolumes {
            original: self.original_volume,
            dubbed: self.dubbed_volume,
        }
    }

    /// Checks that need neither the files nor any collaborator
    pub fn validate(&self) -> Result<()> {
        if !any_model_selected(&self.models) {
            return Err(DubError::Configuration(NO_MODELS_SELECTED.to_string()));
        }
        if self.clone && !has_any_reference(&self.references) {
            return Err(DubError::Configuration(NO_REFERENCE_VOICES.to_string()));
        }
        if !(0.0..=1.0).contains(&self.original_volume) {
            return Err(DubError::InvalidInput(format!(
                "original volume must be between 0.0 and 1.0, got {}",
                self.original_volume
            )));
        }
        if self.dubbed_volume < 0.0 || !self.dubbed_volume.is_finite() {
            return Err(DubError::InvalidInput(format!(
                "dubbed volume must not be negative, got {}",
                self.dubbed_volume
            )));
        }
        validate_speaking_rate(self.speaking_rate)
    }
}

fn validate_speaking_rate(speaking_rate: f32) -> Result<()> {
    if speaking_rate <= 0.0 || !speaking_rate.is_finite() {
        return Err(DubError::InvalidInput(format!(
            "speaking rate must be positive, got {}",
            speaking_rate
        )));
    }
    Ok(())
}

/// A single-utterance synthesis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub model: String,
    pub speaking_rate: f32,
    pub clone: bool,
    pub reference: Option<PathBuf>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            speaking_rate: 1.0,
            clone: false,
            reference: None,
        }
    }

    pub fn with_speaking_rate(mut self, speaking_rate: f32) -> Self {
        self.speaking_rate = speaking_rate;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<PathBuf>) -> Self {
        self.clone = true;
        self.reference = Some(reference.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(DubError::Configuration(NO_MODELS_SELECTED.to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(DubError::InvalidInput("text is empty".to_string()));
        }
        validate_speaking_rate(self.speaking_rate)
    }
}

/// A scripted multi-speaker podcast request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastRequest {
    /// `Speaker N: text` lines
    pub script: String,
    pub models: Vec<String>,
    pub speaking_rate: f32,
    pub clone: bool,
    pub references: Vec<Option<PathBuf>>,
}

impl PodcastRequest {
    pub fn new(script: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            script: script.into(),
            models,
            speaking_rate: 1.0,
            clone: false,
            references: Vec::new(),
        }
    }

    pub fn with_speaking_rate(mut self, speaking_rate: f32) -> Self {
        self.speaking_rate = speaking_rate;
        self
    }

    pub fn with_references(mut self, references: Vec<Option<PathBuf>>) -> Self {
        self.clone = true;
        self.references = references;
        self
    }

    /// Voice used when the podcast is cloned
    pub fn first_reference(&self) -> Option<&PathBuf> {
        self.references.iter().flatten().next()
    }

    pub fn validate(&self) -> Result<()> {
        if !any_model_selected(&self.models) {
            return Err(DubError::Configuration(NO_MODELS_SELECTED.to_string()));
        }
        validate_speaking_rate(self.speaking_rate)
    }
}
