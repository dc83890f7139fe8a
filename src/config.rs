//! Configuration for the tts-dub library
//!
//! [`DubConfig`] carries everything that is constant across jobs: where
//! artifacts go, the timeline sampling rate, mixing headroom, the inference
//! server location and the media tools to invoke.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DubConfig {
    /// Root directory under which every job gets its own sub-directory
    pub output_dir: PathBuf,
    /// Directory whose sub-directories are the available speech models
    pub model_dir: PathBuf,
    /// Sampling rate of speaker timelines and of every dubbed artifact (Hz)
    pub sample_rate: u32,
    /// Peak level of the final mix, as a fraction of full scale
    pub mix_headroom: f32,
    /// Default volume of the original media audio (0.0 - 1.0)
    pub original_volume: f32,
    /// Default volume of the dubbed track
    pub dubbed_volume: f32,
    /// Memory budget for resident speech models, in bytes
    pub model_cache_budget: u64,
    /// Base URL of the local inference server
    pub inference_url: String,
    /// Timeout for a single inference request, in seconds
    pub request_timeout_secs: u64,
    /// Tone converter checkpoint version
    pub clone_model_version: String,
    /// Trim non-speech from voices before extracting their timbre
    pub clone_vad: bool,
    /// ffmpeg executable name or path
    pub ffmpeg: String,
    /// ffprobe executable name or path
    pub ffprobe: String,
    /// Remove per-speaker intermediates after a successful job
    pub cleanup_intermediates: bool,
}

impl Default for DubConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
            model_dir: PathBuf::from("./models"),
            sample_rate: 16_000,
            mix_headroom: 0.9,
            original_volume: 0.5,
            dubbed_volume: 1.0,
            model_cache_budget: 2 * 1024 * 1024 * 1024, // 2 GiB
            inference_url: "http://127.0.0.1:7860".to_string(),
            request_timeout_secs: 300,
            clone_model_version: "v2".to_string(),
            clone_vad: false,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            cleanup_intermediates: false,
        }
    }
}

impl DubConfig {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DubError::FileNotFound(format!("{}: {}", path.display(), e))
        })?;
        let config: DubConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(DubError::Configuration(
                "sample_rate must be greater than zero".to_string(),
            ));
        }
        if !(self.mix_headroom > 0.0 && self.mix_headroom <= 1.0) {
            return Err(DubError::Configuration(format!(
                "mix_headroom must be in (0, 1], got {}",
                self.mix_headroom
            )));
        }
        if self.original_volume < 0.0 || self.dubbed_volume < 0.0 {
            return Err(DubError::Configuration(
                "volumes must not be negative".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(DubError::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = DubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.original_volume, 0.5);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sample_rate": 22050, "output_dir": "/tmp/dubs" }}"#).unwrap();

        let config = DubConfig::load(file.path()).unwrap();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/dubs"));
        assert_eq!(config.mix_headroom, 0.9);
    }

    #[test]
    fn test_rejects_bad_headroom() {
        let config = DubConfig {
            mix_headroom: 1.5,
            ..DubConfig::default()
        };
        assert!(matches!(config.validate(), Err(DubError::Configuration(_))));
    }
}
