//! Error types for the tts-dub library
//!
//! Every stage of the dubbing pipeline reports failures through [`DubError`].
//! Stages that produce a user-facing status turn it into `"Error: ..."` via
//! [`crate::job::JobOutcome::failure`].

use thiserror::Error;

/// Errors produced by tts-dub
#[derive(Debug, Error)]
pub enum DubError {
    /// Malformed subtitle file (fatal, raised before any synthesis)
    #[error("Subtitle parsing error: {0}")]
    SubtitleParsing(String),

    /// The speech synthesizer failed for a segment or utterance
    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    /// The tone converter failed while cloning a voice
    #[error("Voice cloning error: {0}")]
    Cloning(String),

    /// In-process sample manipulation failed (resampling, mixing, WAV layout)
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// ffmpeg/ffprobe failed or produced unusable output
    #[error("Media composition error: {0}")]
    Composition(String),

    /// The job or the library configuration is unusable
    #[error("{0}")]
    Configuration(String),

    /// Caller supplied an argument the pipeline cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for DubError {
    fn from(s: &str) -> Self {
        DubError::Other(s.to_string())
    }
}

impl From<String> for DubError {
    fn from(s: String) -> Self {
        DubError::Other(s)
    }
}

/// Result type for the tts-dub library
pub type Result<T> = std::result::Result<T, DubError>;
