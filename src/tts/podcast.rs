//! Podcast scripts
//!
//! A script is a sequence of `Speaker N: text` lines. Each line is spoken by
//! the model of speaker `N` (1-based) and the utterances are concatenated in
//! script order.

use crate::error::{DubError, Result};
use crate::media::audio::AudioTrack;
use crate::tts::Synthesizer;

/// One utterance of a podcast script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 0-based speaker id
    pub speaker: usize,
    pub text: String,
}

/// Parse a podcast script; blank lines are ignored.
///
/// The speaker number is the last word before the first colon, so both
/// `Speaker 2: hi` and `2: hi` address the second speaker.
pub fn parse_script(script: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();

    for (number, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (label, text) = line.split_once(':').ok_or_else(|| {
            DubError::InvalidInput(format!(
                "Script line {} has no speaker label: {}",
                number + 1,
                line
            ))
        })?;

        let speaker = label
            .split_whitespace()
            .last()
            .and_then(|token| token.parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                DubError::InvalidInput(format!(
                    "Script line {} has an invalid speaker label: {}",
                    number + 1,
                    label.trim()
                ))
            })?;

        let text = text.trim();
        if text.is_empty() {
            log::debug!("Script line {} has no text, skipping", number + 1);
            continue;
        }

        lines.push(ScriptLine {
            speaker: speaker - 1,
            text: text.to_string(),
        });
    }

    Ok(lines)
}

fn model_for<'m>(models: &'m [String], speaker: usize) -> Result<&'m str> {
    models
        .get(speaker)
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            DubError::InvalidInput(format!(
                "No model selected for speaker {} ({} models selected)",
                speaker + 1,
                models.len()
            ))
        })
}

/// Every line must address a speaker with a selected model
pub fn check_models(lines: &[ScriptLine], models: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Err(DubError::InvalidInput("Podcast script is empty".to_string()));
    }
    for line in lines {
        model_for(models, line.speaker)?;
    }
    Ok(())
}

/// Synthesize every line and concatenate the results.
///
/// The output uses the sampling rate of the first utterance; later
/// utterances are resampled to it.
pub async fn render_script(
    synthesizer: &dyn Synthesizer,
    lines: &[ScriptLine],
    models: &[String],
    speaking_rate: f32,
) -> Result<AudioTrack> {
    check_models(lines, models)?;

    let mut combined: Option<AudioTrack> = None;

    for line in lines {
        let model = model_for(models, line.speaker)?;
        let audio = synthesizer.synthesize(&line.text, model, speaking_rate).await?;
        log::debug!(
            "Speaker {} line synthesized: {} samples at {} Hz",
            line.speaker + 1,
            audio.len(),
            audio.sample_rate
        );

        match combined.as_mut() {
            None => combined = Some(audio),
            Some(track) => {
                let audio = audio.resampled(track.sample_rate)?;
                track.samples.extend_from_slice(&audio.samples);
            }
        }
    }

    combined.ok_or_else(|| DubError::InvalidInput("Podcast script is empty".to_string()))
}
