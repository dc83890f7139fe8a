//! Voice cloning
//!
//! A [`ToneConverter`] re-voices a waveform with the timbre of a reference
//! recording. [`clone_speaker_tracks`] applies it to every speaker that has
//! both a dubbed track and a reference voice.

pub mod http;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{DubError, Result};
use crate::utils::job_dir::JobDir;

pub use http::HttpToneConverter;

/// Timbre transfer from a reference voice onto a source waveform
#[async_trait]
pub trait ToneConverter: Send + Sync {
    /// Convert `source` towards `reference`, writing the result to `output`
    async fn convert(&self, source: &Path, reference: &Path, output: &Path) -> Result<PathBuf>;
}

/// True if at least one usable reference voice was given
pub fn has_any_reference(references: &[Option<PathBuf>]) -> bool {
    references.iter().any(|r| r.is_some())
}

/// Clone every speaker track that has a matching reference voice.
///
/// `references` is indexed by speaker id like the track map. Speakers
/// missing either input are left out of the result. The first converter
/// failure aborts the whole stage.
pub async fn clone_speaker_tracks(
    converter: &dyn ToneConverter,
    tracks: &BTreeMap<usize, PathBuf>,
    references: &[Option<PathBuf>],
    job_dir: &mut JobDir,
) -> Result<BTreeMap<usize, PathBuf>> {
    let mut cloned = BTreeMap::new();

    for (&speaker, source) in tracks {
        let Some(reference) = references.get(speaker).and_then(|r| r.as_ref()) else {
            log::warn!(
                "Speaker {} has no reference voice, leaving it out of the cloned mix",
                speaker + 1
            );
            continue;
        };

        if !reference.exists() {
            return Err(DubError::Cloning(format!(
                "Reference voice for speaker {} not found: {}",
                speaker + 1,
                reference.display()
            )));
        }

        let output = job_dir.speaker_cloned(speaker);
        log::info!("Cloning speaker {} voice", speaker + 1);
        let path = converter
            .convert(source, reference, &output)
            .await
            .map_err(|e| match e {
                DubError::Cloning(_) => e,
                other => DubError::Cloning(format!("speaker {}: {}", speaker + 1, other)),
            })?;

        job_dir.track_intermediate(&path);
        cloned.insert(speaker, path);
    }

    Ok(cloned)
}
