//! Mixing speaker tracks into one dubbed track
//!
//! Each input is first normalized to full scale so quiet and loud voices
//! contribute equally, the inputs are summed, and the sum is normalized to
//! the configured headroom.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media::audio::AudioTrack;
use crate::utils::job_dir::remove_existing;

#[derive(Debug, Clone, Copy)]
pub struct TrackMixer {
    headroom: f32,
}

impl Default for TrackMixer {
    fn default() -> Self {
        Self { headroom: 0.9 }
    }
}

impl TrackMixer {
    pub fn new(headroom: f32) -> Self {
        Self { headroom }
    }

    pub fn headroom(&self) -> f32 {
        self.headroom
    }

    /// Mix `tracks` at `sample_rate`.
    ///
    /// The result is at least `min_len` samples long and as long as the
    /// longest input. Inputs at another rate are resampled first.
    pub fn mix_tracks(
        &self,
        tracks: Vec<AudioTrack>,
        sample_rate: u32,
        min_len: usize,
    ) -> Result<AudioTrack> {
        let mut mixed = vec![0.0f32; min_len];

        for track in tracks {
            let mut track = track.resampled(sample_rate)?;
            track.normalize_peak(1.0);

            if track.len() > mixed.len() {
                mixed.resize(track.len(), 0.0);
            }
            for (dst, src) in mixed.iter_mut().zip(&track.samples) {
                *dst += *src;
            }
        }

        let mut result = AudioTrack::new(sample_rate, mixed);
        result.normalize_peak(self.headroom);
        Ok(result)
    }

    /// Mix WAV files into `output`
    pub fn mix_files(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        sample_rate: u32,
        min_len: usize,
    ) -> Result<PathBuf> {
        let tracks = inputs
            .iter()
            .map(AudioTrack::from_wav)
            .collect::<Result<Vec<_>>>()?;

        log::info!("Mixing {} tracks into {}", tracks.len(), output.display());
        let mixed = self.mix_tracks(tracks, sample_rate, min_len)?;
        if mixed.is_silent() {
            log::warn!("Mixed track {} is silent", output.display());
        }

        remove_existing(output)?;
        mixed.write_wav(output)?;
        Ok(output.to_path_buf())
    }
}
