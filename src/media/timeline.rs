//! Per-speaker timelines
//!
//! Each speaker gets one zero-initialized buffer covering the whole media.
//! Rendered segments are added into it at their subtitle offset; the buffer
//! never grows.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::media::audio::AudioTrack;
use crate::utils::job_dir::JobDir;

/// Number of samples needed to cover `duration_secs`
pub fn samples_for_duration(duration_secs: f64, sample_rate: u32) -> usize {
    if duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * sample_rate as f64).ceil() as usize
}

/// Sample index of a time offset
pub fn sample_offset(secs: f64, sample_rate: u32) -> usize {
    if secs <= 0.0 {
        return 0;
    }
    (secs * sample_rate as f64).floor() as usize
}

/// Fixed-length buffer for one speaker
#[derive(Debug, Clone)]
pub struct SpeakerTimeline {
    speaker: usize,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl SpeakerTimeline {
    pub fn new(speaker: usize, sample_rate: u32, len: usize) -> Self {
        Self {
            speaker,
            sample_rate,
            samples: vec![0.0; len],
        }
    }

    pub fn speaker(&self) -> usize {
        self.speaker
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Add `audio` into the buffer starting at `offset`.
    ///
    /// Whatever falls past the end of the buffer is dropped. Returns the
    /// number of samples actually written.
    pub fn accumulate(&mut self, offset: usize, audio: &[f32]) -> usize {
        if offset >= self.samples.len() {
            return 0;
        }
        let writable = audio.len().min(self.samples.len() - offset);
        for (dst, src) in self.samples[offset..offset + writable].iter_mut().zip(audio) {
            *dst += *src;
        }
        writable
    }

    /// True if at least one sample is non-zero
    pub fn has_content(&self) -> bool {
        self.samples.iter().any(|s| *s != 0.0)
    }

    pub fn to_track(&self) -> AudioTrack {
        AudioTrack::new(self.sample_rate, self.samples.clone())
    }
}

/// The timelines of every speaker of a job, indexed by speaker id
#[derive(Debug, Clone)]
pub struct TimelineSet {
    sample_rate: u32,
    timelines: Vec<SpeakerTimeline>,
}

impl TimelineSet {
    /// Allocate `num_speakers` silent timelines long enough for `duration_secs`
    pub fn new(num_speakers: usize, duration_secs: f64, sample_rate: u32) -> Self {
        let len = samples_for_duration(duration_secs, sample_rate);
        log::debug!(
            "Allocating {} speaker timelines of {} samples ({:.3}s at {} Hz)",
            num_speakers,
            len,
            duration_secs,
            sample_rate
        );
        let timelines = (0..num_speakers)
            .map(|speaker| SpeakerTimeline::new(speaker, sample_rate, len))
            .collect();
        Self {
            sample_rate,
            timelines,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length shared by all timelines
    pub fn timeline_len(&self) -> usize {
        self.timelines.first().map(|t| t.len()).unwrap_or(0)
    }

    pub fn num_speakers(&self) -> usize {
        self.timelines.len()
    }

    pub fn get(&self, speaker: usize) -> Option<&SpeakerTimeline> {
        self.timelines.get(speaker)
    }

    pub fn get_mut(&mut self, speaker: usize) -> Option<&mut SpeakerTimeline> {
        self.timelines.get_mut(speaker)
    }

    /// Write every non-silent timeline as `speaker_{n}_base.wav`.
    ///
    /// Each file is peak-normalized to full scale. Speakers without content
    /// are absent from the returned map.
    pub fn export(&self, job_dir: &mut JobDir) -> Result<BTreeMap<usize, PathBuf>> {
        let mut files = BTreeMap::new();

        for timeline in &self.timelines {
            if !timeline.has_content() {
                log::info!(
                    "Speaker {} has no dubbed audio, no track written",
                    timeline.speaker() + 1
                );
                continue;
            }

            let path = job_dir.speaker_base(timeline.speaker());
            let mut track = timeline.to_track();
            track.normalize_peak(1.0);
            track.write_wav(&path)?;
            job_dir.track_intermediate(&path);

            log::info!(
                "Wrote speaker {} track to {}",
                timeline.speaker() + 1,
                path.display()
            );
            files.insert(timeline.speaker(), path);
        }

        Ok(files)
    }
}
