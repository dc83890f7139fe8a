#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use tts_dub::config::DubConfig;
use tts_dub::error::{DubError, Result};
use tts_dub::media::audio::AudioTrack;
use tts_dub::media::compose::{MediaComposer, MixVolumes};
use tts_dub::tts::Synthesizer;
use tts_dub::voice::ToneConverter;
use tts_dub::TtsDub;

pub const SAMPLE_RATE: u32 = 16_000;

/// Synthesizer producing a constant waveform of a fixed duration
pub struct FakeSynthesizer {
    pub rate: u32,
    pub seconds: f64,
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeSynthesizer {
    pub fn new(seconds: f64) -> Self {
        Self {
            rate: SAMPLE_RATE,
            seconds,
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(model: &str) -> Self {
        Self {
            fail_on: Some(model.to_string()),
            ..Self::new(1.0)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, model: &str, _speaking_rate: f32) -> Result<AudioTrack> {
        self.calls.lock().push((text.to_string(), model.to_string()));
        if self.fail_on.as_deref() == Some(model) {
            return Err(DubError::Synthesis(format!("model {} is broken", model)));
        }
        let len = (self.seconds * self.rate as f64) as usize;
        Ok(AudioTrack::new(self.rate, vec![0.5; len]))
    }
}

/// Tone converter that halves the source waveform
pub struct FakeConverter {
    pub fail: bool,
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ToneConverter for FakeConverter {
    async fn convert(&self, source: &Path, reference: &Path, output: &Path) -> Result<PathBuf> {
        self.calls
            .lock()
            .push((source.to_path_buf(), reference.to_path_buf()));
        if self.fail {
            return Err(DubError::Cloning("converter crashed".to_string()));
        }
        let mut track = AudioTrack::from_wav(source)?;
        track.apply_gain(0.5);
        track.write_wav(output)?;
        Ok(output.to_path_buf())
    }
}

#[derive(Debug, Clone)]
pub struct VideoCall {
    pub video: PathBuf,
    pub dubbed: PathBuf,
    pub volumes: MixVolumes,
    pub output: PathBuf,
}

/// Composer with a fixed media duration; video composition copies the
/// dubbed track to the destination
pub struct FakeComposer {
    pub duration: f64,
    pub probes: Mutex<usize>,
    pub video_calls: Mutex<Vec<VideoCall>>,
}

impl FakeComposer {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            probes: Mutex::new(0),
            video_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaComposer for FakeComposer {
    async fn probe_duration(&self, _media: &Path) -> Result<f64> {
        *self.probes.lock() += 1;
        Ok(self.duration)
    }

    async fn compose_video(
        &self,
        video: &Path,
        dubbed: &Path,
        volumes: MixVolumes,
        output: &Path,
    ) -> Result<PathBuf> {
        self.video_calls.lock().push(VideoCall {
            video: video.to_path_buf(),
            dubbed: dubbed.to_path_buf(),
            volumes,
            output: output.to_path_buf(),
        });
        std::fs::copy(dubbed, output)?;
        Ok(output.to_path_buf())
    }
}

/// A pipeline wired to fakes, working inside a temporary directory
pub struct Harness {
    pub dir: TempDir,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub converter: Arc<FakeConverter>,
    pub composer: Arc<FakeComposer>,
    pub pipeline: TtsDub,
}

impl Harness {
    pub fn new(synthesizer: FakeSynthesizer, converter: FakeConverter, duration: f64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DubConfig {
            output_dir: dir.path().join("outputs"),
            model_dir: dir.path().join("models"),
            sample_rate: SAMPLE_RATE,
            ..DubConfig::default()
        };

        let synthesizer = Arc::new(synthesizer);
        let converter = Arc::new(converter);
        let composer = Arc::new(FakeComposer::new(duration));
        let pipeline = TtsDub::new(
            config,
            synthesizer.clone(),
            converter.clone(),
            composer.clone(),
        );

        Self {
            dir,
            synthesizer,
            converter,
            composer,
            pipeline,
        }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// A reference voice on disk
    pub fn reference(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        AudioTrack::new(SAMPLE_RATE, vec![0.1; 1600])
            .write_wav(&path)
            .unwrap();
        path
    }
}

pub fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Sample ranges holding non-zero audio, as half-open intervals
pub fn non_zero_ranges(samples: &[f32]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = None;
    for (i, s) in samples.iter().enumerate() {
        match (start, *s != 0.0) {
            (None, true) => start = Some(i),
            (Some(begin), false) => {
                ranges.push((begin, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        ranges.push((begin, samples.len()));
    }
    ranges
}

pub const TWO_SPEAKER_SRT: &str = "1
00:00:00,000 --> 00:00:03,000
1, Hello from the first speaker

2
00:00:05,000 --> 00:00:08,000
2, And hello from the second
";
