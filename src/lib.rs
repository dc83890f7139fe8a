//! tts-dub: subtitle-timed, multi-speaker speech dubbing
//!
//! The library turns an SRT file into per-speaker speech timelines aligned
//! to a media file, optionally re-voices each speaker with a reference
//! recording, mixes the speakers and composes the result with the original
//! audio or video. Single utterances, standalone voice cloning and scripted
//! podcasts share the same collaborators.

pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod notification;
pub mod progress;
pub mod subtitle;
pub mod tts;
pub mod utils;
pub mod voice;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::job::{
    DubbingJob, JobOutcome, PodcastRequest, SpeechRequest, DUBBING_COMPLETED, PODCAST_GENERATED,
    SPEECH_GENERATED, VOICE_CLONED,
};
use crate::media::compose::{FfmpegComposer, MediaComposer, MediaKind, OutputKind};
use crate::media::mixer::TrackMixer;
use crate::media::timeline::TimelineSet;
use crate::progress::{ProcessStep, ProgressObserver, ProgressTracker};
use crate::tts::http::{build_client, HttpSpeechBackend};
use crate::tts::{CachedSynthesizer, ModelCache, SegmentRenderer, Synthesizer};
use crate::utils::job_dir::JobDir;
use crate::voice::{clone_speaker_tracks, HttpToneConverter, ToneConverter};

/// Entry point of the library
///
/// Holds the collaborators for every job. All operations take `&self`, so a
/// single instance can serve concurrent jobs behind an `Arc`; each job
/// writes into its own directory.
pub struct TtsDub {
    config: DubConfig,
    synthesizer: Arc<dyn Synthesizer>,
    converter: Arc<dyn ToneConverter>,
    composer: Arc<dyn MediaComposer>,
    progress_tracker: Option<ProgressTracker>,
}

impl TtsDub {
    pub fn new(
        config: DubConfig,
        synthesizer: Arc<dyn Synthesizer>,
        converter: Arc<dyn ToneConverter>,
        composer: Arc<dyn MediaComposer>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            converter,
            composer,
            progress_tracker: None,
        }
    }

    /// Wire the inference server adapters, the model cache and ffmpeg
    pub fn from_config(config: DubConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;

        let backend = HttpSpeechBackend::new(client.clone(), config.inference_url.clone());
        let synthesizer =
            CachedSynthesizer::new(backend, ModelCache::new(config.model_cache_budget));
        let converter = HttpToneConverter::from_config(client, &config);
        let composer = FfmpegComposer::from_config(&config);

        Ok(Self::new(
            config,
            Arc::new(synthesizer),
            Arc::new(converter),
            Arc::new(composer),
        ))
    }

    pub fn with_progress_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = Some(tracker);
        self
    }

    /// Add a progress observer, creating a tracker if there is none yet
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.progress_tracker
            .get_or_insert_with(ProgressTracker::new)
            .add_observer(observer)
    }

    pub fn config(&self) -> &DubConfig {
        &self.config
    }

    fn step(&self, step: ProcessStep, details: &str) {
        if let Some(tracker) = &self.progress_tracker {
            tracker.set_step(step);
            tracker.update_step_progress(0.0, Some(details.to_string()));
        }
    }

    fn step_done(&self, details: String) {
        if let Some(tracker) = &self.progress_tracker {
            tracker.update_step_progress(100.0, Some(details));
        }
    }

    /// Run a dubbing job and report its outcome as a status
    pub async fn dub(&self, job: &DubbingJob) -> JobOutcome {
        JobOutcome::from_result(self.try_dub(job).await, DUBBING_COMPLETED)
    }

    /// Run a dubbing job, returning the path of the deliverable
    pub async fn try_dub(&self, job: &DubbingJob) -> Result<PathBuf> {
        if let Some(tracker) = &self.progress_tracker {
            tracker.reset();
        }
        job.validate()?;
        self.config.validate()?;
        ensure_file(&job.subtitle_path, "subtitle")?;
        ensure_file(&job.media_path, "media")?;

        log::info!(
            "Dubbing {} with {} ({} speakers, clone: {}, output: {})",
            job.media_path.display(),
            job.subtitle_path.display(),
            job.models.len(),
            job.clone,
            job.output_kind
        );

        self.step(ProcessStep::SubtitleParsing, "Parsing subtitles");
        let segments = subtitle::parse_srt_file(&job.subtitle_path)?;
        self.step_done(format!("{} segments", segments.len()));

        self.step(ProcessStep::MediaProbe, "Reading media duration");
        let duration = self.composer.probe_duration(&job.media_path).await?;
        self.step_done(format!("{:.3}s", duration));

        let mut job_dir = JobDir::create(&self.config.output_dir)?;
        log::info!("Job {} writes to {}", job_dir.id(), job_dir.path().display());

        self.step(ProcessStep::SpeechGeneration, "Synthesizing segments");
        let mut timelines = TimelineSet::new(job.models.len(), duration, self.config.sample_rate);
        let mut renderer = SegmentRenderer::new(self.synthesizer.as_ref(), &job.models)
            .with_speaking_rate(job.speaking_rate);
        if let Some(tracker) = &self.progress_tracker {
            renderer = renderer.with_progress(tracker);
        }
        let stats = renderer.render(&segments, &mut timelines).await?;
        if stats.rendered == 0 {
            log::warn!("No segment produced speech, the dubbed track will be silent");
        }

        self.step(ProcessStep::TimelineExport, "Writing speaker tracks");
        let speaker_files = timelines.export(&mut job_dir)?;
        self.step_done(format!("{} speaker tracks", speaker_files.len()));

        let dubbed = if job.clone {
            self.step(ProcessStep::VoiceCloning, "Cloning speaker voices");
            let cloned = clone_speaker_tracks(
                self.converter.as_ref(),
                &speaker_files,
                &job.references,
                &mut job_dir,
            )
            .await?;
            self.step_done(format!("{} voices cloned", cloned.len()));

            let output = job_dir.final_cloned();
            self.mix(&cloned, &output, timelines.timeline_len())?
        } else {
            let output = job_dir.final_dubbed();
            self.mix(&speaker_files, &output, timelines.timeline_len())?
        };

        self.step(ProcessStep::Composition, "Composing output");
        let output = self.compose(job, &dubbed, &job_dir).await?;

        if self.config.cleanup_intermediates {
            job_dir.cleanup_intermediates()?;
        }
        if let Some(tracker) = &self.progress_tracker {
            tracker.complete();
        }

        log::info!("Dubbing finished: {}", output.display());
        Ok(output)
    }

    fn mix(
        &self,
        tracks: &BTreeMap<usize, PathBuf>,
        output: &Path,
        min_len: usize,
    ) -> Result<PathBuf> {
        self.step(ProcessStep::Mixing, "Mixing speaker tracks");
        if tracks.is_empty() {
            log::warn!("No speaker track to mix, writing silence");
        }
        let inputs: Vec<PathBuf> = tracks.values().cloned().collect();
        let mixed = TrackMixer::new(self.config.mix_headroom).mix_files(
            &inputs,
            output,
            self.config.sample_rate,
            min_len,
        )?;
        self.step_done(format!("Mixed into {}", mixed.display()));
        Ok(mixed)
    }

    async fn compose(&self, job: &DubbingJob, dubbed: &Path, job_dir: &JobDir) -> Result<PathBuf> {
        let media_kind = MediaKind::from_path(&job.media_path);

        match (job.output_kind, media_kind) {
            (OutputKind::Video, MediaKind::Video) => {
                self.composer
                    .compose_video(&job.media_path, dubbed, job.volumes(), &job_dir.dubbed_video())
                    .await
            }
            (output_kind, media_kind) => {
                if output_kind == OutputKind::Video && media_kind == MediaKind::Audio {
                    log::warn!(
                        "{} is not a video, producing an audio file instead",
                        job.media_path.display()
                    );
                }
                self.composer
                    .compose_audio(dubbed, job.dubbed_volume, &job_dir.dubbed_audio())
                    .await
            }
        }
    }

    /// Synthesize one utterance, optionally re-voiced with a reference
    pub async fn synthesize_to_file(&self, request: &SpeechRequest) -> JobOutcome {
        match self.try_synthesize_to_file(request).await {
            Ok((path, status)) => JobOutcome::success(path, status),
            Err(e) => {
                log::error!("Speech generation failed: {}", e);
                JobOutcome::failure(&e)
            }
        }
    }

    async fn try_synthesize_to_file(
        &self,
        request: &SpeechRequest,
    ) -> Result<(PathBuf, &'static str)> {
        request.validate()?;
        let job_dir = JobDir::create(&self.config.output_dir)?;

        let text = subtitle::text::clean_cue_text(&request.text);
        let mut audio = self
            .synthesizer
            .synthesize(&text, request.model.trim(), request.speaking_rate)
            .await?;
        audio.normalize_peak(1.0);

        let output = job_dir.tts_output();
        audio.write_wav(&output)?;
        log::info!("Speech written to {}", output.display());

        match (request.clone, &request.reference) {
            (true, Some(reference)) => {
                ensure_file(reference, "reference voice")?;
                let cloned = self
                    .converter
                    .convert(&output, reference, &job_dir.tts_cloned())
                    .await?;
                Ok((cloned, VOICE_CLONED))
            }
            (true, None) => {
                log::warn!("Cloning requested without a reference voice, keeping the plain speech");
                Ok((output, SPEECH_GENERATED))
            }
            (false, _) => Ok((output, SPEECH_GENERATED)),
        }
    }

    /// Re-voice `base` with the timbre of `reference`
    pub async fn clone_voice(&self, base: &Path, reference: &Path) -> JobOutcome {
        let result = async {
            ensure_file(base, "base voice")?;
            ensure_file(reference, "reference voice")?;
            let job_dir = JobDir::create(&self.config.output_dir)?;
            self.converter
                .convert(base, reference, &job_dir.voice_cloned())
                .await
        }
        .await;
        JobOutcome::from_result(result, VOICE_CLONED)
    }

    /// Render a `Speaker N: text` script into one audio file
    pub async fn generate_podcast(&self, request: &PodcastRequest) -> JobOutcome {
        match self.try_generate_podcast(request).await {
            Ok((path, status)) => JobOutcome::success(path, status),
            Err(e) => {
                log::error!("Podcast generation failed: {}", e);
                JobOutcome::failure(&e)
            }
        }
    }

    async fn try_generate_podcast(
        &self,
        request: &PodcastRequest,
    ) -> Result<(PathBuf, &'static str)> {
        request.validate()?;
        let lines = tts::podcast::parse_script(&request.script)?;
        tts::podcast::check_models(&lines, &request.models)?;
        let job_dir = JobDir::create(&self.config.output_dir)?;

        let mut audio = tts::podcast::render_script(
            self.synthesizer.as_ref(),
            &lines,
            &request.models,
            request.speaking_rate,
        )
        .await?;
        audio.normalize_peak(1.0);

        let output = job_dir.podcast_output();
        audio.write_wav(&output)?;
        log::info!(
            "Podcast of {} lines ({:.1}s) written to {}",
            lines.len(),
            audio.duration_secs(),
            output.display()
        );

        if request.clone {
            if let Some(reference) = request.first_reference() {
                ensure_file(reference, "reference voice")?;
                let cloned = self
                    .converter
                    .convert(&output, reference, &job_dir.podcast_cloned())
                    .await?;
                return Ok((cloned, VOICE_CLONED));
            }
            log::warn!("Cloning requested without a reference voice, keeping the plain podcast");
        }

        Ok((output, PODCAST_GENERATED))
    }

    /// Names of the models installed in the model directory, sorted
    pub fn list_models(&self) -> Result<Vec<String>> {
        list_models(&self.config.model_dir)
    }
}

/// Sub-directory names of `model_dir`, sorted; a missing directory has none
pub fn list_models(model_dir: &Path) -> Result<Vec<String>> {
    if !model_dir.is_dir() {
        log::warn!("Model directory {} does not exist", model_dir.display());
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(model_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn ensure_file(path: &Path, description: &str) -> Result<()> {
    if !path.is_file() {
        let error = format!("{} file {}", description, path.display());
        log::error!("Input {} not found", error);
        return Err(DubError::FileNotFound(error));
    }
    Ok(())
}
