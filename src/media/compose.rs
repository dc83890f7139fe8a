//! Final output composition
//!
//! [`MediaComposer`] is the only place where external media tools run.
//! [`FfmpegComposer`] builds explicit ffmpeg/ffprobe argument vectors, which
//! are exposed as plain functions so they can be checked without ffmpeg.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::media::audio::AudioTrack;
use crate::utils::ffmpeg::{locate_tool, run_tool};
use crate::utils::job_dir::remove_existing;

const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mkv", "avi"];

/// Container family of the source media, inferred from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                VIDEO_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);

        if is_video {
            Self::Video
        } else {
            Self::Audio
        }
    }
}

/// Requested deliverable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputKind {
    #[default]
    Audio,
    Video,
}

impl FromStr for OutputKind {
    type Err = DubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(DubError::InvalidInput(format!(
                "Unknown output type '{}', expected Audio or Video",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "Audio"),
            Self::Video => write!(f, "Video"),
        }
    }
}

/// Volume multipliers applied during composition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixVolumes {
    pub original: f32,
    pub dubbed: f32,
}

impl Default for MixVolumes {
    fn default() -> Self {
        Self {
            original: 0.5,
            dubbed: 1.0,
        }
    }
}

/// Write `dubbed` scaled by `volume` to `output`
pub fn write_scaled_track(dubbed: &Path, volume: f32, output: &Path) -> Result<PathBuf> {
    let mut track = AudioTrack::from_wav(dubbed)?;
    track.apply_gain(volume);
    remove_existing(output)?;
    track.write_wav(output)?;
    Ok(output.to_path_buf())
}

#[async_trait]
pub trait MediaComposer: Send + Sync {
    /// Duration of `media` in seconds
    async fn probe_duration(&self, media: &Path) -> Result<f64>;

    /// Audio deliverable: the dubbed track scaled by the dubbed volume
    async fn compose_audio(&self, dubbed: &Path, volume: f32, output: &Path) -> Result<PathBuf> {
        write_scaled_track(dubbed, volume, output)
    }

    /// Video deliverable: original video stream with the original audio
    /// and the dubbed track mixed under their volumes
    async fn compose_video(
        &self,
        video: &Path,
        dubbed: &Path,
        volumes: MixVolumes,
        output: &Path,
    ) -> Result<PathBuf>;
}

/// ffprobe arguments printing the container duration in seconds
pub fn duration_probe_args(media: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        media.to_string_lossy().into_owned(),
    ]
}

/// ffprobe arguments listing the audio streams of a file
pub fn audio_stream_probe_args(media: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "a".to_string(),
        "-show_entries".to_string(),
        "stream=index".to_string(),
        "-of".to_string(),
        "csv=p=0".to_string(),
        media.to_string_lossy().into_owned(),
    ]
}

/// ffmpeg arguments muxing the dubbed audio under the original video.
///
/// With `video_has_audio` the original sound is kept at `volumes.original`
/// and mixed with the dubbed track; the mix stops with the shorter input.
/// The video stream is copied, the audio is encoded as AAC.
pub fn video_compose_args(
    video: &Path,
    dubbed: &Path,
    volumes: MixVolumes,
    video_has_audio: bool,
    output: &Path,
) -> Vec<String> {
    let filter = if video_has_audio {
        format!(
            "[0:a]volume={:.3}[orig];[1:a]volume={:.3}[dub];[orig][dub]amix=inputs=2:duration=shortest:normalize=0[aout]",
            volumes.original, volumes.dubbed
        )
    } else {
        format!("[1:a]volume={:.3}[aout]", volumes.dubbed)
    };

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-i".into(),
        dubbed.to_string_lossy().into_owned(),
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "[aout]".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
    ];
    if !video_has_audio {
        args.push("-shortest".into());
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

fn parse_duration(stdout: &str, media: &Path) -> Result<f64> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let duration: f64 = line.parse().map_err(|_| {
        DubError::Composition(format!(
            "Could not read duration of {} from ffprobe output '{}'",
            media.display(),
            line
        ))
    })?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(DubError::Composition(format!(
            "{} has no usable duration ({})",
            media.display(),
            duration
        )));
    }
    Ok(duration)
}

/// [`MediaComposer`] backed by the ffmpeg command line tools
#[derive(Debug, Clone)]
pub struct FfmpegComposer {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegComposer {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegComposer {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &DubConfig) -> Self {
        Self::new(config.ffmpeg.clone(), config.ffprobe.clone())
    }

    /// Fail early when ffmpeg or ffprobe is not installed
    pub fn ensure_available(&self) -> Result<()> {
        locate_tool(&self.ffmpeg)?;
        locate_tool(&self.ffprobe)?;
        Ok(())
    }

    async fn has_audio_stream(&self, media: &Path) -> Result<bool> {
        let stdout = run_tool(&self.ffprobe, audio_stream_probe_args(media)).await?;
        Ok(stdout.lines().any(|l| !l.trim().is_empty()))
    }
}

#[async_trait]
impl MediaComposer for FfmpegComposer {
    async fn probe_duration(&self, media: &Path) -> Result<f64> {
        if !media.exists() {
            return Err(DubError::FileNotFound(media.display().to_string()));
        }
        let stdout = run_tool(&self.ffprobe, duration_probe_args(media)).await?;
        let duration = parse_duration(&stdout, media)?;
        log::info!("{} lasts {:.3}s", media.display(), duration);
        Ok(duration)
    }

    async fn compose_video(
        &self,
        video: &Path,
        dubbed: &Path,
        volumes: MixVolumes,
        output: &Path,
    ) -> Result<PathBuf> {
        let has_audio = self.has_audio_stream(video).await?;
        if !has_audio {
            log::warn!(
                "{} has no audio stream, using the dubbed track alone",
                video.display()
            );
        }

        remove_existing(output)?;
        let args = video_compose_args(video, dubbed, volumes, has_audio, output);
        run_tool(&self.ffmpeg, &args).await?;

        if !output.exists() {
            return Err(DubError::Composition(format!(
                "ffmpeg finished but {} was not created",
                output.display()
            )));
        }
        log::info!("Video written to {}", output.display());
        Ok(output.to_path_buf())
    }
}
