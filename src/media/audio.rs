//! In-memory mono audio and its WAV representation
//!
//! Every artifact the pipeline writes is mono 16-bit signed PCM. Samples are
//! held as `f32` in the nominal range `[-1.0, 1.0]` while in memory.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{DubError, Result};

const I16_SCALE: f32 = i16::MAX as f32;

/// Peaks below this are treated as silence when normalizing
const SILENCE_FLOOR: f32 = 1e-6;

/// A mono waveform with its sampling rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioTrack {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    /// An all-zero track of `len` samples
    pub fn silent(sample_rate: u32, len: usize) -> Self {
        Self::new(sample_rate, vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// True when no sample is non-zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0.0)
    }

    /// Scale so the peak equals `target`. Silent tracks are left untouched.
    pub fn normalize_peak(&mut self, target: f32) {
        let peak = self.peak();
        if peak <= SILENCE_FLOOR {
            return;
        }
        let factor = target / peak;
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Multiply every sample by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }

    /// Read a WAV file, down-mixing to mono
    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|e| {
            DubError::AudioProcessing(format!("Failed to open WAV file {}: {}", path.display(), e))
        })?;
        Self::from_reader(reader)
    }

    /// Decode WAV bytes received from a collaborator
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / I16_SCALE))
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
            (SampleFormat::Int, bits @ (8 | 24 | 32)) => {
                let scale = (1u64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<f32>, hound::Error>>()?
            }
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
            (format, bits) => {
                return Err(DubError::AudioProcessing(format!(
                    "Unsupported WAV layout: {:?}, {} bits",
                    format, bits
                )));
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = if channels > 1 {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            interleaved
        };

        Ok(Self::new(spec.sample_rate, samples))
    }

    /// Write as mono 16-bit PCM. Samples outside `[-1, 1]` are clipped.
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path.as_ref(), spec)?;
        for sample in &self.samples {
            writer.write_sample(quantize(*sample))?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Convert to `target_rate`, preserving duration
    pub fn resampled(self, target_rate: u32) -> Result<Self> {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Ok(Self::new(target_rate, self.samples));
        }
        let samples = resample(&self.samples, self.sample_rate, target_rate)?;
        Ok(Self::new(target_rate, samples))
    }
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * I16_SCALE).round() as i16
}

/// Sinc resampling of a mono buffer; the output holds
/// `round(len * target / source)` samples
fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(DubError::AudioProcessing(format!(
            "Cannot resample between {} Hz and {} Hz",
            source_rate, target_rate
        )));
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 1)
        .map_err(|e| DubError::AudioProcessing(format!("Failed to create resampler: {}", e)))?;

    let expected = (input.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + chunk_size);

    let mut pos = 0;
    while input.len() - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let frames = vec![input[pos..pos + needed].to_vec()];
        let out = resampler
            .process(&frames, None)
            .map_err(|e| DubError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
        pos += needed;
    }

    if pos < input.len() {
        let frames = vec![input[pos..].to_vec()];
        let out = resampler
            .process_partial(Some(frames.as_slice()), None)
            .map_err(|e| DubError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
    }

    // Drain the filter delay
    while output.len() < expected + delay {
        let out = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| DubError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let mut samples: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    samples.resize(expected, 0.0);
    Ok(samples)
}
