//! Segment rendering
//!
//! Turns subtitle segments into speech and places each waveform on its
//! speaker's timeline. A segment always occupies exactly its subtitle span:
//! longer speech is cut, shorter speech is followed by silence.

use crate::error::Result;
use crate::media::timeline::{sample_offset, TimelineSet};
use crate::progress::ProgressTracker;
use crate::subtitle::SubtitleSegment;
use crate::tts::Synthesizer;

/// Truncate or zero-pad `samples` to exactly `span_len` samples
pub fn fit_to_span(mut samples: Vec<f32>, span_len: usize) -> Vec<f32> {
    samples.resize(span_len, 0.0);
    samples
}

/// Outcome of a rendering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: usize,
    pub skipped: usize,
}

/// Renders segments onto speaker timelines, one at a time
pub struct SegmentRenderer<'a> {
    synthesizer: &'a dyn Synthesizer,
    /// Model per speaker id; a blank entry means no model was selected
    models: &'a [String],
    speaking_rate: f32,
    progress: Option<&'a ProgressTracker>,
}

impl<'a> SegmentRenderer<'a> {
    pub fn new(synthesizer: &'a dyn Synthesizer, models: &'a [String]) -> Self {
        Self {
            synthesizer,
            models,
            speaking_rate: 1.0,
            progress: None,
        }
    }

    pub fn with_speaking_rate(mut self, speaking_rate: f32) -> Self {
        self.speaking_rate = speaking_rate;
        self
    }

    pub fn with_progress(mut self, progress: &'a ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Model assigned to `speaker`, if any
    fn model_for(&self, speaker: Option<usize>) -> Option<&'a str> {
        let models: &'a [String] = self.models;
        speaker
            .and_then(|id| models.get(id))
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
    }

    /// Render every segment into `timelines`.
    ///
    /// Segments whose speaker has no model are skipped with a warning.
    /// A synthesis failure aborts the pass.
    pub async fn render(
        &self,
        segments: &[SubtitleSegment],
        timelines: &mut TimelineSet,
    ) -> Result<RenderStats> {
        let sample_rate = timelines.sample_rate();
        let mut stats = RenderStats::default();

        for (position, segment) in segments.iter().enumerate() {
            let Some(model) = self.model_for(segment.speaker) else {
                log::warn!(
                    "Skipping segment {}: speaker {} has no model (models selected: {})",
                    segment.index,
                    segment
                        .speaker
                        .map(|s| (s + 1).to_string())
                        .unwrap_or_else(|| "<invalid>".to_string()),
                    self.models.len()
                );
                stats.skipped += 1;
                continue;
            };
            // model_for only succeeds for a speaker inside the model list
            let speaker = segment.speaker.unwrap_or(0);

            let Some(timeline) = timelines.get_mut(speaker) else {
                log::warn!(
                    "Skipping segment {}: no timeline for speaker {}",
                    segment.index,
                    speaker + 1
                );
                stats.skipped += 1;
                continue;
            };

            let start = sample_offset(segment.start_secs(), sample_rate);
            let end = sample_offset(segment.end_secs(), sample_rate);
            let span_len = end.saturating_sub(start);

            let audio = self
                .synthesizer
                .synthesize(&segment.text, model, self.speaking_rate)
                .await?;
            let produced = audio.len();
            let audio = audio.resampled(sample_rate)?;

            log::debug!(
                "Segment {} (speaker {}, {}): {} samples synthesized, span {} samples at {}",
                segment.index,
                speaker + 1,
                model,
                produced,
                span_len,
                start
            );

            let fitted = fit_to_span(audio.samples, span_len);
            timeline.accumulate(start, &fitted);
            stats.rendered += 1;

            if let Some(progress) = self.progress {
                progress.update_step_progress(
                    (position + 1) as f32 / segments.len() as f32 * 100.0,
                    Some(format!("Segment {}/{}", position + 1, segments.len())),
                );
            }
        }

        log::info!(
            "Rendered {} segments, skipped {}",
            stats.rendered,
            stats.skipped
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::DubError;
    use crate::media::audio::AudioTrack;

    /// Returns a constant waveform of a fixed length per call
    struct ConstSynth {
        rate: u32,
        len: usize,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ConstSynth {
        fn new(rate: u32, len: usize) -> Self {
            Self {
                rate,
                len,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Synthesizer for ConstSynth {
        async fn synthesize(&self, text: &str, model: &str, _rate: f32) -> Result<AudioTrack> {
            self.calls.lock().push((text.to_string(), model.to_string()));
            Ok(AudioTrack::new(self.rate, vec![0.5; self.len]))
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl Synthesizer for FailingSynth {
        async fn synthesize(&self, _text: &str, model: &str, _rate: f32) -> Result<AudioTrack> {
            Err(DubError::Synthesis(format!("{} crashed", model)))
        }
    }

    fn segment(index: usize, start: f64, end: f64, speaker: Option<usize>) -> SubtitleSegment {
        SubtitleSegment {
            index,
            start: Duration::from_secs_f64(start),
            end: Duration::from_secs_f64(end),
            speaker,
            text: format!("line {}", index),
        }
    }

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fit_to_span() {
        assert_eq!(fit_to_span(vec![1.0; 5], 3), vec![1.0; 3]);
        assert_eq!(fit_to_span(vec![1.0; 2], 4), vec![1.0, 1.0, 0.0, 0.0]);
        assert!(fit_to_span(vec![1.0], 0).is_empty());
    }

    #[tokio::test]
    async fn test_long_speech_is_truncated_to_span() {
        let synth = ConstSynth::new(100, 500);
        let models = models(&["m1"]);
        let mut timelines = TimelineSet::new(1, 10.0, 100);

        let stats = SegmentRenderer::new(&synth, &models)
            .render(&[segment(1, 1.0, 2.0, Some(0))], &mut timelines)
            .await
            .unwrap();

        assert_eq!(stats.rendered, 1);
        let samples = timelines.get(0).unwrap().samples();
        let non_zero: Vec<usize> = (0..samples.len()).filter(|i| samples[*i] != 0.0).collect();
        assert_eq!(non_zero.len(), 100);
        assert_eq!(non_zero.first(), Some(&100));
        assert_eq!(non_zero.last(), Some(&199));
    }

    #[tokio::test]
    async fn test_short_speech_is_padded() {
        let synth = ConstSynth::new(100, 20);
        let models = models(&["m1"]);
        let mut timelines = TimelineSet::new(1, 5.0, 100);

        SegmentRenderer::new(&synth, &models)
            .render(&[segment(1, 0.0, 1.0, Some(0))], &mut timelines)
            .await
            .unwrap();

        let samples = timelines.get(0).unwrap().samples();
        assert!(samples[..20].iter().all(|s| *s == 0.5));
        assert!(samples[20..].iter().all(|s| *s == 0.0));
    }

    #[tokio::test]
    async fn test_overlapping_segments_accumulate() {
        let synth = ConstSynth::new(100, 100);
        let models = models(&["m1"]);
        let mut timelines = TimelineSet::new(1, 3.0, 100);

        SegmentRenderer::new(&synth, &models)
            .render(
                &[segment(1, 0.0, 1.0, Some(0)), segment(2, 0.5, 1.5, Some(0))],
                &mut timelines,
            )
            .await
            .unwrap();

        let samples = timelines.get(0).unwrap().samples();
        assert_eq!(samples[25], 0.5);
        assert_eq!(samples[75], 1.0);
        assert_eq!(samples[125], 0.5);
    }

    #[tokio::test]
    async fn test_segments_past_the_end_are_clipped() {
        let synth = ConstSynth::new(100, 300);
        let models = models(&["m1"]);
        let mut timelines = TimelineSet::new(1, 2.0, 100);

        SegmentRenderer::new(&synth, &models)
            .render(&[segment(1, 1.5, 4.0, Some(0))], &mut timelines)
            .await
            .unwrap();

        let timeline = timelines.get(0).unwrap();
        assert_eq!(timeline.len(), 200);
        assert!(timeline.samples()[150..].iter().all(|s| *s == 0.5));
    }

    #[tokio::test]
    async fn test_unassigned_speakers_are_skipped() {
        let synth = ConstSynth::new(100, 10);
        let models = models(&["m1", " "]);
        let mut timelines = TimelineSet::new(2, 5.0, 100);

        let stats = SegmentRenderer::new(&synth, &models)
            .render(
                &[
                    segment(1, 0.0, 1.0, Some(0)),
                    segment(2, 1.0, 2.0, Some(1)),
                    segment(3, 2.0, 3.0, Some(4)),
                    segment(4, 3.0, 4.0, None),
                ],
                &mut timelines,
            )
            .await
            .unwrap();

        assert_eq!(stats, RenderStats { rendered: 1, skipped: 3 });
        assert_eq!(synth.calls.lock().len(), 1);
        assert!(!timelines.get(1).unwrap().has_content());
    }

    #[tokio::test]
    async fn test_model_rate_is_converted_to_timeline_rate() {
        let synth = ConstSynth::new(200, 200);
        let models = models(&["m1"]);
        let mut timelines = TimelineSet::new(1, 4.0, 100);

        SegmentRenderer::new(&synth, &models)
            .render(&[segment(1, 0.0, 3.0, Some(0))], &mut timelines)
            .await
            .unwrap();

        // One second of speech at 200 Hz becomes one second at 100 Hz
        let samples = timelines.get(0).unwrap().samples();
        assert!(samples[..300].iter().any(|s| *s != 0.0));
        assert!(samples[110..].iter().all(|s| *s == 0.0));
    }

    #[tokio::test]
    async fn test_synthesis_failure_aborts() {
        let models = models(&["broken"]);
        let mut timelines = TimelineSet::new(1, 2.0, 100);

        let result = SegmentRenderer::new(&FailingSynth, &models)
            .render(&[segment(1, 0.0, 1.0, Some(0))], &mut timelines)
            .await;
        assert!(matches!(result, Err(DubError::Synthesis(_))));
    }
}
