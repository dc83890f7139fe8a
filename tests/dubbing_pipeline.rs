mod common;

use std::path::PathBuf;

use tts_dub::job::{DubbingJob, PodcastRequest, SpeechRequest};
use tts_dub::media::audio::AudioTrack;
use tts_dub::media::compose::OutputKind;
use tts_dub::notification::MemoryProgressObserver;

use common::*;

fn two_speaker_job(h: &Harness, media: &str) -> DubbingJob {
    let srt = h.write("subs.srt", TWO_SPEAKER_SRT);
    let media = h.write(media, "");
    DubbingJob::new(srt, media, models(&["voice-a", "voice-b"])).with_volumes(0.5, 1.0)
}

#[tokio::test]
async fn audio_job_places_speech_inside_subtitle_spans() {
    let h = Harness::new(FakeSynthesizer::new(4.0), FakeConverter::new(), 10.0);
    let job = two_speaker_job(&h, "clip.wav");

    let outcome = h.pipeline.dub(&job).await;
    assert_eq!(outcome.status, "Dubbing completed!");
    let output = outcome.output.unwrap();
    assert!(output.ends_with("dubbed_audio.wav"));

    let track = AudioTrack::from_wav(&output).unwrap();
    assert_eq!(track.sample_rate, SAMPLE_RATE);
    assert_eq!(track.len(), 10 * SAMPLE_RATE as usize);

    let sr = SAMPLE_RATE as usize;
    assert_eq!(
        non_zero_ranges(&track.samples),
        vec![(0, 3 * sr), (5 * sr, 8 * sr)]
    );
    assert!((track.peak() - 0.9).abs() < 1e-3);

    // Both speaker timelines and the plain mix are kept next to the result
    let job_dir = output.parent().unwrap();
    assert!(job_dir.join("speaker_1_base.wav").exists());
    assert!(job_dir.join("speaker_2_base.wav").exists());
    assert!(job_dir.join("final_dubbed.wav").exists());
    assert!(!job_dir.join("final_cloned.wav").exists());

    let calls = h.synthesizer.calls.lock().clone();
    assert_eq!(
        calls,
        vec![
            ("Hello from the first speaker".to_string(), "voice-a".to_string()),
            ("And hello from the second".to_string(), "voice-b".to_string()),
        ]
    );
}

#[tokio::test]
async fn speaker_without_segments_gets_no_track() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 5.0);
    let srt = h.write(
        "subs.srt",
        "1\n00:00:01,000 --> 00:00:02,000\nOnly the first speaker talks\n",
    );
    let media = h.write("clip.wav", "");
    let job = DubbingJob::new(srt, media, models(&["voice-a", "voice-b", "voice-c"]));

    let output = h.pipeline.try_dub(&job).await.unwrap();
    let job_dir = output.parent().unwrap();
    assert!(job_dir.join("speaker_1_base.wav").exists());
    assert!(!job_dir.join("speaker_2_base.wav").exists());
    assert!(!job_dir.join("speaker_3_base.wav").exists());
}

#[tokio::test]
async fn cloning_keeps_only_speakers_with_a_reference() {
    let h = Harness::new(FakeSynthesizer::new(4.0), FakeConverter::new(), 10.0);
    let reference = h.reference("speaker1.wav");
    let job = two_speaker_job(&h, "clip.wav")
        .with_cloning(true)
        .with_references(vec![Some(reference.clone()), None]);

    let outcome = h.pipeline.dub(&job).await;
    assert_eq!(outcome.status, "Dubbing completed!");
    let output = outcome.output.unwrap();

    let calls = h.converter.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.ends_with("speaker_1_base.wav"));
    assert_eq!(calls[0].1, reference);

    let job_dir = output.parent().unwrap();
    assert!(job_dir.join("speaker_1_cloned.wav").exists());
    assert!(!job_dir.join("speaker_2_cloned.wav").exists());
    assert!(job_dir.join("final_cloned.wav").exists());
    assert!(!job_dir.join("final_dubbed.wav").exists());

    let track = AudioTrack::from_wav(&output).unwrap();
    let sr = SAMPLE_RATE as usize;
    assert_eq!(non_zero_ranges(&track.samples), vec![(0, 3 * sr)]);
}

#[tokio::test]
async fn cloning_failure_yields_error_status_and_no_output() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::failing(), 10.0);
    let reference = h.reference("speaker1.wav");
    let job = two_speaker_job(&h, "clip.wav")
        .with_cloning(true)
        .with_references(vec![Some(reference.clone()), Some(reference)]);

    let outcome = h.pipeline.dub(&job).await;
    assert!(outcome.output.is_none());
    assert!(outcome.status.starts_with("Error: "));
    assert!(outcome.status.contains("converter crashed"));
}

#[tokio::test]
async fn video_job_is_composed_with_both_volumes() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);
    let job = two_speaker_job(&h, "clip.MP4")
        .with_output_kind(OutputKind::Video)
        .with_volumes(0.3, 0.8);

    let output = h.pipeline.try_dub(&job).await.unwrap();
    assert!(output.ends_with("dubbed_video.mp4"));

    let calls = h.composer.video_calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].video.ends_with("clip.MP4"));
    assert!(calls[0].dubbed.ends_with("final_dubbed.wav"));
    assert_eq!(calls[0].volumes.original, 0.3);
    assert_eq!(calls[0].volumes.dubbed, 0.8);
}

#[tokio::test]
async fn video_output_of_audio_source_falls_back_to_audio() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);
    let job = two_speaker_job(&h, "podcast.mp3").with_output_kind(OutputKind::Video);

    let output = h.pipeline.try_dub(&job).await.unwrap();
    assert!(output.ends_with("dubbed_audio.wav"));
    assert!(h.composer.video_calls.lock().is_empty());
}

#[tokio::test]
async fn configuration_errors_stop_before_any_work() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);

    let no_models = two_speaker_job(&h, "clip.wav");
    let no_models = DubbingJob {
        models: models(&["", " "]),
        ..no_models
    };
    let outcome = h.pipeline.dub(&no_models).await;
    assert_eq!(outcome.status, "No models selected");
    assert!(outcome.output.is_none());

    let no_refs = two_speaker_job(&h, "clip.wav")
        .with_cloning(true)
        .with_references(vec![None, None]);
    let outcome = h.pipeline.dub(&no_refs).await;
    assert_eq!(outcome.status, "No reference voices provided for cloning");

    assert_eq!(*h.composer.probes.lock(), 0);
    assert_eq!(h.synthesizer.call_count(), 0);
}

#[tokio::test]
async fn malformed_subtitles_fail_before_synthesis() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);
    let srt = h.write("bad.srt", "1\n00:00:05,000 --> 00:00:01,000\nbackwards\n");
    let media = h.write("clip.wav", "");
    let job = DubbingJob::new(srt, media, models(&["voice-a"]));

    let outcome = h.pipeline.dub(&job).await;
    assert!(outcome.status.starts_with("Error: Subtitle parsing error"));
    assert_eq!(h.synthesizer.call_count(), 0);
}

#[tokio::test]
async fn synthesis_failure_aborts_the_job() {
    let h = Harness::new(FakeSynthesizer::failing_on("voice-b"), FakeConverter::new(), 10.0);
    let job = two_speaker_job(&h, "clip.wav");

    let outcome = h.pipeline.dub(&job).await;
    assert!(outcome.output.is_none());
    assert!(outcome.status.contains("voice-b is broken"));
}

#[tokio::test]
async fn unknown_speaker_segments_are_skipped() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 6.0);
    let srt = h.write(
        "subs.srt",
        "1\n00:00:00,000 --> 00:00:01,000\n1, first\n\n\
         2\n00:00:02,000 --> 00:00:03,000\n4, nobody has this voice\n\n\
         3\n00:00:04,000 --> 00:00:05,000\n0, zero is not a speaker\n",
    );
    let media = h.write("clip.wav", "");
    let job = DubbingJob::new(srt, media, models(&["voice-a"]));

    let output = h.pipeline.try_dub(&job).await.unwrap();
    assert_eq!(h.synthesizer.call_count(), 1);

    let track = AudioTrack::from_wav(&output).unwrap();
    let sr = SAMPLE_RATE as usize;
    assert_eq!(non_zero_ranges(&track.samples), vec![(0, sr)]);
}

#[tokio::test]
async fn concurrent_jobs_use_separate_directories() {
    let h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);
    let job = two_speaker_job(&h, "clip.wav");

    let (a, b) = tokio::join!(h.pipeline.try_dub(&job), h.pipeline.try_dub(&job));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.parent(), b.parent());
    assert!(a.exists() && b.exists());
}

#[tokio::test]
async fn progress_reaches_completion() {
    let mut h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);
    let observer = MemoryProgressObserver::new();
    h.pipeline.add_observer(Box::new(observer.clone()));

    let job = two_speaker_job(&h, "clip.wav");
    h.pipeline.try_dub(&job).await.unwrap();

    let history = observer.history();
    assert!(history.iter().any(|p| p.step == "Generating speech"));
    assert!(history.iter().any(|p| p.step == "Composing output"));
    assert_eq!(history.last().map(|p| p.total_progress), Some(100.0));
}

#[tokio::test]
async fn progress_restarts_for_each_job() {
    let mut h = Harness::new(FakeSynthesizer::new(1.0), FakeConverter::new(), 10.0);
    let observer = MemoryProgressObserver::new();
    h.pipeline.add_observer(Box::new(observer.clone()));

    let job = two_speaker_job(&h, "clip.wav");
    h.pipeline.try_dub(&job).await.unwrap();
    observer.clear_history();
    h.pipeline.try_dub(&job).await.unwrap();

    let history = observer.history();
    let first = &history[0];
    assert_eq!(first.step, "Parsing subtitles");
    assert_eq!(first.total_progress, 0.0);
    assert_eq!(history.last().map(|p| p.total_progress), Some(100.0));
}

#[tokio::test]
async fn single_utterance_with_and_without_cloning() {
    let h = Harness::new(FakeSynthesizer::new(0.5), FakeConverter::new(), 1.0);

    let outcome = h
        .pipeline
        .synthesize_to_file(&SpeechRequest::new("<i>Hello</i> world", "voice-a"))
        .await;
    assert_eq!(outcome.status, "Speech generation successful!");
    assert!(outcome.output.unwrap().ends_with("tts_output.wav"));
    assert_eq!(h.synthesizer.calls.lock()[0].0, "Hello world");

    let reference = h.reference("me.wav");
    let outcome = h
        .pipeline
        .synthesize_to_file(&SpeechRequest::new("Hello", "voice-a").with_reference(reference))
        .await;
    assert_eq!(outcome.status, "Voice cloning successful!");
    assert!(outcome.output.unwrap().ends_with("tts_cloned.wav"));
}

#[tokio::test]
async fn standalone_cloning_reports_missing_files() {
    let h = Harness::new(FakeSynthesizer::new(0.5), FakeConverter::new(), 1.0);
    let base = h.reference("base.wav");
    let reference = h.reference("ref.wav");

    let outcome = h.pipeline.clone_voice(&base, &reference).await;
    assert_eq!(outcome.status, "Voice cloning successful!");
    assert!(outcome.output.unwrap().ends_with("output_cloned.wav"));

    let outcome = h
        .pipeline
        .clone_voice(&PathBuf::from("/missing/base.wav"), &reference)
        .await;
    assert!(outcome.output.is_none());
    assert!(outcome.status.starts_with("Error: File not found"));
}

#[tokio::test]
async fn podcast_concatenates_lines_in_order() {
    let h = Harness::new(FakeSynthesizer::new(0.5), FakeConverter::new(), 1.0);
    let request = PodcastRequest::new(
        "Speaker 1: Welcome\nSpeaker 2: Thanks\n\nSpeaker 1: Bye",
        models(&["voice-a", "voice-b"]),
    );

    let outcome = h.pipeline.generate_podcast(&request).await;
    assert_eq!(outcome.status, "Podcast generation successful!");
    let output = outcome.output.unwrap();
    assert!(output.ends_with("podcast_output.wav"));

    let track = AudioTrack::from_wav(&output).unwrap();
    assert_eq!(track.len(), 3 * SAMPLE_RATE as usize / 2);
    let models_used: Vec<String> = h.synthesizer.calls.lock().iter().map(|c| c.1.clone()).collect();
    assert_eq!(models_used, vec!["voice-a", "voice-b", "voice-a"]);

}

#[tokio::test]
async fn malformed_podcast_scripts_are_errors_before_synthesis() {
    let h = Harness::new(FakeSynthesizer::new(0.5), FakeConverter::new(), 1.0);

    let unknown_speaker = PodcastRequest::new(
        "Speaker 1: Welcome\nSpeaker 3: who?",
        models(&["voice-a"]),
    );
    let outcome = h.pipeline.generate_podcast(&unknown_speaker).await;
    assert!(outcome.output.is_none());
    assert!(outcome.status.starts_with("Error: "), "{}", outcome.status);
    assert!(outcome.status.contains("speaker 3"));

    let no_label = PodcastRequest::new("no colon here", models(&["voice-a"]));
    let outcome = h.pipeline.generate_podcast(&no_label).await;
    assert!(outcome.status.starts_with("Error: "), "{}", outcome.status);

    assert_eq!(h.synthesizer.call_count(), 0);
    assert!(!h.dir.path().join("outputs").exists());
}
