//! Audio buffers, speaker timelines, mixing and output composition

pub mod audio;
pub mod compose;
pub mod mixer;
pub mod timeline;

pub use audio::AudioTrack;
pub use compose::{FfmpegComposer, MediaComposer, MediaKind, MixVolumes, OutputKind};
pub use mixer::TrackMixer;
pub use timeline::{SpeakerTimeline, TimelineSet};
