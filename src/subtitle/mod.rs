//! Subtitle handling: SRT parsing, speaker tags and cue text cleanup

pub mod parser;
pub mod text;

pub use parser::{parse_srt, parse_srt_file, split_speaker_tag, SubtitleSegment};
