//! SRT parsing with speaker tags
//!
//! A cue's text may start with a 1-based speaker number followed by a comma
//! (`"2, hello"`). The tag selects the speaker and is removed from the text
//! that gets synthesized.

use std::path::Path;
use std::time::Duration;

use crate::error::{DubError, Result};
use crate::subtitle::text::clean_cue_text;

/// One subtitled line
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSegment {
    /// 1-based position of the cue in the file
    pub index: usize,
    /// Start of the cue, from the beginning of the media
    pub start: Duration,
    /// End of the cue, always after `start`
    pub end: Duration,
    /// 0-based speaker, or `None` when the tag names no usable speaker (`"0, ..."`)
    pub speaker: Option<usize>,
    /// Cleaned text with the speaker tag removed; never empty
    pub text: String,
}

impl SubtitleSegment {
    pub fn start_secs(&self) -> f64 {
        self.start.as_secs_f64()
    }

    pub fn end_secs(&self) -> f64 {
        self.end.as_secs_f64()
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs() - self.start_secs()
    }
}

/// Parse an SRT file into segments ordered as in the file
pub fn parse_srt_file<P: AsRef<Path>>(path: P) -> Result<Vec<SubtitleSegment>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        DubError::FileNotFound(format!("Failed to open subtitle file {}: {}", path.display(), e))
    })?;

    let segments = parse_srt(&content)?;
    log::info!("Parsed {} subtitle segments from {}", segments.len(), path.display());
    Ok(segments)
}

/// Parse SRT content.
///
/// Any cue with a missing or malformed time range fails the whole parse.
/// Cues whose text is empty after cleanup are dropped.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleSegment>> {
    let content = content.trim_start_matches('\u{feff}');

    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut cue_number = 0;

    for line in content.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }

        cue_number += 1;
        if let Some(segment) = parse_cue_block(&block, cue_number)? {
            segments.push(segment);
        }
        block.clear();
    }

    Ok(segments)
}

fn parse_cue_block(lines: &[&str], cue_number: usize) -> Result<Option<SubtitleSegment>> {
    let timing_pos = lines
        .iter()
        .position(|line| line.contains("-->"))
        .ok_or_else(|| {
            DubError::SubtitleParsing(format!("cue {} has no time range", cue_number))
        })?;

    let (start, end) = parse_time_range(lines[timing_pos]).map_err(|reason| {
        DubError::SubtitleParsing(format!("cue {}: {}", cue_number, reason))
    })?;

    let raw_text = lines[timing_pos + 1..]
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<&str>>()
        .join(" ");

    let (speaker, text) = split_speaker_tag(&clean_cue_text(&raw_text));
    if text.is_empty() {
        log::debug!("Dropping cue {}: empty text", cue_number);
        return Ok(None);
    }

    Ok(Some(SubtitleSegment {
        index: cue_number,
        start,
        end,
        speaker,
        text,
    }))
}

/// Split a leading `"N,"` speaker tag off the text.
///
/// A numeric prefix `N >= 1` yields speaker `N - 1`; a numeric prefix below
/// one yields `None`. Text without a comma, or whose prefix is not a number,
/// belongs to speaker 0 and is kept whole.
pub fn split_speaker_tag(text: &str) -> (Option<usize>, String) {
    let text = text.trim();

    if let Some((prefix, rest)) = text.split_once(',') {
        if let Ok(number) = prefix.trim().parse::<i64>() {
            let speaker = if number >= 1 {
                usize::try_from(number - 1).ok()
            } else {
                None
            };
            return (speaker, rest.trim().to_string());
        }
    }

    (Some(0), text.to_string())
}

fn parse_time_range(line: &str) -> std::result::Result<(Duration, Duration), String> {
    let (start_str, end_str) = line
        .split_once("-->")
        .ok_or_else(|| format!("invalid time range: {}", line))?;

    let start = parse_timestamp(start_str.trim())?;
    // Anything after the end timestamp is positioning metadata
    let end_token = end_str
        .split_whitespace()
        .next()
        .ok_or_else(|| format!("missing end time: {}", line))?;
    let end = parse_timestamp(end_token)?;

    if end <= start {
        return Err(format!("end time does not follow start time: {}", line.trim()));
    }

    Ok((start, end))
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is accepted too)
fn parse_timestamp(timestamp: &str) -> std::result::Result<Duration, String> {
    let invalid = || format!("invalid timestamp: {}", timestamp);

    let parts: Vec<&str> = timestamp.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].trim().parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].trim().parse().map_err(|_| invalid())?;

    let (secs_str, millis_str) = parts[2]
        .split_once(|c: char| c == ',' || c == '.')
        .unwrap_or((parts[2], "0"));
    let seconds: u64 = secs_str.trim().parse().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    let millis_str = millis_str.trim();
    let millis_raw: u64 = millis_str.parse().map_err(|_| invalid())?;
    let millis = match millis_str.len() {
        1 => millis_raw * 100,
        2 => millis_raw * 10,
        3 => millis_raw,
        n => millis_raw / 10_u64.pow(n as u32 - 3),
    };

    Ok(Duration::from_millis(
        hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis,
    ))
}
