//! Support code shared by the pipeline stages

pub mod ffmpeg;
pub mod job_dir;
pub mod logger;
