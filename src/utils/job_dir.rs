//! Job-scoped output directories
//!
//! Every job writes under `<output_root>/<job_id>`, so concurrent jobs never
//! race on artifact paths. File names inside a job directory are fixed per
//! artifact kind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Output directory of a single job
#[derive(Debug)]
pub struct JobDir {
    id: String,
    path: PathBuf,
    /// Per-speaker files that can be removed once the job succeeded
    intermediates: Vec<PathBuf>,
}

impl JobDir {
    /// Create a fresh directory under `output_root`
    pub fn create<P: AsRef<Path>>(output_root: P) -> Result<Self> {
        let id = format!(
            "{}-{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let path = output_root.as_ref().join(&id);
        fs::create_dir_all(&path)?;
        log::debug!("Created job directory {}", path.display());

        Ok(Self {
            id,
            path,
            intermediates: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synthesized timeline of a speaker (0-based id, 1-based in the name)
    pub fn speaker_base(&self, speaker: usize) -> PathBuf {
        self.path.join(format!("speaker_{}_base.wav", speaker + 1))
    }

    /// Tone-converted timeline of a speaker
    pub fn speaker_cloned(&self, speaker: usize) -> PathBuf {
        self.path.join(format!("speaker_{}_cloned.wav", speaker + 1))
    }

    /// Mix of the raw speaker timelines
    pub fn final_dubbed(&self) -> PathBuf {
        self.path.join("final_dubbed.wav")
    }

    /// Mix of the cloned speaker timelines
    pub fn final_cloned(&self) -> PathBuf {
        self.path.join("final_cloned.wav")
    }

    /// Audio-only deliverable
    pub fn dubbed_audio(&self) -> PathBuf {
        self.path.join("dubbed_audio.wav")
    }

    /// Video deliverable
    pub fn dubbed_video(&self) -> PathBuf {
        self.path.join("dubbed_video.mp4")
    }

    pub fn tts_output(&self) -> PathBuf {
        self.path.join("tts_output.wav")
    }

    pub fn tts_cloned(&self) -> PathBuf {
        self.path.join("tts_cloned.wav")
    }

    pub fn voice_cloned(&self) -> PathBuf {
        self.path.join("output_cloned.wav")
    }

    pub fn podcast_output(&self) -> PathBuf {
        self.path.join("podcast_output.wav")
    }

    pub fn podcast_cloned(&self) -> PathBuf {
        self.path.join("podcast_cloned.wav")
    }

    /// Remember a file for [`JobDir::cleanup_intermediates`]
    pub fn track_intermediate(&mut self, path: &Path) {
        self.intermediates.push(path.to_path_buf());
    }

    /// Delete the tracked intermediate files
    pub fn cleanup_intermediates(&mut self) -> Result<()> {
        for file in self.intermediates.drain(..) {
            if file.exists() {
                fs::remove_file(&file)?;
                log::debug!("Removed intermediate {}", file.display());
            }
        }
        Ok(())
    }
}

/// Remove `path` if it exists so a writer never appends to a stale artifact
pub fn remove_existing(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
        log::debug!("Removed existing output {}", path.display());
    }
    Ok(())
}
