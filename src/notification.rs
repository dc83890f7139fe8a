//! Concrete progress observers

use std::sync::Arc;

use parking_lot::Mutex;

use crate::progress::{ProgressInfo, ProgressObserver};

/// Writes progress updates to the `log` facade
pub struct LogProgressObserver {
    prefix: Option<String>,
}

impl LogProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Default for LogProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        match progress.details.as_deref() {
            Some(details) if !details.is_empty() => log::info!(
                "{}{} {:.1}% (total {:.1}%): {}",
                prefix,
                progress.step,
                progress.step_progress,
                progress.total_progress,
                details
            ),
            _ => log::info!(
                "{}{} {:.1}% (total {:.1}%)",
                prefix,
                progress.step,
                progress.step_progress,
                progress.total_progress
            ),
        }
    }
}

/// Keeps every update in memory
///
/// Clones share the same history, so a clone can be handed to a tracker
/// while the original is kept for inspection.
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}
