//! Progress tracking for long-running jobs
//!
//! Observer pattern: a [`ProgressTracker`] keeps the weighted state of the
//! job and forwards every change to the observers registered on its
//! [`ProgressReporter`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Snapshot of the job progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Current stage
    pub step: String,
    /// Progress of the current stage (0.0 - 100.0)
    pub step_progress: f32,
    /// Progress of the whole job (0.0 - 100.0)
    pub total_progress: f32,
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(
        step: impl Into<String>,
        step_progress: f32,
        total_progress: f32,
        details: Option<String>,
    ) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Receives progress updates
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Fans progress updates out to observers
pub trait ProgressReporter: Send + Sync {
    /// Register an observer, returning an id usable with `remove_observer`
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    fn notify_progress(&self, progress: ProgressInfo);
}

pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for observer in self.observers.read().values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Stages of a dubbing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    SubtitleParsing,
    MediaProbe,
    SpeechGeneration,
    TimelineExport,
    VoiceCloning,
    Mixing,
    Composition,
}

impl ProcessStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubtitleParsing => "Parsing subtitles",
            Self::MediaProbe => "Probing media",
            Self::SpeechGeneration => "Generating speech",
            Self::TimelineExport => "Exporting speaker tracks",
            Self::VoiceCloning => "Cloning voices",
            Self::Mixing => "Mixing tracks",
            Self::Composition => "Composing output",
        }
    }

    /// Share of the whole job, in percent
    pub fn weight(&self) -> f32 {
        match self {
            Self::SubtitleParsing => 2.0,
            Self::MediaProbe => 3.0,
            Self::SpeechGeneration => 55.0,
            Self::TimelineExport => 5.0,
            Self::VoiceCloning => 20.0,
            Self::Mixing => 5.0,
            Self::Composition => 10.0,
        }
    }
}

struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    fn initial() -> Self {
        Self {
            current_step: ProcessStep::SubtitleParsing,
            step_progress: 0.0,
            total_progress: 0.0,
            completed_steps: HashMap::new(),
        }
    }
}

/// Weighted progress of a job
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: RwLock::new(TrackerState::initial()),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Register an observer on the reporter, creating a default one if needed
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.reporter
            .get_or_insert_with(|| Box::new(DefaultProgressReporter::new()))
            .add_observer(observer)
    }

    /// Move to `step`; the previous step counts as finished
    pub fn set_step(&self, step: ProcessStep) {
        {
            let mut state = self.state.write();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            Self::recompute_total(&mut state);
        }
        self.report(None);
    }

    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        {
            let mut state = self.state.write();
            state.step_progress = progress.clamp(0.0, 100.0);
            Self::recompute_total(&mut state);
        }
        self.report(details);
    }

    /// Forget every step of the previous job; observers are kept
    pub fn reset(&self) {
        *self.state.write() = TrackerState::initial();
    }

    /// Mark the whole job as finished
    pub fn complete(&self) {
        {
            let mut state = self.state.write();
            let current = state.current_step;
            state.completed_steps.insert(current, 100.0);
            state.step_progress = 100.0;
            state.total_progress = 100.0;
        }
        self.report(Some("Job finished".to_string()));
    }

    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    pub fn current_step(&self) -> ProcessStep {
        self.state.read().current_step
    }

    fn recompute_total(state: &mut TrackerState) {
        let mut total = 0.0;
        let mut total_weight = 0.0;

        for (step, progress) in &state.completed_steps {
            if *step == state.current_step {
                continue;
            }
            total += step.weight() * progress / 100.0;
            total_weight += step.weight();
        }
        total += state.current_step.weight() * state.step_progress / 100.0;
        total_weight += state.current_step.weight();

        state.total_progress = (total / total_weight * 100.0).clamp(0.0, 100.0);
    }

    fn report(&self, details: Option<String>) {
        if let Some(reporter) = &self.reporter {
            let info = {
                let state = self.state.read();
                ProgressInfo::new(
                    state.current_step.as_str(),
                    state.step_progress,
                    state.total_progress,
                    details,
                )
            };
            reporter.notify_progress(info);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
