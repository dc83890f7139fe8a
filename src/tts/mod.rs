//! Speech synthesis
//!
//! The neural model is an opaque collaborator. The pipeline only depends on
//! [`Synthesizer`]; [`cache::CachedSynthesizer`] implements it on top of a
//! [`ModelLoader`] and an LRU [`cache::ModelCache`].

pub mod cache;
pub mod http;
pub mod podcast;
pub mod renderer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::media::audio::AudioTrack;

/// Text to waveform
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the model named `model`
    async fn synthesize(&self, text: &str, model: &str, speaking_rate: f32) -> Result<AudioTrack>;
}

/// A loaded speech model
#[async_trait]
pub trait SpeechModel: Send + Sync {
    fn name(&self) -> &str;

    /// Memory held while the model stays loaded
    fn memory_bytes(&self) -> u64;

    async fn synthesize(&self, text: &str, speaking_rate: f32) -> Result<AudioTrack>;
}

/// Loads and releases speech models
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<Arc<dyn SpeechModel>>;

    /// Called when the cache evicts `model`
    async fn unload(&self, model: Arc<dyn SpeechModel>) {
        log::debug!("Evicted model {}", model.name());
    }
}

pub use cache::{CachedSynthesizer, ModelCache};
pub use renderer::{fit_to_span, RenderStats, SegmentRenderer};
