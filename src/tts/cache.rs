//! Speech model cache
//!
//! Loaded models are kept in memory up to a byte budget. When a new model
//! pushes the resident total over the budget, least recently used models are
//! evicted until it fits again. The model that was just requested is never
//! evicted, so a single model larger than the budget still works.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::media::audio::AudioTrack;
use crate::tts::{ModelLoader, SpeechModel, Synthesizer};

struct CacheEntry {
    model: Arc<dyn SpeechModel>,
    last_used: u64,
}

/// LRU cache of loaded models bounded by memory
pub struct ModelCache {
    budget_bytes: u64,
    resident_bytes: u64,
    clock: u64,
    entries: HashMap<String, CacheEntry>,
}

impl ModelCache {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            budget_bytes,
            resident_bytes: 0,
            clock: 0,
            entries: HashMap::new(),
        }
    }

    /// Look up a model and mark it as most recently used
    pub fn get(&mut self, name: &str) -> Option<Arc<dyn SpeechModel>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(name).map(|entry| {
            entry.last_used = clock;
            entry.model.clone()
        })
    }

    /// Insert a model, returning whatever had to be evicted to fit it
    pub fn insert(&mut self, model: Arc<dyn SpeechModel>) -> Vec<Arc<dyn SpeechModel>> {
        self.clock += 1;
        let name = model.name().to_string();

        if let Some(previous) = self.entries.remove(&name) {
            self.resident_bytes -= previous.model.memory_bytes();
        }
        self.resident_bytes += model.memory_bytes();
        self.entries.insert(
            name.clone(),
            CacheEntry {
                model,
                last_used: self.clock,
            },
        );

        let mut evicted = Vec::new();
        while self.resident_bytes > self.budget_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(key, _)| **key != name)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());

            let Some(victim) = victim else { break };
            if let Some(entry) = self.entries.remove(&victim) {
                self.resident_bytes -= entry.model.memory_bytes();
                log::info!(
                    "Evicting model {} ({} bytes) to stay within {} bytes",
                    victim,
                    entry.model.memory_bytes(),
                    self.budget_bytes
                );
                evicted.push(entry.model);
            }
        }

        evicted
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }
}

/// [`Synthesizer`] that resolves model names through a [`ModelCache`]
pub struct CachedSynthesizer<L: ModelLoader> {
    loader: L,
    cache: Mutex<ModelCache>,
}

impl<L: ModelLoader> CachedSynthesizer<L> {
    pub fn new(loader: L, cache: ModelCache) -> Self {
        Self {
            loader,
            cache: Mutex::new(cache),
        }
    }

    async fn model(&self, name: &str) -> Result<Arc<dyn SpeechModel>> {
        let mut cache = self.cache.lock().await;
        if let Some(model) = cache.get(name) {
            return Ok(model);
        }

        log::info!("Loading speech model {}", name);
        let model = self.loader.load(name).await?;
        let evicted = cache.insert(model.clone());
        drop(cache);

        for old in evicted {
            self.loader.unload(old).await;
        }
        Ok(model)
    }

    pub async fn resident_models(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[async_trait]
impl<L: ModelLoader> Synthesizer for CachedSynthesizer<L> {
    async fn synthesize(&self, text: &str, model: &str, speaking_rate: f32) -> Result<AudioTrack> {
        let handle = self.model(model).await?;
        handle.synthesize(text, speaking_rate).await
    }
}
