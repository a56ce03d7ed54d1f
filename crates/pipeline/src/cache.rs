//! Model cache
//!
//! Keeps loaded model instances keyed by voice id. The whole
//! resident-check / download / pressure-check / evict / load / insert
//! sequence runs under one async mutex, so concurrent misses never load
//! the same voice twice or evict twice.
//!
//! Ordering is FIFO by default: a hit does not refresh an entry. With
//! [`CacheOrdering::Lru`] hits move the entry to the back.
//!
//! [`ModelCacheManager::get`] hands out a [`ModelLease`], counted inside
//! the critical section. Eviction only takes entries with no lease and no
//! executor lock held, and skips when every entry is busy, so an instance
//! in use is never dropped and never loaded a second time.
//!
//! Evicting a voice also drops its cached reference conditioning.

use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
use voice_synth_config::{CacheConfig, CacheOrdering, EvictionMode};
use voice_synth_core::{
    ArtifactDownloader, ArtifactStore, Error, GenerationParams, MemoryProbe, ModelExecutor,
    ModelLoader, Result,
};

use crate::artifacts::load_artifacts;
use crate::conditioning::ConditioningCache;

pub type ExecutorGuard = OwnedMutexGuard<Box<dyn ModelExecutor>>;

/// A resident voice model
pub struct ModelInstance {
    voice_id: String,
    generation: u64,
    sample_rate: u32,
    loaded_at: Instant,
    leases: AtomicUsize,
    executor: Arc<Mutex<Box<dyn ModelExecutor>>>,
}

impl ModelInstance {
    fn new(voice_id: String, generation: u64, executor: Box<dyn ModelExecutor>) -> Self {
        Self {
            voice_id,
            generation,
            sample_rate: executor.sample_rate(),
            loaded_at: Instant::now(),
            leases: AtomicUsize::new(0),
            executor: Arc::new(Mutex::new(executor)),
        }
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Unique per load; a reloaded voice gets a new generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// Exclusive access to the executor, waiting for any in-flight call
    pub async fn lock(&self) -> ExecutorGuard {
        self.executor.clone().lock_owned().await
    }

    fn is_idle(&self) -> bool {
        self.leases.load(Ordering::SeqCst) == 0 && self.executor.try_lock().is_ok()
    }
}

impl std::fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstance")
            .field("voice_id", &self.voice_id)
            .field("generation", &self.generation)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

/// A resident instance checked out of the cache
///
/// The instance cannot be evicted while any lease on it is alive.
pub struct ModelLease {
    instance: Arc<ModelInstance>,
}

impl ModelLease {
    fn new(instance: Arc<ModelInstance>) -> Self {
        instance.leases.fetch_add(1, Ordering::SeqCst);
        Self { instance }
    }

    pub fn same_instance(&self, other: &ModelLease) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl Deref for ModelLease {
    type Target = ModelInstance;

    fn deref(&self) -> &ModelInstance {
        &self.instance
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        self.instance.leases.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModelLease").field(&*self.instance).finish()
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub resident: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Process-wide cache of loaded voice models
pub struct ModelCacheManager {
    entries: Mutex<VecDeque<Arc<ModelInstance>>>,
    store: Arc<dyn ArtifactStore>,
    downloader: Option<Arc<dyn ArtifactDownloader>>,
    loader: Arc<dyn ModelLoader>,
    memory: Arc<dyn MemoryProbe>,
    conditioning: Option<Arc<ConditioningCache>>,
    params: GenerationParams,
    memory_threshold: f64,
    eviction: EvictionMode,
    ordering: CacheOrdering,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ModelCacheManager {
    pub fn new(
        config: &CacheConfig,
        params: GenerationParams,
        store: Arc<dyn ArtifactStore>,
        downloader: Option<Arc<dyn ArtifactDownloader>>,
        loader: Arc<dyn ModelLoader>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            store,
            downloader,
            loader,
            memory,
            conditioning: None,
            params,
            memory_threshold: config.memory_threshold,
            eviction: config.eviction,
            ordering: config.ordering,
            next_generation: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Drop conditioning derived from a voice when that voice is evicted
    pub fn with_conditioning_cache(mut self, conditioning: Arc<ConditioningCache>) -> Self {
        self.conditioning = Some(conditioning);
        self
    }

    /// Resident instance for `voice_id`, loading it on a miss
    pub async fn get(&self, voice_id: &str, auto_download: bool) -> Result<ModelLease> {
        let mut entries = self.entries.lock().await;

        if let Some(pos) = entries.iter().position(|e| e.voice_id == voice_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("tts_model_cache_hits_total").increment(1);
            if self.ordering == CacheOrdering::Lru {
                if let Some(entry) = entries.remove(pos) {
                    entries.push_back(entry);
                }
            }
            if let Some(entry) = entries.iter().find(|e| e.voice_id == voice_id) {
                return Ok(ModelLease::new(entry.clone()));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("tts_model_cache_misses_total").increment(1);

        self.ensure_artifacts(voice_id, auto_download).await?;
        self.relieve_pressure(&mut entries);

        let started = Instant::now();
        let artifacts = load_artifacts(self.store.as_ref(), voice_id).await?;
        let loader = self.loader.clone();
        let params = self.params.clone();
        let executor = tokio::task::spawn_blocking(move || loader.load(&artifacts, &params))
            .await
            .map_err(|e| Error::Internal(format!("model load task failed: {}", e)))?
            .map_err(|e| match e {
                Error::ModelLoad { .. } => e,
                other => Error::ModelLoad {
                    voice_id: voice_id.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let instance = Arc::new(ModelInstance::new(voice_id.to_string(), generation, executor));
        let lease = ModelLease::new(instance.clone());
        entries.push_back(instance);
        metrics::gauge!("tts_model_cache_size").set(entries.len() as f64);

        tracing::info!(
            voice_id = %voice_id,
            generation,
            sample_rate = lease.sample_rate,
            elapsed_ms = started.elapsed().as_millis() as u64,
            resident = entries.len(),
            "Model loaded"
        );
        Ok(lease)
    }

    async fn ensure_artifacts(&self, voice_id: &str, auto_download: bool) -> Result<()> {
        if self.store.artifact_exists(voice_id).await {
            return Ok(());
        }
        match (&self.downloader, auto_download) {
            (Some(downloader), true) => {
                tracing::info!(voice_id = %voice_id, "Artifacts missing, downloading");
                downloader.download(voice_id).await?;
                if self.store.artifact_exists(voice_id).await {
                    Ok(())
                } else {
                    Err(Error::ModelNotFound {
                        voice_id: voice_id.to_string(),
                    })
                }
            }
            _ => Err(Error::ModelNotFound {
                voice_id: voice_id.to_string(),
            }),
        }
    }

    /// Evict while memory usage is above the threshold: one entry in
    /// [`EvictionMode::Single`], otherwise until below or nothing is idle
    fn relieve_pressure(&self, entries: &mut VecDeque<Arc<ModelInstance>>) {
        while !entries.is_empty() {
            let usage = match self.memory.usage() {
                Ok(usage) => usage,
                Err(e) => {
                    tracing::warn!(error = %e, "Memory probe failed, skipping eviction check");
                    return;
                }
            };
            if usage.ratio() <= self.memory_threshold {
                return;
            }
            tracing::info!(
                ratio = usage.ratio(),
                threshold = self.memory_threshold,
                "Memory pressure, evicting"
            );
            if !self.evict_one(entries) || self.eviction == EvictionMode::Single {
                return;
            }
        }
    }

    /// Oldest idle entry; `false` when every entry is in use
    fn evict_one(&self, entries: &mut VecDeque<Arc<ModelInstance>>) -> bool {
        let Some(pos) = entries.iter().position(|e| e.is_idle()) else {
            tracing::warn!(resident = entries.len(), "Every resident model is in use, skipping eviction");
            return false;
        };
        match entries.remove(pos) {
            Some(instance) => {
                self.retire(&instance, entries.len());
                true
            }
            None => false,
        }
    }

    fn retire(&self, instance: &ModelInstance, resident: usize) {
        if let Some(conditioning) = &self.conditioning {
            conditioning.invalidate_voice(&instance.voice_id);
        }
        self.evictions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("tts_model_cache_evictions_total").increment(1);
        metrics::gauge!("tts_model_cache_size").set(resident as f64);
        tracing::info!(
            voice_id = %instance.voice_id,
            generation = instance.generation,
            resident_secs = instance.loaded_at.elapsed().as_secs(),
            "Model evicted"
        );
    }

    /// Drop a voice from the cache; `false` if it is not resident or is
    /// still in use
    pub async fn evict(&self, voice_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(pos) = entries.iter().position(|e| e.voice_id == voice_id) else {
            return false;
        };
        if !entries[pos].is_idle() {
            tracing::debug!(voice_id = %voice_id, "Model in use, not evicting");
            return false;
        }
        match entries.remove(pos) {
            Some(instance) => {
                self.retire(&instance, entries.len());
                true
            }
            None => false,
        }
    }

    /// `1` for every id whose artifacts are available locally, `0` otherwise
    pub async fn get_download_state<S: AsRef<str>>(&self, voice_ids: &[S]) -> HashMap<String, u8> {
        let mut states = HashMap::with_capacity(voice_ids.len());
        for id in voice_ids {
            let id = id.as_ref();
            let exists = self.store.artifact_exists(id).await;
            states.insert(id.to_string(), u8::from(exists));
        }
        states
    }

    pub async fn is_resident(&self, voice_id: &str) -> bool {
        self.entries.lock().await.iter().any(|e| e.voice_id == voice_id)
    }

    /// Resident voice ids, oldest first
    pub async fn resident(&self) -> Vec<String> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|e| e.voice_id.clone())
            .collect()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            resident: self.entries.lock().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
