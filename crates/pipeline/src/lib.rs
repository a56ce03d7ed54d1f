//! Speech synthesis inference pipeline
//!
//! - [`audio`]: WAV decoding, resampling, spectrograms
//! - [`artifacts`]: per-voice artifact storage and remote download
//! - [`conditioning`]: reference clip → prompt codes + spectrogram
//! - [`cache`]: process-wide cache of loaded voice models
//! - [`orchestrator`]: request → chunked inference → PCM
//! - [`telemetry`]: tracing and metrics setup

pub mod artifacts;
pub mod audio;
pub mod cache;
pub mod conditioning;
pub mod memory;
pub mod orchestrator;
pub mod telemetry;

use std::sync::Arc;

use voice_synth_config::Settings;
use voice_synth_core::{
    ArtifactStore, FeatureExtractor, GenerationParams, ModelLoader, Result, SslEmbedder,
};
use voice_synth_text_processing::create_frontend;

pub use artifacts::{create_downloader, load_artifacts, HttpArtifactDownloader, LocalArtifactStore};
pub use audio::{decode_wav, limit_peak, resample, SpectrogramConfig, SpectrogramExtractor};
pub use cache::{CacheStats, ExecutorGuard, ModelCacheManager, ModelInstance, ModelLease};
pub use conditioning::{ConditioningCache, ConditioningKey, ConditioningStats, ReferenceConditioner};
pub use memory::{create_memory_probe, SystemMemoryProbe};
pub use orchestrator::{CancelFlag, InferenceOrchestrator, OrchestratorConfig};
pub use telemetry::{describe_metrics, init_tracing, install_metrics_recorder};

/// Wire up the pipeline from settings
///
/// The model loader and the acoustic embedder are supplied by the host, as
/// is the contextual feature extractor for Chinese (zero features when
/// `None`). Artifacts are read from `storage.root/voices`; a downloader is
/// attached when `storage.download_endpoint` is set.
pub fn create_orchestrator(
    settings: &Settings,
    loader: Arc<dyn ModelLoader>,
    embedder: Arc<dyn SslEmbedder>,
    feature_extractor: Option<Arc<dyn FeatureExtractor>>,
) -> Result<InferenceOrchestrator> {
    let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::from_config(&settings.storage));
    let downloader = create_downloader(&settings.storage)?;

    let conditioning_cache = settings
        .cache
        .conditioning_cache
        .then(|| Arc::new(ConditioningCache::new()));
    let mut cache = ModelCacheManager::new(
        &settings.cache,
        GenerationParams::from(&settings.generation),
        store.clone(),
        downloader,
        loader,
        create_memory_probe(),
    );
    if let Some(conditioning) = &conditioning_cache {
        cache = cache.with_conditioning_cache(conditioning.clone());
    }
    let cache = Arc::new(cache);
    let frontend = Arc::new(create_frontend(settings, feature_extractor));
    let conditioner = Arc::new(ReferenceConditioner::new(embedder, &settings.audio));

    tracing::info!(
        voices_dir = %settings.storage.voices_dir().display(),
        memory_threshold = settings.cache.memory_threshold,
        eviction = ?settings.cache.eviction,
        ordering = ?settings.cache.ordering,
        "Inference pipeline ready"
    );

    Ok(InferenceOrchestrator::new(
        cache,
        store,
        frontend,
        conditioner,
        conditioning_cache,
        OrchestratorConfig::from(settings),
    ))
}
