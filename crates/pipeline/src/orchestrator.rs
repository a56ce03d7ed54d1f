//! Inference orchestration
//!
//! One request runs through:
//! 1. Model instance from the [`ModelCacheManager`]
//! 2. Reference conditioning for the primary and extra references, each
//!    resolved once
//! 3. Paragraph splitting
//! 4. Per-chunk front-end assembly and model inference, strictly in order,
//!    each segment followed by a silence gap
//! 5. Concatenation and 16-bit scaling
//!
//! The cache lease is held for the whole request, so the instance stays
//! resident until its derived conditioning is stored. The executor lock is
//! held from conditioning to the last chunk.
//! Any failure aborts the whole request; partial audio is never returned.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::Array2;
use tracing::Instrument;
use voice_synth_config::{PromptPolicy, Settings};
use voice_synth_core::{
    silence_len, ArtifactStore, Error, ExecutorInput, InferenceRequest, ModelExecutor, OutputAudio,
    ReferenceConditioning, ReferenceSource, Result, TextChunk,
};
use voice_synth_text_processing::TextFrontend;

use crate::audio::resample;
use crate::cache::{ExecutorGuard, ModelCacheManager, ModelInstance};
use crate::conditioning::{ConditioningCache, ConditioningKey, ReferenceConditioner};

/// Cooperative cancellation, checked before each chunk
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrator knobs taken from settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub output_sample_rate: u32,
    pub silence_secs: f32,
    pub prompt_policy: PromptPolicy,
    pub auto_download: bool,
    pub request_timeout: Option<Duration>,
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            output_sample_rate: settings.audio.output_sample_rate,
            silence_secs: settings.audio.silence_secs,
            prompt_policy: settings.text.prompt_policy,
            auto_download: settings.cache.auto_download,
            request_timeout: settings.inference.request_timeout(),
        }
    }
}

/// A reference whose conditioning is known or still has to be derived
enum ResolvedReference {
    Ready(Arc<ReferenceConditioning>),
    Pending {
        key: Option<ConditioningKey>,
        audio: Vec<u8>,
        prompt_text: Option<String>,
    },
}

/// Everything the blocking part of a request needs
struct SynthesisJob {
    chunks: Vec<TextChunk>,
    primary: ResolvedReference,
    extras: Vec<ResolvedReference>,
    speed: f32,
    deadline: Option<(Instant, Duration)>,
    cancel: CancelFlag,
}

/// Output of the blocking part, with conditioning derived along the way
struct SynthesisOutput {
    samples: Vec<f32>,
    chunks: usize,
    derived: Vec<(ConditioningKey, Arc<ReferenceConditioning>)>,
}

/// Drives a request from text to PCM
pub struct InferenceOrchestrator {
    cache: Arc<ModelCacheManager>,
    store: Arc<dyn ArtifactStore>,
    frontend: Arc<TextFrontend>,
    conditioner: Arc<ReferenceConditioner>,
    conditioning_cache: Option<Arc<ConditioningCache>>,
    config: OrchestratorConfig,
}

impl InferenceOrchestrator {
    pub fn new(
        cache: Arc<ModelCacheManager>,
        store: Arc<dyn ArtifactStore>,
        frontend: Arc<TextFrontend>,
        conditioner: Arc<ReferenceConditioner>,
        conditioning_cache: Option<Arc<ConditioningCache>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            cache,
            store,
            frontend,
            conditioner,
            conditioning_cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ModelCacheManager> {
        &self.cache
    }

    pub fn conditioning_cache(&self) -> Option<&Arc<ConditioningCache>> {
        self.conditioning_cache.as_ref()
    }

    /// Synthesize `request` to 16-bit mono PCM at the output rate
    pub async fn run(&self, request: &InferenceRequest) -> Result<OutputAudio> {
        self.run_with_cancel(request, CancelFlag::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        request: &InferenceRequest,
        cancel: CancelFlag,
    ) -> Result<OutputAudio> {
        let span = tracing::info_span!(
            "synthesis",
            request_id = %request.request_id(),
            voice_id = %request.voice_id()
        );

        async move {
            let started = Instant::now();
            tracing::info!(chars = request.text().chars().count(), "Synthesis started");

            let result = self.execute(request, cancel, started).await;
            match &result {
                Ok(audio) => {
                    metrics::counter!("tts_requests_total", "outcome" => "success").increment(1);
                    tracing::info!(
                        samples = audio.len(),
                        duration_secs = audio.duration_secs(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Synthesis finished"
                    );
                }
                Err(e) => {
                    let kind = e.kind();
                    metrics::counter!("tts_requests_total", "outcome" => kind.as_str()).increment(1);
                    if kind.is_public() {
                        tracing::warn!(kind = kind.as_str(), error = %e, "Synthesis rejected");
                    } else {
                        tracing::error!(kind = kind.as_str(), error = %e, "Synthesis failed");
                    }
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &InferenceRequest,
        cancel: CancelFlag,
        started: Instant,
    ) -> Result<OutputAudio> {
        let deadline = self.config.request_timeout.map(|t| (started + t, t));

        let instance = self
            .cache
            .get(request.voice_id(), self.config.auto_download)
            .await?;

        let primary = self.resolve_primary(&instance, request.reference()).await?;
        let mut extras = Vec::new();
        for reference_id in extra_ids(request) {
            extras.push(self.resolve_preset(&instance, reference_id, false).await?);
        }

        let chunks = self.frontend.split(request.text())?;
        if chunks.is_empty() {
            return Err(Error::InputValidation(
                "text contains nothing to synthesize".to_string(),
            ));
        }
        tracing::debug!(chunks = chunks.len(), extras = extras.len(), "Request prepared");

        check_progress(&cancel, deadline)?;
        let guard = instance.lock().await;

        let job = SynthesisJob {
            chunks,
            primary,
            extras,
            speed: request.speed(),
            deadline,
            cancel,
        };
        let frontend = self.frontend.clone();
        let conditioner = self.conditioner.clone();
        let config = self.config.clone();
        let span = tracing::Span::current();

        let output = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            synthesize(guard, job, &frontend, &conditioner, &config)
        })
        .await
        .map_err(|e| Error::Internal(format!("synthesis task failed: {}", e)))??;

        if let Some(cache) = &self.conditioning_cache {
            for (key, conditioning) in output.derived {
                cache.insert(key, conditioning);
            }
        }

        tracing::debug!(chunks = output.chunks, samples = output.samples.len(), "Chunks synthesized");
        Ok(OutputAudio::from_f32(&output.samples, self.config.output_sample_rate))
    }

    async fn resolve_primary(
        &self,
        instance: &ModelInstance,
        reference: &ReferenceSource,
    ) -> Result<ResolvedReference> {
        match reference {
            ReferenceSource::Preset(id) => self.resolve_preset(instance, id, true).await,
            ReferenceSource::Audio { bytes, prompt_text } => Ok(ResolvedReference::Pending {
                key: None,
                audio: bytes.clone(),
                prompt_text: prompt_text.clone(),
            }),
        }
    }

    async fn resolve_preset(
        &self,
        instance: &ModelInstance,
        reference_id: &str,
        primary: bool,
    ) -> Result<ResolvedReference> {
        let key = ConditioningKey {
            voice_id: instance.voice_id().to_string(),
            generation: instance.generation(),
            reference_id: reference_id.to_string(),
            primary,
        };
        if let Some(cached) = self.conditioning_cache.as_ref().and_then(|c| c.get(&key)) {
            tracing::debug!(reference_id = %reference_id, primary, "Reference conditioning cached");
            return Ok(ResolvedReference::Ready(cached));
        }

        let preset = self.store.fetch_preset(instance.voice_id(), reference_id).await?;
        Ok(ResolvedReference::Pending {
            key: Some(key),
            audio: preset.audio,
            // Extra references only contribute a spectrogram
            prompt_text: if primary { preset.text } else { None },
        })
    }
}

/// Extra reference ids, deduplicated and excluding the primary preset
fn extra_ids(request: &InferenceRequest) -> Vec<&str> {
    let mut seen = HashSet::new();
    if let ReferenceSource::Preset(id) = request.reference() {
        seen.insert(id.as_str());
    }
    request
        .extra_reference_ids()
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

fn check_progress(cancel: &CancelFlag, deadline: Option<(Instant, Duration)>) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    match deadline {
        Some((at, budget)) if Instant::now() >= at => Err(Error::Timeout(budget)),
        _ => Ok(()),
    }
}

fn executor_err(e: Error) -> Error {
    match e {
        Error::Executor(_) => e,
        other => Error::Executor(other.to_string()),
    }
}

fn materialize(
    reference: ResolvedReference,
    conditioner: &ReferenceConditioner,
    executor: &mut dyn ModelExecutor,
    derived: &mut Vec<(ConditioningKey, Arc<ReferenceConditioning>)>,
) -> Result<Arc<ReferenceConditioning>> {
    match reference {
        ResolvedReference::Ready(conditioning) => Ok(conditioning),
        ResolvedReference::Pending {
            key,
            audio,
            prompt_text,
        } => {
            let conditioning = Arc::new(conditioner.derive(
                &audio,
                prompt_text.as_deref(),
                executor,
            )?);
            if let Some(key) = key {
                derived.push((key, conditioning.clone()));
            }
            Ok(conditioning)
        }
    }
}

/// Blocking part of a request, run with the executor lock held
fn synthesize(
    mut guard: ExecutorGuard,
    job: SynthesisJob,
    frontend: &TextFrontend,
    conditioner: &ReferenceConditioner,
    config: &OrchestratorConfig,
) -> Result<SynthesisOutput> {
    let SynthesisJob {
        chunks,
        primary,
        extras,
        speed,
        deadline,
        cancel,
    } = job;

    let mut derived = Vec::new();
    let primary = materialize(primary, conditioner, &mut **guard, &mut derived)?;
    let extras = extras
        .into_iter()
        .map(|r| materialize(r, conditioner, &mut **guard, &mut derived))
        .collect::<Result<Vec<_>>>()?;

    let spectrograms: Vec<&Array2<f32>> = std::iter::once(&primary.spectrogram)
        .chain(extras.iter().map(|c| &c.spectrogram))
        .collect();

    let prompt = match (&primary.prompt_codes, &primary.prompt_text) {
        (Some(_), Some(text)) => Some(frontend.process_prompt(text)?),
        _ => None,
    };

    let native_rate = guard.sample_rate();
    let gap = silence_len(config.silence_secs, config.output_sample_rate);
    let total = chunks.len();
    let mut samples = Vec::new();

    for input in frontend.chunk_inputs(chunks, prompt.as_ref(), config.prompt_policy) {
        check_progress(&cancel, deadline)?;
        let input = input?;

        let prompt_codes = if input.has_prompt() {
            primary.prompt_codes.as_deref()
        } else {
            None
        };
        let segment = guard
            .infer(&ExecutorInput {
                phoneme_ids: &input.phoneme_ids,
                all_phoneme_ids: &input.all_phoneme_ids,
                all_phoneme_len: input.all_phoneme_len(),
                features: input.features.view(),
                prompt_codes,
                spectrograms: &spectrograms,
                speed,
            })
            .map_err(executor_err)?;
        let segment = resample(&segment, native_rate, config.output_sample_rate)?;

        tracing::debug!(
            chunk = input.index,
            of = total,
            phonemes = input.phoneme_ids.len(),
            prompt = input.prompt_len,
            samples = segment.len(),
            "Chunk synthesized"
        );
        metrics::counter!("tts_chunks_synthesized_total").increment(1);

        samples.extend_from_slice(&segment);
        samples.resize(samples.len() + gap, 0.0);
    }

    Ok(SynthesisOutput {
        samples,
        chunks: total,
        derived,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(check_progress(&flag, None).is_ok());
        clone.cancel();
        assert!(matches!(check_progress(&flag, None), Err(Error::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let budget = Duration::from_millis(5);
        let past = Instant::now() - Duration::from_millis(10);
        let err = check_progress(&CancelFlag::new(), Some((past, budget))).unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == budget));
    }

    #[test]
    fn test_extra_ids_are_deduplicated() {
        let request = InferenceRequest::builder("hi", "v")
            .reference_id("calm")
            .extra_reference_ids(["bright", "calm", "bright", "warm"])
            .build()
            .unwrap();
        assert_eq!(extra_ids(&request), vec!["bright", "warm"]);
    }

    #[test]
    fn test_executor_errors_are_wrapped() {
        assert!(matches!(executor_err(Error::Audio("x".into())), Error::Executor(_)));
        assert!(matches!(executor_err(Error::Executor("y".into())), Error::Executor(m) if m == "y"));
    }
}
