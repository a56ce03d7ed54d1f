//! End-to-end synthesis with in-process collaborators

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use parking_lot::Mutex;
use tempfile::TempDir;
use voice_synth_config::{PromptPolicy, Settings};
use voice_synth_core::{
    Error, ErrorKind, ExecutorInput, GenerationParams, InferenceRequest, MemoryProbe, MemoryUsage,
    ModelArtifacts, ModelExecutor, ModelLoader, Result, SslEmbedder,
};
use voice_synth_pipeline::{
    CancelFlag, ConditioningCache, InferenceOrchestrator, LocalArtifactStore, ModelCacheManager,
    OrchestratorConfig, ReferenceConditioner,
};
use voice_synth_text_processing::{
    LanguageProcessorRegistry, ProcessorContext, ScriptIdentifier, TextFrontend,
    ZeroFeatureExtractor,
};

const FEATURE_DIM: usize = 8;
const RATE: u32 = 32000;
/// 0.3 s at 32 kHz
const GAP: usize = 9600;
const SAMPLES_PER_PHONEME: usize = 640;

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Debug, Clone)]
struct Call {
    phonemes: usize,
    all_phonemes: usize,
    has_prompt_codes: bool,
    spectrograms: usize,
    samples: usize,
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail: AtomicBool,
}

struct FakeExecutor {
    recorder: Arc<Recorder>,
}

impl ModelExecutor for FakeExecutor {
    fn sample_rate(&self) -> u32 {
        RATE
    }

    fn extract_prompt_codes(&mut self, ssl_features: &Array2<f32>) -> Result<Vec<i64>> {
        Ok(vec![1; ssl_features.ncols()])
    }

    fn infer(&mut self, input: &ExecutorInput<'_>) -> Result<Vec<f32>> {
        let now = self.recorder.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
        self.recorder.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.recorder.fail.load(Ordering::SeqCst) {
            return Err(Error::Executor("CUDA error: out of memory at /opt/models/gpt.pth".into()));
        }
        assert_eq!(input.features.nrows(), FEATURE_DIM);
        assert_eq!(input.features.ncols(), input.all_phoneme_len);

        let samples = input.phoneme_ids.len() * SAMPLES_PER_PHONEME;
        self.recorder.calls.lock().push(Call {
            phonemes: input.phoneme_ids.len(),
            all_phonemes: input.all_phoneme_len,
            has_prompt_codes: input.prompt_codes.is_some(),
            spectrograms: input.spectrograms.len(),
            samples,
        });
        Ok(vec![0.25; samples])
    }
}

struct FakeLoader {
    recorder: Arc<Recorder>,
    loads: AtomicUsize,
}

impl ModelLoader for FakeLoader {
    fn load(&self, _artifacts: &ModelArtifacts, _params: &GenerationParams) -> Result<Box<dyn ModelExecutor>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeExecutor {
            recorder: self.recorder.clone(),
        }))
    }
}

/// 50 frames per second of 16 kHz audio
struct FrameEmbedder;

impl SslEmbedder for FrameEmbedder {
    fn embed(&self, waveform_16k: &[f32]) -> Result<Array2<f32>> {
        Ok(Array2::zeros((16, waveform_16k.len() / 320)))
    }
}

/// Usage ratio in percent, adjustable from the test
struct Gauge(AtomicU64);

impl MemoryProbe for Gauge {
    fn usage(&self) -> Result<MemoryUsage> {
        Ok(MemoryUsage {
            used: self.0.load(Ordering::SeqCst),
            total: 100,
        })
    }
}

// ============================================================================
// Fixture
// ============================================================================

fn wav(secs: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(secs * RATE as f32) as usize {
            writer.write_sample(((i as f32 * 0.03).sin() * 6000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn write_voice(voices: &Path, voice_id: &str) {
    let dir = voices.join(voice_id);
    std::fs::create_dir_all(dir.join("presets")).unwrap();
    std::fs::write(dir.join("gpt.pth"), b"semantic").unwrap();
    std::fs::write(dir.join("sovits.pth"), b"acoustic").unwrap();
    std::fs::write(dir.join("gptsovits.yaml"), "data:\n  sampling_rate: 32000\n").unwrap();
    std::fs::write(dir.join("presets/calm.wav"), wav(1.0)).unwrap();
    std::fs::write(dir.join("presets/calm.txt"), "你好。\n").unwrap();
    // No transcript: spectrogram only
    std::fs::write(dir.join("presets/bright.wav"), wav(0.5)).unwrap();
}

fn resources_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../text_processing/resources")
}

struct Harness {
    _dir: TempDir,
    orchestrator: InferenceOrchestrator,
    recorder: Arc<Recorder>,
    loader: Arc<FakeLoader>,
    gauge: Arc<Gauge>,
}

fn harness_with(tweak: impl FnOnce(&mut Settings)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.storage.root = dir.path().to_path_buf();
    settings.text.resources_dir = resources_dir();
    settings.text.feature_dim = FEATURE_DIM;
    tweak(&mut settings);

    let voices = settings.storage.voices_dir();
    for voice in ["narrator", "guide", "host"] {
        write_voice(&voices, voice);
    }

    let recorder = Arc::new(Recorder::default());
    let loader = Arc::new(FakeLoader {
        recorder: recorder.clone(),
        loads: AtomicUsize::new(0),
    });
    let gauge = Arc::new(Gauge(AtomicU64::new(20)));
    let store = Arc::new(LocalArtifactStore::new(voices));

    let conditioning = Arc::new(ConditioningCache::new());
    let cache = Arc::new(
        ModelCacheManager::new(
            &settings.cache,
            GenerationParams::from(&settings.generation),
            store.clone(),
            None,
            loader.clone(),
            gauge.clone(),
        )
        .with_conditioning_cache(conditioning.clone()),
    );
    let context = ProcessorContext::new(
        &settings.text,
        Arc::new(ZeroFeatureExtractor::new(FEATURE_DIM)),
    );
    let registry = Arc::new(LanguageProcessorRegistry::new(context));
    let frontend = Arc::new(TextFrontend::from_settings(
        &settings,
        registry,
        Arc::new(ScriptIdentifier),
    ));
    let conditioner = Arc::new(ReferenceConditioner::new(Arc::new(FrameEmbedder), &settings.audio));

    let orchestrator = InferenceOrchestrator::new(
        cache,
        store,
        frontend,
        conditioner,
        Some(conditioning),
        OrchestratorConfig::from(&settings),
    );

    Harness {
        _dir: dir,
        orchestrator,
        recorder,
        loader,
        gauge,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn request(text: &str, voice_id: &str) -> InferenceRequest {
    InferenceRequest::builder(text, voice_id)
        .reference_id("calm")
        .build()
        .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_single_chunk_output_length() {
    let h = harness();
    let audio = h.orchestrator.run(&request("你好，世界！", "narrator")).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(audio.sample_rate, RATE);
    assert_eq!(audio.len(), calls[0].samples + GAP);
    // Four syllables of two phonemes each, the comma and the exclamation mark
    assert_eq!(calls[0].phonemes, 10);
    assert!(calls[0].has_prompt_codes);
    assert!(calls[0].all_phonemes > calls[0].phonemes);

    // Speech first, then the silence gap
    assert_eq!(audio.samples[0], 8192);
    assert!(audio.samples[audio.len() - GAP..].iter().all(|s| *s == 0));
}

#[tokio::test]
async fn test_output_is_sum_of_segments_and_gaps() {
    let h = harness();
    let text = "一，二，三，四，五，六，七，八，九。";
    let audio = h.orchestrator.run(&request(text, "narrator")).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert_eq!(calls.len(), 2);
    let speech: usize = calls.iter().map(|c| c.samples).sum();
    assert_eq!(audio.len(), speech + calls.len() * GAP);

    // Second chunk's speech starts right after the first gap
    let second = calls[0].samples + GAP;
    assert_ne!(audio.samples[second], 0);
    assert_eq!(audio.samples[second - 1], 0);
}

#[tokio::test]
async fn test_prompt_only_on_first_chunk() {
    let h = harness();
    let text = "一，二，三，四，五，六，七，八，九。";
    h.orchestrator.run(&request(text, "narrator")).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert!(calls[0].has_prompt_codes);
    assert!(calls[0].all_phonemes > calls[0].phonemes);
    assert!(!calls[1].has_prompt_codes);
    assert_eq!(calls[1].all_phonemes, calls[1].phonemes);
}

#[tokio::test]
async fn test_prompt_on_every_chunk() {
    let h = harness_with(|s| s.text.prompt_policy = PromptPolicy::EveryChunk);
    let text = "一，二，三，四，五，六，七，八，九。";
    h.orchestrator.run(&request(text, "narrator")).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert!(calls.iter().all(|c| c.has_prompt_codes && c.all_phonemes > c.phonemes));
}

#[tokio::test]
async fn test_preset_without_transcript_has_no_prompt() {
    let h = harness();
    let req = InferenceRequest::builder("你好，世界！", "narrator")
        .reference_id("bright")
        .build()
        .unwrap();
    h.orchestrator.run(&req).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert!(!calls[0].has_prompt_codes);
    assert_eq!(calls[0].all_phonemes, calls[0].phonemes);
}

#[tokio::test]
async fn test_inline_reference_audio() {
    let h = harness();
    let req = InferenceRequest::builder("hello world", "narrator")
        .reference_audio(wav(1.0))
        .prompt_text("你好")
        .build()
        .unwrap();
    let audio = h.orchestrator.run(&req).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert!(calls[0].has_prompt_codes);
    assert_eq!(audio.len(), calls[0].samples + GAP);
    // Inline audio is never cached
    let cache = h.orchestrator.conditioning_cache().unwrap();
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_extra_references_add_spectrograms() {
    let h = harness();
    let req = InferenceRequest::builder("你好，世界！", "narrator")
        .reference_id("calm")
        .extra_reference_ids(["bright", "calm", "bright"])
        .build()
        .unwrap();
    h.orchestrator.run(&req).await.unwrap();

    let calls = h.recorder.calls.lock().clone();
    assert_eq!(calls[0].spectrograms, 2);
}

#[tokio::test]
async fn test_conditioning_reused_across_requests() {
    let h = harness();
    h.orchestrator.run(&request("你好，世界！", "narrator")).await.unwrap();
    h.orchestrator.run(&request("你好，世界！", "narrator")).await.unwrap();

    let stats = h.orchestrator.conditioning_cache().unwrap().stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_same_instance_until_evicted() {
    let h = harness();
    let cache = h.orchestrator.cache();
    let first = cache.get("narrator", false).await.unwrap();
    let second = cache.get("narrator", false).await.unwrap();
    assert!(first.same_instance(&second));
}

#[tokio::test]
async fn test_pressure_keeps_cache_size() {
    let h = harness();
    let cache = h.orchestrator.cache();
    cache.get("narrator", false).await.unwrap();
    cache.get("guide", false).await.unwrap();
    assert_eq!(cache.stats().await.resident, 2);

    h.gauge.0.store(95, Ordering::SeqCst);
    cache.get("host", false).await.unwrap();
    assert_eq!(cache.stats().await.resident, 2);
    assert_eq!(cache.resident().await, vec!["guide", "host"]);
}

#[tokio::test]
async fn test_evicted_voice_releases_conditioning() {
    let h = harness();
    h.orchestrator.run(&request("你好，世界！", "narrator")).await.unwrap();
    let conditioning = h.orchestrator.conditioning_cache().unwrap();
    assert_eq!(conditioning.len(), 1);

    h.gauge.0.store(95, Ordering::SeqCst);
    h.orchestrator.run(&request("你好，世界！", "guide")).await.unwrap();

    assert_eq!(h.orchestrator.cache().resident().await, vec!["guide"]);
    assert_eq!(conditioning.len(), 1);
    assert_eq!(h.orchestrator.cache().stats().await.evictions, 1);
}

#[tokio::test]
async fn test_download_state() {
    let h = harness();
    let states = h
        .orchestrator
        .cache()
        .get_download_state(&["narrator", "missing-id", "../escape"])
        .await;
    assert_eq!(states["narrator"], 1);
    assert_eq!(states["missing-id"], 0);
    assert_eq!(states["../escape"], 0);
}

#[tokio::test]
async fn test_unknown_voice() {
    let h = harness();
    let err = h.orchestrator.run(&request("你好", "ghost")).await.unwrap_err();
    assert!(matches!(err, Error::ModelNotFound { ref voice_id } if voice_id == "ghost"));
    assert_eq!(err.to_response().kind, ErrorKind::ModelNotFound);
}

#[tokio::test]
async fn test_unknown_reference() {
    let h = harness();
    let req = InferenceRequest::builder("你好", "narrator")
        .reference_id("whisper")
        .build()
        .unwrap();
    let err = h.orchestrator.run(&req).await.unwrap_err();
    assert!(matches!(err, Error::ReferenceNotFound { .. }));
    assert!(h.recorder.calls.lock().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_first_chunk() {
    let h = harness();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = h
        .orchestrator
        .run_with_cancel(&request("你好，世界！", "narrator"), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(h.recorder.calls.lock().is_empty());
}

#[tokio::test]
async fn test_zero_timeout_fails_without_audio() {
    let h = harness_with(|s| s.inference.request_timeout_ms = Some(0));
    let err = h
        .orchestrator
        .run(&request("你好，世界！", "narrator"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(h.recorder.calls.lock().is_empty());
}

#[tokio::test]
async fn test_executor_failure_hides_detail() {
    let h = harness();
    h.recorder.fail.store(true, Ordering::SeqCst);
    let err = h
        .orchestrator
        .run(&request("你好，世界！", "narrator"))
        .await
        .unwrap_err();
    let response = err.to_response();
    assert_eq!(response.kind, ErrorKind::Executor);
    assert!(!response.message.contains("/opt/models"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_voice_requests_serialize() {
    let h = Arc::new(harness());
    let text = "一，二，三，四，五，六，七，八，九。";
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.orchestrator.run(&request(text, "narrator")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.recorder.calls.lock().len(), 8);
    assert_eq!(h.recorder.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
}
