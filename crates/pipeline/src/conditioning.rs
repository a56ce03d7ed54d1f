//! Reference conditioning
//!
//! A reference clip yields two things for the model:
//! - semantic prompt codes, only when the clip's transcript is known
//!   (16 kHz waveform + zero tail → acoustic embedding → executor codes)
//! - a linear spectrogram of the 32 kHz waveform
//!
//! Conditioning of stored presets is cached per loaded model instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use voice_synth_config::AudioConfig;
use voice_synth_core::{
    silence_len, Error, ModelExecutor, ReferenceConditioning, Result, SslEmbedder,
};

use crate::audio::{limit_peak, load_reference, SpectrogramConfig, SpectrogramExtractor};

/// Derives [`ReferenceConditioning`] from reference audio bytes
pub struct ReferenceConditioner {
    embedder: Arc<dyn SslEmbedder>,
    spectrogram: SpectrogramExtractor,
    ssl_sample_rate: u32,
    spec_sample_rate: u32,
    tail_secs: f32,
}

impl ReferenceConditioner {
    pub fn new(embedder: Arc<dyn SslEmbedder>, config: &AudioConfig) -> Self {
        Self {
            embedder,
            spectrogram: SpectrogramExtractor::new(SpectrogramConfig::from(config)),
            ssl_sample_rate: config.ssl_sample_rate,
            spec_sample_rate: config.spec_sample_rate,
            tail_secs: config.reference_tail_secs,
        }
    }

    /// Blocking; the executor is only used when `prompt_text` is present
    pub fn derive(
        &self,
        audio: &[u8],
        prompt_text: Option<&str>,
        executor: &mut dyn ModelExecutor,
    ) -> Result<ReferenceConditioning> {
        let prompt_text = prompt_text.map(str::trim).filter(|t| !t.is_empty());

        let prompt_codes = match prompt_text {
            Some(_) => {
                let mut wav16k = load_reference(audio, self.ssl_sample_rate)?;
                limit_peak(&mut wav16k);
                wav16k.resize(
                    wav16k.len() + silence_len(self.tail_secs, self.ssl_sample_rate),
                    0.0,
                );
                let ssl = self.embedder.embed(&wav16k)?;
                let codes = executor.extract_prompt_codes(&ssl).map_err(|e| match e {
                    Error::Executor(_) => e,
                    other => Error::Executor(other.to_string()),
                })?;
                Some(codes)
            }
            None => None,
        };

        let mut wav = load_reference(audio, self.spec_sample_rate)?;
        limit_peak(&mut wav);
        let spectrogram = self.spectrogram.compute(&wav)?;

        tracing::debug!(
            semantic = prompt_codes.is_some(),
            prompt_codes = prompt_codes.as_ref().map_or(0, Vec::len),
            frames = spectrogram.ncols(),
            "Derived reference conditioning"
        );

        Ok(ReferenceConditioning {
            prompt_codes,
            spectrogram,
            prompt_text: prompt_text.map(String::from),
        })
    }
}

/// Identifies one cached conditioning
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditioningKey {
    pub voice_id: String,
    /// Load generation of the model instance the codes came from
    pub generation: u64,
    pub reference_id: String,
    /// Primary references carry prompt codes; extra ones only a spectrogram
    pub primary: bool,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditioningStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Conditioning of stored presets, shared across requests
#[derive(Default)]
pub struct ConditioningCache {
    entries: DashMap<ConditioningKey, Arc<ReferenceConditioning>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ConditioningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ConditioningKey) -> Option<Arc<ReferenceConditioning>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert, dropping entries derived from earlier loads of the same voice
    pub fn insert(&self, key: ConditioningKey, conditioning: Arc<ReferenceConditioning>) {
        self.entries
            .retain(|k, _| k.voice_id != key.voice_id || k.generation == key.generation);
        self.entries.insert(key, conditioning);
    }

    pub fn invalidate_voice(&self, voice_id: &str) {
        self.entries.retain(|k, _| k.voice_id != voice_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> ConditioningStats {
        ConditioningStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use ndarray::Array2;
    use voice_synth_core::ExecutorInput;

    struct CountingEmbedder;

    impl SslEmbedder for CountingEmbedder {
        fn embed(&self, waveform_16k: &[f32]) -> Result<Array2<f32>> {
            // One frame per 320 samples, like a 50 Hz encoder
            Ok(Array2::zeros((4, waveform_16k.len() / 320)))
        }
    }

    /// Emits one code per embedding frame
    struct FrameCodes;

    impl ModelExecutor for FrameCodes {
        fn sample_rate(&self) -> u32 {
            32000
        }

        fn extract_prompt_codes(&mut self, ssl_features: &Array2<f32>) -> Result<Vec<i64>> {
            Ok(vec![7; ssl_features.ncols()])
        }

        fn infer(&mut self, _input: &ExecutorInput<'_>) -> Result<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    fn wav(secs: f32, rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..(secs * rate as f32) as usize {
                let v = (i as f32 * 0.05).sin() * 8000.0;
                writer.write_sample(v as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn conditioner() -> ReferenceConditioner {
        ReferenceConditioner::new(Arc::new(CountingEmbedder), &AudioConfig::default())
    }

    #[test]
    fn test_with_transcript_has_prompt_codes() {
        let audio = wav(1.0, 32000);
        let conditioning = conditioner()
            .derive(&audio, Some("你好。"), &mut FrameCodes)
            .unwrap();
        // 1 s + 0.3 s tail at 16 kHz, 320 samples per frame
        assert_eq!(conditioning.prompt_codes.as_ref().map(Vec::len), Some(65));
        assert_eq!(conditioning.prompt_text.as_deref(), Some("你好。"));
        assert_eq!(conditioning.spectrogram.nrows(), 1025);
        assert_eq!(conditioning.spectrogram.ncols(), (32000 - 2048) / 640 + 1);
    }

    #[test]
    fn test_without_transcript_spectrogram_only() {
        let audio = wav(1.0, 48000);
        let conditioning = conditioner().derive(&audio, Some("  "), &mut FrameCodes).unwrap();
        assert!(!conditioning.has_semantic_prompt());
        assert!(conditioning.prompt_text.is_none());
        assert_eq!(conditioning.spectrogram.ncols(), (32000 - 2048) / 640 + 1);
    }

    #[test]
    fn test_invalid_audio_is_rejected() {
        let err = conditioner().derive(b"garbage", None, &mut FrameCodes).unwrap_err();
        assert!(matches!(err, Error::InputValidation(_)));
    }

    fn key(generation: u64, reference_id: &str) -> ConditioningKey {
        ConditioningKey {
            voice_id: "v".into(),
            generation,
            reference_id: reference_id.into(),
            primary: true,
        }
    }

    fn entry() -> Arc<ReferenceConditioning> {
        Arc::new(ReferenceConditioning {
            prompt_codes: None,
            spectrogram: Array2::zeros((2, 2)),
            prompt_text: None,
        })
    }

    #[test]
    fn test_cache_hits_and_misses() {
        let cache = ConditioningCache::new();
        assert!(cache.get(&key(1, "calm")).is_none());
        cache.insert(key(1, "calm"), entry());
        assert!(cache.get(&key(1, "calm")).is_some());
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn test_new_generation_replaces_stale_entries() {
        let cache = ConditioningCache::new();
        cache.insert(key(1, "calm"), entry());
        cache.insert(key(1, "bright"), entry());
        cache.insert(key(2, "calm"), entry());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(2, "calm")).is_some());

        cache.invalidate_voice("v");
        assert!(cache.is_empty());
    }
}
