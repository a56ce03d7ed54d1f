//! Model execution boundary

use ndarray::{Array2, ArrayView2};

use crate::error::Result;
use crate::types::{GenerationParams, ModelArtifacts};

/// Borrowed inputs for one chunk of generation
#[derive(Debug, Clone, Copy)]
pub struct ExecutorInput<'a> {
    /// Target-only phoneme ids, used for waveform decoding
    pub phoneme_ids: &'a [i64],
    /// Prompt + target phoneme ids, used for conditioning length
    pub all_phoneme_ids: &'a [i64],
    pub all_phoneme_len: usize,
    /// Shape `[feature_dim, all_phoneme_len]`
    pub features: ArrayView2<'a, f32>,
    pub prompt_codes: Option<&'a [i64]>,
    /// Primary reference spectrogram first, then any extras
    pub spectrograms: &'a [&'a Array2<f32>],
    pub speed: f32,
}

/// A loaded voice model
///
/// Calls are blocking and take `&mut self`: an instance is never shared by
/// two in-flight calls.
pub trait ModelExecutor: Send {
    /// Native output sample rate
    fn sample_rate(&self) -> u32;

    /// Encode acoustic embeddings of a reference clip into semantic prompt codes
    fn extract_prompt_codes(&mut self, ssl_features: &Array2<f32>) -> Result<Vec<i64>>;

    /// Generate the waveform for one chunk
    fn infer(&mut self, input: &ExecutorInput<'_>) -> Result<Vec<f32>>;
}

/// Builds executors from artifacts on disk
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        artifacts: &ModelArtifacts,
        params: &GenerationParams,
    ) -> Result<Box<dyn ModelExecutor>>;
}
