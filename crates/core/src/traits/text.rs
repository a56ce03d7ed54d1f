//! Text and acoustic feature collaborators

use ndarray::Array2;

use crate::error::Result;
use crate::language::LanguageTag;

/// Contextual per-character features for normalized text
pub trait FeatureExtractor: Send + Sync {
    fn feature_dim(&self) -> usize;

    /// Returns shape `[feature_dim, text.chars().count()]`
    fn extract(&self, text: &str) -> Result<Array2<f32>>;
}

/// Identifies the language of a short text run
pub trait LanguageIdentifier: Send + Sync {
    /// `None` when the text is too short or ambiguous
    fn identify(&self, text: &str) -> Option<LanguageTag>;
}

/// Self-supervised acoustic embedding of a 16 kHz waveform
pub trait SslEmbedder: Send + Sync {
    /// Returns shape `[embedding_dim, frames]`
    fn embed(&self, waveform_16k: &[f32]) -> Result<Array2<f32>>;
}
