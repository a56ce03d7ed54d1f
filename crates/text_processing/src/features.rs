//! Linguistic feature alignment
//!
//! Feature extractors produce one column per normalized character; the
//! front-end repeats each column by the number of phonemes that character
//! produced, so that the result has exactly one column per phoneme.

use std::sync::Arc;

use ndarray::{s, Array2, ArrayView2};
use voice_synth_core::{Error, FeatureExtractor, Result};

/// Extractor that yields all-zero features
///
/// Used for every language without a contextual feature model, and for
/// Chinese when no model is configured.
#[derive(Debug, Clone, Copy)]
pub struct ZeroFeatureExtractor {
    dim: usize,
}

impl ZeroFeatureExtractor {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl FeatureExtractor for ZeroFeatureExtractor {
    fn feature_dim(&self) -> usize {
        self.dim
    }

    fn extract(&self, text: &str) -> Result<Array2<f32>> {
        Ok(Array2::zeros((self.dim, text.chars().count())))
    }
}

/// Create the default feature extractor
pub fn create_feature_extractor(dim: usize) -> Arc<dyn FeatureExtractor> {
    Arc::new(ZeroFeatureExtractor::new(dim))
}

/// Zero features of shape `[dim, len]`
pub fn zero_features(dim: usize, len: usize) -> Array2<f32> {
    Array2::zeros((dim, len))
}

/// Repeat character column `i` `counts[i]` times
pub fn expand_by_counts(char_features: ArrayView2<'_, f32>, counts: &[usize]) -> Result<Array2<f32>> {
    if char_features.ncols() != counts.len() {
        return Err(Error::Internal(format!(
            "feature extractor returned {} columns for {} characters",
            char_features.ncols(),
            counts.len()
        )));
    }
    let total: usize = counts.iter().sum();
    let mut expanded = Array2::zeros((char_features.nrows(), total));
    let mut col = 0;
    for (i, count) in counts.iter().enumerate() {
        for _ in 0..*count {
            expanded
                .slice_mut(s![.., col])
                .assign(&char_features.slice(s![.., i]));
            col += 1;
        }
    }
    Ok(expanded)
}
