//! Text front-end data types
//!
//! All of these live for a single request. The alignment invariant
//! (one feature column per phoneme id) is checked at construction.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::language::LanguageTag;

/// One punctuation-terminated piece of the input text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

/// Contiguous run of a chunk written in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpan {
    pub text: String,
    pub language: LanguageTag,
}

impl LanguageSpan {
    pub fn new(text: impl Into<String>, language: LanguageTag) -> Self {
        Self {
            text: text.into(),
            language,
        }
    }
}

/// Front-end output for one span
#[derive(Debug, Clone)]
pub struct ProcessedSpan {
    pub language: LanguageTag,
    pub normalized_text: String,
    pub phoneme_ids: Vec<i64>,
    /// Shape `[feature_dim, phoneme_ids.len()]`
    pub features: Array2<f32>,
}

impl ProcessedSpan {
    pub fn new(
        language: LanguageTag,
        normalized_text: String,
        phoneme_ids: Vec<i64>,
        features: Array2<f32>,
    ) -> Result<Self> {
        if features.ncols() != phoneme_ids.len() {
            return Err(Error::Internal(format!(
                "{} span has {} feature columns for {} phonemes",
                language,
                features.ncols(),
                phoneme_ids.len()
            )));
        }
        Ok(Self {
            language,
            normalized_text,
            phoneme_ids,
            features,
        })
    }

    pub fn len(&self) -> usize {
        self.phoneme_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phoneme_ids.is_empty()
    }

    pub fn feature_dim(&self) -> usize {
        self.features.nrows()
    }
}

/// Model input for one chunk
///
/// `all_phoneme_ids` and `features` cover prompt + target; `phoneme_ids`
/// holds the target only.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub index: usize,
    pub text: String,
    pub phoneme_ids: Vec<i64>,
    pub all_phoneme_ids: Vec<i64>,
    pub features: Array2<f32>,
    pub prompt_len: usize,
}

impl ChunkInput {
    pub fn all_phoneme_len(&self) -> usize {
        self.all_phoneme_ids.len()
    }

    pub fn has_prompt(&self) -> bool {
        self.prompt_len > 0
    }
}
