//! Per-language text processing
//!
//! A [`LanguageProcessor`] runs the three front-end stages for one language:
//! - `normalize`: punctuation, numerals, script filtering
//! - `convert_to_phonemes`: symbols plus per-character counts
//! - `derive_features`: one feature column per phoneme
//!
//! Dispatch is a closed enum over the supported languages.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::Array2;
use voice_synth_config::{TextConfig, UnknownPhonemePolicy};
use voice_synth_core::{Error, FeatureExtractor, LanguageTag, ProcessedSpan, Result};

use crate::features::{expand_by_counts, zero_features};
use crate::normalize::{chinese, english};
use crate::phonemes::cantonese::CantoneseG2p;
use crate::phonemes::chinese::ChineseG2p;
use crate::phonemes::english::EnglishG2p;
use crate::phonemes::japanese::{self, JapaneseG2p};
use crate::phonemes::korean::{self, KoreanG2p};
use crate::phonemes::Phonemes;
use crate::symbols::SymbolTable;

/// Everything needed to construct processors
#[derive(Clone)]
pub struct ProcessorContext {
    /// Holds one sub-directory per language tag (`zh/`, `en/`, ...)
    pub resources_dir: PathBuf,
    pub feature_dim: usize,
    pub unknown_policy: UnknownPhonemePolicy,
    /// Contextual features for Chinese
    pub feature_extractor: Arc<dyn FeatureExtractor>,
}

impl ProcessorContext {
    pub fn new(config: &TextConfig, feature_extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            resources_dir: config.resources_dir.clone(),
            feature_dim: config.feature_dim,
            unknown_policy: config.unknown_phoneme_policy,
            feature_extractor,
        }
    }

    pub fn language_dir(&self, language: LanguageTag) -> PathBuf {
        self.resources_dir.join(language.as_str())
    }
}

impl fmt::Debug for ProcessorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("resources_dir", &self.resources_dir)
            .field("feature_dim", &self.feature_dim)
            .field("unknown_policy", &self.unknown_policy)
            .finish_non_exhaustive()
    }
}

/// Language-specific normalizer and grapheme-to-phoneme converter
#[derive(Debug, Clone)]
pub enum Phonemizer {
    Chinese(ChineseG2p),
    English(EnglishG2p),
    Japanese(JapaneseG2p),
    Korean(KoreanG2p),
    Cantonese(CantoneseG2p),
}

impl Phonemizer {
    /// Load the dictionaries for `language` from its resource directory
    pub fn load(language: LanguageTag, context: &ProcessorContext) -> Result<Self> {
        let dir = context.language_dir(language);
        Ok(match language {
            LanguageTag::Zh => Self::Chinese(ChineseG2p::load(&dir)?),
            LanguageTag::En => Self::English(EnglishG2p::load(&dir)?),
            LanguageTag::Ja => Self::Japanese(JapaneseG2p::load(&dir)?),
            LanguageTag::Ko => Self::Korean(KoreanG2p::new()),
            LanguageTag::Yue => Self::Cantonese(CantoneseG2p::load(&dir)?),
        })
    }

    pub fn language(&self) -> LanguageTag {
        match self {
            Self::Chinese(_) => LanguageTag::Zh,
            Self::English(_) => LanguageTag::En,
            Self::Japanese(_) => LanguageTag::Ja,
            Self::Korean(_) => LanguageTag::Ko,
            Self::Cantonese(_) => LanguageTag::Yue,
        }
    }

    pub fn normalize(&self, text: &str) -> String {
        match self {
            Self::Chinese(_) | Self::Cantonese(_) => chinese::normalize(text),
            Self::English(_) => english::normalize(text),
            Self::Japanese(_) => japanese::normalize(text),
            Self::Korean(_) => korean::normalize(text),
        }
    }

    pub fn convert(&self, normalized: &str) -> Phonemes {
        match self {
            Self::Chinese(g2p) => g2p.convert(normalized),
            Self::English(g2p) => g2p.convert(normalized),
            Self::Japanese(g2p) => g2p.convert(normalized),
            Self::Korean(g2p) => g2p.convert(normalized),
            Self::Cantonese(g2p) => g2p.convert(normalized),
        }
    }
}

/// Text → (normalized text, phoneme ids, aligned features) for one language
pub struct LanguageProcessor {
    phonemizer: Phonemizer,
    feature_dim: usize,
    unknown_policy: UnknownPhonemePolicy,
    feature_extractor: Arc<dyn FeatureExtractor>,
}

impl LanguageProcessor {
    /// Construct the processor for `language`, loading its dictionaries
    pub fn build(language: LanguageTag, context: &ProcessorContext) -> Result<Self> {
        let phonemizer = Phonemizer::load(language, context)?;
        Self::new(
            phonemizer,
            context.feature_dim,
            context.unknown_policy,
            context.feature_extractor.clone(),
        )
    }

    pub fn new(
        phonemizer: Phonemizer,
        feature_dim: usize,
        unknown_policy: UnknownPhonemePolicy,
        feature_extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self> {
        if matches!(phonemizer, Phonemizer::Chinese(_))
            && feature_extractor.feature_dim() != feature_dim
        {
            return Err(Error::Resource(format!(
                "feature extractor dimension {} does not match configured {}",
                feature_extractor.feature_dim(),
                feature_dim
            )));
        }
        Ok(Self {
            phonemizer,
            feature_dim,
            unknown_policy,
            feature_extractor,
        })
    }

    pub fn language(&self) -> LanguageTag {
        self.phonemizer.language()
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn normalize(&self, text: &str) -> String {
        self.phonemizer.normalize(text)
    }

    /// Symbols and per-character counts; fails if they do not line up with
    /// the normalized text
    pub fn convert_to_phonemes(&self, normalized: &str) -> Result<Phonemes> {
        let phonemes = self.phonemizer.convert(normalized);
        phonemes.check_alignment(normalized)?;
        Ok(phonemes)
    }

    /// Shape `[feature_dim, phonemes.len()]`
    pub fn derive_features(&self, normalized: &str, phonemes: &Phonemes) -> Result<Array2<f32>> {
        match self.phonemizer {
            Phonemizer::Chinese(_) => {
                let char_features = self.feature_extractor.extract(normalized)?;
                expand_by_counts(char_features.view(), &phonemes.counts)
            }
            _ => Ok(zero_features(self.feature_dim, phonemes.len())),
        }
    }

    pub fn process(&self, text: &str) -> Result<ProcessedSpan> {
        let language = self.language();
        let normalized = self.normalize(text);
        let phonemes = self.convert_to_phonemes(&normalized)?;
        let ids = SymbolTable::shared().encode(language, &phonemes.symbols, self.unknown_policy)?;
        let features = self.derive_features(&normalized, &phonemes)?;
        tracing::trace!(
            language = %language,
            chars = phonemes.counts.len(),
            phonemes = ids.len(),
            "Processed span"
        );
        ProcessedSpan::new(language, normalized, ids, features)
    }
}

impl fmt::Debug for LanguageProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageProcessor")
            .field("language", &self.language())
            .field("feature_dim", &self.feature_dim)
            .field("unknown_policy", &self.unknown_policy)
            .finish_non_exhaustive()
    }
}
