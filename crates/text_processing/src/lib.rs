//! Multi-language text front-end
//!
//! Turns raw input text into model-ready phoneme sequences:
//! - Paragraph chunking on sentence and clause delimiters
//! - Language segmentation (zh, en, ja, ko, yue)
//! - Per-language normalization and grapheme-to-phoneme conversion
//! - Linguistic feature alignment (one column per phoneme)
//! - Chunk assembly with an optional reference prompt

pub mod features;
pub mod frontend;
pub mod normalize;
pub mod phonemes;
pub mod processor;
pub mod registry;
pub mod segmenter;
pub mod splitter;
pub mod symbols;

use std::sync::Arc;

use voice_synth_config::Settings;
use voice_synth_core::FeatureExtractor;

pub use features::{create_feature_extractor, ZeroFeatureExtractor};
pub use frontend::{ChunkInputs, FrontendAssembler, TextFrontend};
pub use processor::{LanguageProcessor, Phonemizer, ProcessorContext};
pub use registry::LanguageProcessorRegistry;
pub use segmenter::{create_identifier, LanguageSegmenter, ScriptIdentifier};
#[cfg(feature = "lingua")]
pub use segmenter::LinguaIdentifier;
pub use splitter::ParagraphSplitter;
pub use symbols::SymbolTable;

/// Build the front-end from settings
///
/// Processors are constructed lazily on first use of each language, so
/// this never touches the resource directory.
pub fn create_frontend(
    settings: &Settings,
    feature_extractor: Option<Arc<dyn FeatureExtractor>>,
) -> TextFrontend {
    let feature_extractor =
        feature_extractor.unwrap_or_else(|| create_feature_extractor(settings.text.feature_dim));
    let context = ProcessorContext::new(&settings.text, feature_extractor);
    let registry = Arc::new(LanguageProcessorRegistry::new(context));
    TextFrontend::from_settings(settings, registry, create_identifier())
}
