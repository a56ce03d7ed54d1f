//! Process-wide table of language processors
//!
//! One slot per language tag. Each slot is built on first use, at most
//! once, and a slow construction only blocks callers of the same tag.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use voice_synth_core::{LanguageSpan, LanguageTag, ProcessedSpan, Result};

use crate::processor::{LanguageProcessor, ProcessorContext};

/// Memoizing factory for [`LanguageProcessor`]s
#[derive(Debug)]
pub struct LanguageProcessorRegistry {
    context: ProcessorContext,
    slots: [OnceCell<Arc<LanguageProcessor>>; LanguageTag::ALL.len()],
    constructions: AtomicUsize,
}

impl LanguageProcessorRegistry {
    pub fn new(context: ProcessorContext) -> Self {
        Self {
            context,
            slots: Default::default(),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Processor for `language`, constructing it on first access.
    /// A failed construction leaves the slot empty so a later call retries.
    pub fn get(&self, language: LanguageTag) -> Result<Arc<LanguageProcessor>> {
        self.slots[language.index()]
            .get_or_try_init(|| {
                let started = Instant::now();
                let processor = LanguageProcessor::build(language, &self.context)?;
                self.constructions.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    language = %language,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Language processor loaded"
                );
                Ok(Arc::new(processor))
            })
            .cloned()
    }

    /// Run the processor for the span's language over its text
    pub fn process(&self, span: &LanguageSpan) -> Result<ProcessedSpan> {
        self.get(span.language)?.process(&span.text)
    }

    pub fn is_loaded(&self, language: LanguageTag) -> bool {
        self.slots[language.index()].get().is_some()
    }

    /// Number of processors built so far
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    pub fn feature_dim(&self) -> usize {
        self.context.feature_dim
    }
}
