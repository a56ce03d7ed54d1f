//! Text front-end assembly
//!
//! [`FrontendAssembler`] concatenates the processed spans of a chunk along
//! the phoneme axis, optionally behind a reference prompt. [`TextFrontend`]
//! wires splitter, segmenter and registry together and hands the
//! orchestrator a single-pass iterator of chunk inputs.

use std::sync::Arc;

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use voice_synth_config::{PromptPolicy, Settings};
use voice_synth_core::{
    ChunkInput, Error, LanguageIdentifier, LanguageTag, ProcessedSpan, Result, TextChunk,
};

use crate::registry::LanguageProcessorRegistry;
use crate::segmenter::LanguageSegmenter;
use crate::splitter::{is_delimiter, ParagraphSplitter};

#[derive(Debug, Clone, Copy)]
pub struct FrontendAssembler {
    feature_dim: usize,
}

impl FrontendAssembler {
    pub fn new(feature_dim: usize) -> Self {
        Self { feature_dim }
    }

    /// Join spans in order into one span. The language is that of the
    /// first span.
    pub fn merge_spans(&self, spans: &[ProcessedSpan]) -> Result<ProcessedSpan> {
        let language = spans.first().map_or(LanguageTag::Zh, |s| s.language);
        let normalized: String = spans.iter().map(|s| s.normalized_text.as_str()).collect();
        let ids: Vec<i64> = spans.iter().flat_map(|s| s.phoneme_ids.iter().copied()).collect();
        let features = self.concat_features(spans.iter().map(|s| s.features.view()))?;
        ProcessedSpan::new(language, normalized, ids, features)
    }

    /// Build the model input for one chunk. With a prompt, `all_phoneme_ids`
    /// and `features` are prompt followed by target while `phoneme_ids`
    /// stays target-only.
    pub fn assemble(
        &self,
        chunk: &TextChunk,
        spans: &[ProcessedSpan],
        prompt: Option<&ProcessedSpan>,
    ) -> Result<ChunkInput> {
        let phoneme_ids: Vec<i64> = spans.iter().flat_map(|s| s.phoneme_ids.iter().copied()).collect();
        let prompt_len = prompt.map_or(0, ProcessedSpan::len);

        let mut all_phoneme_ids = Vec::with_capacity(prompt_len + phoneme_ids.len());
        if let Some(prompt) = prompt {
            all_phoneme_ids.extend_from_slice(&prompt.phoneme_ids);
        }
        all_phoneme_ids.extend_from_slice(&phoneme_ids);

        let features = self.concat_features(
            prompt
                .into_iter()
                .chain(spans.iter())
                .map(|s| s.features.view()),
        )?;

        Ok(ChunkInput {
            index: chunk.index,
            text: chunk.text.clone(),
            phoneme_ids,
            all_phoneme_ids,
            features,
            prompt_len,
        })
    }

    fn concat_features<'a>(
        &self,
        views: impl Iterator<Item = ArrayView2<'a, f32>>,
    ) -> Result<Array2<f32>> {
        let views: Vec<ArrayView2<'a, f32>> = views.collect();
        if let Some(bad) = views.iter().find(|v| v.nrows() != self.feature_dim) {
            return Err(Error::Internal(format!(
                "span features have {} rows, expected {}",
                bad.nrows(),
                self.feature_dim
            )));
        }
        if views.is_empty() {
            return Ok(Array2::zeros((self.feature_dim, 0)));
        }
        concatenate(Axis(1), &views).map_err(|e| Error::Internal(format!("feature concat: {}", e)))
    }
}

/// Splitter, segmenter and language processors behind one interface
pub struct TextFrontend {
    splitter: ParagraphSplitter,
    segmenter: LanguageSegmenter,
    registry: Arc<LanguageProcessorRegistry>,
    assembler: FrontendAssembler,
    min_phonemes: usize,
}

impl TextFrontend {
    pub fn new(
        splitter: ParagraphSplitter,
        segmenter: LanguageSegmenter,
        registry: Arc<LanguageProcessorRegistry>,
        min_phonemes: usize,
    ) -> Self {
        let assembler = FrontendAssembler::new(registry.feature_dim());
        Self {
            splitter,
            segmenter,
            registry,
            assembler,
            min_phonemes,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        registry: Arc<LanguageProcessorRegistry>,
        identifier: Arc<dyn LanguageIdentifier>,
    ) -> Self {
        Self::new(
            ParagraphSplitter::from_config(&settings.splitter),
            LanguageSegmenter::new(identifier, &settings.text),
            registry,
            settings.text.min_phonemes,
        )
    }

    pub fn registry(&self) -> &Arc<LanguageProcessorRegistry> {
        &self.registry
    }

    pub fn split(&self, text: &str) -> Result<Vec<TextChunk>> {
        self.splitter.split(text)
    }

    /// Segment and process one piece of text. Very short results are
    /// retried once with a leading pause mark.
    pub fn process_text(&self, text: &str) -> Result<Vec<ProcessedSpan>> {
        let spans = self.process_segments(text)?;
        let total: usize = spans.iter().map(ProcessedSpan::len).sum();
        if total >= self.min_phonemes {
            return Ok(spans);
        }
        tracing::debug!(phonemes = total, "Short phoneme sequence, retrying with leading pause");
        self.process_segments(&format!(".{}", text))
    }

    fn process_segments(&self, text: &str) -> Result<Vec<ProcessedSpan>> {
        self.segmenter
            .segment(text)
            .iter()
            .map(|span| self.registry.process(span))
            .collect()
    }

    /// The reference transcript as a single prompt span, terminated like a sentence
    pub fn process_prompt(&self, prompt_text: &str) -> Result<ProcessedSpan> {
        let trimmed = prompt_text.trim();
        if trimmed.is_empty() {
            return Err(Error::InputValidation("prompt text is empty".to_string()));
        }
        let mut text = trimmed.to_string();
        if !text.chars().last().map_or(false, is_delimiter) {
            let english = text.chars().all(|c| c.is_ascii());
            text.push(if english { '.' } else { '。' });
        }
        let spans = self.process_text(&text)?;
        self.assembler.merge_spans(&spans)
    }

    /// Assemble one chunk
    pub fn chunk_input(&self, chunk: &TextChunk, prompt: Option<&ProcessedSpan>) -> Result<ChunkInput> {
        let spans = self.process_text(&chunk.text)?;
        self.assembler.assemble(chunk, &spans, prompt)
    }

    /// Lazily assemble `chunks` in order
    pub fn chunk_inputs<'a>(
        &'a self,
        chunks: Vec<TextChunk>,
        prompt: Option<&'a ProcessedSpan>,
        policy: PromptPolicy,
    ) -> ChunkInputs<'a> {
        ChunkInputs {
            frontend: self,
            chunks: chunks.into_iter(),
            prompt,
            policy,
            emitted: 0,
        }
    }
}

/// Single-pass producer of chunk inputs
pub struct ChunkInputs<'a> {
    frontend: &'a TextFrontend,
    chunks: std::vec::IntoIter<TextChunk>,
    prompt: Option<&'a ProcessedSpan>,
    policy: PromptPolicy,
    emitted: usize,
}

impl<'a> Iterator for ChunkInputs<'a> {
    type Item = Result<ChunkInput>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let prompt = match self.policy {
            PromptPolicy::FirstChunk if self.emitted > 0 => None,
            _ => self.prompt,
        };
        self.emitted += 1;
        Some(self.frontend.chunk_input(&chunk, prompt))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use voice_synth_config::{TextConfig, UnknownPhonemePolicy};

    use crate::features::ZeroFeatureExtractor;
    use crate::processor::ProcessorContext;
    use crate::segmenter::ScriptIdentifier;

    const DIM: usize = 4;

    fn span(language: LanguageTag, ids: Vec<i64>, fill: f32) -> ProcessedSpan {
        let n = ids.len();
        ProcessedSpan::new(language, "x".repeat(n), ids, Array2::from_elem((DIM, n), fill)).unwrap()
    }

    fn chunk() -> TextChunk {
        TextChunk {
            index: 3,
            text: "chunk".into(),
        }
    }

    #[test]
    fn test_assemble_without_prompt() {
        let assembler = FrontendAssembler::new(DIM);
        let spans = [span(LanguageTag::Zh, vec![1, 2], 1.0), span(LanguageTag::En, vec![3], 2.0)];
        let input = assembler.assemble(&chunk(), &spans, None).unwrap();
        assert_eq!(input.index, 3);
        assert_eq!(input.phoneme_ids, vec![1, 2, 3]);
        assert_eq!(input.all_phoneme_ids, vec![1, 2, 3]);
        assert_eq!(input.features.dim(), (DIM, 3));
        assert_eq!(input.features[[0, 2]], 2.0);
        assert!(!input.has_prompt());
    }

    #[test]
    fn test_assemble_prepends_prompt() {
        let assembler = FrontendAssembler::new(DIM);
        let prompt = span(LanguageTag::Zh, vec![9, 9], 5.0);
        let spans = [span(LanguageTag::En, vec![3, 4, 5], 2.0)];
        let input = assembler.assemble(&chunk(), &spans, Some(&prompt)).unwrap();
        assert_eq!(input.phoneme_ids, vec![3, 4, 5]);
        assert_eq!(input.all_phoneme_ids, vec![9, 9, 3, 4, 5]);
        assert_eq!(input.all_phoneme_len(), 5);
        assert_eq!(input.prompt_len, 2);
        assert_eq!(input.features.ncols(), 5);
        assert_eq!(input.features[[0, 0]], 5.0);
        assert_eq!(input.features[[0, 4]], 2.0);
    }

    #[test]
    fn test_assemble_rejects_wrong_feature_dim() {
        let assembler = FrontendAssembler::new(DIM + 1);
        let spans = [span(LanguageTag::Zh, vec![1], 0.0)];
        assert!(assembler.assemble(&chunk(), &spans, None).is_err());
    }

    #[test]
    fn test_merge_spans() {
        let assembler = FrontendAssembler::new(DIM);
        let merged = assembler
            .merge_spans(&[span(LanguageTag::Ja, vec![1], 0.0), span(LanguageTag::En, vec![2, 3], 0.0)])
            .unwrap();
        assert_eq!(merged.language, LanguageTag::Ja);
        assert_eq!(merged.phoneme_ids, vec![1, 2, 3]);
        assert_eq!(merged.features.ncols(), 3);
    }

    fn frontend() -> TextFrontend {
        let context = ProcessorContext {
            resources_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/resources")),
            feature_dim: DIM,
            unknown_policy: UnknownPhonemePolicy::Substitute,
            feature_extractor: Arc::new(ZeroFeatureExtractor::new(DIM)),
        };
        TextFrontend::new(
            ParagraphSplitter::default(),
            LanguageSegmenter::new(Arc::new(ScriptIdentifier), &TextConfig::default()),
            Arc::new(LanguageProcessorRegistry::new(context)),
            6,
        )
    }

    #[test]
    fn test_hello_world_scenario() {
        let frontend = frontend();
        let chunks = frontend.split("你好，世界！").unwrap();
        assert_eq!(chunks.len(), 1);
        let inputs: Vec<ChunkInput> = frontend
            .chunk_inputs(chunks, None, PromptPolicy::FirstChunk)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(inputs.len(), 1);
        let input = &inputs[0];
        assert_eq!(input.phoneme_ids.len(), 10);
        assert_eq!(input.features.dim(), (DIM, 10));
    }

    #[test]
    fn test_short_text_gets_leading_pause() {
        let frontend = frontend();
        let spans = frontend.process_text("好").unwrap();
        let normalized: String = spans.iter().map(|s| s.normalized_text.as_str()).collect();
        assert_eq!(normalized, ".好");
    }

    #[test]
    fn test_prompt_only_on_first_chunk() {
        let frontend = frontend();
        let prompt = frontend.process_prompt("你好").unwrap();
        assert!(prompt.normalized_text.ends_with('.'));
        let chunks = ParagraphSplitter::new(1, 1).split("你好。世界。").unwrap();
        assert_eq!(chunks.len(), 2);

        let inputs: Vec<ChunkInput> = frontend
            .chunk_inputs(chunks.clone(), Some(&prompt), PromptPolicy::FirstChunk)
            .collect::<Result<_>>()
            .unwrap();
        assert!(inputs[0].has_prompt());
        assert!(!inputs[1].has_prompt());

        let inputs: Vec<ChunkInput> = frontend
            .chunk_inputs(chunks, Some(&prompt), PromptPolicy::EveryChunk)
            .collect::<Result<_>>()
            .unwrap();
        assert!(inputs.iter().all(ChunkInput::has_prompt));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(matches!(
            frontend().process_prompt("   "),
            Err(Error::InputValidation(_))
        ));
    }
}
