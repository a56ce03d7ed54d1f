//! Paragraph chunking
//!
//! Text is cut after every sentence or clause delimiter, the pieces are
//! grouped `group_size` at a time, and groups shorter than `threshold`
//! characters are merged into the previous chunk. Chunks made only of
//! punctuation and spaces are dropped.

use voice_synth_config::SplitterConfig;
use voice_synth_core::{Error, Result, TextChunk};

/// Characters after which a new piece starts
const DELIMITERS: [char; 13] = [
    '，', '。', '？', '！', ',', '.', '?', '!', '~', ':', '：', '—', '…',
];

/// Appended when the text does not end on a delimiter
pub const TERMINATOR: char = '。';

/// A chunk made only of these carries nothing to say
const SILENT: [char; 7] = ['!', '?', '…', ',', '.', '-', ' '];

pub fn is_delimiter(c: char) -> bool {
    DELIMITERS.contains(&c)
}

#[derive(Debug, Clone, Copy)]
pub struct ParagraphSplitter {
    threshold: usize,
    group_size: usize,
}

impl ParagraphSplitter {
    pub fn new(threshold: usize, group_size: usize) -> Self {
        Self {
            threshold,
            group_size: group_size.max(1),
        }
    }

    pub fn from_config(config: &SplitterConfig) -> Self {
        Self::new(config.threshold, config.group_size)
    }

    pub fn split(&self, text: &str) -> Result<Vec<TextChunk>> {
        let mut text = text
            .replace("……", "。")
            .replace("——", "，")
            .trim_matches('\n')
            .to_string();
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        if !text.chars().last().map_or(false, is_delimiter) {
            text.push(TERMINATOR);
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            current.push(c);
            if is_delimiter(c) {
                pieces.push(std::mem::take(&mut current));
            }
        }

        let mut combined: Vec<String> = Vec::new();
        for group in pieces.chunks(self.group_size) {
            let group = group.concat();
            match combined.last_mut() {
                Some(last) if group.chars().count() < self.threshold => last.push_str(&group),
                _ => combined.push(group),
            }
        }

        let chunks: Vec<TextChunk> = combined
            .into_iter()
            .filter(|chunk| !chunk.chars().all(|c| SILENT.contains(&c)))
            .enumerate()
            .map(|(index, text)| TextChunk { index, text })
            .collect();

        tracing::debug!(chunks = chunks.len(), "Split text into chunks");
        Ok(chunks)
    }
}

impl Default for ParagraphSplitter {
    fn default() -> Self {
        Self::from_config(&SplitterConfig::default())
    }
}
