//! Language segmentation of a chunk
//!
//! Text is first cut by script: Latin letters are English, Hangul is
//! Korean and kana is Japanese. Han runs are Japanese when the chunk
//! contains kana; otherwise a [`LanguageIdentifier`] decides, defaulting
//! to Chinese. Digits, punctuation and whitespace carry no language and
//! stay with the run they follow (or the run they precede at the start
//! of the chunk). Adjacent runs with the same tag are merged.

use std::sync::Arc;

use voice_synth_config::TextConfig;
use voice_synth_core::{LanguageIdentifier, LanguageSpan, LanguageTag};

use crate::normalize::chinese::normalize_numbers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Hangul,
    Kana,
    Han,
}

fn script_of(c: char) -> Option<Script> {
    match c {
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}' | '々' => {
            Some(Script::Han)
        }
        '\u{3040}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => Some(Script::Kana),
        '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => {
            Some(Script::Hangul)
        }
        c if c.is_alphabetic() && (c as u32) < 0x250 => Some(Script::Latin),
        _ => None,
    }
}

/// Identifier that only looks at script: kana → ja, Hangul → ko, Latin → en
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptIdentifier;

impl LanguageIdentifier for ScriptIdentifier {
    fn identify(&self, text: &str) -> Option<LanguageTag> {
        let mut counts = [0usize; 4];
        for script in text.chars().filter_map(script_of) {
            counts[script as usize] += 1;
        }
        let (best, count) = counts.iter().enumerate().max_by_key(|(_, n)| **n)?;
        if *count == 0 {
            return None;
        }
        Some(match best {
            0 => LanguageTag::En,
            1 => LanguageTag::Ko,
            2 => LanguageTag::Ja,
            _ => LanguageTag::Zh,
        })
    }
}

/// Statistical identifier restricted to zh/en/ja/ko
#[cfg(feature = "lingua")]
pub struct LinguaIdentifier {
    detector: lingua::LanguageDetector,
}

#[cfg(feature = "lingua")]
impl LinguaIdentifier {
    pub fn new() -> Self {
        use lingua::{Language, LanguageDetectorBuilder};

        let detector = LanguageDetectorBuilder::from_languages(&[
            Language::Chinese,
            Language::English,
            Language::Japanese,
            Language::Korean,
        ])
        .build();
        Self { detector }
    }
}

#[cfg(feature = "lingua")]
impl Default for LinguaIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "lingua")]
impl LanguageIdentifier for LinguaIdentifier {
    fn identify(&self, text: &str) -> Option<LanguageTag> {
        use lingua::Language;

        match self.detector.detect_language_of(text)? {
            Language::Chinese => Some(LanguageTag::Zh),
            Language::English => Some(LanguageTag::En),
            Language::Japanese => Some(LanguageTag::Ja),
            Language::Korean => Some(LanguageTag::Ko),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Create the language identifier for Han-script runs
pub fn create_identifier() -> Arc<dyn LanguageIdentifier> {
    #[cfg(feature = "lingua")]
    {
        Arc::new(LinguaIdentifier::new())
    }
    #[cfg(not(feature = "lingua"))]
    {
        Arc::new(ScriptIdentifier)
    }
}

/// Splits a chunk into contiguous same-language spans
#[derive(Clone)]
pub struct LanguageSegmenter {
    identifier: Arc<dyn LanguageIdentifier>,
    default_language: LanguageTag,
    cantonese: bool,
}

impl LanguageSegmenter {
    pub fn new(identifier: Arc<dyn LanguageIdentifier>, config: &TextConfig) -> Self {
        Self {
            identifier,
            default_language: config.default_language,
            cantonese: config.cantonese,
        }
    }

    pub fn with_default_language(mut self, language: LanguageTag) -> Self {
        self.default_language = language;
        self
    }

    /// Spans cover the chunk in order. In Han-majority text digits are
    /// first rewritten as Chinese numerals, and the spans cover that text.
    pub fn segment(&self, text: &str) -> Vec<LanguageSpan> {
        if text.is_empty() {
            return Vec::new();
        }
        let text = if is_han_majority(text) {
            normalize_numbers(text)
        } else {
            text.to_string()
        };
        let has_kana = text.chars().any(|c| script_of(c) == Some(Script::Kana));

        // Runs of one script; `None` only while nothing but neutral characters has been seen
        let mut runs: Vec<(Option<Script>, String)> = Vec::new();
        for c in text.chars() {
            let script = match script_of(c) {
                Some(Script::Han) if has_kana => Some(Script::Kana),
                other => other,
            };
            match runs.last_mut() {
                Some((current, run))
                    if script.is_none() || current.is_none() || *current == script =>
                {
                    if current.is_none() {
                        *current = script;
                    }
                    run.push(c);
                }
                _ => runs.push((script, c.to_string())),
            }
        }

        let mut spans: Vec<LanguageSpan> = Vec::new();
        for (script, run) in runs {
            let language = match script {
                Some(Script::Latin) => LanguageTag::En,
                Some(Script::Hangul) => LanguageTag::Ko,
                Some(Script::Kana) => LanguageTag::Ja,
                Some(Script::Han) => self.resolve_han(&run),
                None => self.default_language,
            };
            let language = match language {
                LanguageTag::Zh if self.cantonese => LanguageTag::Yue,
                other => other,
            };
            match spans.last_mut() {
                Some(last) if last.language == language => last.text.push_str(&run),
                _ => spans.push(LanguageSpan::new(run, language)),
            }
        }
        spans
    }

    fn resolve_han(&self, run: &str) -> LanguageTag {
        match self.identifier.identify(run) {
            Some(LanguageTag::Ja) => LanguageTag::Ja,
            Some(other) => {
                if other != LanguageTag::Zh {
                    tracing::debug!(detected = %other, "Han run identified as non-Han language, reading as zh");
                }
                LanguageTag::Zh
            }
            None => LanguageTag::Zh,
        }
    }
}

fn is_han_majority(text: &str) -> bool {
    let mut han = 0usize;
    let mut other = 0usize;
    for script in text.chars().filter_map(script_of) {
        if script == Script::Han {
            han += 1;
        } else {
            other += 1;
        }
    }
    han > 0 && han >= other
}
