//! English front-end: dictionary-driven ARPAbet conversion
//!
//! Lookup order for a word:
//! 1. single letters use the letter-name table
//! 2. the pronouncing dictionary (hot entries override the base dictionary)
//! 3. possessive `'s` on a known stem
//! 4. short words and all-caps acronyms are spelled out
//! 5. two-part compounds whose halves are both known
//! 6. anything else is spelled letter by letter

use std::collections::HashMap;
use std::path::Path;

use unicode_segmentation::UnicodeSegmentation;
use voice_synth_core::{Error, LanguageTag, Result};

use super::Phonemes;
use crate::symbols::{is_punctuation, note_unknown};

pub const DICTIONARY_FILE: &str = "cmudict.rep";
pub const HOT_DICTIONARY_FILE: &str = "engdict-hot.rep";

/// Entries that read worse than their spelled-out form
const SPELLED_OVERRIDES: [&str; 6] = ["AE", "AI", "AR", "IOS", "HUD", "OS"];

/// Utterances shorter than this get a leading pause
const MIN_PHONES: usize = 4;

const LETTERS: [(char, &[&str]); 26] = [
    ('A', &["EY1"]),
    ('B', &["B", "IY1"]),
    ('C', &["S", "IY1"]),
    ('D', &["D", "IY1"]),
    ('E', &["IY1"]),
    ('F', &["EH1", "F"]),
    ('G', &["JH", "IY1"]),
    ('H', &["EY1", "CH"]),
    ('I', &["AY1"]),
    ('J', &["JH", "EY1"]),
    ('K', &["K", "EY1"]),
    ('L', &["EH1", "L"]),
    ('M', &["EH1", "M"]),
    ('N', &["EH1", "N"]),
    ('O', &["OW1"]),
    ('P', &["P", "IY1"]),
    ('Q', &["K", "Y", "UW1"]),
    ('R', &["AA1", "R"]),
    ('S', &["EH1", "S"]),
    ('T', &["T", "IY1"]),
    ('U', &["Y", "UW1"]),
    ('V', &["V", "IY1"]),
    ('W', &["D", "AH1", "B", "AH0", "L", "Y", "UW0"]),
    ('X', &["EH1", "K", "S"]),
    ('Y', &["W", "AY1"]),
    ('Z', &["Z", "IY1"]),
];

const VOICELESS_FINALS: [&str; 6] = ["P", "T", "K", "F", "TH", "HH"];
const SIBILANT_FINALS: [&str; 6] = ["S", "Z", "SH", "ZH", "CH", "JH"];

/// English grapheme-to-phoneme converter
#[derive(Debug, Clone, Default)]
pub struct EnglishG2p {
    dictionary: HashMap<String, Vec<String>>,
}

impl EnglishG2p {
    /// Load `cmudict.rep` (required) and `engdict-hot.rep` (optional) from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let base_path = dir.join(DICTIONARY_FILE);
        let base = std::fs::read_to_string(&base_path).map_err(|e| {
            Error::Resource(format!("failed to read {}: {}", base_path.display(), e))
        })?;
        let hot_path = dir.join(HOT_DICTIONARY_FILE);
        let hot = if hot_path.exists() {
            std::fs::read_to_string(&hot_path).map_err(|e| {
                Error::Resource(format!("failed to read {}: {}", hot_path.display(), e))
            })?
        } else {
            String::new()
        };
        let g2p = Self::from_sources(&base, &hot);
        tracing::debug!(entries = g2p.dictionary.len(), "Loaded English dictionary");
        Ok(g2p)
    }

    pub fn from_sources(base: &str, hot: &str) -> Self {
        let mut dictionary = HashMap::new();
        parse_dictionary(base, &mut dictionary, false);
        for word in SPELLED_OVERRIDES {
            dictionary.remove(word);
        }
        parse_dictionary(hot, &mut dictionary, true);
        Self { dictionary }
    }

    /// Word phones are attributed to the first character of the word.
    /// A quote-style apostrophe outside a word reads as `-`; spaces and a
    /// hyphen joining two letters produce nothing.
    pub fn convert(&self, normalized: &str) -> Phonemes {
        let chars: Vec<char> = normalized.chars().collect();
        let mut phonemes = Phonemes::with_capacity(chars.len());
        let mut char_pos = 0;

        for token in normalized.split_word_bounds() {
            let token_chars: Vec<char> = token.chars().collect();
            let is_word = token_chars.iter().any(|c| c.is_ascii_alphabetic())
                && token_chars
                    .iter()
                    .all(|c| c.is_ascii_alphabetic() || *c == '\'');
            if is_word {
                phonemes.push_char(self.word_phones(token));
                for _ in 1..token_chars.len() {
                    phonemes.push_char(Vec::<String>::new());
                }
            } else {
                for (offset, c) in token_chars.iter().enumerate() {
                    let pos = char_pos + offset;
                    let joins_letters = *c == '-'
                        && pos > 0
                        && chars[pos - 1].is_ascii_alphabetic()
                        && chars.get(pos + 1).map_or(false, |n| n.is_ascii_alphabetic());
                    if *c == '\'' {
                        phonemes.push_char(["-"]);
                    } else if is_punctuation(*c) && !joins_letters {
                        phonemes.push_char([c.to_string()]);
                    } else {
                        phonemes.push_char(Vec::<String>::new());
                    }
                }
            }
            char_pos += token_chars.len();
        }

        if !phonemes.is_empty() && phonemes.len() < MIN_PHONES {
            phonemes.symbols.insert(0, ",".to_string());
            if let Some(first) = phonemes.counts.first_mut() {
                *first += 1;
            }
        }
        phonemes
    }

    /// Phones for a single word
    pub fn word_phones(&self, word: &str) -> Vec<String> {
        let upper = word.to_ascii_uppercase();
        let letters: String = upper.chars().filter(|c| c.is_ascii_alphabetic()).collect();

        if letters.len() == 1 {
            return spell(&letters);
        }
        if let Some(phones) = self.dictionary.get(&upper) {
            return phones.clone();
        }
        if let Some(stem) = upper.strip_suffix("'S").filter(|s| !s.is_empty()) {
            return possessive(self.word_phones(stem));
        }
        if letters.len() <= 3 || (word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase())) {
            return spell(&letters);
        }
        if letters != upper {
            if let Some(phones) = self.dictionary.get(&letters) {
                return phones.clone();
            }
        }
        if let Some(phones) = self.compound(&letters) {
            return phones;
        }
        note_unknown(LanguageTag::En, word);
        spell(&letters)
    }

    fn compound(&self, word: &str) -> Option<Vec<String>> {
        (2..word.len().saturating_sub(1)).rev().find_map(|split| {
            let (head, tail) = word.split_at(split);
            let head = self.dictionary.get(head)?;
            let tail = self.dictionary.get(tail)?;
            Some(head.iter().chain(tail.iter()).cloned().collect())
        })
    }
}

fn parse_dictionary(content: &str, dictionary: &mut HashMap<String, Vec<String>>, overwrite: bool) {
    for line in content.lines() {
        if line.starts_with(";;;") || line.trim().is_empty() {
            continue;
        }
        let (word, pron) = match line.split_once("  ") {
            Some(parts) => parts,
            None => match line.split_once(char::is_whitespace) {
                Some(parts) => parts,
                None => continue,
            },
        };
        let word = word.trim().to_ascii_uppercase();
        // Alternate pronunciations are written WORD(1)
        if word.is_empty() || word.ends_with(')') {
            continue;
        }
        let phones: Vec<String> = pron
            .split_whitespace()
            .filter(|p| *p != "-")
            .map(String::from)
            .collect();
        if phones.is_empty() {
            continue;
        }
        if overwrite {
            dictionary.insert(word, phones);
        } else {
            dictionary.entry(word).or_insert(phones);
        }
    }
}

fn spell(letters: &str) -> Vec<String> {
    letters
        .chars()
        .filter_map(|c| LETTERS.iter().find(|(l, _)| *l == c.to_ascii_uppercase()))
        .flat_map(|(_, phones)| phones.iter().map(|p| p.to_string()))
        .collect()
}

fn possessive(mut phones: Vec<String>) -> Vec<String> {
    match phones.last().map(String::as_str) {
        Some(last) if VOICELESS_FINALS.contains(&last) => phones.push("S".to_string()),
        Some(last) if SIBILANT_FINALS.contains(&last) => {
            phones.push("AH0".to_string());
            phones.push("Z".to_string());
        }
        _ => phones.push("Z".to_string()),
    }
    phones
}
