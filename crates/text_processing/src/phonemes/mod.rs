//! Grapheme-to-phoneme conversion
//!
//! Every converter returns the phoneme symbols together with a
//! per-character count over the normalized text, so that
//! `counts.len() == chars` and `counts.sum() == symbols.len()`.

pub mod cantonese;
pub mod chinese;
pub mod english;
pub mod japanese;
pub mod korean;
pub mod pinyin;

use std::collections::HashMap;
use std::path::Path;

use voice_synth_core::{Error, Result};

/// Phoneme symbols with their per-character alignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phonemes {
    pub symbols: Vec<String>,
    /// Number of symbols produced by each normalized character
    pub counts: Vec<usize>,
}

impl Phonemes {
    pub fn with_capacity(chars: usize) -> Self {
        Self {
            symbols: Vec::with_capacity(chars * 2),
            counts: Vec::with_capacity(chars),
        }
    }

    /// Append the symbols produced by one character
    pub fn push_char<I, S>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.symbols.len();
        self.symbols.extend(symbols.into_iter().map(Into::into));
        self.counts.push(self.symbols.len() - before);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Check the alignment invariant against the normalized text
    pub fn check_alignment(&self, normalized: &str) -> Result<()> {
        let chars = normalized.chars().count();
        let total: usize = self.counts.iter().sum();
        if self.counts.len() != chars || total != self.symbols.len() {
            return Err(Error::Internal(format!(
                "phoneme alignment broken: {} counts for {} chars, sum {} for {} symbols",
                self.counts.len(),
                chars,
                total,
                self.symbols.len()
            )));
        }
        Ok(())
    }
}

/// Word → pronunciation table loaded from a tab-separated file
///
/// Lines are `entry<TAB>reading`; blank lines and `#` comments are ignored
/// and the first reading of a repeated entry wins.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, String>,
    max_entry_chars: usize,
}

impl Lexicon {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!("failed to read lexicon {}: {}", path.display(), e))
        })?;
        let lexicon = Self::parse(&content);
        tracing::debug!(
            path = %path.display(),
            entries = lexicon.len(),
            "Loaded lexicon"
        );
        Ok(lexicon)
    }

    pub fn parse(content: &str) -> Self {
        let mut lexicon = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((entry, reading)) = line.split_once('\t') else {
                continue;
            };
            let (entry, reading) = (entry.trim(), reading.trim());
            if entry.is_empty() || reading.is_empty() {
                continue;
            }
            lexicon.insert(entry, reading);
        }
        lexicon
    }

    pub fn insert(&mut self, entry: &str, reading: &str) {
        if self.entries.contains_key(entry) {
            return;
        }
        self.max_entry_chars = self.max_entry_chars.max(entry.chars().count());
        self.entries.insert(entry.to_string(), reading.to_string());
    }

    pub fn get(&self, entry: &str) -> Option<&str> {
        self.entries.get(entry).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest entry starting at `chars[start]`, as (char length, reading)
    pub fn longest_match(&self, chars: &[char], start: usize) -> Option<(usize, &str)> {
        let max = self.max_entry_chars.min(chars.len().saturating_sub(start));
        (1..=max).rev().find_map(|len| {
            let candidate: String = chars[start..start + len].iter().collect();
            self.get(&candidate).map(|reading| (len, reading))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_char_counts() {
        let mut p = Phonemes::default();
        p.push_char(["n", "i3"]);
        p.push_char([","]);
        p.push_char(Vec::<String>::new());
        assert_eq!(p.counts, vec![2, 1, 0]);
        assert_eq!(p.len(), 3);
        assert!(p.check_alignment("你,x").is_ok());
        assert!(p.check_alignment("你,").is_err());
    }

    #[test]
    fn test_lexicon_parse_and_match() {
        let lex = Lexicon::parse("# comment\n中\tzhong1\n中国\tzhong1 guo2\n中\tzhong4\n\nbad line\n");
        assert_eq!(lex.len(), 2);
        assert_eq!(lex.get("中"), Some("zhong1"));

        let chars: Vec<char> = "中国人".chars().collect();
        assert_eq!(lex.longest_match(&chars, 0), Some((2, "zhong1 guo2")));
        assert_eq!(lex.longest_match(&chars, 2), None);
    }

    #[test]
    fn test_lexicon_load_missing_file() {
        let err = Lexicon::load(Path::new("/nonexistent/lexicon.tsv")).unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
    }
}
