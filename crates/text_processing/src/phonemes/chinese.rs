//! Mandarin front-end: normalized text → initials and toned finals

use std::path::Path;

use voice_synth_core::{LanguageTag, Result};

use super::pinyin::{syllable_to_symbols, PinyinDictionary};
use super::Phonemes;
use crate::symbols::{is_punctuation, note_unknown, UNK};

/// Mandarin grapheme-to-phoneme converter
#[derive(Debug, Clone)]
pub struct ChineseG2p {
    dictionary: PinyinDictionary,
}

impl ChineseG2p {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::new(PinyinDictionary::load(dir)?))
    }

    pub fn new(dictionary: PinyinDictionary) -> Self {
        Self { dictionary }
    }

    /// Each syllable yields two symbols, each punctuation mark one.
    /// A character without a reading yields a single `UNK`.
    pub fn convert(&self, normalized: &str) -> Phonemes {
        let chars: Vec<char> = normalized.chars().collect();
        let mut phonemes = Phonemes::with_capacity(chars.len());

        let mut start = 0;
        while start < chars.len() {
            if is_punctuation(chars[start]) {
                phonemes.push_char([chars[start].to_string()]);
                start += 1;
                continue;
            }
            let end = chars[start..]
                .iter()
                .position(|c| is_punctuation(*c))
                .map_or(chars.len(), |p| start + p);
            let run = &chars[start..end];
            for (c, reading) in run.iter().zip(self.dictionary.readings(run)) {
                match reading.as_deref().and_then(syllable_to_symbols) {
                    Some((initial, final_)) => phonemes.push_char([initial, final_]),
                    None => {
                        note_unknown(LanguageTag::Zh, &c.to_string());
                        phonemes.push_char([UNK]);
                    }
                }
            }
            start = end;
        }
        phonemes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phonemes::Lexicon;

    fn g2p() -> ChineseG2p {
        let lexicon = Lexicon::parse(
            "你\tni3\n好\thao3\n世\tshi4\n界\tjie4\n你好\tni3 hao3\n世界\tshi4 jie4\n",
        );
        ChineseG2p::new(PinyinDictionary::new(lexicon, Vec::new(), Vec::new()))
    }

    #[test]
    fn test_hello_world() {
        let p = g2p().convert("你好,世界!");
        assert_eq!(
            p.symbols,
            vec!["n", "i2", "h", "ao3", ",", "sh", "ir4", "j", "ie4", "!"]
        );
        assert_eq!(p.counts, vec![2, 2, 1, 2, 2, 1]);
        assert!(p.check_alignment("你好,世界!").is_ok());
    }

    #[test]
    fn test_unknown_character_is_unk() {
        let p = g2p().convert("你龘");
        assert_eq!(p.symbols, vec!["n", "i3", UNK]);
        assert_eq!(p.counts, vec![2, 1]);
    }

    #[test]
    fn test_punctuation_only() {
        let p = g2p().convert(".");
        assert_eq!(p.symbols, vec!["."]);
        assert_eq!(p.counts, vec![1]);
    }
}
