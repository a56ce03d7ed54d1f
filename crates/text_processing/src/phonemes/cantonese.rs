//! Cantonese front-end: Jyutping lexicon lookup
//!
//! Each syllable becomes a prefixed initial (when present) and a prefixed
//! toned final, e.g. `nei5` → `Yn`, `Yei5`.

use std::path::Path;

use voice_synth_core::{LanguageTag, Result};

use super::{Lexicon, Phonemes};
use crate::symbols::{
    is_punctuation, note_unknown, CANTONESE_EXTRA_FINALS, CANTONESE_FINALS, CANTONESE_INITIALS,
    CANTONESE_PREFIX, UNK,
};

pub const LEXICON_FILE: &str = "jyutping.tsv";

fn is_final(candidate: &str) -> bool {
    CANTONESE_FINALS.contains(&candidate) || CANTONESE_EXTRA_FINALS.contains(&candidate)
}

/// Split a toned Jyutping syllable into prefixed symbols
pub fn syllable_to_symbols(syllable: &str) -> Option<Vec<String>> {
    let syllable = syllable.trim().to_ascii_lowercase();
    let tone = syllable.chars().last()?.to_digit(10).filter(|t| (1..=6).contains(t))?;
    let base = &syllable[..syllable.len() - 1];
    if base.is_empty() {
        return None;
    }
    if is_final(base) {
        return Some(vec![format!("{}{}{}", CANTONESE_PREFIX, base, tone)]);
    }

    let mut initials: Vec<&str> = CANTONESE_INITIALS.to_vec();
    initials.sort_by_key(|i| std::cmp::Reverse(i.len()));
    initials.into_iter().find_map(|initial| {
        let final_ = base.strip_prefix(initial)?;
        is_final(final_).then(|| {
            vec![
                format!("{}{}", CANTONESE_PREFIX, initial),
                format!("{}{}{}", CANTONESE_PREFIX, final_, tone),
            ]
        })
    })
}

/// Cantonese grapheme-to-phoneme converter
#[derive(Debug, Clone, Default)]
pub struct CantoneseG2p {
    lexicon: Lexicon,
}

impl CantoneseG2p {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::new(Lexicon::load(&dir.join(LEXICON_FILE))?))
    }

    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn convert(&self, normalized: &str) -> Phonemes {
        let chars: Vec<char> = normalized.chars().collect();
        let mut phonemes = Phonemes::with_capacity(chars.len());

        let mut i = 0;
        while i < chars.len() {
            if is_punctuation(chars[i]) {
                phonemes.push_char([chars[i].to_string()]);
                i += 1;
                continue;
            }
            let (len, readings): (usize, Vec<Option<&str>>) = match self.lexicon.longest_match(&chars, i) {
                Some((len, reading)) => {
                    let syllables: Vec<&str> = reading.split_whitespace().collect();
                    if syllables.len() == len {
                        (len, syllables.into_iter().map(Some).collect())
                    } else {
                        (len, chars[i..i + len].iter().map(|c| self.char_reading(*c)).collect())
                    }
                }
                None => (1, vec![None]),
            };
            for (c, reading) in chars[i..i + len].iter().zip(readings) {
                match reading.and_then(syllable_to_symbols) {
                    Some(symbols) => phonemes.push_char(symbols),
                    None => {
                        note_unknown(LanguageTag::Yue, &c.to_string());
                        phonemes.push_char([UNK]);
                    }
                }
            }
            i += len;
        }
        phonemes
    }

    fn char_reading(&self, c: char) -> Option<&str> {
        self.lexicon
            .get(&c.to_string())
            .and_then(|r| r.split_whitespace().next())
    }
}
