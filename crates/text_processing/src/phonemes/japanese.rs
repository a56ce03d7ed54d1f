//! Japanese front-end: kana-to-phoneme table plus a kanji reading lexicon

use std::path::Path;

use voice_synth_core::{LanguageTag, Result};

use super::{Lexicon, Phonemes};
use crate::normalize::{chinese::normalize_numbers, collapse_punctuation, map_punctuation};
use crate::symbols::{is_punctuation, note_unknown, UNK};

pub const READINGS_FILE: &str = "readings.tsv";

/// Katakana → (consonant, vowel); an empty consonant is a bare vowel
const KANA: [(char, &str, &str); 79] = [
    ('ア', "", "a"), ('イ', "", "i"), ('ウ', "", "u"), ('エ', "", "e"), ('オ', "", "o"),
    ('カ', "k", "a"), ('キ', "k", "i"), ('ク', "k", "u"), ('ケ', "k", "e"), ('コ', "k", "o"),
    ('ガ', "g", "a"), ('ギ', "g", "i"), ('グ', "g", "u"), ('ゲ', "g", "e"), ('ゴ', "g", "o"),
    ('サ', "s", "a"), ('シ', "sh", "i"), ('ス', "s", "u"), ('セ', "s", "e"), ('ソ', "s", "o"),
    ('ザ', "z", "a"), ('ジ', "j", "i"), ('ズ', "z", "u"), ('ゼ', "z", "e"), ('ゾ', "z", "o"),
    ('タ', "t", "a"), ('チ', "ch", "i"), ('ツ', "ts", "u"), ('テ', "t", "e"), ('ト', "t", "o"),
    ('ダ', "d", "a"), ('ヂ', "j", "i"), ('ヅ', "z", "u"), ('デ', "d", "e"), ('ド', "d", "o"),
    ('ナ', "n", "a"), ('ニ', "n", "i"), ('ヌ', "n", "u"), ('ネ', "n", "e"), ('ノ', "n", "o"),
    ('ハ', "h", "a"), ('ヒ', "h", "i"), ('フ', "f", "u"), ('ヘ', "h", "e"), ('ホ', "h", "o"),
    ('バ', "b", "a"), ('ビ', "b", "i"), ('ブ', "b", "u"), ('ベ', "b", "e"), ('ボ', "b", "o"),
    ('パ', "p", "a"), ('ピ', "p", "i"), ('プ', "p", "u"), ('ペ', "p", "e"), ('ポ', "p", "o"),
    ('マ', "m", "a"), ('ミ', "m", "i"), ('ム', "m", "u"), ('メ', "m", "e"), ('モ', "m", "o"),
    ('ヤ', "y", "a"), ('ユ', "y", "u"), ('ヨ', "y", "o"),
    ('ラ', "r", "a"), ('リ', "r", "i"), ('ル', "r", "u"), ('レ', "r", "e"), ('ロ', "r", "o"),
    ('ワ', "w", "a"), ('ヲ', "", "o"), ('ヴ', "v", "u"),
    ('ァ', "", "a"), ('ィ', "", "i"), ('ゥ', "", "u"), ('ェ', "", "e"), ('ォ', "", "o"),
    ('ャ', "y", "a"), ('ュ', "y", "u"), ('ョ', "y", "o"),
];

fn kana_entry(c: char) -> Option<(&'static str, &'static str)> {
    KANA.iter()
        .find(|(k, _, _)| *k == c)
        .map(|(_, consonant, vowel)| (*consonant, *vowel))
}

fn small_vowel(c: char) -> Option<&'static str> {
    match c {
        'ァ' => Some("a"),
        'ィ' => Some("i"),
        'ゥ' => Some("u"),
        'ェ' => Some("e"),
        'ォ' => Some("o"),
        _ => None,
    }
}

fn small_glide(c: char) -> Option<&'static str> {
    match c {
        'ャ' => Some("a"),
        'ュ' => Some("u"),
        'ョ' => Some("o"),
        _ => None,
    }
}

/// Hiragana is folded onto katakana
pub fn to_katakana(c: char) -> char {
    match c {
        '\u{3041}'..='\u{3096}' => char::from_u32(c as u32 + 0x60).unwrap_or(c),
        _ => c,
    }
}

pub fn is_kana(c: char) -> bool {
    matches!(c, '\u{3041}'..='\u{3096}' | '\u{30a1}'..='\u{30fa}' | 'ー')
}

pub fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '々')
}

/// Numbers read out, punctuation canonicalized, everything but kana,
/// kanji and canonical punctuation removed
pub fn normalize(text: &str) -> String {
    let text = normalize_numbers(text);
    let text = map_punctuation(&text);
    let kept: String = text
        .chars()
        .filter(|c| is_kana(*c) || is_kanji(*c) || is_punctuation(*c))
        .collect();
    collapse_punctuation(&kept)
}

/// Phones for a kana string, one entry per input character
fn kana_phones(chars: &[char]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = Vec::with_capacity(chars.len());
    let mut last_vowel: Option<&'static str> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = to_katakana(chars[i]);
        let next = chars.get(i + 1).map(|n| to_katakana(*n));

        let phones: Vec<&str> = match c {
            'ン' => vec!["N"],
            'ッ' => vec!["cl"],
            'ー' => last_vowel.map(|v| vec![v]).unwrap_or_default(),
            _ => match kana_entry(c) {
                Some((consonant, vowel)) => {
                    let merged = match next {
                        Some(n) if small_glide(n).is_some() && vowel == "i" && !consonant.is_empty() => {
                            let glide_vowel = small_glide(n).unwrap_or(vowel);
                            let palatal = match consonant {
                                "sh" | "ch" | "j" => consonant,
                                "k" => "ky",
                                "g" => "gy",
                                "n" => "ny",
                                "h" => "hy",
                                "b" => "by",
                                "p" => "py",
                                "m" => "my",
                                "r" => "ry",
                                "d" => "dy",
                                _ => consonant,
                            };
                            Some(vec![palatal, glide_vowel])
                        }
                        Some(n) if small_vowel(n).is_some() && !consonant.is_empty() => {
                            Some(vec![consonant, small_vowel(n).unwrap_or(vowel)])
                        }
                        _ => None,
                    };
                    match merged {
                        Some(phones) => {
                            last_vowel = phones.last().copied();
                            out.push(phones.into_iter().map(String::from).collect());
                            out.push(Vec::new());
                            i += 2;
                            continue;
                        }
                        None if consonant.is_empty() => vec![vowel],
                        None => vec![consonant, vowel],
                    }
                }
                None => Vec::new(),
            },
        };
        if let Some(v) = phones.last().filter(|p| matches!(**p, "a" | "i" | "u" | "e" | "o")) {
            last_vowel = Some(*v);
        }
        out.push(phones.into_iter().map(String::from).collect());
        i += 1;
    }
    out
}

/// Japanese grapheme-to-phoneme converter
#[derive(Debug, Clone, Default)]
pub struct JapaneseG2p {
    readings: Lexicon,
}

impl JapaneseG2p {
    /// Load the kanji reading lexicon if present; kana needs no resources
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(READINGS_FILE);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Kanji readings not found, kanji will be UNK");
            return Ok(Self::default());
        }
        Ok(Self::new(Lexicon::load(&path)?))
    }

    pub fn new(readings: Lexicon) -> Self {
        Self { readings }
    }

    /// Kanji words carry their whole reading on the first character
    pub fn convert(&self, normalized: &str) -> Phonemes {
        let chars: Vec<char> = normalized.chars().collect();
        let mut phonemes = Phonemes::with_capacity(chars.len());

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if is_punctuation(c) {
                phonemes.push_char([c.to_string()]);
                i += 1;
            } else if is_kanji(c) {
                match self.readings.longest_match(&chars, i) {
                    Some((len, reading)) => {
                        let reading: Vec<char> = reading.chars().filter(|c| is_kana(*c)).collect();
                        phonemes.push_char(kana_phones(&reading).into_iter().flatten());
                        for _ in 1..len {
                            phonemes.push_char(Vec::<String>::new());
                        }
                        i += len;
                    }
                    None => {
                        note_unknown(LanguageTag::Ja, &c.to_string());
                        phonemes.push_char([UNK]);
                        i += 1;
                    }
                }
            } else {
                let end = chars[i..]
                    .iter()
                    .position(|c| !is_kana(*c))
                    .map_or(chars.len(), |p| i + p);
                for phones in kana_phones(&chars[i..end]) {
                    phonemes.push_char(phones);
                }
                // Characters outside every class still need a count
                if end == i {
                    phonemes.push_char(Vec::<String>::new());
                    i += 1;
                } else {
                    i = end;
                }
            }
        }
        phonemes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g2p() -> JapaneseG2p {
        JapaneseG2p::new(Lexicon::parse("日本\tニホン\n語\tゴ\n"))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("こんにちは、世界！"), "こんにちは,世界!");
        assert_eq!(normalize("「テスト」abc"), "テスト");
    }

    #[test]
    fn test_plain_kana() {
        let p = g2p().convert("こんにちは");
        assert_eq!(
            p.symbols,
            vec!["k", "o", "N", "n", "i", "ch", "i", "h", "a"]
        );
        assert_eq!(p.counts, vec![2, 1, 2, 2, 2]);
    }

    #[test]
    fn test_digraphs_and_geminates() {
        let p = g2p().convert("きょうはちょっと");
        assert_eq!(
            p.symbols,
            vec!["ky", "o", "u", "h", "a", "ch", "o", "cl", "t", "o"]
        );
        assert!(p.check_alignment("きょうはちょっと").is_ok());
    }

    #[test]
    fn test_long_vowel_mark() {
        let p = g2p().convert("ラーメン");
        assert_eq!(p.symbols, vec!["r", "a", "a", "m", "e", "N"]);
    }

    #[test]
    fn test_kanji_word_reading() {
        let p = g2p().convert("日本語.");
        assert_eq!(p.symbols, vec!["n", "i", "h", "o", "N", "g", "o", "."]);
        assert_eq!(p.counts, vec![5, 0, 2, 1]);
    }

    #[test]
    fn test_unknown_kanji() {
        let p = g2p().convert("猫");
        assert_eq!(p.symbols, vec![UNK]);
    }
}
