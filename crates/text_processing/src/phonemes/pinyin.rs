//! Pinyin lookup and the pinyin → phoneme mapping
//!
//! Readings come from a tab-separated lexicon (`字<TAB>zi4`, phrases as
//! `你好<TAB>ni3 hao3`) segmented by forward maximum match. After lookup
//! the usual Mandarin tone sandhi is applied:
//! - 不 before a fourth tone becomes bu2
//! - 一 becomes yi2 before a fourth tone and yi4 before other tones,
//!   except inside numbers and at the end of a phrase
//! - two third tones inside a word: the first becomes a second tone
//! - a word-final 儿 takes the tone of the syllable before it (erhua)

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use serde::Deserialize;
use voice_synth_core::{Error, Result};

use super::Lexicon;
use crate::symbols::MANDARIN_FINALS;

pub const LEXICON_FILE: &str = "pinyin.tsv";
pub const ERHUA_FILE: &str = "erhua.json";

/// Written initials, two-letter ones first
const INITIALS: [&str; 23] = [
    "zh", "ch", "sh", "b", "p", "m", "f", "d", "t", "n", "l", "g", "k", "h", "j", "q", "x", "r",
    "z", "c", "s", "y", "w",
];

/// Neighbours that make 一 part of a number
const NUMERIC_CONTEXT: &str = "零一二三四五六七八九十百千万亿两第";

/// Split `hao3` into (`hao`, 3). A missing tone digit is the neutral tone.
pub fn split_tone(syllable: &str) -> (&str, u8) {
    match syllable.chars().last().and_then(|c| c.to_digit(10)) {
        Some(tone @ 1..=5) => (&syllable[..syllable.len() - 1], tone as u8),
        _ => (syllable, 5),
    }
}

/// Map a toned pinyin syllable to its (initial, final+tone) phoneme pair
///
/// Zero-initial syllables get the `AA`/`EE`/`OO` placeholders and `y`/`w`
/// spellings are folded back to their underlying finals. Returns `None`
/// for anything that is not a valid Mandarin syllable.
pub fn syllable_to_symbols(syllable: &str) -> Option<(String, String)> {
    let syllable = syllable
        .trim()
        .to_lowercase()
        .replace('ü', "v")
        .replace("u:", "v");
    let (base, tone) = split_tone(&syllable);
    if base.is_empty() {
        return None;
    }

    let initial = INITIALS
        .iter()
        .find(|i| base.starts_with(**i) && base.len() > i.len())
        .copied()
        .unwrap_or("");
    let rest = &base[initial.len()..];

    let (initial, final_) = match initial {
        "" => {
            let placeholder = match rest.chars().next()? {
                'a' => "AA",
                'e' => "EE",
                'o' => "OO",
                _ => return None,
            };
            (placeholder, rest.to_string())
        }
        "y" => (initial, y_final(rest)?.to_string()),
        "w" => (initial, w_final(rest)?.to_string()),
        "zh" | "ch" | "sh" | "r" if rest == "i" => (initial, "ir".to_string()),
        "z" | "c" | "s" if rest == "i" => (initial, "i0".to_string()),
        "j" | "q" | "x" if rest.starts_with('u') => {
            (initial, contract(&format!("v{}", &rest[1..])))
        }
        _ => (initial, contract(rest)),
    };

    if !MANDARIN_FINALS.contains(&final_.as_str()) {
        return None;
    }
    Some((initial.to_string(), format!("{}{}", final_, tone)))
}

fn y_final(rest: &str) -> Option<&'static str> {
    Some(match rest {
        "i" => "i",
        "a" => "ia",
        "an" => "En",
        "ang" => "iang",
        "ao" => "iao",
        "e" => "E",
        "in" => "in",
        "ing" => "ing",
        "o" => "o",
        "ong" => "iong",
        "ou" => "iu",
        "u" | "v" => "v",
        "uan" | "van" => "van",
        "ue" | "ve" => "ve",
        "un" | "vn" => "vn",
        _ => return None,
    })
}

fn w_final(rest: &str) -> Option<&'static str> {
    Some(match rest {
        "u" => "u",
        "a" => "ua",
        "ai" => "uai",
        "an" => "uan",
        "ang" => "uang",
        "ei" => "ui",
        "en" => "un",
        "eng" => "eng",
        "o" => "uo",
        _ => return None,
    })
}

fn contract(final_: &str) -> String {
    match final_ {
        "uei" => "ui",
        "iou" => "iu",
        "uen" => "un",
        "ue" => "ve",
        other => other,
    }
    .to_string()
}

#[derive(Debug, Default, Deserialize)]
struct ErhuaLists {
    #[serde(default)]
    must_erhua: Vec<String>,
    #[serde(default)]
    not_erhua: Vec<String>,
}

/// Character and phrase readings with sandhi applied
#[derive(Debug, Clone, Default)]
pub struct PinyinDictionary {
    lexicon: Lexicon,
    must_erhua: HashSet<String>,
    not_erhua: HashSet<String>,
}

impl PinyinDictionary {
    /// Load `pinyin.tsv` and the optional `erhua.json` from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let lexicon = Lexicon::load(&dir.join(LEXICON_FILE))?;
        let erhua_path = dir.join(ERHUA_FILE);
        let lists = if erhua_path.exists() {
            let content = std::fs::read_to_string(&erhua_path).map_err(|e| {
                Error::Resource(format!("failed to read {}: {}", erhua_path.display(), e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Resource(format!("invalid {}: {}", erhua_path.display(), e))
            })?
        } else {
            ErhuaLists::default()
        };
        Ok(Self::new(lexicon, lists.must_erhua, lists.not_erhua))
    }

    pub fn new(
        lexicon: Lexicon,
        must_erhua: impl IntoIterator<Item = String>,
        not_erhua: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            lexicon,
            must_erhua: must_erhua.into_iter().collect(),
            not_erhua: not_erhua.into_iter().collect(),
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// One toned reading per character of a run of Han characters.
    /// `None` marks a character the lexicon has no reading for.
    pub fn readings(&self, chars: &[char]) -> Vec<Option<String>> {
        let mut readings = Vec::with_capacity(chars.len());
        let mut words: Vec<Range<usize>> = Vec::new();

        let mut i = 0;
        while i < chars.len() {
            match self.lexicon.longest_match(chars, i) {
                Some((len, reading)) => {
                    let syllables: Vec<&str> = reading.split_whitespace().collect();
                    if syllables.len() == len {
                        readings.extend(syllables.into_iter().map(|s| Some(s.to_string())));
                    } else {
                        readings.extend(chars[i..i + len].iter().map(|c| self.char_reading(*c)));
                    }
                    words.push(i..i + len);
                    i += len;
                }
                None => {
                    readings.push(None);
                    words.push(i..i + 1);
                    i += 1;
                }
            }
        }

        for word in &words {
            self.merge_erhua(&chars[word.clone()], &mut readings[word.clone()]);
        }
        apply_bu_yi_sandhi(chars, &mut readings);
        for word in &words {
            apply_third_tone_sandhi(&mut readings[word.clone()]);
        }
        readings
    }

    fn char_reading(&self, c: char) -> Option<String> {
        self.lexicon
            .get(&c.to_string())
            .and_then(|r| r.split_whitespace().next())
            .map(String::from)
    }

    fn merge_erhua(&self, word: &[char], readings: &mut [Option<String>]) {
        let n = word.len();
        if n < 2 || word[n - 1] != '儿' {
            return;
        }
        if readings[n - 1].as_deref() == Some("er1") {
            readings[n - 1] = Some("er2".to_string());
        }

        let text: String = word.iter().collect();
        let tail: String = word[n - 2..].iter().collect();
        if !self.must_erhua.contains(&text)
            && (self.not_erhua.contains(&text) || self.not_erhua.contains(&tail))
        {
            return;
        }
        if !matches!(readings[n - 1].as_deref(), Some("er2") | Some("er5")) {
            return;
        }
        if let Some(prev_tone) = readings[n - 2].as_deref().map(|r| split_tone(r).1) {
            readings[n - 1] = Some(format!("er{}", prev_tone));
        }
    }
}

fn apply_bu_yi_sandhi(chars: &[char], readings: &mut [Option<String>]) {
    for i in 0..chars.len() {
        let next_tone = readings
            .get(i + 1)
            .and_then(|r| r.as_deref())
            .map(|r| split_tone(r).1);
        match chars[i] {
            '不' if next_tone == Some(4) => readings[i] = Some("bu2".to_string()),
            '一' => {
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let next = chars.get(i + 1).copied();
                if prev.map_or(false, |c| NUMERIC_CONTEXT.contains(c))
                    || next.map_or(false, |c| NUMERIC_CONTEXT.contains(c))
                {
                    continue;
                }
                // 看一看
                if prev.is_some() && prev == next {
                    readings[i] = Some("yi5".to_string());
                    continue;
                }
                match next_tone {
                    Some(4) => readings[i] = Some("yi2".to_string()),
                    Some(1..=3) => readings[i] = Some("yi4".to_string()),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

fn apply_third_tone_sandhi(readings: &mut [Option<String>]) {
    for i in 0..readings.len().saturating_sub(1) {
        let both_third = matches!(
            (readings[i].as_deref(), readings[i + 1].as_deref()),
            (Some(a), Some(b)) if split_tone(a).1 == 3 && split_tone(b).1 == 3
        );
        if both_third {
            if let Some(reading) = readings[i].as_mut() {
                let base = split_tone(reading.as_str()).0.to_string();
                *reading = format!("{}2", base);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(i: &str, f: &str) -> Option<(String, String)> {
        Some((i.to_string(), f.to_string()))
    }

    #[test]
    fn test_split_tone() {
        assert_eq!(split_tone("hao3"), ("hao", 3));
        assert_eq!(split_tone("de"), ("de", 5));
    }

    #[test]
    fn test_regular_syllables() {
        assert_eq!(syllable_to_symbols("ni3"), pair("n", "i3"));
        assert_eq!(syllable_to_symbols("hao3"), pair("h", "ao3"));
        assert_eq!(syllable_to_symbols("jie4"), pair("j", "ie4"));
        assert_eq!(syllable_to_symbols("dui4"), pair("d", "ui4"));
        assert_eq!(syllable_to_symbols("de"), pair("d", "e5"));
    }

    #[test]
    fn test_apical_vowels() {
        assert_eq!(syllable_to_symbols("shi4"), pair("sh", "ir4"));
        assert_eq!(syllable_to_symbols("ri4"), pair("r", "ir4"));
        assert_eq!(syllable_to_symbols("zi5"), pair("z", "i05"));
        assert_eq!(syllable_to_symbols("si1"), pair("s", "i01"));
    }

    #[test]
    fn test_zero_initial_and_glides() {
        assert_eq!(syllable_to_symbols("ai4"), pair("AA", "ai4"));
        assert_eq!(syllable_to_symbols("er2"), pair("EE", "er2"));
        assert_eq!(syllable_to_symbols("ou1"), pair("OO", "ou1"));
        assert_eq!(syllable_to_symbols("yan4"), pair("y", "En4"));
        assert_eq!(syllable_to_symbols("yu2"), pair("y", "v2"));
        assert_eq!(syllable_to_symbols("you3"), pair("y", "iu3"));
        assert_eq!(syllable_to_symbols("wei4"), pair("w", "ui4"));
        assert_eq!(syllable_to_symbols("wo3"), pair("w", "uo3"));
    }

    #[test]
    fn test_umlaut_finals() {
        assert_eq!(syllable_to_symbols("ju4"), pair("j", "v4"));
        assert_eq!(syllable_to_symbols("xue2"), pair("x", "ve2"));
        assert_eq!(syllable_to_symbols("quan2"), pair("q", "van2"));
        assert_eq!(syllable_to_symbols("lv4"), pair("l", "v4"));
        assert_eq!(syllable_to_symbols("lüe4"), pair("l", "ve4"));
    }

    #[test]
    fn test_invalid_syllables() {
        assert_eq!(syllable_to_symbols("ng2"), None);
        assert_eq!(syllable_to_symbols("xyz"), None);
        assert_eq!(syllable_to_symbols("3"), None);
    }

    fn dictionary(entries: &str) -> PinyinDictionary {
        PinyinDictionary::new(Lexicon::parse(entries), Vec::new(), vec!["女儿".to_string()])
    }

    fn read(dict: &PinyinDictionary, text: &str) -> Vec<Option<String>> {
        let chars: Vec<char> = text.chars().collect();
        dict.readings(&chars)
    }

    fn some(readings: &[&str]) -> Vec<Option<String>> {
        readings.iter().map(|r| Some(r.to_string())).collect()
    }

    #[test]
    fn test_phrase_and_third_tone() {
        let dict = dictionary("你\tni3\n好\thao3\n你好\tni3 hao3\n");
        assert_eq!(read(&dict, "你好"), some(&["ni2", "hao3"]));
        // Separate words keep their tones
        assert_eq!(read(&dict, "好你"), some(&["hao3", "ni3"]));
    }

    #[test]
    fn test_bu_sandhi() {
        let dict = dictionary("不\tbu4\n是\tshi4\n好\thao3\n");
        assert_eq!(read(&dict, "不是"), some(&["bu2", "shi4"]));
        assert_eq!(read(&dict, "不好"), some(&["bu4", "hao3"]));
    }

    #[test]
    fn test_yi_sandhi() {
        let dict = dictionary("一\tyi1\n个\tge4\n天\ttian1\n十\tshi2\n看\tkan4\n");
        assert_eq!(read(&dict, "一个"), some(&["yi2", "ge4"]));
        assert_eq!(read(&dict, "一天"), some(&["yi4", "tian1"]));
        assert_eq!(read(&dict, "十一"), some(&["shi2", "yi1"]));
        assert_eq!(read(&dict, "看一看"), some(&["kan4", "yi5", "kan4"]));
        assert_eq!(read(&dict, "一"), some(&["yi1"]));
    }

    #[test]
    fn test_erhua_takes_previous_tone() {
        let dict = dictionary("玩儿\twan2 er5\n女儿\tnv3 er2\n");
        assert_eq!(read(&dict, "玩儿"), some(&["wan2", "er2"]));
        assert_eq!(read(&dict, "女儿"), some(&["nv3", "er2"]));
    }

    #[test]
    fn test_unknown_character_has_no_reading() {
        let dict = dictionary("好\thao3\n");
        assert_eq!(read(&dict, "好龘"), vec![Some("hao3".to_string()), None]);
    }
}
