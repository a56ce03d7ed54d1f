//! Phoneme vocabulary
//!
//! Ids are positions in a fixed, ordered symbol list shared by every
//! language front-end. The list is built once:
//! `sorted(unique(pad + mandarin + japanese + punctuation + arpabet))`,
//! then `[`, `]`, sorted Korean jamo and sorted Cantonese symbols.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use voice_synth_config::UnknownPhonemePolicy;
use voice_synth_core::{Error, LanguageTag, Result};

pub const PAD: &str = "_";
pub const UNK: &str = "UNK";

/// Canonical punctuation kept by every normalizer
pub const PUNCTUATION: [char; 6] = ['!', '?', '…', ',', '.', '-'];

pub fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(&c)
}

/// Source punctuation and its canonical replacement, longest keys first
pub const PUNCTUATION_MAP: [(&str, &str); 15] = [
    ("...", "…"),
    ("：", ","),
    ("；", ","),
    ("，", ","),
    ("。", "."),
    ("！", "!"),
    ("？", "?"),
    ("\n", "."),
    ("·", ","),
    ("、", ","),
    ("$", "."),
    ("/", ","),
    ("—", "-"),
    ("~", "…"),
    ("～", "…"),
];

const SPECIALS: [&str; 4] = ["SP", "SP2", "SP3", UNK];

/// Mandarin initials, including the zero-initial placeholders
pub const MANDARIN_INITIALS: [&str; 26] = [
    "AA", "EE", "OO", "b", "c", "ch", "d", "f", "g", "h", "j", "k", "l", "m", "n", "p", "q",
    "r", "s", "sh", "t", "w", "x", "y", "z", "zh",
];

/// Mandarin finals without tone
pub const MANDARIN_FINALS: [&str; 39] = [
    "E", "En", "a", "ai", "an", "ang", "ao", "e", "ei", "en", "eng", "er", "i", "i0", "ia",
    "ian", "iang", "iao", "ie", "in", "ing", "iong", "ir", "iu", "o", "ong", "ou", "u", "ua",
    "uai", "uan", "uang", "ui", "un", "uo", "v", "van", "ve", "vn",
];

const JAPANESE: [&str; 38] = [
    "I", "N", "U", "a", "b", "by", "ch", "cl", "d", "dy", "e", "f", "g", "gy", "h", "hy", "i",
    "j", "k", "ky", "m", "my", "n", "ny", "o", "p", "py", "r", "ry", "s", "sh", "t", "ts", "u",
    "v", "w", "y", "z",
];

const ARPABET: [&str; 71] = [
    "AA0", "AA1", "AA2", "AE0", "AE1", "AE2", "AH0", "AH1", "AH2", "AO0", "AO1", "AO2", "AW0",
    "AW1", "AW2", "AY0", "AY1", "AY2", "B", "CH", "D", "DH", "EH0", "EH1", "EH2", "ER", "ER0",
    "ER1", "ER2", "EY0", "EY1", "EY2", "F", "G", "HH", "IH", "IH0", "IH1", "IH2", "IY0", "IY1",
    "IY2", "JH", "K", "L", "M", "N", "NG", "OW0", "OW1", "OW2", "OY0", "OY1", "OY2", "P", "R",
    "S", "SH", "T", "TH", "UH0", "UH1", "UH2", "UW0", "UW1", "UW2", "V", "W", "Y", "Z", "ZH",
];

/// Korean jamo plus the space (`空`) and unknown (`停`) markers
pub const KOREAN: &str = "ㄱㄴㄷㄹㅁㅂㅅㅇㅈㅊㅋㅌㅍㅎㄲㄸㅃㅆㅉㅏㅓㅗㅜㅡㅣㅐㅔ空停";
pub const KOREAN_SPACE: &str = "空";
pub const KOREAN_UNKNOWN: &str = "停";

/// Jyutping initials
pub const CANTONESE_INITIALS: [&str; 19] = [
    "b", "p", "m", "f", "d", "t", "n", "l", "g", "k", "ng", "h", "gw", "kw", "w", "z", "c", "s",
    "j",
];

/// Jyutping finals, including the syllabic nasals
pub const CANTONESE_FINALS: [&str; 55] = [
    "aa", "aai", "aau", "aam", "aan", "aang", "aap", "aat", "aak", "ai", "au", "am", "an", "ang",
    "ap", "at", "ak", "e", "ei", "eu", "em", "en", "eng", "ep", "et", "ek", "i", "iu", "im", "in",
    "ing", "ip", "it", "ik", "o", "oi", "ou", "on", "ong", "ot", "ok", "oe", "oeng", "oet", "oek",
    "eoi", "eon", "eot", "u", "ui", "un", "ung", "ut", "uk", "yu",
];
/// Finals written without a vowel nucleus of their own
pub const CANTONESE_EXTRA_FINALS: [&str; 4] = ["yun", "yut", "m", "ng"];

/// Prefix that keeps Cantonese symbols disjoint from Mandarin ones
pub const CANTONESE_PREFIX: &str = "Y";

fn cantonese_symbols() -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for initial in CANTONESE_INITIALS {
        set.insert(format!("{}{}", CANTONESE_PREFIX, initial));
    }
    for final_ in CANTONESE_FINALS.iter().chain(CANTONESE_EXTRA_FINALS.iter()) {
        set.insert(format!("{}{}", CANTONESE_PREFIX, final_));
        for tone in 1..=6 {
            set.insert(format!("{}{}{}", CANTONESE_PREFIX, final_, tone));
        }
    }
    set
}

fn build_symbols() -> Vec<String> {
    let mut base: BTreeSet<String> = BTreeSet::new();
    base.insert(PAD.to_string());
    base.extend(MANDARIN_INITIALS.iter().map(|s| s.to_string()));
    for final_ in MANDARIN_FINALS {
        for tone in 1..=5 {
            base.insert(format!("{}{}", final_, tone));
        }
    }
    base.extend(JAPANESE.iter().map(|s| s.to_string()));
    base.extend(PUNCTUATION.iter().map(|c| c.to_string()));
    base.extend(SPECIALS.iter().map(|s| s.to_string()));
    base.extend(ARPABET.iter().map(|s| s.to_string()));

    let mut symbols: Vec<String> = base.into_iter().collect();
    symbols.push("[".to_string());
    symbols.push("]".to_string());

    let korean: BTreeSet<String> = KOREAN.chars().map(|c| c.to_string()).collect();
    symbols.extend(korean);
    symbols.extend(cantonese_symbols());
    symbols
}

static SHARED: Lazy<SymbolTable> = Lazy::new(|| SymbolTable::new(build_symbols()));

/// Symbol ↔ id mapping
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<String>,
    ids: HashMap<String, i64>,
    unk_id: i64,
}

impl SymbolTable {
    fn new(symbols: Vec<String>) -> Self {
        let mut ids = HashMap::with_capacity(symbols.len());
        for (i, s) in symbols.iter().enumerate() {
            // Earlier position wins if a symbol repeats across groups
            ids.entry(s.clone()).or_insert(i as i64);
        }
        let unk_id = ids.get(UNK).copied().unwrap_or(0);
        Self {
            symbols,
            ids,
            unk_id,
        }
    }

    /// Process-wide vocabulary
    pub fn shared() -> &'static SymbolTable {
        &SHARED
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn id(&self, symbol: &str) -> Option<i64> {
        self.ids.get(symbol).copied()
    }

    pub fn symbol(&self, id: i64) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.symbols.get(i))
            .map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.ids.contains_key(symbol)
    }

    pub fn unk_id(&self) -> i64 {
        self.unk_id
    }

    /// Map symbols to ids, applying `policy` to anything outside the vocabulary.
    /// Never drops a symbol, so the output length always equals the input length.
    pub fn encode<S: AsRef<str>>(
        &self,
        language: LanguageTag,
        symbols: &[S],
        policy: UnknownPhonemePolicy,
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.as_ref();
            match self.id(symbol) {
                Some(id) => ids.push(id),
                None => match policy {
                    UnknownPhonemePolicy::Reject => {
                        return Err(Error::PhonemeMapping {
                            language,
                            symbol: symbol.to_string(),
                        })
                    }
                    UnknownPhonemePolicy::Substitute => {
                        tracing::warn!(
                            language = %language,
                            symbol = %symbol,
                            "Phoneme outside vocabulary, substituting UNK"
                        );
                        metrics::counter!("tts_unknown_phonemes_total", "language" => language.as_str())
                            .increment(1);
                        ids.push(self.unk_id);
                    }
                },
            }
        }
        Ok(ids)
    }
}

/// Record an UNK emitted directly by a front-end (e.g. a character with no reading)
pub(crate) fn note_unknown(language: LanguageTag, text: &str) {
    tracing::warn!(language = %language, text = %text, "No pronunciation found, emitting UNK");
    metrics::counter!("tts_unknown_phonemes_total", "language" => language.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_and_unk_present() {
        let table = SymbolTable::shared();
        assert!(table.contains(PAD));
        assert_eq!(table.symbol(table.unk_id()), Some(UNK));
    }

    #[test]
    fn test_base_group_is_sorted() {
        let table = SymbolTable::shared();
        let open = table.id("[").unwrap() as usize;
        let base: Vec<&str> = (0..open).filter_map(|i| table.symbol(i as i64)).collect();
        let mut sorted = base.clone();
        sorted.sort();
        assert_eq!(base, sorted);
        assert_eq!(table.id("]"), Some(open as i64 + 1));
    }

    #[test]
    fn test_groups_present() {
        let table = SymbolTable::shared();
        for s in ["a1", "zh", "ir4", "i05", "AE1", "cl", "…", "UNK", "ㄱ", "空", "停", "Yei5", "Yng", "Ygw", "Yaa"] {
            assert!(table.contains(s), "missing symbol {}", s);
        }
        assert!(!table.contains("UW"));
    }

    #[test]
    fn test_symbol_shared_across_languages_has_one_id() {
        // "ch" is both a Mandarin initial and a Japanese consonant
        let table = SymbolTable::shared();
        let id = table.id("ch").unwrap();
        assert_eq!(table.symbol(id), Some("ch"));
        let open = table.id("[").unwrap();
        assert!(id < open);
    }

    #[test]
    fn test_encode_substitutes_unknown() {
        let table = SymbolTable::shared();
        let ids = table
            .encode(LanguageTag::En, &["HH", "XX9", "OW1"], UnknownPhonemePolicy::Substitute)
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], table.unk_id());
        assert_eq!(ids[0], table.id("HH").unwrap());
    }

    #[test]
    fn test_encode_rejects_unknown() {
        let table = SymbolTable::shared();
        let err = table
            .encode(LanguageTag::En, &["HH", "XX9"], UnknownPhonemePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, Error::PhonemeMapping { ref symbol, .. } if symbol == "XX9"));
    }

    #[test]
    fn test_punctuation_map_longest_first() {
        assert_eq!(PUNCTUATION_MAP[0].0, "...");
    }
}
