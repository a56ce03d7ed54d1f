//! Korean front-end: Hangul syllables decomposed into compatibility jamo
//!
//! Compound vowels and consonant clusters are split into their parts so
//! that every output symbol is one of the basic jamo. Spaces become `空`,
//! anything without a jamo reading becomes `停`.

use super::Phonemes;
use crate::normalize::{collapse_punctuation, map_punctuation};
use crate::symbols::{is_punctuation, KOREAN_SPACE, KOREAN_UNKNOWN};

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const VOWEL_COUNT: u32 = 21;
const FINAL_COUNT: u32 = 28;

const INITIALS: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];

const VOWELS: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ',
    'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

/// Index 0 is "no final consonant"
const FINALS: [Option<char>; 28] = [
    None,
    Some('ㄱ'), Some('ㄲ'), Some('ㄳ'), Some('ㄴ'), Some('ㄵ'), Some('ㄶ'), Some('ㄷ'),
    Some('ㄹ'), Some('ㄺ'), Some('ㄻ'), Some('ㄼ'), Some('ㄽ'), Some('ㄾ'), Some('ㄿ'), Some('ㅀ'),
    Some('ㅁ'), Some('ㅂ'), Some('ㅄ'), Some('ㅅ'), Some('ㅆ'), Some('ㅇ'), Some('ㅈ'), Some('ㅊ'),
    Some('ㅋ'), Some('ㅌ'), Some('ㅍ'), Some('ㅎ'),
];

const DIVIDED: [(char, &str); 24] = [
    ('ㄳ', "ㄱㅅ"), ('ㄵ', "ㄴㅈ"), ('ㄶ', "ㄴㅎ"), ('ㄺ', "ㄹㄱ"), ('ㄻ', "ㄹㅁ"), ('ㄼ', "ㄹㅂ"),
    ('ㄽ', "ㄹㅅ"), ('ㄾ', "ㄹㅌ"), ('ㄿ', "ㄹㅍ"), ('ㅀ', "ㄹㅎ"), ('ㅄ', "ㅂㅅ"), ('ㅘ', "ㅗㅏ"),
    ('ㅙ', "ㅗㅐ"), ('ㅚ', "ㅗㅣ"), ('ㅝ', "ㅜㅓ"), ('ㅞ', "ㅜㅔ"), ('ㅟ', "ㅜㅣ"), ('ㅢ', "ㅡㅣ"),
    ('ㅑ', "ㅣㅏ"), ('ㅒ', "ㅣㅐ"), ('ㅕ', "ㅣㅓ"), ('ㅖ', "ㅣㅔ"), ('ㅛ', "ㅣㅗ"), ('ㅠ', "ㅣㅜ"),
];

/// Latin letters read by their Korean letter names
const LATIN_NAMES: [(char, &str); 26] = [
    ('a', "에이"), ('b', "비"), ('c', "시"), ('d', "디"), ('e', "이"), ('f', "에프"),
    ('g', "지"), ('h', "에이치"), ('i', "아이"), ('j', "제이"), ('k', "케이"), ('l', "엘"),
    ('m', "엠"), ('n', "엔"), ('o', "오"), ('p', "피"), ('q', "큐"), ('r', "아르"),
    ('s', "에스"), ('t', "티"), ('u', "유"), ('v', "브이"), ('w', "더블유"), ('x', "엑스"),
    ('y', "와이"), ('z', "제트"),
];

pub fn is_hangul(c: char) -> bool {
    matches!(c as u32, SYLLABLE_BASE..=SYLLABLE_LAST) || is_jamo(c)
}

/// Compatibility jamo block
pub fn is_jamo(c: char) -> bool {
    matches!(c, '\u{3131}'..='\u{3163}')
}

/// Latin letters spelled in Hangul and punctuation canonicalized
pub fn normalize(text: &str) -> String {
    let mut spelled = String::with_capacity(text.len());
    for c in text.chars() {
        let lower = c.to_ascii_lowercase();
        match LATIN_NAMES.iter().find(|(l, _)| *l == lower) {
            Some((_, name)) => spelled.push_str(name),
            None => spelled.push(c),
        }
    }
    collapse_punctuation(&map_punctuation(&spelled))
}

/// Compatibility jamo of one character, clusters already divided
fn jamo(c: char) -> Option<Vec<char>> {
    let code = c as u32;
    let parts: Vec<char> = if (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&code) {
        let index = code - SYLLABLE_BASE;
        let initial = INITIALS[(index / (VOWEL_COUNT * FINAL_COUNT)) as usize];
        let vowel = VOWELS[(index % (VOWEL_COUNT * FINAL_COUNT) / FINAL_COUNT) as usize];
        let mut parts = vec![initial, vowel];
        parts.extend(FINALS[(index % FINAL_COUNT) as usize]);
        parts
    } else if is_jamo(c) {
        vec![c]
    } else {
        return None;
    };

    Some(
        parts
            .into_iter()
            .flat_map(|j| match DIVIDED.iter().find(|(from, _)| *from == j) {
                Some((_, to)) => to.chars().collect::<Vec<_>>(),
                None => vec![j],
            })
            .collect(),
    )
}

/// Korean grapheme-to-phoneme converter
#[derive(Debug, Clone, Copy, Default)]
pub struct KoreanG2p;

impl KoreanG2p {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, normalized: &str) -> Phonemes {
        let chars: Vec<char> = normalized.chars().collect();
        let mut phonemes = Phonemes::with_capacity(chars.len());

        for c in &chars {
            if let Some(parts) = jamo(*c) {
                phonemes.push_char(parts.into_iter().map(String::from));
            } else if *c == ' ' {
                phonemes.push_char([KOREAN_SPACE]);
            } else if is_punctuation(*c) {
                phonemes.push_char([c.to_string()]);
            } else {
                phonemes.push_char([KOREAN_UNKNOWN]);
            }
        }

        fix_liquid_nasalization(&mut phonemes.symbols);

        // Utterances ending on a bare jamo get a closing stop
        if chars.last().map_or(false, |c| is_hangul(*c)) {
            phonemes.symbols.push(".".to_string());
            if let Some(last) = phonemes.counts.last_mut() {
                *last += 1;
            }
        }
        phonemes
    }
}

/// `-을 ㄹ` / `-를 ㄹ` across a word boundary is read with `ㄴ`
fn fix_liquid_nasalization(symbols: &mut [String]) {
    let mut i = 0;
    while i + 4 < symbols.len() {
        let head = symbols[i].as_str();
        if (head == "ㅇ" || head == "ㄹ")
            && symbols[i + 1] == "ㅡ"
            && symbols[i + 2] == "ㄹ"
            && symbols[i + 3] == KOREAN_SPACE
            && symbols[i + 4] == "ㄹ"
        {
            symbols[i + 4] = "ㄴ".to_string();
            i += 5;
        } else {
            i += 1;
        }
    }
}
