//! Text normalization shared by the language front-ends
//!
//! - Punctuation canonicalization into the six vocabulary marks
//! - Collapsing runs of punctuation (repeated marks leak prosody from the prompt)
//! - Chinese numeral reading
//! - English number, unit and abbreviation expansion

pub mod chinese;
pub mod english;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::symbols::{PUNCTUATION, PUNCTUATION_MAP};

static RE_PUNCTUATION_MAP: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = PUNCTUATION_MAP
        .iter()
        .map(|(from, _)| regex::escape(from))
        .collect();
    Regex::new(&alternatives.join("|")).expect("punctuation map pattern is valid")
});

/// Replace source punctuation with its canonical mark
pub fn map_punctuation(text: &str) -> String {
    RE_PUNCTUATION_MAP
        .replace_all(text, |caps: &regex::Captures| {
            let matched = caps.get(0).map_or("", |m| m.as_str());
            PUNCTUATION_MAP
                .iter()
                .find(|(from, _)| *from == matched)
                .map_or(matched, |(_, to)| *to)
                .to_string()
        })
        .into_owned()
}

/// Keep only the first mark of every run of canonical punctuation
pub fn collapse_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_punct = false;
    for c in text.chars() {
        let is_punct = PUNCTUATION.contains(&c);
        if is_punct && prev_punct {
            continue;
        }
        prev_punct = is_punct;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_punctuation() {
        assert_eq!(map_punctuation("你好，世界。"), "你好,世界.");
        assert_eq!(map_punctuation("wait...what"), "wait…what");
        assert_eq!(map_punctuation("a～b"), "a…b");
        assert_eq!(map_punctuation("line\nnext"), "line.next");
    }

    #[test]
    fn test_collapse_punctuation() {
        assert_eq!(collapse_punctuation("好!!!?吗"), "好!吗");
        assert_eq!(collapse_punctuation("a,b,c"), "a,b,c");
        assert_eq!(collapse_punctuation(""), "");
    }
}
