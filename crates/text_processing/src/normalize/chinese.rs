//! Chinese text normalization
//!
//! Numerals are read out as Chinese characters, punctuation is
//! canonicalized and everything other than CJK ideographs and the
//! canonical marks is removed.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{collapse_punctuation, map_punctuation};
use crate::symbols::is_punctuation;

const DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const SECTION_UNITS: [&str; 4] = ["千", "百", "十", ""];
const GROUP_UNITS: [&str; 4] = ["", "万", "亿", "万亿"];

/// Longer digit strings are read digit by digit
const MAX_CARDINAL_DIGITS: usize = 16;

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]{2,4})年").unwrap());
static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?)([0-9]+(?:\.[0-9]+)?)[%％]").unwrap());
static RE_TEMPERATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?)([0-9]+(?:\.[0-9]+)?)\s*(?:°C|℃)").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?)([0-9]+(?:\.[0-9]+)?)").unwrap());

/// Full Chinese normalization
pub fn normalize(text: &str) -> String {
    let text = normalize_numbers(text);
    let text = text.replace('嗯', "恩").replace('呣', "母");
    let text = map_punctuation(&text);
    let kept: String = text
        .chars()
        .filter(|c| is_cjk_ideograph(*c) || is_punctuation(*c))
        .collect();
    collapse_punctuation(&kept)
}

/// `０`-`９` become ASCII digits
fn fold_fullwidth_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect()
}

/// Characters the Chinese front-end can pronounce
pub fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Rewrite Arabic numerals as Chinese readings, leaving other text untouched
pub fn normalize_numbers(text: &str) -> String {
    let text = fold_fullwidth_digits(text);
    let text = RE_YEAR.replace_all(&text, |caps: &Captures| {
        format!("{}年", read_digits(&caps[1]))
    });
    let text = RE_PERCENT.replace_all(&text, |caps: &Captures| {
        format!("{}百分之{}", sign(&caps[1]), read_number(&caps[2]))
    });
    let text = RE_TEMPERATURE.replace_all(&text, |caps: &Captures| {
        format!("{}{}摄氏度", sign(&caps[1]), read_number(&caps[2]))
    });
    let source = text.as_ref();
    RE_NUMBER
        .replace_all(source, |caps: &Captures| {
            let start = caps.get(0).map_or(0, |m| m.start());
            // "3-5" is a range, not a negative five
            let after_digit = source[..start]
                .chars()
                .last()
                .map_or(false, |c| c.is_ascii_digit());
            let minus = if !caps[1].is_empty() && after_digit {
                "-"
            } else {
                sign(&caps[1])
            };
            format!("{}{}", minus, read_number(&caps[2]))
        })
        .into_owned()
}

fn sign(minus: &str) -> &'static str {
    if minus.is_empty() {
        ""
    } else {
        "负"
    }
}

/// Read `123.45` style numbers
pub fn read_number(number: &str) -> String {
    match number.split_once('.') {
        Some((int, frac)) => format!("{}点{}", read_integer(int), read_digits(frac)),
        None => read_integer(number),
    }
}

/// Read each digit separately
pub fn read_digits(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| DIGITS[d as usize])
        .collect()
}

/// Read a non-negative integer given as decimal digits
pub fn read_integer(digits: &str) -> String {
    if digits.len() > 1 && digits.starts_with('0') {
        return read_digits(digits);
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return DIGITS[0].to_string();
    }
    if trimmed.len() > MAX_CARDINAL_DIGITS {
        return read_digits(trimmed);
    }

    let values: Vec<u32> = trimmed.chars().filter_map(|c| c.to_digit(10)).collect();
    let mut groups = Vec::new();
    let mut end = values.len();
    while end > 0 {
        let start = end.saturating_sub(4);
        let group = values[start..end].iter().fold(0u32, |acc, d| acc * 10 + d);
        groups.push(group);
        end = start;
    }

    let mut out = String::new();
    let mut pending_zero = false;
    for (idx, group) in groups.iter().enumerate().rev() {
        if *group == 0 {
            if !out.is_empty() {
                pending_zero = true;
            }
            continue;
        }
        if !out.is_empty() && (pending_zero || *group < 1000) {
            out.push(DIGITS[0]);
        }
        pending_zero = false;
        out.push_str(&read_section(*group));
        out.push_str(GROUP_UNITS[idx]);
    }

    // 10..19 at the start read as 十X rather than 一十X
    match out.strip_prefix("一十") {
        Some(rest) => format!("十{}", rest),
        None => out,
    }
}

fn read_section(value: u32) -> String {
    let digits = [value / 1000, value / 100 % 10, value / 10 % 10, value % 10];
    let mut out = String::new();
    let mut zero = false;
    for (i, d) in digits.iter().enumerate() {
        if *d == 0 {
            if !out.is_empty() {
                zero = true;
            }
            continue;
        }
        if zero {
            out.push(DIGITS[0]);
            zero = false;
        }
        out.push(DIGITS[*d as usize]);
        out.push_str(SECTION_UNITS[i]);
    }
    out
}
