//! English text normalization
//!
//! Expands units, ranges, currency, percentages, ordinals and cardinals to
//! words, folds accented letters and keeps only letters, apostrophes,
//! spaces and the canonical punctuation.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::collapse_punctuation;

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Unit abbreviations expanded after a number
const UNITS: [(&str, &str); 20] = [
    ("m²", "square meter"),
    ("m^2", "square meter"),
    ("㎡", "square meter"),
    ("m³", "cubic meter"),
    ("m^3", "cubic meter"),
    ("mm", "millimeter"),
    ("mm²", "square millimeter"),
    ("mm^2", "square millimeter"),
    ("mm³", "cubic millimeter"),
    ("mm^3", "cubic millimeter"),
    ("cm", "centimeter"),
    ("cm²", "square centimeter"),
    ("cm^2", "square centimeter"),
    ("cm³", "cubic centimeter"),
    ("cm^3", "cubic centimeter"),
    ("km", "kilometer"),
    ("ft", "foot"),
    ("yd", "yard"),
    ("mi", "mile"),
    ("m", "meter"),
];

static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;:：，；]").unwrap());
static RE_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new("[\"’]").unwrap());
static RE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]+(?:\.[0-9]+)?)(%|°C|℃|cm²|cm³|cm|kg|km|m²|m³|ml|mm|m|s)?~([0-9]+(?:\.[0-9]+)?)").unwrap()
});
static RE_DIMENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*([a-zA-Z²³㎡]*)\s*[*×]\s*([0-9]+(?:\.[0-9]+)?)").unwrap()
});
static RE_UNITS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let mut units: Vec<&(&str, &str)> = UNITS.iter().collect();
    // Longest abbreviation first so "mm" is not read as "m" + "m"
    units.sort_by_key(|(abbr, _)| std::cmp::Reverse(abbr.chars().count()));
    units
        .into_iter()
        .map(|(abbr, name)| {
            let pattern = format!(r"([0-9]+(?:\.[0-9]+)?)\s*{}([^A-Za-z]|$)", regex::escape(abbr));
            (Regex::new(&pattern).unwrap(), *name)
        })
        .collect()
});
static RE_COMMA_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{1,3}(?:,[0-9]{3})+").unwrap());
static RE_CURRENCY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([0-9]+)(?:\.([0-9]+))?").unwrap());
static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)%").unwrap());
static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)(st|nd|rd|th)\b").unwrap());
static RE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)\.([0-9]+)").unwrap());
static RE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
static RE_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^ A-Za-z'.,?!\-]").unwrap());
static RE_IE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)i\.e\.").unwrap());
static RE_EG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)e\.g\.").unwrap());

/// Full English normalization
pub fn normalize(text: &str) -> String {
    let text = RE_SEPARATORS.replace_all(text, ",");
    let text = RE_QUOTES.replace_all(&text, "'");
    let text = text.replace('。', ".").replace('！', "!").replace('？', "?");
    let text = normalize_quantifiers(&text);
    let text = normalize_numbers(&text);
    let text = fold_accents(&text);
    let text = RE_DISALLOWED.replace_all(&text, "");
    let text = RE_IE.replace_all(&text, "that is");
    let text = RE_EG.replace_all(&text, "for example");
    collapse_punctuation(&text)
}

/// Ranges, dimensions and measurement units
pub fn normalize_quantifiers(text: &str) -> String {
    let text = RE_RANGE.replace_all(text, "${1}${2} to ${3}");
    let text = RE_DIMENSION.replace_all(&text, "${1}${2} by ${3}");
    let mut text = text.into_owned();
    for (re, name) in RE_UNITS.iter() {
        text = re
            .replace_all(&text, |caps: &Captures| format!("{} {}{}", &caps[1], name, &caps[2]))
            .into_owned();
    }
    text
}

/// Currency, percentages, ordinals, decimals and cardinals to words
pub fn normalize_numbers(text: &str) -> String {
    let text = RE_COMMA_NUMBER.replace_all(text, |caps: &Captures| caps[0].replace(',', ""));
    let text = RE_CURRENCY.replace_all(&text, |caps: &Captures| {
        let dollars = parse_or_zero(&caps[1]);
        let cents = caps.get(2).map_or(0, |m| parse_or_zero(m.as_str()));
        expand_currency(dollars, cents)
    });
    let text = RE_PERCENT.replace_all(&text, "$1 percent");
    let text = RE_ORDINAL.replace_all(&text, |caps: &Captures| {
        ordinal_to_words(parse_or_zero(&caps[1]))
    });
    let text = RE_DECIMAL.replace_all(&text, |caps: &Captures| {
        format!(
            "{} point {}",
            spoken_number(&caps[1]),
            digits_to_words(&caps[2])
        )
    });
    RE_INTEGER
        .replace_all(&text, |caps: &Captures| spoken_number(&caps[0]))
        .into_owned()
}

fn parse_or_zero(digits: &str) -> u64 {
    digits.parse().unwrap_or(0)
}

fn expand_currency(dollars: u64, cents: u64) -> String {
    let unit = |n: u64, one: &str, many: &str| {
        format!("{} {}", integer_to_words(n), if n == 1 { one } else { many })
    };
    match (dollars, cents) {
        (0, 0) => "zero dollars".to_string(),
        (d, 0) => unit(d, "dollar", "dollars"),
        (0, c) => unit(c, "cent", "cents"),
        (d, c) => format!("{}, {}", unit(d, "dollar", "dollars"), unit(c, "cent", "cents")),
    }
}

/// Cardinal reading; four-digit numbers between 1000 and 3000 read as years
fn spoken_number(digits: &str) -> String {
    if digits.len() > 18 {
        return digits_to_words(digits);
    }
    let n = parse_or_zero(digits);
    if n > 1000 && n < 3000 {
        if n == 2000 {
            return "two thousand".to_string();
        }
        if n > 2000 && n < 2010 {
            return format!("two thousand {}", ONES[(n % 100) as usize]);
        }
        if n % 100 == 0 {
            return format!("{} hundred", integer_to_words(n / 100));
        }
        let low = n % 100;
        let low_words = if low < 10 {
            format!("oh {}", ONES[low as usize])
        } else {
            integer_to_words(low)
        };
        return format!("{} {}", integer_to_words(n / 100), low_words);
    }
    integer_to_words(n)
}

/// Cardinal number in words
pub fn integer_to_words(n: u64) -> String {
    if n < 20 {
        return ONES[n as usize].to_string();
    }

    let mut parts = Vec::new();
    let mut rest = n;
    for (scale, name) in [
        (1_000_000_000_000_000u64, "quadrillion"),
        (1_000_000_000_000, "trillion"),
        (1_000_000_000, "billion"),
        (1_000_000, "million"),
        (1_000, "thousand"),
    ] {
        if rest >= scale {
            parts.push(format!("{} {}", integer_to_words(rest / scale), name));
            rest %= scale;
        }
    }
    if rest >= 100 {
        parts.push(format!("{} hundred", ONES[(rest / 100) as usize]));
        rest %= 100;
    }
    if rest >= 20 {
        let tens = TENS[(rest / 10) as usize];
        if rest % 10 > 0 {
            parts.push(format!("{}-{}", tens, ONES[(rest % 10) as usize]));
        } else {
            parts.push(tens.to_string());
        }
    } else if rest > 0 {
        parts.push(ONES[rest as usize].to_string());
    }
    parts.join(" ")
}

/// Ordinal number in words
pub fn ordinal_to_words(n: u64) -> String {
    let cardinal = integer_to_words(n);
    let (head, last) = match cardinal.rfind(|c: char| c == ' ' || c == '-') {
        Some(pos) => cardinal.split_at(pos + 1),
        None => ("", cardinal.as_str()),
    };
    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{}th", w),
    };
    format!("{}{}", head, last)
}

fn digits_to_words(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| ONES[d as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip diacritics from Latin letters
pub fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
            'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
            'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
            'ď' => 'd',
            'Ď' => 'D',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
            'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
            'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => 'i',
            'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' => 'I',
            'ñ' | 'ń' | 'ň' => 'n',
            'Ñ' | 'Ń' | 'Ň' => 'N',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' | 'ŏ' | 'ő' => 'o',
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
            'ŕ' | 'ř' => 'r',
            'Ŕ' | 'Ř' => 'R',
            'ś' | 'š' | 'ş' => 's',
            'Ś' | 'Š' | 'Ş' => 'S',
            'ť' | 'ţ' => 't',
            'Ť' | 'Ţ' => 'T',
            'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
            'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
            'ý' | 'ÿ' => 'y',
            'Ý' | 'Ÿ' => 'Y',
            'ź' | 'ż' | 'ž' => 'z',
            'Ź' | 'Ż' | 'Ž' => 'Z',
            other => other,
        })
        .collect()
}
