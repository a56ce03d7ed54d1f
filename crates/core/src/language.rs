//! Language tags for the text front-ends

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Closed set of languages the front-end can process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    /// Mandarin Chinese
    Zh,
    /// English
    En,
    /// Japanese
    Ja,
    /// Korean
    Ko,
    /// Cantonese
    Yue,
}

impl LanguageTag {
    pub const ALL: [LanguageTag; 5] = [Self::Zh, Self::En, Self::Ja, Self::Ko, Self::Yue];

    /// Stable dense index, used for fixed-size per-language tables
    pub fn index(&self) -> usize {
        match self {
            Self::Zh => 0,
            Self::En => 1,
            Self::Ja => 2,
            Self::Ko => 3,
            Self::Yue => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
            Self::Ja => "ja",
            Self::Ko => "ko",
            Self::Yue => "yue",
        }
    }

    /// Whether the language is written with Han characters
    pub fn is_sinitic(&self) -> bool {
        matches!(self, Self::Zh | Self::Yue)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "all_zh" => Ok(Self::Zh),
            "en" | "all_en" => Ok(Self::En),
            "ja" | "all_ja" => Ok(Self::Ja),
            "ko" | "all_ko" => Ok(Self::Ko),
            "yue" | "all_yue" => Ok(Self::Yue),
            other => Err(Error::UnsupportedLanguage(other.to_string())),
        }
    }
}
