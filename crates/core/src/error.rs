//! Error taxonomy
//!
//! Every failure surfaced by the pipeline maps onto one [`ErrorKind`].
//! Validation and not-found errors reach the caller verbatim; failures from
//! model loading, execution and downloads are reported with a generic
//! message so internal details (paths, device state) never leak.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::language::LanguageTag;

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("text is empty")]
    EmptyInput,

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("no model artifacts found for voice '{voice_id}'")]
    ModelNotFound { voice_id: String },

    #[error("failed to load model for voice '{voice_id}': {reason}")]
    ModelLoad { voice_id: String, reason: String },

    #[error("reference '{reference_id}' not found for voice '{voice_id}'")]
    ReferenceNotFound {
        voice_id: String,
        reference_id: String,
    },

    #[error("phoneme '{symbol}' produced by the {language} front-end is not in the vocabulary")]
    PhonemeMapping {
        language: LanguageTag,
        symbol: String,
    },

    #[error("model execution failed: {0}")]
    Executor(String),

    #[error("artifact download failed for voice '{voice_id}': {reason}")]
    Download { voice_id: String, reason: String },

    #[error("audio processing failed: {0}")]
    Audio(String),

    #[error("resource unavailable: {0}")]
    Resource(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputValidation,
    UnsupportedLanguage,
    ModelNotFound,
    ModelLoad,
    ReferenceNotFound,
    PhonemeMapping,
    Executor,
    Download,
    Audio,
    Resource,
    Cancelled,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::UnsupportedLanguage => "unsupported_language",
            Self::ModelNotFound => "model_not_found",
            Self::ModelLoad => "model_load",
            Self::ReferenceNotFound => "reference_not_found",
            Self::PhonemeMapping => "phoneme_mapping",
            Self::Executor => "executor",
            Self::Download => "download",
            Self::Audio => "audio",
            Self::Resource => "resource",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }

    /// Whether the error message may be shown to the caller as-is
    pub fn is_public(&self) -> bool {
        !matches!(
            self,
            Self::ModelLoad
                | Self::Executor
                | Self::Download
                | Self::Resource
                | Self::Internal
        )
    }
}

/// Structured failure returned to the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation(_) | Self::EmptyInput => ErrorKind::InputValidation,
            Self::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            Self::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Self::ModelLoad { .. } => ErrorKind::ModelLoad,
            Self::ReferenceNotFound { .. } => ErrorKind::ReferenceNotFound,
            Self::PhonemeMapping { .. } => ErrorKind::PhonemeMapping,
            Self::Executor(_) => ErrorKind::Executor,
            Self::Download { .. } => ErrorKind::Download,
            Self::Audio(_) => ErrorKind::Audio,
            Self::Resource(_) => ErrorKind::Resource,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Internal(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Convert to the caller-facing response, hiding internal detail
    pub fn to_response(&self) -> ErrorResponse {
        let kind = self.kind();
        let message = if kind.is_public() {
            self.to_string()
        } else {
            match kind {
                ErrorKind::ModelLoad => "voice model could not be loaded".to_string(),
                ErrorKind::Download => "voice model could not be fetched".to_string(),
                _ => "speech synthesis failed".to_string(),
            }
        };
        ErrorResponse { kind, message }
    }
}
