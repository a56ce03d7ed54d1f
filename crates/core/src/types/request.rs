//! Inference request
//!
//! A request is validated once when built and is immutable afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Where the primary reference voice sample comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSource {
    /// A preset stored alongside the voice model
    Preset(String),
    /// Raw audio supplied with the request, with an optional transcript
    Audio {
        bytes: Vec<u8>,
        prompt_text: Option<String>,
    },
}

/// A validated synthesis request
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    request_id: Uuid,
    text: String,
    voice_id: String,
    reference: ReferenceSource,
    extra_reference_ids: Vec<String>,
    speed: f32,
}

impl InferenceRequest {
    pub fn builder(text: impl Into<String>, voice_id: impl Into<String>) -> InferenceRequestBuilder {
        InferenceRequestBuilder {
            text: text.into(),
            voice_id: voice_id.into(),
            reference_id: None,
            reference_audio: None,
            prompt_text: None,
            extra_reference_ids: Vec::new(),
            speed: None,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn reference(&self) -> &ReferenceSource {
        &self.reference
    }

    pub fn extra_reference_ids(&self) -> &[String] {
        &self.extra_reference_ids
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}

/// Builder for [`InferenceRequest`]
#[derive(Debug, Clone)]
pub struct InferenceRequestBuilder {
    text: String,
    voice_id: String,
    reference_id: Option<String>,
    reference_audio: Option<Vec<u8>>,
    prompt_text: Option<String>,
    extra_reference_ids: Vec<String>,
    speed: Option<f32>,
}

impl InferenceRequestBuilder {
    pub fn reference_id(mut self, id: impl Into<String>) -> Self {
        self.reference_id = Some(id.into());
        self
    }

    pub fn reference_audio(mut self, bytes: Vec<u8>) -> Self {
        self.reference_audio = Some(bytes);
        self
    }

    /// Transcript of the inline reference audio
    pub fn prompt_text(mut self, text: impl Into<String>) -> Self {
        self.prompt_text = Some(text.into());
        self
    }

    pub fn extra_reference_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_reference_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn build(self) -> Result<InferenceRequest> {
        if self.text.trim().is_empty() {
            return Err(Error::InputValidation("text must not be empty".into()));
        }
        if self.voice_id.trim().is_empty() {
            return Err(Error::InputValidation("voice_id must not be empty".into()));
        }

        let reference = match (self.reference_id, self.reference_audio) {
            (Some(_), Some(_)) => {
                return Err(Error::InputValidation(
                    "provide either reference_id or reference_audio, not both".into(),
                ))
            }
            (Some(id), None) => {
                if id.trim().is_empty() {
                    return Err(Error::InputValidation("reference_id must not be empty".into()));
                }
                ReferenceSource::Preset(id)
            }
            (None, Some(bytes)) => {
                if bytes.is_empty() {
                    return Err(Error::InputValidation("reference_audio must not be empty".into()));
                }
                ReferenceSource::Audio {
                    bytes,
                    prompt_text: self.prompt_text.filter(|t| !t.trim().is_empty()),
                }
            }
            (None, None) => {
                return Err(Error::InputValidation(
                    "a reference_id or reference_audio is required".into(),
                ))
            }
        };

        if self.extra_reference_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::InputValidation(
                "extra_reference_ids must not contain empty ids".into(),
            ));
        }

        let speed = self.speed.unwrap_or(1.0);
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InputValidation(format!(
                "speed must be a positive number, got {}",
                speed
            )));
        }

        Ok(InferenceRequest {
            request_id: Uuid::new_v4(),
            text: self.text,
            voice_id: self.voice_id,
            reference,
            extra_reference_ids: self.extra_reference_ids,
            speed,
        })
    }
}

/// Wire shape of a synthesis request as received by a transport
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisPayload {
    pub text: String,
    pub voice_id: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub reference_audio: Option<Vec<u8>>,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub extra_reference_ids: Vec<String>,
    #[serde(default)]
    pub speed: Option<f32>,
}

impl TryFrom<SynthesisPayload> for InferenceRequest {
    type Error = Error;

    fn try_from(payload: SynthesisPayload) -> Result<Self> {
        let mut builder = InferenceRequest::builder(payload.text, payload.voice_id)
            .extra_reference_ids(payload.extra_reference_ids);
        if let Some(id) = payload.reference_id {
            builder = builder.reference_id(id);
        }
        if let Some(bytes) = payload.reference_audio {
            builder = builder.reference_audio(bytes);
        }
        if let Some(text) = payload.prompt_text {
            builder = builder.prompt_text(text);
        }
        if let Some(speed) = payload.speed {
            builder = builder.speed(speed);
        }
        builder.build()
    }
}
