//! Audio buffers

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Float waveform at the producer's native rate, nominally in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Zero-amplitude buffer of the given duration
    pub fn silence(duration_secs: f32, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; silence_len(duration_secs, sample_rate)],
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }
}

/// Number of samples in a silence gap
pub fn silence_len(duration_secs: f32, sample_rate: u32) -> usize {
    (duration_secs * sample_rate as f32).round() as usize
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Final mono 16-bit PCM output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl OutputAudio {
    /// Peak-normalize if the waveform exceeds full scale, then scale to i16
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let peak = peak(samples);
        let gain = if peak > 1.0 { 1.0 / peak } else { 1.0 };
        let samples = samples
            .iter()
            .map(|s| {
                let v = (s * gain * 32768.0).round();
                v.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Little-endian raw PCM bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Acoustic conditioning derived from one reference recording
#[derive(Debug, Clone)]
pub struct ReferenceConditioning {
    /// Semantic prompt codes, present only when a transcript is known
    pub prompt_codes: Option<Vec<i64>>,
    /// Linear spectrogram, shape `[n_fft / 2 + 1, frames]`
    pub spectrogram: Array2<f32>,
    pub prompt_text: Option<String>,
}

impl ReferenceConditioning {
    pub fn has_semantic_prompt(&self) -> bool {
        self.prompt_codes.is_some()
    }
}
