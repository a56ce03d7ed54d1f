//! Model artifact and runtime descriptors

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sampling parameters handed to a model executor at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub top_k: usize,
    pub top_p: f32,
    pub temperature: f32,
    /// Semantic token rate
    pub token_rate_hz: u32,
    /// Hard cap on generated speech per chunk
    pub max_duration_secs: u32,
    pub seed: Option<u64>,
}

impl GenerationParams {
    /// Token budget after which generation stops
    pub fn early_stop_tokens(&self) -> usize {
        self.token_rate_hz as usize * self.max_duration_secs as usize
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            top_k: 15,
            top_p: 1.0,
            temperature: 1.0,
            token_rate_hz: 50,
            max_duration_secs: 54,
            seed: None,
        }
    }
}

/// Locations of the two weight files for a voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelWeights {
    pub semantic: PathBuf,
    pub acoustic: PathBuf,
}

/// Everything a loader needs to build one model instance
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub voice_id: String,
    pub config: serde_json::Value,
    pub weights: ModelWeights,
}

/// Reference recording shipped with a voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub id: String,
    pub audio: Vec<u8>,
    pub text: Option<String>,
}

/// Device memory snapshot in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
}

impl MemoryUsage {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_stop_tokens() {
        let params = GenerationParams::default();
        assert_eq!(params.early_stop_tokens(), 2700);
    }

    #[test]
    fn test_memory_ratio() {
        let usage = MemoryUsage { used: 95, total: 100 };
        assert!(usage.ratio() > 0.9);
        let empty = MemoryUsage { used: 0, total: 0 };
        assert_eq!(empty.ratio(), 0.0);
    }
}
