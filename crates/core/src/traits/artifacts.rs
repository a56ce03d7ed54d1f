//! Artifact storage collaborators

use crate::error::Result;
use crate::types::{ModelWeights, Preset};

/// Read access to per-voice model artifacts
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Whether the voice's artifact directory exists locally
    async fn artifact_exists(&self, voice_id: &str) -> bool;

    /// Sub-network configuration document
    async fn fetch_model_config(&self, voice_id: &str) -> Result<serde_json::Value>;

    async fn fetch_model_weights(&self, voice_id: &str) -> Result<ModelWeights>;

    async fn list_presets(&self, voice_id: &str) -> Result<Vec<String>>;

    async fn fetch_preset(&self, voice_id: &str, preset_id: &str) -> Result<Preset>;
}

/// Fetches missing artifacts from remote storage
#[async_trait::async_trait]
pub trait ArtifactDownloader: Send + Sync {
    /// Download any missing files for `voice_id`; existing files are kept
    async fn download(&self, voice_id: &str) -> Result<()>;
}
