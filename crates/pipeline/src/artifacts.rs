//! Model artifact storage
//!
//! Layout under the storage root, per voice:
//! ```text
//! voices/<voice_id>/gpt.pth
//! voices/<voice_id>/sovits.pth
//! voices/<voice_id>/gptsovits.yaml
//! voices/<voice_id>/presets/<id>.wav
//! voices/<voice_id>/presets/<id>.txt   (optional transcript)
//! ```
//!
//! Missing voices are fetched by an [`ArtifactDownloader`] from a manifest
//! of `relative path → URL` entries served at
//! `<endpoint>/voices/<voice_id>/manifest.json`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use voice_synth_config::constants::storage::{
    ACOUSTIC_WEIGHTS_FILE, MODEL_CONFIG_FILE, PRESETS_DIR, REQUIRED_FILES, SEMANTIC_WEIGHTS_FILE,
    VOICES_DIR,
};
use voice_synth_config::StorageConfig;
use voice_synth_core::{
    ArtifactDownloader, ArtifactStore, Error, ModelArtifacts, ModelWeights, Preset, Result,
};

const PRESET_AUDIO_EXT: &str = "wav";
const PRESET_TEXT_EXT: &str = "txt";
const MANIFEST_FILE: &str = "manifest.json";

/// Ids become path components, so they must be a single plain name
fn check_id(kind: &str, id: &str) -> Result<()> {
    let mut components = Path::new(id).components();
    let plain = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    if id.is_empty() || !plain || id.contains(['/', '\\']) {
        return Err(Error::InputValidation(format!("invalid {} '{}'", kind, id)));
    }
    Ok(())
}

// ============================================================================
// Local store
// ============================================================================

/// Artifacts on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    voices_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(voices_dir: impl Into<PathBuf>) -> Self {
        Self {
            voices_dir: voices_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.voices_dir())
    }

    pub fn voice_dir(&self, voice_id: &str) -> PathBuf {
        self.voices_dir.join(voice_id)
    }

    async fn require_voice(&self, voice_id: &str) -> Result<PathBuf> {
        check_id("voice id", voice_id)?;
        let dir = self.voice_dir(voice_id);
        if !is_dir(&dir).await {
            return Err(Error::ModelNotFound {
                voice_id: voice_id.to_string(),
            });
        }
        Ok(dir)
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl ArtifactStore for LocalArtifactStore {
    /// Every required file must be present; a voice left half-written by
    /// an interrupted download counts as missing
    async fn artifact_exists(&self, voice_id: &str) -> bool {
        if check_id("voice id", voice_id).is_err() {
            return false;
        }
        let dir = self.voice_dir(voice_id);
        for file in REQUIRED_FILES {
            if !is_file(&dir.join(file)).await {
                return false;
            }
        }
        true
    }

    async fn fetch_model_config(&self, voice_id: &str) -> Result<serde_json::Value> {
        let path = self.require_voice(voice_id).await?.join(MODEL_CONFIG_FILE);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| Error::ModelLoad {
            voice_id: voice_id.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| Error::ModelLoad {
            voice_id: voice_id.to_string(),
            reason: format!("invalid {}: {}", path.display(), e),
        })
    }

    async fn fetch_model_weights(&self, voice_id: &str) -> Result<ModelWeights> {
        let dir = self.require_voice(voice_id).await?;
        let weights = ModelWeights {
            semantic: dir.join(SEMANTIC_WEIGHTS_FILE),
            acoustic: dir.join(ACOUSTIC_WEIGHTS_FILE),
        };
        for path in [&weights.semantic, &weights.acoustic] {
            if !is_file(path).await {
                return Err(Error::ModelLoad {
                    voice_id: voice_id.to_string(),
                    reason: format!("missing weights {}", path.display()),
                });
            }
        }
        Ok(weights)
    }

    async fn list_presets(&self, voice_id: &str) -> Result<Vec<String>> {
        let dir = self.require_voice(voice_id).await?.join(PRESETS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(PRESET_AUDIO_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn fetch_preset(&self, voice_id: &str, preset_id: &str) -> Result<Preset> {
        check_id("reference id", preset_id)?;
        let dir = self.require_voice(voice_id).await?.join(PRESETS_DIR);
        let not_found = || Error::ReferenceNotFound {
            voice_id: voice_id.to_string(),
            reference_id: preset_id.to_string(),
        };

        let audio_path = dir.join(format!("{}.{}", preset_id, PRESET_AUDIO_EXT));
        let audio = match tokio::fs::read(&audio_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        let text_path = dir.join(format!("{}.{}", preset_id, PRESET_TEXT_EXT));
        let text = match tokio::fs::read_to_string(&text_path).await {
            Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Preset {
            id: preset_id.to_string(),
            audio,
            text,
        })
    }
}

/// Gather config and weight locations for a voice
pub async fn load_artifacts(store: &dyn ArtifactStore, voice_id: &str) -> Result<ModelArtifacts> {
    let config = store.fetch_model_config(voice_id).await?;
    let weights = store.fetch_model_weights(voice_id).await?;
    Ok(ModelArtifacts {
        voice_id: voice_id.to_string(),
        config,
        weights,
    })
}

// ============================================================================
// Remote download
// ============================================================================

#[derive(Debug, Deserialize)]
struct Manifest {
    /// Paths relative to the storage root, e.g. `voices/<id>/gpt.pth`
    #[serde(rename = "fileUrls")]
    file_urls: BTreeMap<String, String>,
}

/// Downloads voice artifacts over HTTP
pub struct HttpArtifactDownloader {
    client: reqwest::Client,
    endpoint: String,
    root: PathBuf,
    max_retries: u32,
    backoff: Duration,
    concurrency: usize,
}

impl HttpArtifactDownloader {
    pub fn new(config: &StorageConfig, endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| Error::Resource(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            root: config.root.clone(),
            max_retries: config.max_retries,
            backoff: config.backoff(),
            concurrency: config.download_concurrency.max(1),
        })
    }

    fn manifest_url(&self, voice_id: &str) -> String {
        format!("{}/{}/{}/{}", self.endpoint, VOICES_DIR, voice_id, MANIFEST_FILE)
    }

    /// GET with bounded retries and exponential backoff. Client errors
    /// other than 429 are not retried.
    async fn get_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let mut attempt = 0;
        loop {
            let result = async {
                let response = self.client.get(url).send().await?.error_for_status()?;
                response.bytes().await
            }
            .await;

            match result {
                Ok(bytes) => return Ok(bytes.to_vec()),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(url = %url, attempt = attempt + 1, error = %e, "Download failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_manifest(&self, voice_id: &str) -> Result<Manifest> {
        let url = self.manifest_url(voice_id);
        let bytes = self.get_bytes(&url).await.map_err(|e| {
            if e.status() == Some(reqwest::StatusCode::NOT_FOUND) {
                Error::ModelNotFound {
                    voice_id: voice_id.to_string(),
                }
            } else {
                Error::Download {
                    voice_id: voice_id.to_string(),
                    reason: format!("manifest: {}", e),
                }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Download {
            voice_id: voice_id.to_string(),
            reason: format!("invalid manifest: {}", e),
        })
    }

    async fn download_file(&self, relative: &str, url: &str) -> std::result::Result<bool, String> {
        let relative_path = Path::new(relative);
        if relative_path.is_absolute()
            || relative_path
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(format!("refusing path outside storage root: {}", relative));
        }
        let local = self.root.join(relative_path);
        if is_file(&local).await {
            tracing::debug!(path = %relative, "Artifact exists, skipping");
            return Ok(false);
        }
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("{}: {}", relative, e))?;
        }

        let bytes = self
            .get_bytes(url)
            .await
            .map_err(|e| format!("{}: {}", relative, e))?;
        // Write then rename so a partial file is never taken for a complete one
        let partial = local.with_extension("part");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| format!("{}: {}", relative, e))?;
        tokio::fs::rename(&partial, &local)
            .await
            .map_err(|e| format!("{}: {}", relative, e))?;
        tracing::info!(path = %relative, bytes = bytes.len(), "Downloaded artifact");
        Ok(true)
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    match e.status() {
        Some(status) => status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
        None => true,
    }
}

#[async_trait::async_trait]
impl ArtifactDownloader for HttpArtifactDownloader {
    async fn download(&self, voice_id: &str) -> Result<()> {
        check_id("voice id", voice_id)?;
        let manifest = self.fetch_manifest(voice_id).await?;

        let downloads: Vec<_> = manifest
            .file_urls
            .iter()
            .map(|(path, url)| self.download_file(path, url))
            .collect();
        let results: Vec<std::result::Result<bool, String>> = stream::iter(downloads)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let downloaded = results.iter().filter(|r| matches!(r, Ok(true))).count();
        let failures: Vec<String> = results.into_iter().filter_map(|r| r.err()).collect();
        if !failures.is_empty() {
            for failure in &failures {
                tracing::error!(voice_id = %voice_id, error = %failure, "Artifact download failed");
            }
            return Err(Error::Download {
                voice_id: voice_id.to_string(),
                reason: failures.join("; "),
            });
        }

        let voice_dir = self.root.join(VOICES_DIR).join(voice_id);
        for file in REQUIRED_FILES {
            if !is_file(&voice_dir.join(file)).await {
                return Err(Error::Download {
                    voice_id: voice_id.to_string(),
                    reason: format!("manifest does not provide {}", file),
                });
            }
        }
        tokio::fs::create_dir_all(voice_dir.join(PRESETS_DIR)).await?;

        tracing::info!(voice_id = %voice_id, files = downloaded, "Voice artifacts ready");
        Ok(())
    }
}

/// Downloader for the configured endpoint, if any
pub fn create_downloader(config: &StorageConfig) -> Result<Option<Arc<dyn ArtifactDownloader>>> {
    match &config.download_endpoint {
        Some(endpoint) if !endpoint.trim().is_empty() => {
            Ok(Some(Arc::new(HttpArtifactDownloader::new(config, endpoint.as_str())?)))
        }
        _ => Ok(None),
    }
}
