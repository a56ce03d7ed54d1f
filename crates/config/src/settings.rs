//! Runtime settings
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (see [`crate::constants`])
//! 2. An optional configuration file (TOML, YAML or JSON)
//! 3. Environment overrides, e.g. `VOICE_SYNTH_CACHE__MEMORY_THRESHOLD=0.8`

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use voice_synth_core::{GenerationParams, LanguageTag};

use crate::constants;

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioConfig,
    pub splitter: SplitterConfig,
    pub text: TextConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load defaults, then `path` (or `config/default.*` when absent), then
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let env = Environment::with_prefix(constants::env::PREFIX)
            .prefix_separator("_")
            .separator(constants::env::SEPARATOR)
            .try_parsing(true);
        Self::load_with(path, env)
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        builder = match path {
            Some(p) => builder.add_source(File::from(p).required(true)),
            None => builder.add_source(File::with_name("config/default").required(false)),
        };

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(
            storage_root = %settings.storage.root.display(),
            memory_threshold = settings.cache.memory_threshold,
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Reject values the pipeline cannot operate with
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field, reason: &str| {
            Err(SettingsError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        let threshold = self.cache.memory_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return invalid("cache.memory_threshold", "must be in (0, 1]");
        }
        if self.splitter.group_size == 0 {
            return invalid("splitter.group_size", "must be at least 1");
        }
        if self.audio.output_sample_rate == 0
            || self.audio.ssl_sample_rate == 0
            || self.audio.spec_sample_rate == 0
        {
            return invalid("audio", "sample rates must be positive");
        }
        if self.audio.silence_secs < 0.0 || self.audio.reference_tail_secs < 0.0 {
            return invalid("audio", "durations must not be negative");
        }
        if self.audio.hop_length == 0
            || self.audio.hop_length > self.audio.win_length
            || self.audio.win_length > self.audio.n_fft
        {
            return invalid("audio", "requires 0 < hop_length <= win_length <= n_fft");
        }
        if self.text.feature_dim == 0 {
            return invalid("text.feature_dim", "must be at least 1");
        }
        if self.storage.download_concurrency == 0 {
            return invalid("storage.download_concurrency", "must be at least 1");
        }
        if self.generation.top_k == 0 {
            return invalid("generation.top_k", "must be at least 1");
        }
        Ok(())
    }
}

// ============================================================================
// Audio
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
    #[serde(default = "default_silence_secs")]
    pub silence_secs: f32,
    #[serde(default = "default_ssl_sample_rate")]
    pub ssl_sample_rate: u32,
    #[serde(default = "default_spec_sample_rate")]
    pub spec_sample_rate: u32,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_win_length")]
    pub win_length: usize,
    #[serde(default = "default_reference_tail_secs")]
    pub reference_tail_secs: f32,
}

fn default_output_sample_rate() -> u32 {
    constants::audio::OUTPUT_SAMPLE_RATE
}
fn default_silence_secs() -> f32 {
    constants::audio::SILENCE_SECS
}
fn default_ssl_sample_rate() -> u32 {
    constants::audio::SSL_SAMPLE_RATE
}
fn default_spec_sample_rate() -> u32 {
    constants::audio::SPEC_SAMPLE_RATE
}
fn default_n_fft() -> usize {
    constants::audio::N_FFT
}
fn default_hop_length() -> usize {
    constants::audio::HOP_LENGTH
}
fn default_win_length() -> usize {
    constants::audio::WIN_LENGTH
}
fn default_reference_tail_secs() -> f32 {
    constants::audio::REFERENCE_TAIL_SECS
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: default_output_sample_rate(),
            silence_secs: default_silence_secs(),
            ssl_sample_rate: default_ssl_sample_rate(),
            spec_sample_rate: default_spec_sample_rate(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            win_length: default_win_length(),
            reference_tail_secs: default_reference_tail_secs(),
        }
    }
}

// ============================================================================
// Text front-end
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    #[serde(default = "default_split_threshold")]
    pub threshold: usize,
    #[serde(default = "default_split_group_size")]
    pub group_size: usize,
}

fn default_split_threshold() -> usize {
    constants::text::SPLIT_THRESHOLD
}
fn default_split_group_size() -> usize {
    constants::text::SPLIT_GROUP_SIZE
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            threshold: default_split_threshold(),
            group_size: default_split_group_size(),
        }
    }
}

/// What to do when a front-end emits a symbol outside the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPhonemePolicy {
    /// Log, count and map to the reserved UNK id
    #[default]
    Substitute,
    /// Fail the request
    Reject,
}

/// Which chunks receive the reference transcript as a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPolicy {
    #[default]
    FirstChunk,
    EveryChunk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    /// Directory holding pronunciation lexicons
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,
    /// Language for text with no identifiable script
    #[serde(default = "default_language")]
    pub default_language: LanguageTag,
    /// Read Chinese spans as Cantonese
    #[serde(default)]
    pub cantonese: bool,
    #[serde(default)]
    pub unknown_phoneme_policy: UnknownPhonemePolicy,
    #[serde(default)]
    pub prompt_policy: PromptPolicy,
    #[serde(default = "default_min_phonemes")]
    pub min_phonemes: usize,
}

fn default_resources_dir() -> PathBuf {
    PathBuf::from("resources")
}
fn default_feature_dim() -> usize {
    constants::text::FEATURE_DIM
}
fn default_language() -> LanguageTag {
    LanguageTag::Zh
}
fn default_min_phonemes() -> usize {
    constants::text::MIN_PHONEMES
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            resources_dir: default_resources_dir(),
            feature_dim: default_feature_dim(),
            default_language: default_language(),
            cantonese: false,
            unknown_phoneme_policy: UnknownPhonemePolicy::default(),
            prompt_policy: PromptPolicy::default(),
            min_phonemes: default_min_phonemes(),
        }
    }
}

// ============================================================================
// Model cache
// ============================================================================

/// How many entries to evict when memory pressure trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    /// Exactly one entry per miss
    #[default]
    Single,
    /// Keep evicting until usage drops below the threshold or the cache is empty
    UntilBelowThreshold,
}

/// Which entry counts as oldest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOrdering {
    /// Insertion order; hits do not refresh an entry
    #[default]
    Fifo,
    /// Hits move an entry to the back
    Lru,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,
    #[serde(default)]
    pub eviction: EvictionMode,
    #[serde(default)]
    pub ordering: CacheOrdering,
    /// Fetch missing artifacts on a cache miss
    #[serde(default = "default_true")]
    pub auto_download: bool,
    /// Reuse reference conditioning across requests
    #[serde(default = "default_true")]
    pub conditioning_cache: bool,
}

fn default_memory_threshold() -> f64 {
    constants::cache::MEMORY_THRESHOLD
}
fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_threshold: default_memory_threshold(),
            eviction: EvictionMode::default(),
            ordering: CacheOrdering::default(),
            auto_download: true,
            conditioning_cache: true,
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the artifact tree; voices live under `<root>/voices/<id>`
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Base URL of the remote artifact store
    #[serde(default)]
    pub download_endpoint: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

/// `$USER_DATA_PATH/pretrained_models`, relative when the variable is unset
pub fn default_storage_root() -> PathBuf {
    storage_root_from(std::env::var(constants::storage::USER_DATA_ENV).ok().as_deref())
}

fn storage_root_from(user_data: Option<&str>) -> PathBuf {
    match user_data {
        Some(dir) if !dir.is_empty() => Path::new(dir).join(constants::storage::MODELS_DIR),
        _ => PathBuf::from(constants::storage::MODELS_DIR),
    }
}

fn default_max_retries() -> u32 {
    constants::storage::MAX_RETRIES
}
fn default_backoff_ms() -> u64 {
    constants::storage::BACKOFF_MS
}
fn default_download_concurrency() -> usize {
    constants::storage::DOWNLOAD_CONCURRENCY
}
fn default_http_timeout_ms() -> u64 {
    constants::storage::HTTP_TIMEOUT_MS
}

impl StorageConfig {
    pub fn voices_dir(&self) -> PathBuf {
        self.root.join(constants::storage::VOICES_DIR)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            download_endpoint: None,
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            download_concurrency: default_download_concurrency(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

// ============================================================================
// Generation and inference
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_token_rate_hz")]
    pub token_rate_hz: u32,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,
    /// Fixed seed for reproducible output
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_top_k() -> usize {
    constants::generation::TOP_K
}
fn default_top_p() -> f32 {
    constants::generation::TOP_P
}
fn default_temperature() -> f32 {
    constants::generation::TEMPERATURE
}
fn default_token_rate_hz() -> u32 {
    constants::generation::TOKEN_RATE_HZ
}
fn default_max_duration_secs() -> u32 {
    constants::generation::MAX_DURATION_SECS
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            top_p: default_top_p(),
            temperature: default_temperature(),
            token_rate_hz: default_token_rate_hz(),
            max_duration_secs: default_max_duration_secs(),
            seed: None,
        }
    }
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(cfg: &GenerationConfig) -> Self {
        GenerationParams {
            top_k: cfg.top_k,
            top_p: cfg.top_p,
            temperature: cfg.temperature,
            token_rate_hz: cfg.token_rate_hz,
            max_duration_secs: cfg.max_duration_secs,
            seed: cfg.seed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Per-request deadline, checked between chunks
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl InferenceConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env() -> Environment {
        Environment::with_prefix("VOICE_SYNTH_TEST_UNUSED").source(Some(Default::default()))
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.audio.output_sample_rate, 32000);
        assert_eq!(s.audio.hop_length, 640);
        assert_eq!(s.splitter.threshold, 5);
        assert_eq!(s.splitter.group_size, 4);
        assert_eq!(s.text.feature_dim, 1024);
        assert_eq!(s.text.default_language, LanguageTag::Zh);
        assert_eq!(s.cache.eviction, EvictionMode::Single);
        assert_eq!(s.cache.ordering, CacheOrdering::Fifo);
        assert!((s.cache.memory_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(s.storage.max_retries, 3);
        assert_eq!(s.storage.download_concurrency, 5);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_storage_root_from_user_data() {
        assert_eq!(
            storage_root_from(Some("/data/user")),
            PathBuf::from("/data/user/pretrained_models")
        );
        assert_eq!(storage_root_from(Some("")), PathBuf::from("pretrained_models"));
        assert_eq!(storage_root_from(None), PathBuf::from("pretrained_models"));
    }

    #[test]
    fn test_load_without_file() {
        let s = Settings::load_with(None, no_env()).unwrap();
        assert_eq!(s.generation.top_k, 15);
        assert_eq!(s.generation.token_rate_hz, 50);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cache]
memory_threshold = 0.75
eviction = "until_below_threshold"
ordering = "lru"

[text]
cantonese = true
prompt_policy = "every_chunk"
"#
        )
        .unwrap();

        let s = Settings::load_with(Some(file.path()), no_env()).unwrap();
        assert!((s.cache.memory_threshold - 0.75).abs() < 1e-9);
        assert_eq!(s.cache.eviction, EvictionMode::UntilBelowThreshold);
        assert_eq!(s.cache.ordering, CacheOrdering::Lru);
        assert!(s.text.cantonese);
        assert_eq!(s.text.prompt_policy, PromptPolicy::EveryChunk);
        // Untouched sections keep defaults
        assert_eq!(s.splitter.threshold, 5);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut vars = std::collections::HashMap::new();
        vars.insert("VOICE_SYNTH_SPLITTER__THRESHOLD".to_string(), "8".to_string());
        vars.insert("VOICE_SYNTH_TEXT__DEFAULT_LANGUAGE".to_string(), "en".to_string());
        let env = Environment::with_prefix("VOICE_SYNTH")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(vars));

        let s = Settings::load_with(None, env).unwrap();
        assert_eq!(s.splitter.threshold, 8);
        assert_eq!(s.text.default_language, LanguageTag::En);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = Settings::load_with(Some(Path::new("/nonexistent/settings.toml")), no_env());
        assert!(matches!(result, Err(SettingsError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut s = Settings::default();
        s.cache.memory_threshold = 1.5;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { field: "cache.memory_threshold", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut s = Settings::default();
        s.audio.hop_length = 4096;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_generation_params_conversion() {
        let cfg = GenerationConfig {
            seed: Some(7),
            ..Default::default()
        };
        let params = GenerationParams::from(&cfg);
        assert_eq!(params.seed, Some(7));
        assert_eq!(params.early_stop_tokens(), 2700);
    }
}
