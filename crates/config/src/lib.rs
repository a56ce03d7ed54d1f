//! Configuration for the speech synthesis pipeline
//!
//! - [`constants`]: single source of truth for default values
//! - [`settings`]: layered runtime settings (defaults, file, environment)

pub mod constants;
pub mod settings;

pub use settings::{
    AudioConfig, CacheConfig, CacheOrdering, EvictionMode, GenerationConfig, InferenceConfig,
    LoggingConfig, PromptPolicy, Settings, SettingsError, SplitterConfig, StorageConfig,
    TextConfig, UnknownPhonemePolicy,
};
