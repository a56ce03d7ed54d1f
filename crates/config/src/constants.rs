//! Centralized constants for the synthesis pipeline
//!
//! Default values used across crates live here so the settings layer, the
//! front-end and the audio path agree on them.

/// Audio rates and analysis window
pub mod audio {
    /// Output PCM sample rate (Hz)
    pub const OUTPUT_SAMPLE_RATE: u32 = 32000;

    /// Silence appended after every synthesized chunk (seconds)
    pub const SILENCE_SECS: f32 = 0.3;

    /// Rate of the waveform fed to the acoustic embedder (Hz)
    pub const SSL_SAMPLE_RATE: u32 = 16000;

    /// Rate of the waveform used for the reference spectrogram (Hz)
    pub const SPEC_SAMPLE_RATE: u32 = 32000;

    /// Spectrogram FFT size
    pub const N_FFT: usize = 2048;

    /// Spectrogram hop length (samples)
    pub const HOP_LENGTH: usize = 640;

    /// Spectrogram window length (samples)
    pub const WIN_LENGTH: usize = 2048;

    /// Zero tail appended to the 16 kHz reference before embedding (seconds)
    pub const REFERENCE_TAIL_SECS: f32 = 0.3;
}

/// Text front-end defaults
pub mod text {
    /// Groups shorter than this many characters merge into the previous chunk
    pub const SPLIT_THRESHOLD: usize = 5;

    /// Number of delimiter-terminated segments per group
    pub const SPLIT_GROUP_SIZE: usize = 4;

    /// Width of per-phoneme linguistic feature vectors
    pub const FEATURE_DIM: usize = 1024;

    /// Chunks producing fewer phonemes are re-processed with a leading stop
    pub const MIN_PHONEMES: usize = 6;
}

/// Model cache defaults
pub mod cache {
    /// Used/total device memory ratio above which an entry is evicted
    pub const MEMORY_THRESHOLD: f64 = 0.9;
}

/// Autoregressive generation defaults
pub mod generation {
    pub const TOP_K: usize = 15;
    pub const TOP_P: f32 = 1.0;
    pub const TEMPERATURE: f32 = 1.0;

    /// Semantic tokens per second
    pub const TOKEN_RATE_HZ: u32 = 50;

    /// Maximum generated speech per chunk (seconds)
    pub const MAX_DURATION_SECS: u32 = 54;
}

/// Artifact storage layout and transfer defaults
pub mod storage {
    /// Environment variable holding the user data directory
    pub const USER_DATA_ENV: &str = "USER_DATA_PATH";

    pub const MODELS_DIR: &str = "pretrained_models";
    pub const VOICES_DIR: &str = "voices";
    pub const PRESETS_DIR: &str = "presets";

    pub const SEMANTIC_WEIGHTS_FILE: &str = "gpt.pth";
    pub const ACOUSTIC_WEIGHTS_FILE: &str = "sovits.pth";
    pub const MODEL_CONFIG_FILE: &str = "gptsovits.yaml";

    /// Files that must all exist for a voice to be loadable
    pub const REQUIRED_FILES: [&str; 3] =
        [SEMANTIC_WEIGHTS_FILE, ACOUSTIC_WEIGHTS_FILE, MODEL_CONFIG_FILE];

    pub const MAX_RETRIES: u32 = 3;
    pub const BACKOFF_MS: u64 = 500;
    pub const DOWNLOAD_CONCURRENCY: usize = 5;
    pub const HTTP_TIMEOUT_MS: u64 = 60_000;
}

/// Environment overrides
pub mod env {
    /// Prefix for settings overrides, e.g. `VOICE_SYNTH_CACHE__MEMORY_THRESHOLD`
    pub const PREFIX: &str = "VOICE_SYNTH";
    pub const SEPARATOR: &str = "__";
}
