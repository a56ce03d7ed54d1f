//! Logging and metrics setup

use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voice_synth_config::LoggingConfig;
use voice_synth_core::{Error, Result};

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. Calling this again once a
/// subscriber is installed is a no-op.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (json, plain) = if config.json {
        (Some(fmt::layer().json().with_current_span(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
    }
}

/// Register descriptions for every metric the pipeline emits
pub fn describe_metrics() {
    describe_counter!(
        "tts_requests_total",
        Unit::Count,
        "Synthesis requests by outcome"
    );
    describe_counter!(
        "tts_chunks_synthesized_total",
        Unit::Count,
        "Text chunks passed through the model"
    );
    describe_counter!(
        "tts_unknown_phonemes_total",
        Unit::Count,
        "Phonemes replaced by the unknown symbol, by language"
    );
    describe_counter!("tts_model_cache_hits_total", Unit::Count, "Model cache hits");
    describe_counter!("tts_model_cache_misses_total", Unit::Count, "Model cache misses");
    describe_counter!(
        "tts_model_cache_evictions_total",
        Unit::Count,
        "Models evicted under memory pressure or on request"
    );
    describe_gauge!("tts_model_cache_size", Unit::Count, "Resident voice models");
}

/// Install a Prometheus recorder and describe the pipeline metrics
///
/// The returned handle renders the text exposition format; serving it is
/// left to the embedding application.
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Internal(format!("failed to install metrics recorder: {}", e)))?;
    describe_metrics();
    Ok(handle)
}
