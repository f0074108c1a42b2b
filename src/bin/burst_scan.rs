//! Burst scan binary
//!
//! Decodes burst series for every feature of a JSON corpus and prints the
//! run result as JSON on stdout. Logs go to stderr.
//!
//! ## Input
//!
//! ```json
//! { "featureset": "terms", "features": { "process": [[2000, 1], [2001, 5]] } }
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `BURST_K`: Number of burst states (default: 5)
//! - `BURST_S`: Rate scaling factor, > 1 (default: 1.1)
//! - `BURST_GAMMA`: Upward transition cost weight (default: 1.0)
//! - `BURST_NORMALIZE`: Divide scores by k; accepts true/false, 1/0, yes/no, on/off (default: true)
//! - `BURST_EXTRACTION`: "column_argmin" or "viterbi" (default: column_argmin)
//! - `BURST_WORKERS`: Worker threads (default: 5)
//! - `BURST_TOP_N`: Decode only the N highest-count features (default: all)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! BURST_S=2.0 cargo run --bin burst_scan -- corpus.json > bursts.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use burstness_kernel::{
    burstness, BurstParams, BurstnessConfig, FeatureId, FeatureSelection, InMemoryCorpus,
    OccurrenceDistribution, StateExtraction, TopN, DEFAULT_GAMMA, DEFAULT_SCALE,
    DEFAULT_STATE_COUNT, DEFAULT_WORKERS,
};

type BoxError = Box<dyn std::error::Error>;

/// Corpus file layout.
#[derive(Debug, Deserialize)]
struct CorpusFile {
    featureset: String,
    features: BTreeMap<FeatureId, OccurrenceDistribution>,
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "burst_scan=info,burstness_kernel=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> Result<T, BoxError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{name}={raw:?}: {e}").into()),
        Err(_) => Ok(default),
    }
}

/// Boolean switch as written in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flag(bool);

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" => Ok(Self(false)),
            other => Err(format!(
                "expected one of true/false, 1/0, yes/no, on/off, got {other:?}"
            )),
        }
    }
}

fn config_from_env(features: Vec<FeatureId>) -> Result<BurstnessConfig, BoxError> {
    let params = BurstParams::new(
        env_or("BURST_K", DEFAULT_STATE_COUNT)?,
        env_or("BURST_S", DEFAULT_SCALE)?,
        env_or("BURST_GAMMA", DEFAULT_GAMMA)?,
        env_or("BURST_NORMALIZE", Flag(true))?.0,
    )
    .with_extraction(env_or("BURST_EXTRACTION", StateExtraction::default())?);

    let selection = match std::env::var("BURST_TOP_N") {
        Ok(_) => FeatureSelection::Top {
            topn: TopN::Count(env_or("BURST_TOP_N", 0usize)?),
            perslice: false,
        },
        Err(_) => FeatureSelection::Explicit(features),
    };

    Ok(BurstnessConfig {
        params,
        workers: env_or("BURST_WORKERS", DEFAULT_WORKERS)?,
        selection,
    })
}

fn main() -> Result<(), BoxError> {
    init_tracing();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: burst_scan <corpus.json>")?;

    info!(version = env!("CARGO_PKG_VERSION"), path = %path, "Starting burst scan");

    let file: CorpusFile = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let features: Vec<FeatureId> = file.features.keys().cloned().collect();

    let mut corpus = InMemoryCorpus::new();
    for (feature, distribution) in file.features {
        corpus.add_feature(&file.featureset, feature, distribution);
    }

    let config = config_from_env(features)?;
    config.validate()?;
    info!(
        k = config.params.k,
        s = config.params.s,
        gamma = config.params.gamma,
        extraction = %config.params.extraction,
        workers = config.workers,
        "Configuration loaded"
    );

    let run = burstness(&corpus, &file.featureset, &config)?;
    println!("{}", serde_json::to_string_pretty(&run)?);

    info!(
        run_id = %run.manifest.run_id,
        decoded = run.manifest.decoded_features,
        skipped = run.manifest.skipped_features,
        "Burst scan complete"
    );
    Ok(())
}
