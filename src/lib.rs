//! # burstness-kernel
//!
//! Burst detection over feature timelines, with sigma scoring for
//! time-sliced graphs.
//!
//! Given, for each feature of a corpus, how often it occurs on each date,
//! the kernel decodes a discrete burst intensity over time with a
//! two-cost hidden-state automaton, fans the work out over a worker pool
//! for large feature sets, and combines burst intensity with betweenness
//! centrality into a per-node, per-slice sigma score.
//!
//! ## Architecture
//!
//! ```text
//! FeatureCorpus → build_gap_sequence → BurstDecoder → aggregate → BurstSeries
//!                 └──────────── FeaturePipeline (per feature) ───────────┘
//!                                        ↓  FanOut (W workers)
//!                                 FeatureBurstMap + RunManifest
//!                                        ↓
//!                  GraphCollection → sigma → SigmaSeries
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same distributions + same parameters → identical burst series,
//!   whatever the worker count
//! - Ties between states resolve to the lowest state
//! - Result maps are ordered by feature id, series by date
//!
//! ## Failure isolation
//!
//! A feature that cannot be decoded is reported in
//! [`BurstnessRun::skipped`] with a [`FeatureFailure`] and never aborts the
//! batch. Invalid parameters and lost partitions are fatal.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod store;
pub mod sequence;
pub mod decoder;
pub mod aggregate;
pub mod burstness;
pub mod fanout;
pub mod sigma;
pub mod manifest;
pub mod canonical;

// Re-exports
pub use types::{
    BurstSeries, BurstStateSequence, Date, EventGapSequence, FeatureBurstMap, FeatureId,
    OccurrenceDistribution, SigmaMap, SigmaSeries,
};
pub use policy::{
    BurstParams, BurstnessConfig, FeatureSelection, ParamsError, StateExtraction, TopN,
    DEFAULT_GAMMA, DEFAULT_SCALE, DEFAULT_STATE_COUNT, DEFAULT_TOP_N, DEFAULT_WORKERS,
};
pub use store::{
    FeatureCorpus, GraphCollection, InMemoryCorpus, InMemoryError, InMemoryGraphCollection,
    NodeIndex, RankedFeatures,
};
pub use sequence::{build_gap_sequence, time_zero, SequenceError, GAP_SCALE, PADDING_GAP};
pub use decoder::{BurstDecoder, DecodeError, NumericDomainFailure};
pub use aggregate::aggregate;
pub use burstness::{feature_burstness, FeatureFailure, FeaturePipeline, SkippedFeature};
pub use fanout::{burstness, partition, BurstnessError, BurstnessRun, FanOut, WorkPackage, WorkerOutput};
pub use sigma::{sigma, sigma_value, SigmaError, SIGMA_ATTRIBUTE};
pub use manifest::RunManifest;
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

/// Schema version of the result types.
/// Increment on breaking changes to any serialized type.
pub const BURSTNESS_SCHEMA_VERSION: &str = "1.0.0";
