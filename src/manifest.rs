//! Run manifest: a fingerprint of one burstness batch.
//!
//! Two batches over the same corpus with the same parameters produce the
//! same `result_hash`, whatever their worker counts. `run_id` and
//! `computed_at` identify the run itself and are not hashed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::burstness::SkippedFeature;
use crate::canonical::canonical_hash_hex;
use crate::policy::BurstnessConfig;
use crate::types::FeatureBurstMap;
use crate::BURSTNESS_SCHEMA_VERSION;

/// Fingerprint and summary of a burstness batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Unique identifier of this run.
    pub run_id: Uuid,
    /// When the batch finished.
    pub computed_at: DateTime<Utc>,
    /// Schema version of the result types.
    pub schema_version: String,
    /// Featureset the features came from.
    pub featureset: String,
    /// Hash of the automaton parameters.
    pub params_hash: String,
    /// Features requested after deduplication.
    pub requested_features: usize,
    /// Features with a burst series.
    pub decoded_features: usize,
    /// Features left out.
    pub skipped_features: usize,
    /// Configured degree of parallelism.
    pub worker_count: usize,
    /// Hash of the burst map and skipped list.
    pub result_hash: String,
}

impl RunManifest {
    /// Summarize a finished batch.
    pub fn new(
        featureset: &str,
        config: &BurstnessConfig,
        requested_features: usize,
        bursts: &FeatureBurstMap,
        skipped: &[SkippedFeature],
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            computed_at: Utc::now(),
            schema_version: BURSTNESS_SCHEMA_VERSION.to_string(),
            featureset: featureset.to_string(),
            params_hash: config.params.params_hash(),
            requested_features,
            decoded_features: bursts.len(),
            skipped_features: skipped.len(),
            worker_count: config.workers,
            result_hash: result_hash(bursts, skipped),
        }
    }

    /// Whether two runs produced identical results under identical
    /// parameters.
    pub fn same_result(&self, other: &RunManifest) -> bool {
        self.params_hash == other.params_hash && self.result_hash == other.result_hash
    }
}

/// Hash of a batch result.
pub fn result_hash(bursts: &FeatureBurstMap, skipped: &[SkippedFeature]) -> String {
    canonical_hash_hex(&(bursts, skipped))
}
