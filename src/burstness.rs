//! Per-feature burstness pipeline: builder → decoder → aggregator.
//!
//! A feature that cannot be decoded is reported as a [`FeatureFailure`]
//! and left out of the result map. No score is ever fabricated for it.

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, warn};

use crate::aggregate::aggregate;
use crate::decoder::{BurstDecoder, DecodeError};
use crate::policy::{BurstParams, ParamsError};
use crate::sequence::{build_gap_sequence, SequenceError};
use crate::types::{BurstSeries, Date, FeatureId, OccurrenceDistribution};

/// Why a feature has no burst series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureFailure {
    /// No occurrences, or no elapsed time to derive a base rate from.
    #[error("Degenerate sequence: {detail}")]
    DegenerateSequence {
        /// Details of the degenerate input.
        detail: String,
    },
    /// Every state became infinite-cost at time index `t`.
    #[error("Decode failure at t={t}")]
    DecodeFailure {
        /// First time index without a finite-cost state.
        t: usize,
    },
    /// The collaborator handed over a malformed distribution.
    #[error("Invalid distribution: {detail}")]
    InvalidDistribution {
        /// What was wrong with it.
        detail: String,
    },
}

impl From<SequenceError> for FeatureFailure {
    fn from(e: SequenceError) -> Self {
        match e {
            SequenceError::DegenerateSequence => Self::DegenerateSequence {
                detail: e.to_string(),
            },
            SequenceError::UnorderedDates | SequenceError::PrecedesTimeZero { .. } => {
                Self::InvalidDistribution {
                    detail: e.to_string(),
                }
            }
        }
    }
}

impl From<DecodeError> for FeatureFailure {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::DegenerateSequence { .. } => Self::DegenerateSequence {
                detail: e.to_string(),
            },
            DecodeError::DecodeFailure { t } => Self::DecodeFailure { t },
        }
    }
}

/// A feature left out of a batch result, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFeature {
    /// The feature.
    pub feature: FeatureId,
    /// Why it has no series.
    pub reason: FeatureFailure,
}

/// Builder, decoder and aggregator bound to one parameter set and one
/// synthetic time zero.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    decoder: BurstDecoder,
    time_zero: Date,
}

impl FeaturePipeline {
    /// Create a pipeline, rejecting invalid parameters.
    pub fn new(params: &BurstParams, time_zero: Date) -> Result<Self, ParamsError> {
        Ok(Self {
            decoder: BurstDecoder::new(params)?,
            time_zero,
        })
    }

    /// Synthetic time zero gaps are measured from.
    pub fn time_zero(&self) -> Date {
        self.time_zero
    }

    /// Compute the burst series of one feature.
    pub fn run(
        &self,
        feature: &FeatureId,
        distribution: &OccurrenceDistribution,
    ) -> Result<BurstSeries, FeatureFailure> {
        let span = debug_span!("feature", feature = %feature);
        let _enter = span.enter();

        let result = self.decode(distribution);
        match &result {
            Ok(series) => debug!(dates = series.len(), peak = ?series.peak(), "decoded feature"),
            Err(reason) => warn!(feature = %feature, %reason, "skipping feature"),
        }
        result
    }

    fn decode(&self, distribution: &OccurrenceDistribution) -> Result<BurstSeries, FeatureFailure> {
        let sequence = build_gap_sequence(distribution, self.time_zero)?;
        let states = self.decoder.decode(sequence.gaps())?;
        let params = self.decoder.params();
        Ok(aggregate(&states, sequence.dates(), params.k, params.normalize))
    }
}

/// Compute the burst series of a single feature.
pub fn feature_burstness(
    feature: &FeatureId,
    distribution: &OccurrenceDistribution,
    time_zero: Date,
    params: &BurstParams,
) -> Result<Result<BurstSeries, FeatureFailure>, ParamsError> {
    Ok(FeaturePipeline::new(params, time_zero)?.run(feature, distribution))
}
