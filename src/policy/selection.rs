//! Feature selection and batch configuration.

use serde::{Deserialize, Serialize};

use super::params::{BurstParams, ParamsError};
use crate::types::FeatureId;

/// Default number of top features when no explicit list is given.
pub const DEFAULT_TOP_N: usize = 20;
/// Default worker count.
pub const DEFAULT_WORKERS: usize = 5;

/// How many top features to take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopN {
    /// A fixed number of features.
    Count(usize),
    /// A fraction in (0, 1] of all features in the featureset.
    Fraction(f64),
}

impl TopN {
    /// Resolve to a count given the number of available features.
    pub fn resolve(&self, available: usize) -> usize {
        match *self {
            Self::Count(n) => n.min(available),
            Self::Fraction(f) => ((f * available as f64).ceil() as usize).min(available),
        }
    }
}

impl Default for TopN {
    fn default() -> Self {
        Self::Count(DEFAULT_TOP_N)
    }
}

/// Which features a batch decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    /// An explicit list. Duplicates are dropped, first occurrence wins.
    Explicit(Vec<FeatureId>),
    /// The highest-count features reported by the corpus.
    Top {
        /// How many features to take.
        topn: TopN,
        /// Take `topn` per date slice instead of overall.
        perslice: bool,
    },
}

impl FeatureSelection {
    /// Select an explicit feature list.
    pub fn explicit<I, F>(features: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FeatureId>,
    {
        Self::Explicit(features.into_iter().map(Into::into).collect())
    }
}

impl Default for FeatureSelection {
    fn default() -> Self {
        Self::Top {
            topn: TopN::default(),
            perslice: false,
        }
    }
}

/// Configuration of one burstness batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstnessConfig {
    /// Automaton parameters shared by every feature.
    pub params: BurstParams,
    /// Degree of parallelism. `1` runs sequentially on the calling thread.
    pub workers: usize,
    /// Features to decode.
    pub selection: FeatureSelection,
}

impl BurstnessConfig {
    /// Configuration for an explicit feature list with default parameters.
    pub fn for_features<I, F>(features: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FeatureId>,
    {
        Self {
            selection: FeatureSelection::explicit(features),
            ..Self::default()
        }
    }

    /// Replace the automaton parameters.
    pub fn with_params(mut self, params: BurstParams) -> Self {
        self.params = params;
        self
    }

    /// Replace the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Check the whole configuration.
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.params.validate()?;
        if self.workers < 1 {
            return Err(ParamsError::InvalidWorkers(self.workers));
        }
        if let FeatureSelection::Top { topn: TopN::Fraction(f), .. } = self.selection {
            if !(f > 0.0 && f <= 1.0) {
                return Err(ParamsError::InvalidTopN(f));
            }
        }
        Ok(())
    }
}

impl Default for BurstnessConfig {
    fn default() -> Self {
        Self {
            params: BurstParams::default(),
            workers: DEFAULT_WORKERS,
            selection: FeatureSelection::default(),
        }
    }
}
