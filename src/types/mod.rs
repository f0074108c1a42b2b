//! Core types for the burstness kernel.

pub mod feature;
pub mod sequence;
pub mod series;

pub use feature::{Date, FeatureId, OccurrenceDistribution};
pub use sequence::{EventGapSequence, BurstStateSequence};
pub use series::{BurstSeries, FeatureBurstMap, SigmaSeries, SigmaMap};
