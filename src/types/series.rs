//! Per-feature result series: burst scores and sigma values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::feature::{Date, FeatureId};

/// Burst score per date for one feature.
///
/// Dates are unique and ascending. Scores lie in `[0, (k-1)/k]` when
/// normalized, else in `[0, k-1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstSeries {
    /// Dates with at least one genuine occurrence, ascending.
    pub dates: Vec<Date>,
    /// Score per date (aligned with `dates`).
    pub scores: Vec<f64>,
}

impl BurstSeries {
    /// Build a series from a date-ordered map.
    pub fn from_map(map: BTreeMap<Date, f64>) -> Self {
        let (dates, scores) = map.into_iter().unzip();
        Self { dates, scores }
    }

    /// Score for a date, if the feature occurs on it.
    pub fn get(&self, date: Date) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.scores[idx])
    }

    /// Iterate `(date, score)` pairs in date order.
    pub fn iter(&self) -> impl Iterator<Item = (Date, f64)> + '_ {
        self.dates.iter().copied().zip(self.scores.iter().copied())
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series has no dates.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Highest score in the series.
    pub fn peak(&self) -> Option<f64> {
        self.scores.iter().copied().reduce(f64::max)
    }
}

/// Burst series keyed by feature.
///
/// Backed by a `BTreeMap` so iteration and serialization are deterministic
/// regardless of the order in which worker results were merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureBurstMap {
    series: BTreeMap<FeatureId, BurstSeries>,
}

impl FeatureBurstMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series, returning the previous one for the same feature.
    pub fn insert(&mut self, feature: FeatureId, series: BurstSeries) -> Option<BurstSeries> {
        self.series.insert(feature, series)
    }

    /// Merge a disjoint partial map into this one.
    ///
    /// Returns the first feature present in both maps; on error `self`
    /// still holds every entry merged before the collision.
    pub fn union(&mut self, other: FeatureBurstMap) -> Result<(), FeatureId> {
        for (feature, series) in other.series {
            if self.series.contains_key(&feature) {
                return Err(feature);
            }
            self.series.insert(feature, series);
        }
        Ok(())
    }

    /// Series for a feature.
    pub fn get(&self, feature: &FeatureId) -> Option<&BurstSeries> {
        self.series.get(feature)
    }

    /// Whether a series exists for the feature.
    pub fn contains(&self, feature: &FeatureId) -> bool {
        self.series.contains_key(feature)
    }

    /// Iterate features and their series in feature order.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureId, &BurstSeries)> {
        self.series.iter()
    }

    /// Features in order.
    pub fn features(&self) -> impl Iterator<Item = &FeatureId> {
        self.series.keys()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<(FeatureId, BurstSeries)> for FeatureBurstMap {
    fn from_iter<I: IntoIterator<Item = (FeatureId, BurstSeries)>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureBurstMap {
    type Item = (FeatureId, BurstSeries);
    type IntoIter = std::collections::btree_map::IntoIter<FeatureId, BurstSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.into_iter()
    }
}

/// Sigma value per time slice for one feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigmaSeries {
    /// Slice keys where the feature's node carried a sigma value, ascending.
    pub dates: Vec<Date>,
    /// Sigma per slice key (aligned with `dates`).
    pub values: Vec<f64>,
}

impl SigmaSeries {
    /// Build a series from a slice-ordered history.
    pub fn from_history(history: BTreeMap<Date, f64>) -> Self {
        let (dates, values) = history.into_iter().unzip();
        Self { dates, values }
    }

    /// Sigma for a slice key.
    pub fn get(&self, date: Date) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Number of slices with a value.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no slice carried a value.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Sigma series keyed by feature.
pub type SigmaMap = BTreeMap<FeatureId, SigmaSeries>;
