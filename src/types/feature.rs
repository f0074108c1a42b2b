//! Feature identity and occurrence distributions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar date of an occurrence.
///
/// Dates are integral time units (usually years) as produced by the
/// corpus date index. Differences between dates are the raw gaps fed
/// to the burst automaton.
pub type Date = i64;

/// Identifier of a recurring feature (term, citation, author, ...).
///
/// Implements `Ord` so feature maps iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    /// Create a new feature identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Occurrence counts of a single feature, by date.
///
/// Entries are kept in the order the corpus reported them. The builder
/// rejects distributions whose dates decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceDistribution {
    entries: Vec<(Date, u64)>,
}

impl OccurrenceDistribution {
    /// Create a distribution from `(date, count)` pairs.
    pub fn new(entries: Vec<(Date, u64)>) -> Self {
        Self { entries }
    }

    /// All `(date, count)` pairs.
    pub fn entries(&self) -> &[(Date, u64)] {
        &self.entries
    }

    /// Total number of occurrences across all dates.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| *n).sum()
    }

    /// Whether the dates never decrease.
    pub fn is_ordered(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].0 <= w[1].0)
    }

    /// Earliest date with a non-zero count.
    pub fn first_occurrence(&self) -> Option<Date> {
        self.entries.iter().find(|(_, n)| *n > 0).map(|(d, _)| *d)
    }
}

impl FromIterator<(Date, u64)> for OccurrenceDistribution {
    fn from_iter<I: IntoIterator<Item = (Date, u64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
