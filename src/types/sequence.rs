//! Event gap sequences and decoded state sequences.

use serde::{Deserialize, Serialize};

use super::feature::Date;

/// Inter-arrival gaps of a feature's occurrences, aligned with the date
/// each gap ends on.
///
/// The first entry is always the padding gap anchored at the synthetic
/// time zero; genuine occurrences follow. Both vectors have the same
/// length and dates never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGapSequence {
    gaps: Vec<f64>,
    dates: Vec<Date>,
}

impl EventGapSequence {
    /// Start a sequence with a single padding gap at `time_zero`.
    pub(crate) fn padded(padding_gap: f64, time_zero: Date) -> Self {
        Self {
            gaps: vec![padding_gap],
            dates: vec![time_zero],
        }
    }

    /// Append one occurrence.
    pub(crate) fn push(&mut self, gap: f64, date: Date) {
        debug_assert!(self.dates.last().map_or(true, |last| *last <= date));
        self.gaps.push(gap);
        self.dates.push(date);
    }

    /// Multiply every gap by `factor`.
    pub(crate) fn scale(&mut self, factor: f64) {
        for gap in &mut self.gaps {
            *gap *= factor;
        }
    }

    /// Gap values, padding first.
    pub fn gaps(&self) -> &[f64] {
        &self.gaps
    }

    /// Date each gap ends on, padding date first.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Number of gaps including the padding entry.
    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    /// Always false for a constructed sequence; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Number of genuine occurrences (excludes the padding gap).
    pub fn occurrences(&self) -> usize {
        self.gaps.len().saturating_sub(1)
    }

    /// Sum of all gaps.
    pub fn total_elapsed(&self) -> f64 {
        self.gaps.iter().sum()
    }
}

/// Discrete burst states, one per element of an [`EventGapSequence`].
///
/// Every state lies in `[0, k-1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BurstStateSequence(Vec<usize>);

impl BurstStateSequence {
    pub(crate) fn new(states: Vec<usize>) -> Self {
        Self(states)
    }

    /// The decoded states.
    pub fn states(&self) -> &[usize] {
        &self.0
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no states.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest state reached, if any.
    pub fn peak(&self) -> Option<usize> {
        self.0.iter().copied().max()
    }
}
