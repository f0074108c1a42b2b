//! Event-sequence builder.
//!
//! Turns a feature's `(date, count)` distribution into the inter-arrival
//! gap sequence consumed by the decoder.
//!
//! ## Algorithm
//!
//! 1. Start with a padding gap of `1.0` at the synthetic time zero
//! 2. For each date with `count > 0`, relative to the previous date:
//!    - `count == 1`: one gap of `date - previous`
//!    - `count > 1`, date contiguous with previous: `count` gaps of `1/count`
//!    - `count > 1`, otherwise: one gap of `date - previous`, then
//!      `count - 1` gaps of `1/(count - 1)`
//! 3. Skip zero-count dates
//! 4. Scale every gap by [`GAP_SCALE`]
//!
//! Sub-unit gaps model several occurrences within one date as evenly
//! spaced across it.

use tracing::trace;

use crate::types::{Date, EventGapSequence, OccurrenceDistribution};

/// Factor applied to every gap before decoding.
pub const GAP_SCALE: f64 = 100.0;

/// Gap assigned to the padding entry at time zero (before scaling).
pub const PADDING_GAP: f64 = 1.0;

/// Error type for sequence construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    /// The feature has no genuine occurrence.
    #[error("Degenerate sequence: no occurrences after time zero")]
    DegenerateSequence,
    /// The distribution's dates decrease somewhere.
    #[error("Distribution dates are not ordered")]
    UnorderedDates,
    /// An occurrence is dated at or before the synthetic time zero.
    #[error("Occurrence at {date} does not follow time zero {time_zero}")]
    PrecedesTimeZero {
        /// Offending date.
        date: Date,
        /// Synthetic time zero of the batch.
        time_zero: Date,
    },
}

/// Synthetic time zero for a corpus whose earliest date is `min_date`.
pub fn time_zero(min_date: Date) -> Date {
    min_date - 1
}

/// Build the scaled gap sequence for one feature.
pub fn build_gap_sequence(
    distribution: &OccurrenceDistribution,
    time_zero: Date,
) -> Result<EventGapSequence, SequenceError> {
    if !distribution.is_ordered() {
        return Err(SequenceError::UnorderedDates);
    }

    let mut seq = EventGapSequence::padded(PADDING_GAP, time_zero);
    let mut previous = time_zero;

    for &(date, count) in distribution.entries() {
        if count == 0 {
            continue;
        }
        if date <= time_zero {
            return Err(SequenceError::PrecedesTimeZero { date, time_zero });
        }

        let elapsed = (date - previous) as f64;
        if count == 1 {
            seq.push(elapsed, date);
        } else if date == previous + 1 {
            let fraction = 1.0 / count as f64;
            for _ in 0..count {
                seq.push(fraction, date);
            }
        } else {
            seq.push(elapsed, date);
            let fraction = 1.0 / (count - 1) as f64;
            for _ in 1..count {
                seq.push(fraction, date);
            }
        }
        previous = date;
    }

    if seq.occurrences() == 0 {
        return Err(SequenceError::DegenerateSequence);
    }

    seq.scale(GAP_SCALE);
    trace!(events = seq.len(), elapsed = seq.total_elapsed(), "built gap sequence");
    Ok(seq)
}
