//! Burstness aggregation: bins decoded states by date.

use std::collections::BTreeMap;

use crate::types::{BurstSeries, BurstStateSequence, Date};

/// Bin states by date, average each bin and optionally normalize.
///
/// Several occurrences on the same date collapse to their arithmetic mean
/// state. With `normalize`, the mean is divided by `k` (not `k - 1`), so
/// scores stay below `1.0` even at the top state. The earliest date is the
/// padding entry at time zero and is always dropped.
pub fn aggregate(
    states: &BurstStateSequence,
    dates: &[Date],
    k: usize,
    normalize: bool,
) -> BurstSeries {
    debug_assert_eq!(states.len(), dates.len());

    let mut bins: BTreeMap<Date, (usize, usize)> = BTreeMap::new();
    for (&date, &state) in dates.iter().zip(states.states()) {
        let bin = bins.entry(date).or_insert((0, 0));
        bin.0 += state;
        bin.1 += 1;
    }
    bins.pop_first();

    let divisor = if normalize { k as f64 } else { 1.0 };
    let scores = bins
        .into_iter()
        .map(|(date, (sum, count))| (date, sum as f64 / count as f64 / divisor))
        .collect();

    BurstSeries::from_map(scores)
}
