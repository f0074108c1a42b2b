//! Burst state decoder.
//!
//! Dynamic program over a `k × T` cost table for the rate-based burst
//! automaton (Kleinberg, 2002).
//!
//! ## Model
//!
//! - State `j` emits gaps at rate `alpha(j) = (n/T)·s^j`
//! - Emission cost of gap `x` in state `j`: `-ln(alpha(j)·e^(-alpha(j)·x))`
//! - Climbing from `l` to `j > l` costs `(j-l)·gamma·ln(n)`; staying or
//!   falling is free
//! - `C(0,0) = 0`, `C(j>0,0) = ∞`,
//!   `C(j,t) = emission(j, x_t) + min_l [C(l,t-1) + tau(l,j)]`
//!
//! ## Numerics
//!
//! Costs are evaluated in the log domain: the emission cost is computed as
//! `alpha·x - ln(alpha)` with `ln(alpha) = ln(n/T) + j·ln(s)`. The
//! exponential density is never materialized, so it cannot underflow to
//! zero however far apart the state rates are. A cell whose cost is
//! undefined (non-finite rate, invalid gap) is logged and set to infinite
//! cost; the rest of the table is still computed.

use tracing::warn;

use crate::policy::{BurstParams, ParamsError, StateExtraction};
use crate::types::BurstStateSequence;

/// Error type for decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The sequence is empty or spans no time, so `n/T` is undefined.
    #[error("Degenerate sequence: {events} events over elapsed time {elapsed}")]
    DegenerateSequence {
        /// Number of gaps.
        events: usize,
        /// Sum of gaps.
        elapsed: f64,
    },
    /// Every state has infinite cost at time index `t`.
    #[error("No state with finite cost at t={t}")]
    DecodeFailure {
        /// First time index without a finite-cost state.
        t: usize,
    },
}

/// A single cost-table cell that could not be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericDomainFailure {
    /// State index of the cell.
    pub state: usize,
    /// Time index of the cell.
    pub t: usize,
    /// What went wrong.
    pub reason: &'static str,
}

impl std::fmt::Display for NumericDomainFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cost undefined at state {} t {}: {}", self.state, self.t, self.reason)
    }
}

/// Decoder for one set of automaton parameters.
///
/// Construction validates the parameters, so decoding only fails on the
/// sequence itself.
#[derive(Debug, Clone)]
pub struct BurstDecoder {
    params: BurstParams,
}

impl BurstDecoder {
    /// Create a decoder, rejecting invalid parameters.
    pub fn new(params: &BurstParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
        })
    }

    /// The parameters this decoder runs with.
    pub fn params(&self) -> &BurstParams {
        &self.params
    }

    /// Decode the burst state of every gap.
    ///
    /// `gaps` is the full sequence including the padding entry. Calling
    /// twice with the same gaps yields identical states.
    pub fn decode(&self, gaps: &[f64]) -> Result<BurstStateSequence, DecodeError> {
        let table = CostTable::forward(gaps, &self.params)?;
        let states = match self.params.extraction {
            StateExtraction::ColumnArgmin => table.column_argmin()?,
            StateExtraction::Viterbi => table.backtrace()?,
        };
        Ok(BurstStateSequence::new(states))
    }
}

/// Accumulated costs, stored column by column (`cells[t * k + j]`).
///
/// Owned by one decode call and dropped once states are extracted.
struct CostTable {
    k: usize,
    len: usize,
    cells: Vec<f64>,
    /// Cheapest predecessor per cell; only kept for Viterbi extraction.
    parents: Option<Vec<usize>>,
    numeric_failures: usize,
}

impl CostTable {
    fn forward(gaps: &[f64], params: &BurstParams) -> Result<Self, DecodeError> {
        let n = gaps.len();
        let elapsed: f64 = gaps.iter().sum();
        if n == 0 || !elapsed.is_finite() || elapsed <= 0.0 {
            return Err(DecodeError::DegenerateSequence { events: n, elapsed });
        }

        let k = params.k;
        let ln_n = (n as f64).ln();
        let ln_base_rate = ln_n - elapsed.ln();
        let ln_s = params.s.ln();
        let log_alpha: Vec<f64> = (0..k).map(|j| ln_base_rate + j as f64 * ln_s).collect();
        let climb = params.gamma * ln_n;
        let tau = |from: usize, to: usize| -> f64 {
            if to > from {
                (to - from) as f64 * climb
            } else {
                0.0
            }
        };

        let mut table = Self {
            k,
            len: n,
            cells: vec![f64::INFINITY; k * n],
            parents: matches!(params.extraction, StateExtraction::Viterbi).then(|| vec![0; k * n]),
            numeric_failures: 0,
        };
        table.cells[0] = 0.0;

        for t in 1..n {
            let (prev, current) = table.cells.split_at_mut(t * k);
            let prev = &prev[(t - 1) * k..];
            let current = &mut current[..k];

            for j in 0..k {
                let (from, carried) = cheapest_predecessor(prev, j, &tau);
                if let Some(parents) = table.parents.as_mut() {
                    parents[t * k + j] = from;
                }

                current[j] = match emission_cost(log_alpha[j], gaps[t]) {
                    Ok(emission) => emission + carried,
                    Err(reason) => {
                        let failure = NumericDomainFailure { state: j, t, reason };
                        warn!(state = j, t, reason, "{failure}; using infinite cost");
                        table.numeric_failures += 1;
                        f64::INFINITY
                    }
                };
            }
        }

        Ok(table)
    }

    fn column(&self, t: usize) -> &[f64] {
        &self.cells[t * self.k..(t + 1) * self.k]
    }

    /// Cheapest state of every column, ties to the lowest state.
    fn column_argmin(&self) -> Result<Vec<usize>, DecodeError> {
        (0..self.len)
            .map(|t| {
                argmin_finite(self.column(t)).ok_or_else(|| self.failure_at(t))
            })
            .collect()
    }

    /// Cheapest complete path, recovered from parent pointers.
    fn backtrace(&self) -> Result<Vec<usize>, DecodeError> {
        let last = self.len - 1;
        let mut state = argmin_finite(self.column(last)).ok_or_else(|| self.failure_at(last))?;
        let parents = match self.parents.as_ref() {
            Some(parents) => parents,
            None => return self.column_argmin(),
        };

        let mut states = vec![0; self.len];
        states[last] = state;
        for t in (1..self.len).rev() {
            state = parents[t * self.k + state];
            states[t - 1] = state;
        }
        Ok(states)
    }

    fn failure_at(&self, t: usize) -> DecodeError {
        // Report the earliest dead column; later ones follow from it.
        let first_dead = (0..=t)
            .find(|&c| argmin_finite(self.column(c)).is_none())
            .unwrap_or(t);
        if self.numeric_failures > 0 {
            warn!(
                numeric_failures = self.numeric_failures,
                t = first_dead,
                "cost table has no finite state"
            );
        }
        DecodeError::DecodeFailure { t: first_dead }
    }
}

/// Lowest `C(l,t-1) + tau(l,j)` over `l`, ties to the lowest `l`.
fn cheapest_predecessor(prev: &[f64], to: usize, tau: &impl Fn(usize, usize) -> f64) -> (usize, f64) {
    let mut best = (0, prev[0] + tau(0, to));
    for (from, cost) in prev.iter().enumerate().skip(1) {
        let candidate = cost + tau(from, to);
        if candidate < best.1 {
            best = (from, candidate);
        }
    }
    best
}

/// Index of the smallest finite value, ties to the lowest index.
fn argmin_finite(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, b)| value < b) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

/// `-ln(alpha·e^(-alpha·x))` evaluated as `alpha·x - ln(alpha)`.
fn emission_cost(log_alpha: f64, gap: f64) -> Result<f64, &'static str> {
    if !log_alpha.is_finite() {
        return Err("rate is not finite");
    }
    if !gap.is_finite() || gap < 0.0 {
        return Err("gap is negative or not finite");
    }
    let cost = log_alpha.exp() * gap - log_alpha;
    if cost.is_nan() {
        return Err("cost is undefined");
    }
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize, s: f64, gamma: f64) -> BurstParams {
        BurstParams::new(k, s, gamma, true)
    }

    fn decode(gaps: &[f64], params: &BurstParams) -> Result<BurstStateSequence, DecodeError> {
        BurstDecoder::new(params).unwrap().decode(gaps)
    }

    // Gaps of feature occurring once in 2000, five times in 2001 and once
    // in 2010, with time zero 1999.
    const SCENARIO: [f64; 8] = [100.0, 100.0, 20.0, 20.0, 20.0, 20.0, 20.0, 900.0];

    #[test]
    fn test_single_state_is_always_zero() {
        let states = decode(&SCENARIO, &params(1, 1.1, 1.0)).unwrap();
        assert_eq!(states.states(), &[0; 8]);
    }

    #[test]
    fn test_first_state_is_zero() {
        let states = decode(&[100.0, 1.0, 1.0], &params(4, 3.0, 0.0)).unwrap();
        assert_eq!(states.states()[0], 0);
    }

    #[test]
    fn test_column_argmin_scenario() {
        let states = decode(&SCENARIO, &params(5, 2.0, 1.0)).unwrap();
        assert_eq!(states.states(), &[0, 0, 0, 0, 0, 1, 2, 0]);
    }

    #[test]
    fn test_viterbi_scenario() {
        let p = params(5, 2.0, 1.0).with_extraction(StateExtraction::Viterbi);
        let states = decode(&SCENARIO, &p).unwrap();
        assert_eq!(states.states(), &[0, 1, 2, 2, 2, 2, 2, 0]);
    }

    #[test]
    fn test_default_scale_too_flat_for_short_cluster() {
        let states = decode(&SCENARIO, &BurstParams::default()).unwrap();
        assert_eq!(states.peak(), Some(0));
    }

    #[test]
    fn test_free_transitions_follow_emission() {
        // With gamma = 0 each column picks its cheapest emission.
        let states = decode(&[100.0, 1000.0, 1.0], &params(3, 4.0, 0.0)).unwrap();
        assert_eq!(states.states(), &[0, 0, 2]);
    }

    #[test]
    fn test_determinism() {
        let p = BurstParams::default();
        let a = decode(&SCENARIO, &p).unwrap();
        let b = decode(&SCENARIO, &p).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wide_state_range_does_not_underflow() {
        // alpha(24) = (n/T)·3^24; the density would underflow in f64.
        let gaps = [100.0, 100.0, 5000.0, 0.01, 0.01, 0.01, 7000.0];
        let states = decode(&gaps, &params(25, 3.0, 1.0)).unwrap();
        assert_eq!(states.len(), gaps.len());
        assert!(states.states().iter().all(|s| *s < 25));
    }

    #[test]
    fn test_degenerate_sequences() {
        assert!(matches!(
            decode(&[], &BurstParams::default()),
            Err(DecodeError::DegenerateSequence { events: 0, .. })
        ));
        assert!(matches!(
            decode(&[0.0, 0.0], &BurstParams::default()),
            Err(DecodeError::DegenerateSequence { events: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert_eq!(
            BurstDecoder::new(&params(5, 0.5, 1.0)).unwrap_err(),
            ParamsError::InvalidScale(0.5)
        );
        assert_eq!(
            BurstDecoder::new(&params(0, 1.1, 1.0)).unwrap_err(),
            ParamsError::InvalidStateCount(0)
        );
    }

    #[test]
    fn test_bad_cell_is_isolated() {
        // A negative gap poisons only its own column's cells; earlier
        // columns are still decodable but the dead column fails the decode.
        let result = decode(&[100.0, 100.0, -5.0, 100.0], &params(3, 2.0, 1.0));
        assert_eq!(result, Err(DecodeError::DecodeFailure { t: 2 }));
    }

    #[test]
    fn test_single_bad_cell_does_not_fail_decode() {
        // ln(alpha(4)) ≈ 917 overflows exp(); against a zero gap the cell
        // is inf·0. States 0..=3 keep finite rates.
        let gaps = [100.0, 0.0, 100.0];
        let p = params(5, 1e100, 1.0);

        let table = CostTable::forward(&gaps, &p).unwrap();
        assert_eq!(table.numeric_failures, 1);
        assert_eq!(table.column(1)[4], f64::INFINITY);
        assert!(table.column(1)[..4].iter().all(|c| c.is_finite()));

        for extraction in [StateExtraction::ColumnArgmin, StateExtraction::Viterbi] {
            let states = decode(&gaps, &p.clone().with_extraction(extraction)).unwrap();
            assert_eq!(states.len(), 3);
            assert_ne!(states.states()[1], 4, "{extraction}");
            assert!(states.states().iter().all(|s| *s < 5));
        }
    }

    #[test]
    fn test_emission_cost_log_domain() {
        let log_alpha = (0.5f64).ln();
        let cost = emission_cost(log_alpha, 2.0).unwrap();
        let direct = -(0.5 * (-0.5f64 * 2.0).exp()).ln();
        assert!((cost - direct).abs() < 1e-12);

        assert!(emission_cost(f64::NAN, 1.0).is_err());
        assert!(emission_cost(0.0, -1.0).is_err());
    }

    #[test]
    fn test_argmin_finite_ties_low() {
        assert_eq!(argmin_finite(&[2.0, 1.0, 1.0]), Some(1));
        assert_eq!(argmin_finite(&[f64::INFINITY, f64::INFINITY]), None);
    }
}
