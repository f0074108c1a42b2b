//! Decode parameters for the burst automaton.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing so that the same
//! parameters always yield the same `params_hash`, regardless of float
//! formatting. The quantization factor is 1e6 (multiply by 1,000,000 and
//! round to i64).

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Default number of burst states.
pub const DEFAULT_STATE_COUNT: usize = 5;
/// Default rate scaling factor between consecutive states.
pub const DEFAULT_SCALE: f64 = 1.1;
/// Default weight of the upward transition penalty.
pub const DEFAULT_GAMMA: f64 = 1.0;

/// Error type for invalid configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    /// `k` must be at least 1.
    #[error("State count must be at least 1, got {0}")]
    InvalidStateCount(usize),
    /// `s` must be finite and strictly greater than 1.
    #[error("Scaling factor must be finite and > 1, got {0}")]
    InvalidScale(f64),
    /// `gamma` must be finite and non-negative.
    #[error("Transition penalty must be finite and >= 0, got {0}")]
    InvalidGamma(f64),
    /// At least one worker is required.
    #[error("Worker count must be at least 1, got {0}")]
    InvalidWorkers(usize),
    /// Fractional top-N must lie in (0, 1].
    #[error("Top-N fraction must lie in (0, 1], got {0}")]
    InvalidTopN(f64),
}

/// How a state sequence is read out of the cost table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateExtraction {
    /// Cheapest state of each column independently.
    ///
    /// Matches the published tooling, but the implied path may jump in
    /// ways the transition costs would not allow.
    #[default]
    ColumnArgmin,
    /// Single cheapest path, recovered by backtracking parent pointers.
    Viterbi,
}

impl std::fmt::Display for StateExtraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnArgmin => write!(f, "column_argmin"),
            Self::Viterbi => write!(f, "viterbi"),
        }
    }
}

impl std::str::FromStr for StateExtraction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "column_argmin" | "argmin" => Ok(Self::ColumnArgmin),
            "viterbi" => Ok(Self::Viterbi),
            other => Err(format!("unknown state extraction: {other}")),
        }
    }
}

/// Parameters of the burst automaton.
///
/// ## Parameters
///
/// - `k`: number of states; state `j` emits at rate `(n/T)·s^j`
/// - `s`: rate ratio between consecutive states (> 1)
/// - `gamma`: weight of the `gamma·ln(n)` cost per level climbed
/// - `normalize`: divide binned scores by `k`
/// - `extraction`: how states are read from the cost table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstParams {
    /// Number of burst states.
    pub k: usize,
    /// Rate scaling factor between consecutive states.
    pub s: f64,
    /// Upward transition penalty weight.
    pub gamma: f64,
    /// Whether scores are divided by `k`.
    pub normalize: bool,
    /// State extraction mode.
    pub extraction: StateExtraction,
}

impl BurstParams {
    /// Create parameters with the default extraction mode.
    pub fn new(k: usize, s: f64, gamma: f64, normalize: bool) -> Self {
        Self {
            k,
            s,
            gamma,
            normalize,
            extraction: StateExtraction::default(),
        }
    }

    /// Replace the extraction mode.
    pub fn with_extraction(mut self, extraction: StateExtraction) -> Self {
        self.extraction = extraction;
        self
    }

    /// Check the parameters describe a valid automaton.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.k < 1 {
            return Err(ParamsError::InvalidStateCount(self.k));
        }
        if !self.s.is_finite() || self.s <= 1.0 {
            return Err(ParamsError::InvalidScale(self.s));
        }
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(ParamsError::InvalidGamma(self.gamma));
        }
        Ok(())
    }

    /// Compute a hash of the parameters.
    ///
    /// Floats are multiplied by 1e6 and rounded to i64 before hashing.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&self.to_quantized())
    }

    fn to_quantized(&self) -> QuantizedParams {
        QuantizedParams {
            k: self.k,
            s: quantize_float(self.s),
            gamma: quantize_float(self.gamma),
            normalize: self.normalize,
            extraction: self.extraction,
        }
    }
}

impl Default for BurstParams {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_COUNT, DEFAULT_SCALE, DEFAULT_GAMMA, true)
    }
}

/// Quantize a float to an i64 for deterministic hashing.
fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

/// Quantized parameters for deterministic hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantizedParams {
    k: usize,
    s: i64,
    gamma: i64,
    normalize: bool,
    extraction: StateExtraction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let params = BurstParams::default();
        assert_eq!(params.k, 5);
        assert_eq!(params.s, 1.1);
        assert_eq!(params.gamma, 1.0);
        assert!(params.normalize);
        assert_eq!(params.extraction, StateExtraction::ColumnArgmin);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        assert_eq!(
            BurstParams::new(0, 1.1, 1.0, true).validate(),
            Err(ParamsError::InvalidStateCount(0))
        );
        assert_eq!(
            BurstParams::new(5, 1.0, 1.0, true).validate(),
            Err(ParamsError::InvalidScale(1.0))
        );
        assert!(matches!(
            BurstParams::new(5, f64::NAN, 1.0, true).validate(),
            Err(ParamsError::InvalidScale(_))
        ));
        assert_eq!(
            BurstParams::new(5, 1.1, -0.5, true).validate(),
            Err(ParamsError::InvalidGamma(-0.5))
        );
    }

    #[test]
    fn test_params_hash_determinism() {
        assert_eq!(BurstParams::default().params_hash(), BurstParams::default().params_hash());
    }

    #[test]
    fn test_params_hash_changes() {
        let base = BurstParams::default();
        let viterbi = base.clone().with_extraction(StateExtraction::Viterbi);
        let mut sharper = base.clone();
        sharper.s = 2.0;

        assert_ne!(base.params_hash(), viterbi.params_hash());
        assert_ne!(base.params_hash(), sharper.params_hash());
    }

    #[test]
    fn test_extraction_parse() {
        assert_eq!("viterbi".parse::<StateExtraction>(), Ok(StateExtraction::Viterbi));
        assert_eq!("Column_Argmin".parse::<StateExtraction>(), Ok(StateExtraction::ColumnArgmin));
        assert!("backtrace".parse::<StateExtraction>().is_err());
    }
}
