//! Burst automaton parameters and batch configuration.

pub mod params;
pub mod selection;

pub use params::{BurstParams, ParamsError, StateExtraction, DEFAULT_GAMMA, DEFAULT_SCALE, DEFAULT_STATE_COUNT};
pub use selection::{BurstnessConfig, FeatureSelection, TopN, DEFAULT_TOP_N, DEFAULT_WORKERS};
