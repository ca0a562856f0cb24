//! Indicator engine: pure functions over a validated [`PriceSeries`].
//!
//! Nothing in here performs I/O or keeps state between calls, so callers may
//! run one symbol per task without any locking.
//!
//! [`PriceSeries`]: crate::price_series::PriceSeries

pub mod deviation;
pub mod extrema;
pub mod moving_average;
pub mod rsi;

pub use deviation::{DeviationStats, compute_deviation};
pub use extrema::{DEFAULT_EXTREMA_WINDOW, find_local_extrema};
pub use moving_average::simple_moving_average;
pub use rsi::{DEFAULT_RSI_PERIOD, RsiZone, compute_rsi};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    #[error("price series is empty")]
    EmptySeries,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("insufficient history: need at least {needed} samples, found {found}")]
    InsufficientHistory { needed: usize, found: usize },

    #[error("timestamps must be strictly increasing (violated at index {index})")]
    UnorderedTimestamps { index: usize },
}
