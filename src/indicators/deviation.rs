use super::EngineError;
use crate::price_series::PriceSeries;
use serde::{Deserialize, Serialize};

/// Latest close measured against the extremes of the whole series.
///
/// `deviation_from_max` is never positive and `deviation_from_min` never
/// negative, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationStats {
    pub latest_price: f64,
    pub global_max: f64,
    pub global_min: f64,
    pub deviation_from_max: f64,
    pub deviation_from_min: f64,
}

pub fn compute_deviation(prices: &PriceSeries) -> Result<DeviationStats, EngineError> {
    let closes = prices.closes();
    let latest_price = *closes.last().ok_or(EngineError::EmptySeries)?;

    let (global_min, global_max) = closes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));

    if global_max == 0.0 || global_min == 0.0 {
        return Err(EngineError::InvalidValue(
            "series extreme is zero, deviation is undefined".to_string(),
        ));
    }
    if global_min < 0.0 {
        return Err(EngineError::InvalidValue(format!(
            "negative close ({global_min}) in series"
        )));
    }

    Ok(DeviationStats {
        latest_price,
        global_max,
        global_min,
        deviation_from_max: (latest_price - global_max) / global_max * 100.0,
        deviation_from_min: (latest_price - global_min) / global_min * 100.0,
    })
}
