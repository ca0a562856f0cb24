// Relative Strength Index with Wilder smoothing.
//
// avg_gain / avg_loss are seeded with the simple mean of the first `period`
// deltas, then follow avg[i] = alpha * raw[i] + (1 - alpha) * avg[i - 1]
// with alpha = 1 / period. Indices before `period` hold NEUTRAL_RSI.

use super::EngineError;
use crate::price_series::PriceSeries;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Value reported where the smoothing has not seen `period` deltas yet, and
/// when gains and losses are both zero.
pub const NEUTRAL_RSI: f64 = 50.0;

const OVERSOLD: f64 = 30.0;
const OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiSeries {
    period: usize,
    values: Vec<f64>,
}

impl RsiSeries {
    #[cfg(test)]
    pub fn period(&self) -> usize {
        self.period
    }

    /// One value per input close. Undefined positions hold [`NEUTRAL_RSI`].
    #[cfg(test)]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[cfg(test)]
    pub fn is_defined(&self, index: usize) -> bool {
        index >= self.period && index < self.values.len()
    }

    pub fn has_sufficient_history(&self) -> bool {
        self.values.len() > self.period
    }

    /// Last value including the sentinel, `None` only for an empty input.
    #[cfg(test)]
    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn latest_defined(&self) -> Result<f64, EngineError> {
        match self.values.last() {
            Some(&v) if self.has_sufficient_history() => Ok(v),
            _ => Err(EngineError::InsufficientHistory {
                needed: self.period + 1,
                found: self.values.len(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

impl RsiZone {
    pub fn classify(rsi: f64) -> Self {
        if rsi >= OVERBOUGHT {
            RsiZone::Overbought
        } else if rsi <= OVERSOLD {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RsiZone::Oversold => "OVERSOLD",
            RsiZone::Neutral => "NEUTRAL",
            RsiZone::Overbought => "OVERBOUGHT",
        }
    }
}

/// Computes an RSI series aligned with `prices`.
///
/// A series with `period` or fewer closes yields all [`NEUTRAL_RSI`]; that is
/// not an error here, use [`RsiSeries::latest_defined`] to insist on a value.
pub fn compute_rsi(prices: &PriceSeries, period: usize) -> Result<RsiSeries, EngineError> {
    if period == 0 {
        return Err(EngineError::InvalidParameter {
            name: "period",
            value: period,
            reason: "must be at least 1",
        });
    }

    let closes = prices.closes();
    let n = closes.len();
    let mut values = vec![NEUTRAL_RSI; n];
    if n <= period {
        return Ok(RsiSeries { period, values });
    }

    let period_f = period as f64;
    let (sum_gain, sum_loss) = closes[..=period]
        .windows(2)
        .fold((0.0_f64, 0.0_f64), |(g, l), w| {
            let (gain, loss) = split_delta(w[1] - w[0]);
            (g + gain, l + loss)
        });
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;
    values[period] = rsi_from_averages(avg_gain, avg_loss);

    let alpha = 1.0 / period_f;
    for i in (period + 1)..n {
        let (gain, loss) = split_delta(closes[i] - closes[i - 1]);
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        values[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    Ok(RsiSeries { period, values })
}

fn split_delta(delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        (delta, 0.0)
    } else {
        (0.0, -delta)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { NEUTRAL_RSI } else { 100.0 }
    } else {
        let rs = avg_gain / avg_loss;
        (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
    }
}
