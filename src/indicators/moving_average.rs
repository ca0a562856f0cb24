use super::EngineError;
use crate::price_series::PriceSeries;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Trailing simple moving average aligned with `prices`; `None` until
/// `period` closes have been seen.
pub fn simple_moving_average(prices: &PriceSeries, period: usize) -> Result<Vec<Option<f64>>, EngineError> {
    let mut sma = SimpleMovingAverage::new(period).map_err(|_| EngineError::InvalidParameter {
        name: "period",
        value: period,
        reason: "must be at least 1",
    })?;

    Ok(prices
        .closes()
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = sma.next(close);
            (i + 1 >= period).then_some(value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::series;
    use approx::assert_relative_eq;

    #[test]
    fn period_zero_is_rejected() {
        assert!(simple_moving_average(&series(&[1.0]), 0).is_err());
    }

    #[test]
    fn warm_up_then_trailing_mean() {
        let ma = simple_moving_average(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3).unwrap();
        assert_eq!(ma[..2], [None, None]);
        assert_relative_eq!(ma[2].unwrap(), 2.0);
        assert_relative_eq!(ma[4].unwrap(), 4.0);
    }

    #[test]
    fn longer_period_than_series() {
        let ma = simple_moving_average(&series(&[1.0, 2.0]), 200).unwrap();
        assert!(ma.iter().all(Option::is_none));
    }
}
