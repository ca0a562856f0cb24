use crate::indicators::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Time-ordered daily closes for one symbol.
///
/// Construction validates the series once, so every indicator can assume
/// finite closes and strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    timestamps: Vec<DateTime<Utc>>,
    closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, EngineError> {
        let mut timestamps = Vec::with_capacity(points.len());
        let mut closes = Vec::with_capacity(points.len());

        for (index, point) in points.into_iter().enumerate() {
            if !point.close.is_finite() {
                return Err(EngineError::InvalidValue(format!(
                    "close at index {} is not finite ({})",
                    index, point.close
                )));
            }
            if let Some(prev) = timestamps.last() {
                if point.timestamp <= *prev {
                    return Err(EngineError::UnorderedTimestamps { index });
                }
            }
            timestamps.push(point.timestamp);
            closes.push(point.close);
        }

        Ok(Self { timestamps, closes })
    }

    /// Builds a series with one close per day starting at `start`.
    #[cfg(test)]
    pub fn from_closes(start: DateTime<Utc>, closes: &[f64]) -> Result<Self, EngineError> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: start + chrono::Duration::days(i as i64),
                close,
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    #[cfg(test)]
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn get(&self, index: usize) -> Option<PricePoint> {
        Some(PricePoint {
            timestamp: *self.timestamps.get(index)?,
            close: *self.closes.get(index)?,
        })
    }

    pub fn latest(&self) -> Option<PricePoint> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }
}

#[cfg(test)]
pub(crate) fn series(closes: &[f64]) -> PriceSeries {
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    PriceSeries::from_closes(start, closes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let points = vec![
            PricePoint { timestamp: at(10), close: 1.0 },
            PricePoint { timestamp: at(20), close: 2.0 },
            PricePoint { timestamp: at(20), close: 3.0 },
        ];
        assert_eq!(
            PriceSeries::new(points),
            Err(EngineError::UnorderedTimestamps { index: 2 })
        );
    }

    #[test]
    fn rejects_non_finite_close() {
        let points = vec![
            PricePoint { timestamp: at(10), close: 1.0 },
            PricePoint { timestamp: at(20), close: f64::NAN },
        ];
        assert!(matches!(
            PriceSeries::new(points),
            Err(EngineError::InvalidValue(_))
        ));
    }

    #[test]
    fn from_closes_spaces_points_daily() {
        let s = series(&[1.0, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.timestamps()[2] - s.timestamps()[0], Duration::days(2));
        assert_eq!(s.latest().map(|p| p.close), Some(3.0));
    }

    #[test]
    fn empty_series_has_no_latest() {
        let s = series(&[]);
        assert!(s.is_empty());
        assert!(s.latest().is_none());
    }
}
