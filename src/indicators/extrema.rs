use super::EngineError;
use crate::price_series::{PricePoint, PriceSeries};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_EXTREMA_WINDOW: usize = 5;

/// Indices of local maxima and minima, each list ascending.
///
/// Comparisons are inclusive: every point of a flat run that dominates its
/// neighbourhood is reported, so a plateau of N equal values yields N
/// indices. A point whose whole window lies inside a plateau sees only equal
/// neighbours, so it is both a maximum and a minimum; for `[1, 3, 3, 3, 1]`
/// with `window = 1` the middle point is in both lists. Windows are clipped
/// at the series boundaries instead of excluding the first and last
/// `window` points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtremaResult {
    pub maxima: Vec<usize>,
    pub minima: Vec<usize>,
}

impl ExtremaResult {
    pub fn maxima_points(&self, prices: &PriceSeries) -> Vec<PricePoint> {
        self.maxima.iter().filter_map(|&i| prices.get(i)).collect()
    }

    pub fn minima_points(&self, prices: &PriceSeries) -> Vec<PricePoint> {
        self.minima.iter().filter_map(|&i| prices.get(i)).collect()
    }
}

/// Marks `i` as a maximum when `close[i] >= close[j]` for every `j` within
/// `window` positions of `i` (and as a minimum with `<=`). Runs in O(n)
/// regardless of `window`.
pub fn find_local_extrema(prices: &PriceSeries, window: usize) -> Result<ExtremaResult, EngineError> {
    if window == 0 {
        return Err(EngineError::InvalidParameter {
            name: "window",
            value: window,
            reason: "must be at least 1",
        });
    }

    let closes = prices.closes();
    let highs = centered_extreme(closes, window, |new, old| new >= old);
    let lows = centered_extreme(closes, window, |new, old| new <= old);

    let mut result = ExtremaResult::default();
    for (i, &close) in closes.iter().enumerate() {
        if close >= highs[i] {
            result.maxima.push(i);
        }
        if close <= lows[i] {
            result.minima.push(i);
        }
    }
    Ok(result)
}

/// For every index, the dominant value over `[i - window, i + window]`
/// clipped to the slice, via a monotonic deque of candidate indices.
fn centered_extreme(values: &[f64], window: usize, dominates: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    let mut candidates: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for i in 0..n {
        let hi = i.saturating_add(window).min(n - 1);
        while next <= hi {
            while candidates
                .back()
                .is_some_and(|&back| dominates(values[next], values[back]))
            {
                candidates.pop_back();
            }
            candidates.push_back(next);
            next += 1;
        }

        let lo = i.saturating_sub(window);
        while candidates.front().is_some_and(|&front| front < lo) {
            candidates.pop_front();
        }

        // `hi` itself is always a live candidate, so the deque is never empty.
        let best = candidates.front().map_or(values[i], |&j| values[j]);
        out.push(best);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::series;
    use proptest::prelude::*;

    fn brute_force(closes: &[f64], window: usize) -> ExtremaResult {
        let n = closes.len();
        let mut result = ExtremaResult::default();
        for i in 0..n {
            let lo = i.saturating_sub(window);
            let hi = (i + window).min(n - 1);
            let others = (lo..=hi).filter(|&j| j != i);
            if others.clone().all(|j| closes[i] >= closes[j]) {
                result.maxima.push(i);
            }
            if others.clone().all(|j| closes[i] <= closes[j]) {
                result.minima.push(i);
            }
        }
        result
    }

    #[test]
    fn window_zero_is_rejected() {
        let err = find_local_extrema(&series(&[1.0, 2.0]), 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "window", .. }));
    }

    #[test]
    fn empty_series_has_no_extrema() {
        assert_eq!(find_local_extrema(&series(&[]), 5).unwrap(), ExtremaResult::default());
    }

    #[test]
    fn rising_series_with_wide_window() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let result = find_local_extrema(&series(&closes), 10).unwrap();
        assert_eq!(result.maxima, vec![9]);
        assert_eq!(result.minima, vec![0]);
    }

    #[test]
    fn mixed_trend_scenario() {
        let closes = [
            10.0, 11.0, 12.0, 11.0, 10.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0,
            18.0,
        ];
        let s = series(&closes);
        let result = find_local_extrema(&s, 5).unwrap();
        assert!(result.maxima.contains(&2));
        assert!(result.minima.contains(&5));
        assert_eq!(result.maxima, vec![2, 14]);
        assert_eq!(result.minima, vec![5]);
        assert_eq!(result.minima_points(&s)[0].close, 9.0);
    }

    #[test]
    fn plateau_reports_every_point() {
        let closes = [1.0, 3.0, 3.0, 3.0, 1.0];
        let result = find_local_extrema(&series(&closes), 1).unwrap();
        assert_eq!(result.maxima, vec![1, 2, 3]);
        // Index 2 only sees its 3.0 neighbours.
        assert_eq!(result.minima, vec![0, 2, 4]);
    }

    #[test]
    fn flat_series_is_both() {
        let result = find_local_extrema(&series(&[5.0; 4]), 2).unwrap();
        assert_eq!(result.maxima, vec![0, 1, 2, 3]);
        assert_eq!(result.minima, vec![0, 1, 2, 3]);
    }

    #[test]
    fn window_larger_than_series() {
        let result = find_local_extrema(&series(&[2.0, 1.0, 3.0]), usize::MAX).unwrap();
        assert_eq!(result.maxima, vec![2]);
        assert_eq!(result.minima, vec![1]);
    }

    proptest! {
        #[test]
        fn matches_brute_force(
            closes in prop::collection::vec(0i32..20, 0..80),
            window in 1usize..12,
        ) {
            // Small integer range forces plenty of ties.
            let closes: Vec<f64> = closes.into_iter().map(f64::from).collect();
            let result = find_local_extrema(&series(&closes), window).unwrap();
            prop_assert!(result.maxima.iter().chain(&result.minima).all(|&i| i < closes.len()));
            prop_assert_eq!(result, brute_force(&closes, window));
        }
    }
}
