//! This module contains the core analysis pipeline logic.

use crate::indicators::{
    DeviationStats, EngineError, RsiZone, compute_deviation, compute_rsi, find_local_extrema,
    simple_moving_average,
};
use crate::market_data::{PriceSource, fetch_all};
use crate::price_series::{PricePoint, PriceSeries};
use crate::storage_utils::{AnalysisConfig, AppConfig, AsyncStorageManager};
use crate::symbols;
use anyhow::{Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const REPORT_FILE: &str = "report";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageValue {
    pub period: usize,
    pub value: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub last_close_time: DateTime<Utc>,
    pub samples: usize,
    /// `None` when the series is too short for a defined RSI.
    pub rsi: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
    /// `None` when a zero or negative close leaves the percentages undefined.
    pub deviation: Option<DeviationStats>,
    pub maxima_count: usize,
    pub minima_count: usize,
    pub last_local_max: Option<PricePoint>,
    pub last_local_min: Option<PricePoint>,
    pub moving_averages: Vec<MovingAverageValue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub reports: Vec<SymbolReport>,
    pub failures: Vec<SymbolFailure>,
}

impl AnalysisReport {
    /// Splits per-symbol outcomes, keeping input order within each list.
    pub fn from_outcomes<E: std::fmt::Display>(
        generated_at: DateTime<Utc>,
        outcomes: Vec<(String, Result<SymbolReport, E>)>,
    ) -> Self {
        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => failures.push(SymbolFailure {
                    symbol,
                    reason: e.to_string(),
                }),
            }
        }
        Self {
            generated_at,
            reports,
            failures,
        }
    }
}

pub fn analyze_series(
    symbol: &str,
    series: &PriceSeries,
    params: &AnalysisConfig,
) -> Result<SymbolReport, EngineError> {
    let latest = series.latest().ok_or(EngineError::EmptySeries)?;
    // RSI and extrema stay reportable even when the deviation is undefined.
    let deviation = match compute_deviation(series) {
        Ok(stats) => Some(stats),
        Err(EngineError::InvalidValue(reason)) => {
            warn!(%symbol, %reason, "deviation undefined");
            None
        }
        Err(e) => return Err(e),
    };

    let rsi = compute_rsi(series, params.rsi_period)?.latest_defined().ok();
    let extrema = find_local_extrema(series, params.extrema_window)?;

    let moving_averages = params
        .moving_averages
        .iter()
        .map(|&period| {
            let values = simple_moving_average(series, period)?;
            Ok(MovingAverageValue {
                period,
                value: values.last().copied().flatten(),
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    Ok(SymbolReport {
        symbol: symbol.to_string(),
        last_close_time: latest.timestamp,
        samples: series.len(),
        rsi,
        rsi_zone: rsi.map(RsiZone::classify),
        deviation,
        maxima_count: extrema.maxima.len(),
        minima_count: extrema.minima.len(),
        last_local_max: extrema.maxima_points(series).last().copied(),
        last_local_min: extrema.minima_points(series).last().copied(),
        moving_averages,
    })
}

/// Start of the download window, `history_days` before `now`.
pub fn history_start(now: DateTime<Utc>, history_days: i64) -> Result<DateTime<Utc>> {
    if history_days <= 0 {
        bail!("history_days must be positive, got {}", history_days);
    }
    match TimeDelta::try_days(history_days).and_then(|d| now.checked_sub_signed(d)) {
        Some(start) => Ok(start),
        None => bail!("history_days {} is out of range", history_days),
    }
}

/// Fetches and analyzes every symbol. A failing symbol is recorded and the
/// rest carry on.
pub async fn analyze_symbols(
    source: &dyn PriceSource,
    symbols: &[String],
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<AnalysisReport> {
    let start = history_start(now, config.history_days)?;
    let fetched = fetch_all(
        source,
        symbols,
        start,
        now,
        config.market_data.max_concurrent_requests,
    )
    .await;

    let outcomes = fetched
        .into_iter()
        .map(|(symbol, fetched)| {
            let outcome = fetched
                .map_err(anyhow::Error::from)
                .and_then(|series| {
                    analyze_series(&symbol, &series, &config.analysis).map_err(anyhow::Error::from)
                });
            match &outcome {
                Ok(report) => info!(%symbol, rsi = ?report.rsi, samples = report.samples, "analyzed"),
                Err(e) => warn!(%symbol, error = %e, "skipping symbol"),
            }
            (symbol, outcome)
        })
        .collect();

    Ok(AnalysisReport::from_outcomes(now, outcomes))
}

/// Runs the full analysis pipeline:
/// 1. Reads the symbol list.
/// 2. Fetches daily closes and analyzes each symbol.
/// 3. Persists the report and writes the CSV tables.
pub async fn run_analysis_pipeline(
    config: &AppConfig,
    storage: &AsyncStorageManager,
    source: &dyn PriceSource,
) -> Result<AnalysisReport> {
    let symbols = symbols::load_symbols(&config.symbols_file).await?;
    info!(count = symbols.len(), "symbols to process");

    let report = analyze_symbols(source, &symbols, config, Utc::now()).await?;
    storage.save(REPORT_FILE, &report).await?;

    let written = crate::csv_report::write_tables(&config.output_dir, &report).await?;
    for path in written {
        info!(path = %path.display(), "table written");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::FetchError;
    use crate::price_series::series;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FakeSource {
        data: HashMap<String, Vec<f64>>,
    }

    #[async_trait]
    impl PriceSource for FakeSource {
        async fn fetch_price_history(
            &self,
            symbol: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<PriceSeries, FetchError> {
            match self.data.get(symbol) {
                Some(closes) => Ok(series(closes)),
                None => Err(FetchError::NoDataAvailable {
                    symbol: symbol.to_string(),
                }),
            }
        }
    }

    fn scenario() -> Vec<f64> {
        vec![
            10.0, 11.0, 12.0, 11.0, 10.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0,
            18.0,
        ]
    }

    fn params() -> AnalysisConfig {
        AnalysisConfig {
            rsi_period: 14,
            extrema_window: 5,
            moving_averages: vec![5, 50],
        }
    }

    #[test]
    fn analyzes_scenario_series() {
        let s = series(&scenario());
        let report = analyze_series("ABC", &s, &params()).unwrap();

        assert_eq!(report.samples, 15);
        assert!(report.rsi.unwrap() > 50.0);
        assert_eq!(report.rsi_zone, Some(RsiZone::Overbought));
        assert_eq!(report.deviation.map(|d| d.deviation_from_max), Some(0.0));
        assert_eq!(report.maxima_count, 2);
        assert_eq!(report.minima_count, 1);
        assert_eq!(report.last_local_min.map(|p| p.close), Some(9.0));
        assert_eq!(report.moving_averages[0].value, Some(16.0));
        assert_eq!(report.moving_averages[1].value, None);
    }

    #[test]
    fn short_series_has_no_rsi() {
        let report = analyze_series("ABC", &series(&[1.0, 2.0, 3.0]), &params()).unwrap();
        assert_eq!(report.rsi, None);
        assert_eq!(report.rsi_zone, None);
    }

    #[test]
    fn empty_series_fails() {
        assert_eq!(
            analyze_series("ABC", &series(&[]), &params()),
            Err(EngineError::EmptySeries)
        );
    }

    #[tokio::test]
    async fn failures_are_isolated_per_symbol() {
        let source = FakeSource {
            data: HashMap::from([
                ("UP".to_string(), scenario()),
                ("ZERO".to_string(), vec![0.0, 1.0]),
                ("FLAT".to_string(), vec![5.0; 20]),
            ]),
        };
        let symbols: Vec<String> = ["UP", "MISSING", "ZERO", "FLAT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut config = AppConfig::default();
        config.analysis = params();
        config.market_data.max_concurrent_requests = 3;

        let report = analyze_symbols(&source, &symbols, &config, Utc::now())
            .await
            .unwrap();

        let ok: Vec<_> = report.reports.iter().map(|r| r.symbol.as_str()).collect();
        let failed: Vec<_> = report.failures.iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(ok, vec!["UP", "ZERO", "FLAT"]);
        assert_eq!(failed, vec!["MISSING"]);
        assert!(report.failures[0].reason.contains("no data available"));
        assert_eq!(report.reports[1].deviation, None);
        assert_eq!(report.reports[2].rsi, Some(50.0));
    }

    #[test]
    fn zero_close_keeps_rsi() {
        let mut closes = vec![0.0];
        closes.extend((1..=20).map(|x| x as f64));
        let report = analyze_series("ZERO", &series(&closes), &params()).unwrap();
        assert_eq!(report.deviation, None);
        assert_eq!(report.rsi, Some(100.0));
        assert_eq!(report.maxima_count, 1);
    }

    #[test]
    fn history_window_is_validated() {
        let now = Utc::now();
        assert_eq!(history_start(now, 730).unwrap(), now - TimeDelta::days(730));
        assert!(history_start(now, 0).is_err());
        assert!(history_start(now, -5).is_err());
        assert!(history_start(now, 100_000_000).is_err());
        assert!(history_start(now, i64::MAX).is_err());
    }

    #[tokio::test]
    async fn out_of_range_history_fails_without_fetching() {
        let source = FakeSource {
            data: HashMap::from([("UP".to_string(), scenario())]),
        };
        let mut config = AppConfig::default();
        config.history_days = 100_000_000;

        let err = analyze_symbols(&source, &["UP".to_string()], &config, Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let source = FakeSource {
            data: HashMap::from([("UP".to_string(), scenario())]),
        };
        let symbols = vec!["UP".to_string()];
        let config = AppConfig::default();
        let now = Utc::now();

        let a = analyze_symbols(&source, &symbols, &config, now).await.unwrap();
        let b = analyze_symbols(&source, &symbols, &config, now).await.unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
