use crate::indicators::EngineError;
use crate::price_series::{PricePoint, PriceSeries};
use crate::storage_utils::MarketDataConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;
const USER_AGENT: &str = concat!("rsi-screener/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no data available for {symbol}")]
    NoDataAvailable { symbol: String },

    #[error("rate limited while fetching {symbol}")]
    RateLimited { symbol: String },

    #[error("provider error for {symbol}: {message}")]
    Provider { symbol: String, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("malformed series: {0}")]
    Series(#[from] EngineError),
}

/// Producer of daily close history for one symbol.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, FetchError>;
}

// --- Yahoo chart API response ---

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Turns a chart response into a series. Bars with a null close are
/// dropped; repeated timestamps keep the last bar.
fn series_from_chart(symbol: &str, envelope: ChartEnvelope) -> Result<PriceSeries, FetchError> {
    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(FetchError::NoDataAvailable { symbol: symbol.to_string() });
        }
        return Err(FetchError::Provider {
            symbol: symbol.to_string(),
            message: err.description.unwrap_or(err.code),
        });
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(FetchError::NoDataAvailable { symbol: symbol.to_string() });
    };
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut points: Vec<PricePoint> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            Some(PricePoint {
                timestamp: DateTime::from_timestamp(ts, 0)?,
                close: close?,
            })
        })
        .collect();

    points.sort_by_key(|p| p.timestamp);
    points.reverse();
    points.dedup_by_key(|p| p.timestamp);
    points.reverse();

    if points.is_empty() {
        return Err(FetchError::NoDataAvailable { symbol: symbol.to_string() });
    }
    Ok(PriceSeries::new(points)?)
}

pub struct YahooChartClient {
    client: Client,
    base_url: String,
    interval: String,
    max_retries: u32,
}

impl YahooChartClient {
    pub fn new(config: &MarketDataConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(config.max_concurrent_requests.max(1))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            interval: config.interval.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl PriceSource for YahooChartClient {
    async fn fetch_price_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, FetchError> {
        let url = format!("{}/{}", self.base_url, symbol);
        let query = [
            ("period1", start.timestamp().to_string()),
            ("period2", end.timestamp().to_string()),
            ("interval", self.interval.clone()),
            ("events", "history".to_string()),
        ];

        let mut attempt = 0;
        loop {
            let response = self.client.get(&url).query(&query).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.max_retries {
                    return Err(FetchError::RateLimited { symbol: symbol.to_string() });
                }
                let wait = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!(%symbol, wait_secs = wait, attempt, "rate limited, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                attempt += 1;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NoDataAvailable { symbol: symbol.to_string() });
            }

            let response = response.error_for_status()?;
            let envelope: ChartEnvelope = response.json().await?;
            let series = series_from_chart(symbol, envelope)?;
            debug!(%symbol, samples = series.len(), "fetched price history");
            return Ok(series);
        }
    }
}

/// Fetches every symbol in batches of `batch_size` concurrent requests,
/// keeping the input order in the output.
pub async fn fetch_all(
    source: &dyn PriceSource,
    symbols: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    batch_size: usize,
) -> Vec<(String, Result<PriceSeries, FetchError>)> {
    let mut all_results = Vec::with_capacity(symbols.len());

    for batch in symbols.chunks(batch_size.max(1)) {
        let tasks: Vec<_> = batch
            .iter()
            .map(|s| source.fetch_price_history(s, start, end))
            .collect();
        let results = futures::future::join_all(tasks).await;
        all_results.extend(batch.iter().cloned().zip(results));
    }

    all_results
}
