//! Semicolon-delimited summary tables, one row per analyzed symbol.
//!
//! Files start with a UTF-8 BOM so spreadsheet tools pick the right encoding.

use crate::analysis::{AnalysisReport, SymbolReport};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEVIATION_FILE: &str = "deviation.csv";
pub const RSI_FILE: &str = "rsi.csv";

const BOM: &[u8] = b"\xEF\xBB\xBF";

// Values are pre-formatted so the tables always carry two decimals.
#[derive(Serialize)]
struct DeviationRow<'a> {
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "Last_Close")]
    last_close: String,
    #[serde(rename = "Series_Max")]
    series_max: String,
    #[serde(rename = "Series_Min")]
    series_min: String,
    #[serde(rename = "Deviation_Max(%)")]
    deviation_max: String,
    #[serde(rename = "Deviation_Min(%)")]
    deviation_min: String,
}

#[derive(Serialize)]
struct RsiRow<'a> {
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "RSI")]
    rsi: String,
}

fn two_decimals(value: f64) -> String {
    format!("{:.2}", value)
}

fn render<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(BOM.to_vec());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Symbols whose deviation is undefined (zero or negative closes) are left out.
pub fn render_deviation_table(report: &AnalysisReport) -> Result<Vec<u8>> {
    render(report.reports.iter().filter_map(|r: &SymbolReport| {
        let d = r.deviation.as_ref()?;
        Some(DeviationRow {
            symbol: &r.symbol,
            last_close: two_decimals(d.latest_price),
            series_max: two_decimals(d.global_max),
            series_min: two_decimals(d.global_min),
            deviation_max: two_decimals(d.deviation_from_max),
            deviation_min: two_decimals(d.deviation_from_min),
        })
    }))
}

pub fn render_rsi_table(report: &AnalysisReport) -> Result<Vec<u8>> {
    render(report.reports.iter().map(|r| RsiRow {
        symbol: &r.symbol,
        rsi: r.rsi.map_or_else(|| "N/A".to_string(), two_decimals),
    }))
}

/// Writes both tables into `dir`. Nothing is written when no symbol
/// produced a report.
pub async fn write_tables(dir: &Path, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
    if report.reports.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir).await?;

    let mut written = Vec::with_capacity(2);
    for (name, content) in [
        (DEVIATION_FILE, render_deviation_table(report)?),
        (RSI_FILE, render_rsi_table(report)?),
    ] {
        let path = dir.join(name);
        let tmp = dir.join(format!("{}.tmp", name));
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SymbolFailure, analyze_series};
    use crate::price_series::series;
    use crate::storage_utils::{AnalysisConfig, scratch_dir};
    use chrono::Utc;

    fn report() -> AnalysisReport {
        let params = AnalysisConfig::default();
        let long: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        AnalysisReport {
            generated_at: Utc::now(),
            reports: vec![
                analyze_series("LONG", &series(&long), &params).unwrap(),
                analyze_series("SHORT", &series(&[4.0, 2.0, 3.0]), &params).unwrap(),
                analyze_series("ZERO", &series(&[0.0, 1.0]), &params).unwrap(),
                analyze_series("A;B", &series(&[1.0, 2.0]), &params).unwrap(),
            ],
            failures: vec![SymbolFailure {
                symbol: "BAD".to_string(),
                reason: "no data".to_string(),
            }],
        }
    }

    fn text(bytes: Vec<u8>) -> String {
        let bytes = bytes.strip_prefix(BOM).expect("BOM prefix").to_vec();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn deviation_rows() {
        let table = text(render_deviation_table(&report()).unwrap());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines[0],
            "Symbol;Last_Close;Series_Max;Series_Min;Deviation_Max(%);Deviation_Min(%)"
        );
        assert_eq!(lines[1], "LONG;20.00;20.00;1.00;0.00;1900.00");
        assert_eq!(lines[2], "SHORT;3.00;4.00;2.00;-25.00;50.00");
        assert!(!table.contains("ZERO"));
    }

    #[test]
    fn undefined_rsi_is_na() {
        let table = text(render_rsi_table(&report()).unwrap());
        assert!(table.starts_with("Symbol;RSI\n"));
        assert!(table.contains("LONG;100.00\n"));
        assert!(table.contains("SHORT;N/A\n"));
        assert!(table.contains("ZERO;N/A\n"));
        assert!(!table.contains("BAD"));
    }

    #[test]
    fn quotes_fields_with_separator() {
        let table = text(render_rsi_table(&report()).unwrap());
        assert!(table.contains("\"A;B\";N/A\n"));
    }

    #[tokio::test]
    async fn writes_both_files() {
        let dir = scratch_dir("csv");
        let written = write_tables(&dir, &report()).await.unwrap();
        assert_eq!(written, vec![dir.join(DEVIATION_FILE), dir.join(RSI_FILE)]);
        let rsi = std::fs::read(dir.join(RSI_FILE)).unwrap();
        assert!(rsi.starts_with(BOM));
        assert!(String::from_utf8_lossy(&rsi).contains("SHORT;N/A"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
