use anyhow::{Context, Result, bail};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

// Plain tickers, exchange suffixes (SAN.MC), share classes (BRK-B),
// indices (^GSPC) and FX / futures (EURUSD=X, GC=F).
static TICKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\^?[A-Z0-9][A-Z0-9.\-]*(=[A-Z])?$").expect("valid ticker regex"));

/// One symbol per line. Lines are trimmed and upper-cased; blanks and `#`
/// comments are skipped; repeats keep their first position.
pub fn parse_symbols(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let symbol = line.trim().to_uppercase();
        if symbol.is_empty() || symbol.starts_with('#') {
            continue;
        }
        if !TICKER.is_match(&symbol) {
            warn!(line = line_no + 1, %symbol, "skipping malformed symbol");
            continue;
        }
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }
    symbols
}

pub async fn load_symbols(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("could not read symbols file {}", path.display()))?;

    let symbols = parse_symbols(&content);
    if symbols.is_empty() {
        bail!("symbols file {} contains no symbols", path.display());
    }
    Ok(symbols)
}
