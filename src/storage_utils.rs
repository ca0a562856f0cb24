use crate::indicators::{DEFAULT_EXTREMA_WINDOW, DEFAULT_RSI_PERIOD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

// CONFIGURATION STRUCTS

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub interval: String,              // e.g., "1d"
    pub max_concurrent_requests: usize, // symbols fetched per batch
    pub max_retries: u32,               // retries after HTTP 429
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            interval: "1d".to_string(),
            max_concurrent_requests: 8,
            max_retries: 3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rsi_period: usize,
    pub extrema_window: usize,
    pub moving_averages: Vec<usize>, // e.g., [50, 200]
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rsi_period: DEFAULT_RSI_PERIOD,
            extrema_window: DEFAULT_EXTREMA_WINDOW,
            moving_averages: vec![50, 200],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub symbols_file: PathBuf,
    pub output_dir: PathBuf,
    pub history_days: i64, // two years of daily closes by default
    pub market_data: MarketDataConfig,
    pub analysis: AnalysisConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols_file: PathBuf::from("symbols.txt"),
            output_dir: PathBuf::from("output"),
            history_days: 730,
            market_data: MarketDataConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

// STORAGE MANAGER

#[derive(Debug, Clone)]
pub struct AsyncStorageManager {
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Storage directory next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);
        Self::new(base_dir).await
    }

    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        // Created once here so save() never has to check.
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Pretty JSON, written to a `.tmp` sibling and renamed into place so a
    /// crash mid-write never leaves a truncated file.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{}.json", filename);
        let final_path = self.base_dir.join(&file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;
        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));
        // serde_json validates UTF-8 itself, no need for read_to_string.
        let content = fs::read(path).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Loads `filename`, or writes `default` there first if it does not exist.
    pub async fn load_or_init<T>(&self, filename: &str, default: T) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let path = self.base_dir.join(format!("{}.json", filename));
        if fs::try_exists(&path).await? {
            return self.load(filename).await;
        }
        info!(path = %path.display(), "writing default {}", filename);
        self.save(filename, &default).await?;
        Ok(default)
    }
}

#[cfg(test)]
pub(crate) fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rsi-screener-{}-{}", name, std::process::id()))
}
