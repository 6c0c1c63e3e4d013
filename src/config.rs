use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub budget: BudgetLimits,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub shaping: ShapingConfig,

    #[serde(default)]
    pub segments: SegmentConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// External market data provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Exchange prefix applied to bare symbols
    pub default_exchange: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".to_string(),
            api_key: None,
            default_exchange: "NSE".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Rolling-window call limits and per-endpoint costs
///
/// Costs are policy, not structure: a cheap single-field lookup and a
/// multi-indicator fetch may legitimately cost differently, so callers
/// declare them here instead of the tracker hard-coding them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetLimits {
    /// Short-window limit (free tier: 5 calls/minute)
    pub calls_per_minute: u32,

    /// Long-window limit (free tier: 500 calls/day)
    pub calls_per_day: u32,

    /// Cost units per endpoint tag; endpoints not listed cost 1
    #[serde(default)]
    pub costs: HashMap<String, u32>,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        let mut costs = HashMap::new();
        costs.insert("GLOBAL_QUOTE".to_string(), 1);
        costs.insert("OVERVIEW".to_string(), 1);
        costs.insert("TIME_SERIES_DAILY".to_string(), 1);
        costs.insert("SYMBOL_SEARCH".to_string(), 1);
        costs.insert("SMA".to_string(), 1);
        costs.insert("RSI".to_string(), 1);

        Self {
            calls_per_minute: 5,
            calls_per_day: 500,
            costs,
        }
    }
}

impl BudgetLimits {
    /// Cost units for an endpoint tag (1 if not configured)
    pub fn cost_of(&self, endpoint: &str) -> u32 {
        self.costs.get(endpoint).copied().unwrap_or(1).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// LRU safety net; key growth is otherwise bounded only by parameter space
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3_600,
            max_entries: 512,
        }
    }
}

/// Size governor thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingConfig {
    /// Byte budget for a serialized response payload
    pub max_response_bytes: usize,

    /// Tier 1: maximum length for free-text fields
    pub max_text_len: usize,

    /// Tier 2: time-series entries kept after history trimming
    pub history_keep: usize,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: 15_000,
            max_text_len: 100,
            history_keep: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub default_segment_size: usize,
    pub max_segment_size: usize,
    /// Effective segment size ceiling when maximal detail is requested
    pub detail_ceiling: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            default_segment_size: 5,
            max_segment_size: 10,
            detail_ceiling: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per external call, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".stockbridge").join("config.toml"))
    }
}
