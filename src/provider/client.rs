//! Market data provider client
//!
//! The provider enforces its own server-side rate limit whose rejections
//! must be distinguishable from other failures: they arrive as HTTP 429,
//! as a JSON "Note" about call frequency, or occasionally as an HTML error
//! page. All three map to `ProviderRateLimited`; everything else that is
//! not a hard API error maps to `ProviderUnavailable`.

use crate::config::ProviderConfig;
use crate::errors::{BrokerError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Provider endpoints the broker can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GlobalQuote,
    Overview,
    TimeSeriesDaily,
    SymbolSearch,
    Sma,
    Rsi,
}

impl Endpoint {
    /// Wire name, also used as the budget tracker's endpoint tag
    pub fn tag(&self) -> &'static str {
        match self {
            Endpoint::GlobalQuote => "GLOBAL_QUOTE",
            Endpoint::Overview => "OVERVIEW",
            Endpoint::TimeSeriesDaily => "TIME_SERIES_DAILY",
            Endpoint::SymbolSearch => "SYMBOL_SEARCH",
            Endpoint::Sma => "SMA",
            Endpoint::Rsi => "RSI",
        }
    }
}

/// Seam to the external provider; implemented over HTTP in production and
/// by scripted doubles in tests
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Invoke one provider endpoint; blocks on I/O, nothing else does
    async fn call(&self, endpoint: Endpoint, params: &[(String, String)]) -> Result<Value>;
}

/// HTTP client for an Alpha-Vantage-shaped API
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    config: ProviderConfig,
}

impl AlphaVantageClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(BrokerError::HttpError)?;

        Ok(Self { client, config })
    }

    /// Classify a successful HTTP response body
    fn interpret_body(data: Value) -> Result<Value> {
        if let Some(note) = data.get("Note").and_then(Value::as_str) {
            if note.contains("call frequency") {
                return Err(BrokerError::ProviderRateLimited(note.to_string()));
            }
        }

        if let Some(message) = data.get("Error Message").and_then(Value::as_str) {
            return Err(BrokerError::ProviderUnavailable(format!(
                "API error: {}",
                message
            )));
        }

        Ok(data)
    }
}

#[async_trait]
impl MarketData for AlphaVantageClient {
    async fn call(&self, endpoint: Endpoint, params: &[(String, String)]) -> Result<Value> {
        let api_key = self.config.api_key.clone().ok_or_else(|| {
            BrokerError::ConfigError("provider API key not configured".to_string())
        })?;

        let mut query: Vec<(String, String)> = vec![
            ("function".to_string(), endpoint.tag().to_string()),
            ("apikey".to_string(), api_key),
        ];
        query.extend(params.iter().cloned());

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrokerError::Timeout {
                        duration_ms: self.config.timeout_secs * 1_000,
                    }
                } else {
                    BrokerError::HttpError(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(BrokerError::ProviderRateLimited(
                "HTTP 429 Too Many Requests".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(BrokerError::ProviderUnavailable(format!(
                "HTTP {}",
                status
            )));
        }

        // Error pages sometimes arrive as HTML with a 200 status
        let text = response.text().await.map_err(BrokerError::HttpError)?;
        match serde_json::from_str::<Value>(&text) {
            Ok(data) => Self::interpret_body(data),
            Err(_) if text.contains("call frequency") => Err(BrokerError::ProviderRateLimited(
                "rate limit reported in non-JSON response".to_string(),
            )),
            Err(_) => Err(BrokerError::ProviderUnavailable(
                "unparseable provider response".to_string(),
            )),
        }
    }
}
