//! Portfolio store
//!
//! Read-side access to the user's holdings and stored financial records.
//! Unlike the market data provider this source carries no call budget, so
//! the orchestrator queries it freely. The trait seam lets tests provide
//! an in-memory store instead of a real backend.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One portfolio position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub company_name: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub current_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
}

/// A quarterly metrics record for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    /// Reporting quarter, e.g. "Q3 FY24". Records sort by this field,
    /// latest first.
    pub quarter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piotroski_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strengths: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weaknesses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fundamental_insights: Option<String>,
}

/// Stored financial history for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFinancials {
    pub symbol: String,
    pub company_name: String,
    pub financial_metrics: Vec<FinancialMetrics>,
}

impl StockFinancials {
    /// Most recent metrics record, by quarter ordering
    pub fn latest_metrics(&self) -> Option<&FinancialMetrics> {
        self.financial_metrics
            .iter()
            .max_by(|a, b| a.quarter.cmp(&b.quarter))
    }
}

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// All holdings, at most `limit` entries
    async fn get_holdings(&self, limit: usize) -> Result<Vec<Holding>>;

    /// Stored financials for one symbol, `None` if the store has no
    /// record for it
    async fn get_detailed_financials(&self, symbol: &str) -> Result<Option<StockFinancials>>;
}

/// Store backed by in-memory vectors, used in tests and demos
#[derive(Debug, Clone, Default)]
pub struct InMemoryPortfolioStore {
    holdings: Vec<Holding>,
    financials: Vec<StockFinancials>,
}

impl InMemoryPortfolioStore {
    pub fn new(holdings: Vec<Holding>, financials: Vec<StockFinancials>) -> Self {
        Self {
            holdings,
            financials,
        }
    }
}

#[async_trait]
impl PortfolioStore for InMemoryPortfolioStore {
    async fn get_holdings(&self, limit: usize) -> Result<Vec<Holding>> {
        Ok(self.holdings.iter().take(limit).cloned().collect())
    }

    async fn get_detailed_financials(&self, symbol: &str) -> Result<Option<StockFinancials>> {
        Ok(self
            .financials
            .iter()
            .find(|f| f.symbol.eq_ignore_ascii_case(symbol))
            .cloned())
    }
}
