//! Result payload shapes
//!
//! Every operation returns one of a finite set of typed payloads, so the
//! size governor's truncation and removal steps act on known fields
//! instead of probing free-form JSON for things to cut.

use crate::budget::BudgetStatus;
use serde::{Deserialize, Serialize};

/// Degradation tiers, applied in order until the payload fits its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationTier {
    /// Tier 1: free-text fields truncated with a marker
    TextTruncated,
    /// Tier 2: time-series history dropped to the most recent entries
    HistoryTrimmed,
    /// Tier 3: non-essential metadata removed
    MetadataStripped,
    /// Tier 4: payload replaced by a minimal summary
    MinimalSummary,
}

/// Where the data in a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Fetched from the provider for this request
    Live,
    /// Served from the result cache
    Cache,
    /// Substitute content from the fallback provider
    Fallback,
    /// Some sub-results live, others fallback
    Mixed,
}

/// The finite set of result shapes the broker produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    Quote(QuotePayload),
    TechnicalAnalysis(TechnicalAnalysisPayload),
    PortfolioSummary(PortfolioSummaryPayload),
    PortfolioAnalysis(PortfolioAnalysisPayload),
    Trending(TrendingPayload),
    SymbolMatches(SymbolMatchesPayload),
    ApiStatus(BudgetStatus),
    /// Tier-4 emergency shape: counts and identifiers only
    Minimal(MinimalPayload),
    /// Fallback note when no better substitute content exists
    Advisory(AdvisoryPayload),
}

impl ResultPayload {
    /// Short label used in minimal summaries and telemetry
    pub fn label(&self) -> &'static str {
        match self {
            ResultPayload::Quote(_) => "quote",
            ResultPayload::TechnicalAnalysis(_) => "technical_analysis",
            ResultPayload::PortfolioSummary(_) => "portfolio_summary",
            ResultPayload::PortfolioAnalysis(_) => "portfolio_analysis",
            ResultPayload::Trending(_) => "trending",
            ResultPayload::SymbolMatches(_) => "symbol_matches",
            ResultPayload::ApiStatus(_) => "api_status",
            ResultPayload::Minimal(_) => "minimal",
            ResultPayload::Advisory(_) => "advisory",
        }
    }

    /// True for shapes that are already at the degradation floor
    pub fn is_minimal(&self) -> bool {
        matches!(
            self,
            ResultPayload::Minimal(_) | ResultPayload::Advisory(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotePayload {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<String>,
    /// Company overview, stripped at tier 3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<CompanyOverview>,
    /// Recent daily bars, trimmed at tier 2
    #[serde(default)]
    pub daily: Vec<DailyBar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyOverview {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    /// Free text, truncated at tier 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    /// Indicator name, e.g. "SMA" or "RSI"
    pub name: String,
    pub value: f64,
    pub time_period: u32,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysisPayload {
    pub symbol: String,
    pub indicators: Vec<IndicatorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorCount {
    pub sector: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentHint {
    pub total_segments: usize,
    pub recommended_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummaryPayload {
    pub total_stocks: usize,
    pub average_price: f64,
    pub sector_distribution: Vec<SectorCount>,
    /// How to drive segmented analysis over this portfolio
    pub segments: SegmentHint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_tip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialBrief {
    pub quarter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piotroski_score: Option<String>,
    /// Free text, truncated at tier 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strengths: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weaknesses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingAnalysis {
    pub symbol: String,
    pub company_name: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub current_price: f64,
    pub purchase_value: f64,
    pub current_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percent: f64,
    /// Stripped at tier 3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financials: Option<FinancialBrief>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_stocks_in_portfolio: usize,
    pub stocks_in_segment: usize,
    pub segment: usize,
    pub segment_size: usize,
    pub total_segments: usize,
    pub total_investment: f64,
    pub total_current_value: f64,
    pub total_profit_loss: f64,
    pub total_profit_loss_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAnalysisPayload {
    pub metrics: PortfolioMetrics,
    pub holdings: Vec<HoldingAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingStock {
    pub symbol: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percentage: Option<String>,
    /// Stripped at tier 3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub trend_strength: String,
    pub price_momentum: String,
    /// Free text, truncated at tier 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_insights: Option<String>,
    #[serde(default)]
    pub is_fallback_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingPayload {
    pub stocks: Vec<TrendingStock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatchesPayload {
    pub matches: Vec<SymbolMatch>,
}

/// Tier-4 payload: counts and identifiers only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalPayload {
    pub operation: String,
    pub item_count: usize,
    pub identifiers: Vec<String>,
    pub note: String,
}

/// Explanatory fallback content carrying retry guidance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryPayload {
    pub message: String,
    pub remaining_minute: u32,
    pub remaining_day: u32,
    pub retry_after_secs: u64,
}

/// The outer payload after size-governor processing
///
/// `tier` records the deepest degradation applied, `None` for a payload
/// returned in full, so callers can distinguish full from degraded
/// answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapedResult {
    pub payload: ResultPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<DegradationTier>,
    pub estimated_bytes: usize,
}

impl ShapedResult {
    pub fn was_degraded(&self) -> bool {
        self.tier.is_some()
    }
}
