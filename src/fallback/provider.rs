//! Fallback content provider
//!
//! Consulted only after the budget tracker denies a call (or the provider
//! fails past retry). Always returns non-empty content: static reference
//! data where it exists for the operation kind, otherwise an advisory note
//! carrying the remaining budget and suggested retry timing. The
//! orchestrator checks for a stale cache entry before reaching here, so
//! this is the last line before a caller would otherwise see a bare
//! rate-limit failure.

use crate::budget::BudgetStatus;
use crate::shaping::types::{AdvisoryPayload, ResultPayload, TrendingPayload, TrendingStock};

/// Static substitute content per operation kind
#[derive(Debug, Clone, Default)]
pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }

    /// Substitute payload for a denied operation
    ///
    /// `operation` is the payload label of the operation being degraded.
    pub fn fallback_for(
        &self,
        operation: &str,
        limit: usize,
        status: &BudgetStatus,
        retry_after_secs: u64,
    ) -> ResultPayload {
        match operation {
            "trending" => ResultPayload::Trending(self.static_trending(limit)),
            _ => ResultPayload::Advisory(self.advisory(operation, status, retry_after_secs)),
        }
    }

    /// Static trending data, marked so callers can tell it from live data
    pub fn static_trending(&self, limit: usize) -> TrendingPayload {
        let stocks = static_trending_stocks()
            .into_iter()
            .take(limit.max(1))
            .collect();
        TrendingPayload { stocks }
    }

    /// Explanatory note with remaining budget and retry guidance
    pub fn advisory(
        &self,
        operation: &str,
        status: &BudgetStatus,
        retry_after_secs: u64,
    ) -> AdvisoryPayload {
        AdvisoryPayload {
            message: format!(
                "Live data for '{}' is unavailable: the external call budget is exhausted. Retry in about {}s.",
                operation, retry_after_secs.max(1)
            ),
            remaining_minute: status.remaining_minute,
            remaining_day: status.remaining_day,
            retry_after_secs: retry_after_secs.max(1),
        }
    }
}

fn fallback_stock(
    symbol: &str,
    name: &str,
    price: &str,
    change: &str,
    sector: &str,
    strength: &str,
    momentum: &str,
    insight: &str,
) -> TrendingStock {
    TrendingStock {
        symbol: symbol.to_string(),
        company_name: name.to_string(),
        price: Some(price.to_string()),
        change_percentage: Some(change.to_string()),
        sector: Some(sector.to_string()),
        trend_strength: strength.to_string(),
        price_momentum: momentum.to_string(),
        trend_insights: Some(insight.to_string()),
        is_fallback_data: true,
    }
}

/// Reference data for major NSE stocks, used when live quotes are not
/// affordable
fn static_trending_stocks() -> Vec<TrendingStock> {
    vec![
        fallback_stock(
            "NSE:RELIANCE",
            "RELIANCE",
            "2,856.15",
            "1.5%",
            "Oil & Gas",
            "MEDIUM",
            "BULLISH",
            "Reliance has shown medium bullish momentum recently with steady buying interest.",
        ),
        fallback_stock(
            "NSE:TCS",
            "TCS",
            "3,567.80",
            "0.8%",
            "IT Services",
            "WEAK",
            "BULLISH",
            "TCS has shown weak bullish momentum with moderate trading volumes.",
        ),
        fallback_stock(
            "NSE:HDFCBANK",
            "HDFCBANK",
            "1,678.25",
            "2.1%",
            "Banking",
            "STRONG",
            "BULLISH",
            "HDFC Bank has shown strong bullish momentum with increasing volumes.",
        ),
        fallback_stock(
            "NSE:INFY",
            "INFY",
            "1,489.50",
            "-0.7%",
            "IT Services",
            "WEAK",
            "BEARISH",
            "Infosys has shown weak bearish momentum with limited selling pressure.",
        ),
        fallback_stock(
            "NSE:HINDUNILVR",
            "HINDUNILVR",
            "2,742.30",
            "0.4%",
            "Consumer Goods",
            "WEAK",
            "BULLISH",
            "Hindustan Unilever has shown weak bullish momentum recently.",
        ),
        fallback_stock(
            "NSE:ICICIBANK",
            "ICICIBANK",
            "1,056.75",
            "1.8%",
            "Banking",
            "MEDIUM",
            "BULLISH",
            "ICICI Bank has shown medium bullish momentum with good buying support.",
        ),
        fallback_stock(
            "NSE:SBIN",
            "SBIN",
            "789.60",
            "3.2%",
            "Banking",
            "STRONG",
            "BULLISH",
            "SBI has shown strong bullish momentum with high volumes.",
        ),
        fallback_stock(
            "NSE:BAJFINANCE",
            "BAJFINANCE",
            "7,124.50",
            "-1.2%",
            "Financial Services",
            "MEDIUM",
            "BEARISH",
            "Bajaj Finance has shown medium bearish momentum with some selling pressure.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> BudgetStatus {
        BudgetStatus {
            remaining_minute: 0,
            remaining_day: 495,
            used_this_minute: 5,
            used_today: 5,
            recent_calls: Vec::new(),
        }
    }

    #[test]
    fn test_trending_fallback_is_static_data() {
        let provider = FallbackProvider::new();
        let payload = provider.fallback_for("trending", 5, &status(), 40);

        match payload {
            ResultPayload::Trending(t) => {
                assert_eq!(t.stocks.len(), 5);
                assert!(t.stocks.iter().all(|s| s.is_fallback_data));
            }
            other => panic!("expected trending payload, got {:?}", other),
        }
    }

    #[test]
    fn test_trending_fallback_never_empty() {
        let provider = FallbackProvider::new();
        let payload = provider.static_trending(0);
        assert!(!payload.stocks.is_empty());
    }

    #[test]
    fn test_advisory_carries_budget_and_retry() {
        let provider = FallbackProvider::new();
        let advisory = provider.advisory("quote", &status(), 40);

        assert_eq!(advisory.remaining_minute, 0);
        assert_eq!(advisory.remaining_day, 495);
        assert_eq!(advisory.retry_after_secs, 40);
        assert!(advisory.message.contains("quote"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let provider = FallbackProvider::new();
        let a = provider.fallback_for("quote", 5, &status(), 40);
        let b = provider.fallback_for("quote", 5, &status(), 40);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_retry_rounded_up() {
        let provider = FallbackProvider::new();
        let advisory = provider.advisory("quote", &status(), 0);
        assert_eq!(advisory.retry_after_secs, 1);
    }
}
