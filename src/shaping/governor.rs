//! Tiered size governor
//!
//! Degrades a payload one tier at a time until its estimated size fits
//! the byte budget:
//!
//! 1. Truncate free-text fields (with a "..." marker)
//! 2. Drop time-series history to the most recent entries
//! 3. Remove non-essential metadata fields
//! 4. Replace the payload with a minimal summary
//!
//! Estimation is the serialized JSON length, which is monotonic: a fuller
//! version of a structure never estimates smaller than a more degraded
//! one. Degradation is tagged on the result, never silent.

use crate::config::ShapingConfig;
use crate::shaping::types::{
    DegradationTier, MinimalPayload, ResultPayload, ShapedResult,
};

/// Marker appended to truncated text
const TRUNCATION_MARKER: &str = "...";

/// Adaptive response-size controller
#[derive(Debug, Clone)]
pub struct SizeGovernor {
    config: ShapingConfig,
}

impl SizeGovernor {
    pub fn new(config: ShapingConfig) -> Self {
        Self { config }
    }

    /// Estimated serialized size of a payload in bytes
    pub fn estimate(&self, payload: &ResultPayload) -> usize {
        serde_json::to_string(payload).map(|s| s.len()).unwrap_or(usize::MAX)
    }

    /// Shape a payload against the configured byte budget
    pub fn shape(&self, payload: ResultPayload) -> ShapedResult {
        self.shape_with_budget(payload, self.config.max_response_bytes)
    }

    /// Shape a payload against an explicit byte budget
    ///
    /// Minimal and advisory payloads are the degradation floor and pass
    /// through unchanged even when they exceed the budget.
    pub fn shape_with_budget(&self, payload: ResultPayload, byte_budget: usize) -> ShapedResult {
        if payload.is_minimal() {
            let estimated_bytes = self.estimate(&payload);
            return ShapedResult {
                payload,
                tier: None,
                estimated_bytes,
            };
        }

        let mut current = payload;
        let mut applied: Option<DegradationTier> = None;

        let tiers = [
            DegradationTier::TextTruncated,
            DegradationTier::HistoryTrimmed,
            DegradationTier::MetadataStripped,
        ];

        let mut estimated = self.estimate(&current);
        if estimated <= byte_budget {
            return ShapedResult {
                payload: current,
                tier: None,
                estimated_bytes: estimated,
            };
        }

        for tier in tiers {
            current = self.apply_tier(current, tier);
            applied = Some(tier);
            estimated = self.estimate(&current);
            if estimated <= byte_budget {
                return ShapedResult {
                    payload: current,
                    tier: applied,
                    estimated_bytes: estimated,
                };
            }
        }

        // Emergency floor: counts and identifiers only
        let minimal = ResultPayload::Minimal(self.summarize(&current));
        let estimated_bytes = self.estimate(&minimal);
        ShapedResult {
            payload: minimal,
            tier: Some(DegradationTier::MinimalSummary),
            estimated_bytes,
        }
    }

    fn apply_tier(&self, payload: ResultPayload, tier: DegradationTier) -> ResultPayload {
        match tier {
            DegradationTier::TextTruncated => self.truncate_text(payload),
            DegradationTier::HistoryTrimmed => self.trim_history(payload),
            DegradationTier::MetadataStripped => self.strip_metadata(payload),
            DegradationTier::MinimalSummary => ResultPayload::Minimal(self.summarize(&payload)),
        }
    }

    /// Tier 1: bound every free-text field
    fn truncate_text(&self, payload: ResultPayload) -> ResultPayload {
        let max = self.config.max_text_len;
        match payload {
            ResultPayload::Quote(mut quote) => {
                truncate_opt(&mut quote.note, max);
                if let Some(overview) = quote.overview.as_mut() {
                    truncate_opt(&mut overview.description, max);
                }
                ResultPayload::Quote(quote)
            }
            ResultPayload::TechnicalAnalysis(mut ta) => {
                truncate_opt(&mut ta.insights, max);
                ResultPayload::TechnicalAnalysis(ta)
            }
            ResultPayload::PortfolioSummary(mut summary) => {
                truncate_opt(&mut summary.analysis_tip, max);
                ResultPayload::PortfolioSummary(summary)
            }
            ResultPayload::PortfolioAnalysis(mut analysis) => {
                truncate_opt(&mut analysis.note, max);
                for holding in analysis.holdings.iter_mut() {
                    if let Some(financials) = holding.financials.as_mut() {
                        truncate_opt(&mut financials.strengths, max);
                        truncate_opt(&mut financials.weaknesses, max);
                        truncate_opt(&mut financials.insights, max);
                    }
                }
                ResultPayload::PortfolioAnalysis(analysis)
            }
            ResultPayload::Trending(mut trending) => {
                for stock in trending.stocks.iter_mut() {
                    truncate_opt(&mut stock.trend_insights, max);
                }
                ResultPayload::Trending(trending)
            }
            other => other,
        }
    }

    /// Tier 2: keep only the most recent time-series entries
    fn trim_history(&self, payload: ResultPayload) -> ResultPayload {
        let keep = self.config.history_keep;
        match payload {
            ResultPayload::Quote(mut quote) => {
                quote.daily.truncate(keep);
                ResultPayload::Quote(quote)
            }
            ResultPayload::TechnicalAnalysis(mut ta) => {
                ta.indicators.truncate(keep);
                ResultPayload::TechnicalAnalysis(ta)
            }
            other => other,
        }
    }

    /// Tier 3: drop non-essential metadata
    fn strip_metadata(&self, payload: ResultPayload) -> ResultPayload {
        match payload {
            ResultPayload::Quote(mut quote) => {
                quote.overview = None;
                quote.note = None;
                ResultPayload::Quote(quote)
            }
            ResultPayload::TechnicalAnalysis(mut ta) => {
                ta.insights = None;
                ResultPayload::TechnicalAnalysis(ta)
            }
            ResultPayload::PortfolioSummary(mut summary) => {
                summary.analysis_tip = None;
                ResultPayload::PortfolioSummary(summary)
            }
            ResultPayload::PortfolioAnalysis(mut analysis) => {
                for holding in analysis.holdings.iter_mut() {
                    holding.sector = None;
                    holding.financials = None;
                }
                ResultPayload::PortfolioAnalysis(analysis)
            }
            ResultPayload::Trending(mut trending) => {
                for stock in trending.stocks.iter_mut() {
                    stock.sector = None;
                    stock.trend_insights = None;
                }
                ResultPayload::Trending(trending)
            }
            ResultPayload::SymbolMatches(mut matches) => {
                for m in matches.matches.iter_mut() {
                    m.region = None;
                    m.currency = None;
                }
                ResultPayload::SymbolMatches(matches)
            }
            other => other,
        }
    }

    /// Build the tier-4 minimal summary for a payload
    fn summarize(&self, payload: &ResultPayload) -> MinimalPayload {
        let identifiers = match payload {
            ResultPayload::Quote(q) => vec![q.symbol.clone()],
            ResultPayload::TechnicalAnalysis(ta) => vec![ta.symbol.clone()],
            ResultPayload::PortfolioSummary(_) => Vec::new(),
            ResultPayload::PortfolioAnalysis(a) => {
                a.holdings.iter().map(|h| h.symbol.clone()).collect()
            }
            ResultPayload::Trending(t) => t.stocks.iter().map(|s| s.symbol.clone()).collect(),
            ResultPayload::SymbolMatches(m) => {
                m.matches.iter().map(|s| s.symbol.clone()).collect()
            }
            _ => Vec::new(),
        };

        MinimalPayload {
            operation: payload.label().to_string(),
            item_count: identifiers.len(),
            identifiers,
            note: "Response simplified due to size constraints. Request fewer items or a smaller segment for full detail.".to_string(),
        }
    }
}

impl Default for SizeGovernor {
    fn default() -> Self {
        Self::new(ShapingConfig::default())
    }
}

/// Truncate an optional text field to `max` bytes, appending a marker
///
/// Only shortens: a field at or under the limit is left untouched, and
/// the truncated form (including the marker) never exceeds the limit.
fn truncate_opt(field: &mut Option<String>, max: usize) {
    if let Some(text) = field {
        if text.len() > max {
            let cut = max.saturating_sub(TRUNCATION_MARKER.len());
            let boundary = text
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|&i| i <= cut)
                .last()
                .unwrap_or(0);
            text.truncate(boundary);
            text.push_str(TRUNCATION_MARKER);
        }
    }
}
