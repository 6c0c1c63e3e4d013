//! Incoming operation requests

use crate::errors::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The operations the broker serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationKind {
    /// Live quote with overview and recent daily bars
    Quote { symbol: String },
    /// SMA and RSI readings for one symbol
    TechnicalAnalysis { symbol: String },
    /// Sector and size overview of the stored portfolio
    PortfolioSummary,
    /// One segment of per-holding analysis
    PortfolioAnalysis {
        segment: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        segment_size: Option<usize>,
        #[serde(default)]
        include_details: bool,
    },
    /// Currently trending stocks
    Trending { limit: usize },
    /// Symbol lookup by keywords
    SearchSymbol { keywords: String },
    /// Remaining call budget, served without consuming any
    ApiStatus,
}

impl OperationKind {
    /// Label used in fingerprints, telemetry, and minimal summaries
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Quote { .. } => "quote",
            OperationKind::TechnicalAnalysis { .. } => "technical_analysis",
            OperationKind::PortfolioSummary => "portfolio_summary",
            OperationKind::PortfolioAnalysis { .. } => "portfolio_analysis",
            OperationKind::Trending { .. } => "trending",
            OperationKind::SearchSymbol { .. } => "search_symbol",
            OperationKind::ApiStatus => "api_status",
        }
    }

    /// Whether results of this operation go through the result cache
    ///
    /// Portfolio operations read the local store and budget status reads
    /// the tracker; neither spends provider budget, so neither is cached.
    pub fn cacheable(&self) -> bool {
        matches!(
            self,
            OperationKind::Quote { .. }
                | OperationKind::TechnicalAnalysis { .. }
                | OperationKind::Trending { .. }
                | OperationKind::SearchSymbol { .. }
        )
    }
}

/// One request into the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Skip the cache read; a fresh result still gets cached
    #[serde(default)]
    pub force_refresh: bool,
}

impl OperationRequest {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            force_refresh: false,
        }
    }

    pub fn with_force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    /// Reject malformed parameters before any budget or cache access
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            OperationKind::Quote { symbol } | OperationKind::TechnicalAnalysis { symbol } => {
                if symbol.trim().is_empty() {
                    return Err(BrokerError::InvalidInput("symbol must not be empty".to_string()));
                }
            }
            OperationKind::SearchSymbol { keywords } => {
                if keywords.trim().is_empty() {
                    return Err(BrokerError::InvalidInput(
                        "search keywords must not be empty".to_string(),
                    ));
                }
            }
            OperationKind::PortfolioAnalysis { segment, .. } => {
                if *segment == 0 {
                    return Err(BrokerError::InvalidInput(
                        "segment index is 1-based and must be >= 1".to_string(),
                    ));
                }
            }
            OperationKind::Trending { limit } => {
                if *limit == 0 {
                    return Err(BrokerError::InvalidInput(
                        "trending limit must be >= 1".to_string(),
                    ));
                }
            }
            OperationKind::PortfolioSummary | OperationKind::ApiStatus => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_symbol_rejected() {
        let request = OperationRequest::new(OperationKind::Quote {
            symbol: "   ".to_string(),
        });
        assert!(matches!(
            request.validate().unwrap_err(),
            BrokerError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_zero_segment_rejected() {
        let request = OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 0,
            segment_size: None,
            include_details: false,
        });
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_valid_request_passes() {
        let request = OperationRequest::new(OperationKind::Quote {
            symbol: "RELIANCE".to_string(),
        });
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_cacheable_split() {
        assert!(OperationKind::Quote {
            symbol: "TCS".to_string()
        }
        .cacheable());
        assert!(!OperationKind::ApiStatus.cacheable());
        assert!(!OperationKind::PortfolioSummary.cacheable());
    }

    #[test]
    fn test_request_round_trips_through_json() {
        let request = OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 2,
            segment_size: Some(5),
            include_details: true,
        });

        let json = serde_json::to_string(&request).unwrap();
        let back: OperationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
