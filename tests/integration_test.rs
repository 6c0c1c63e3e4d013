//! Integration tests for the stockbridge broker
//!
//! Drive the full request path with a scripted provider double: no
//! network, no real clock pressure, deterministic budget behavior.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use stockbridge::broker::{Broker, OperationKind, OperationRequest};
use stockbridge::config::Config;
use stockbridge::errors::{BrokerError, Result};
use stockbridge::provider::{Endpoint, MarketData};
use stockbridge::shaping::types::{DataSource, ResultPayload};
use stockbridge::store::{
    FinancialMetrics, Holding, InMemoryPortfolioStore, StockFinancials,
};

/// Provider double answering every endpoint with canned data
struct ScriptedProvider {
    calls: AtomicU32,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketData for ScriptedProvider {
    async fn call(&self, endpoint: Endpoint, _params: &[(String, String)]) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = match endpoint {
            Endpoint::GlobalQuote => json!({
                "Global Quote": {
                    "01. symbol": "RELIANCE.NSE",
                    "05. price": "2856.15",
                    "10. change percent": "1.5%"
                }
            }),
            Endpoint::Overview => json!({
                "Name": "Reliance Industries",
                "Sector": "Oil & Gas",
                "MarketCapitalization": "19000000000000",
                "Description": "Indian conglomerate."
            }),
            Endpoint::TimeSeriesDaily => json!({
                "Time Series (Daily)": {
                    "2024-03-01": {"1. open": "2830", "2. high": "2860", "3. low": "2820", "4. close": "2856.15", "5. volume": "4100000"},
                    "2024-02-29": {"1. open": "2810", "2. high": "2835", "3. low": "2800", "4. close": "2830", "5. volume": "3900000"}
                }
            }),
            Endpoint::Sma => json!({
                "Technical Analysis: SMA": {
                    "2024-03-01": {"SMA": "2801.40"},
                    "2024-02-29": {"SMA": "2795.10"}
                }
            }),
            Endpoint::Rsi => json!({
                "Technical Analysis: RSI": {
                    "2024-03-01": {"RSI": "61.2"},
                    "2024-02-29": {"RSI": "58.9"}
                }
            }),
            Endpoint::SymbolSearch => json!({
                "bestMatches": [
                    {"1. symbol": "TCS.BSE", "2. name": "Tata Consultancy Services", "4. region": "India/Bombay", "8. currency": "INR"}
                ]
            }),
        };
        Ok(value)
    }
}

/// Provider double that fails every call
struct FailingProvider;

#[async_trait]
impl MarketData for FailingProvider {
    async fn call(&self, _endpoint: Endpoint, _params: &[(String, String)]) -> Result<Value> {
        Err(BrokerError::ProviderUnavailable("connection refused".to_string()))
    }
}

fn test_config(per_minute: u32, per_day: u32) -> Config {
    let mut config = Config::default();
    config.budget.calls_per_minute = per_minute;
    config.budget.calls_per_day = per_day;
    config.retry.max_attempts = 1;
    config.retry.base_delay_ms = 1;
    config
}

fn holding(symbol: &str, sector: &str, quantity: f64, purchase: f64, current: f64) -> Holding {
    Holding {
        symbol: symbol.to_string(),
        company_name: symbol.to_string(),
        quantity,
        purchase_price: purchase,
        current_price: current,
        sector: Some(sector.to_string()),
        average_price: Some(purchase),
    }
}

fn seven_stock_portfolio() -> InMemoryPortfolioStore {
    let holdings = vec![
        holding("SBIN", "Banking", 50.0, 600.0, 789.6),
        holding("HDFCBANK", "Banking", 20.0, 1500.0, 1678.25),
        holding("ICICIBANK", "Banking", 30.0, 900.0, 1056.75),
        holding("TCS", "IT Services", 10.0, 3200.0, 3567.8),
        holding("INFY", "IT Services", 25.0, 1550.0, 1489.5),
        holding("RELIANCE", "Oil & Gas", 15.0, 2400.0, 2856.15),
        holding("HINDUNILVR", "Consumer Goods", 12.0, 2500.0, 2742.3),
    ];
    let financials = vec![StockFinancials {
        symbol: "RELIANCE".to_string(),
        company_name: "Reliance Industries".to_string(),
        financial_metrics: vec![FinancialMetrics {
            quarter: "2024-Q3".to_string(),
            pe_ratio: Some("24.1".to_string()),
            piotroski_score: Some("7".to_string()),
            strengths: Some("Diversified revenue streams".to_string()),
            weaknesses: Some("Capital intensive".to_string()),
            fundamental_insights: Some("Steady earnings growth".to_string()),
        }],
    }];
    InMemoryPortfolioStore::new(holdings, financials)
}

fn broker_with(config: Config, provider: Arc<dyn MarketData>) -> Broker {
    Broker::new(config, provider, Arc::new(seven_stock_portfolio()))
}

#[tokio::test]
async fn test_quote_live_then_cached() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(5, 500), provider.clone());

    let request = OperationRequest::new(OperationKind::Quote {
        symbol: "RELIANCE".to_string(),
    });
    let first = broker.handle(request.clone()).await.unwrap();

    assert_eq!(first.source, DataSource::Live);
    match &first.result.payload {
        ResultPayload::Quote(q) => {
            assert_eq!(q.symbol, "NSE:RELIANCE");
            assert_eq!(q.price, Some(2856.15));
            assert!(q.overview.is_some());
            assert_eq!(q.daily.len(), 2);
        }
        other => panic!("expected quote, got {:?}", other),
    }
    // Quote plus two enrichments
    assert_eq!(provider.call_count(), 3);

    let second = broker.handle(request).await.unwrap();
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(provider.call_count(), 3, "cache hit must not call the provider");
    assert_eq!(second.result.payload, first.result.payload);
}

#[tokio::test]
async fn test_budget_exhaustion_serves_stale_cache() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(5, 500), provider.clone());

    // Five admitted calls drain the minute window
    let first = broker
        .handle(OperationRequest::new(OperationKind::Trending { limit: 5 }))
        .await
        .unwrap();
    assert_eq!(first.source, DataSource::Live);
    assert_eq!(provider.call_count(), 5);

    // Same operation with force_refresh: budget denied, stale cache wins
    let second = broker
        .handle(OperationRequest::new(OperationKind::Trending { limit: 5 }).with_force_refresh())
        .await
        .unwrap();
    assert_eq!(second.source, DataSource::Fallback);
    assert_eq!(provider.call_count(), 5);
    assert_eq!(second.result.payload, first.result.payload);
}

#[tokio::test]
async fn test_exhausted_budget_without_cache_serves_static_trending() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(0, 500), provider.clone());

    let response = broker
        .handle(OperationRequest::new(OperationKind::Trending { limit: 5 }))
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Fallback);
    assert_eq!(provider.call_count(), 0);
    match &response.result.payload {
        ResultPayload::Trending(t) => {
            assert_eq!(t.stocks.len(), 5);
            assert!(t.stocks.iter().all(|s| s.is_fallback_data));
        }
        other => panic!("expected trending fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exhausted_budget_quote_gets_advisory() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(0, 500), provider);

    let response = broker
        .handle(OperationRequest::new(OperationKind::Quote {
            symbol: "TCS".to_string(),
        }))
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Fallback);
    match &response.result.payload {
        ResultPayload::Advisory(a) => {
            assert_eq!(a.remaining_minute, 0);
            assert!(a.retry_after_secs >= 1);
            assert!(a.message.contains("quote"));
        }
        other => panic!("expected advisory, got {:?}", other),
    }
}

#[tokio::test]
async fn test_partial_budget_quote_is_mixed_and_uncached() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(1, 500), provider.clone());

    let request = OperationRequest::new(OperationKind::Quote {
        symbol: "RELIANCE".to_string(),
    });
    let response = broker.handle(request.clone()).await.unwrap();

    // Core quote fetched, both enrichments denied
    assert_eq!(response.source, DataSource::Mixed);
    assert_eq!(provider.call_count(), 1);
    match &response.result.payload {
        ResultPayload::Quote(q) => {
            assert_eq!(q.price, Some(2856.15));
            assert!(q.overview.is_none());
            assert!(q.note.is_some());
        }
        other => panic!("expected quote, got {:?}", other),
    }

    // Partial results were not cached: the retry is denied outright
    let retry = broker.handle(request).await.unwrap();
    assert_eq!(retry.source, DataSource::Fallback);
}

#[tokio::test]
async fn test_technical_analysis_mixed_when_one_indicator_denied() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(1, 500), provider.clone());

    let response = broker
        .handle(OperationRequest::new(OperationKind::TechnicalAnalysis {
            symbol: "RELIANCE".to_string(),
        }))
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Mixed);
    match &response.result.payload {
        ResultPayload::TechnicalAnalysis(ta) => {
            assert!(ta.indicators.iter().all(|i| i.name == "SMA"));
            assert!(!ta.indicators.is_empty());
            assert!(ta.insights.as_ref().unwrap().contains("RSI"));
        }
        other => panic!("expected technical analysis, got {:?}", other),
    }
}

#[tokio::test]
async fn test_provider_failure_degrades_instead_of_erroring() {
    let broker = broker_with(test_config(5, 500), Arc::new(FailingProvider));

    let response = broker
        .handle(OperationRequest::new(OperationKind::Quote {
            symbol: "SBIN".to_string(),
        }))
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Fallback);
    assert!(matches!(
        response.result.payload,
        ResultPayload::Advisory(_)
    ));
}

#[tokio::test]
async fn test_symbol_search_round_trip() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(5, 500), provider);

    let response = broker
        .handle(OperationRequest::new(OperationKind::SearchSymbol {
            keywords: "tata".to_string(),
        }))
        .await
        .unwrap();

    assert_eq!(response.source, DataSource::Live);
    match &response.result.payload {
        ResultPayload::SymbolMatches(m) => {
            assert_eq!(m.matches.len(), 1);
            assert_eq!(m.matches[0].symbol, "TCS.BSE");
        }
        other => panic!("expected symbol matches, got {:?}", other),
    }
}

#[tokio::test]
async fn test_portfolio_summary_reads_store_without_budget() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(5, 500), provider.clone());

    let response = broker
        .handle(OperationRequest::new(OperationKind::PortfolioSummary))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 0);
    match &response.result.payload {
        ResultPayload::PortfolioSummary(s) => {
            assert_eq!(s.total_stocks, 7);
            assert_eq!(s.sector_distribution[0].sector, "Banking");
            assert_eq!(s.sector_distribution[0].count, 3);
            assert_eq!(s.segments.total_segments, 2);
        }
        other => panic!("expected portfolio summary, got {:?}", other),
    }
}

#[tokio::test]
async fn test_portfolio_analysis_segment_walk() {
    let broker = broker_with(test_config(5, 500), Arc::new(ScriptedProvider::new()));

    // Segment 2 of size 5 over 7 holdings covers the last two
    let second = broker
        .handle(OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 2,
            segment_size: Some(5),
            include_details: false,
        }))
        .await
        .unwrap();
    match &second.result.payload {
        ResultPayload::PortfolioAnalysis(a) => {
            assert_eq!(a.metrics.total_stocks_in_portfolio, 7);
            assert_eq!(a.metrics.stocks_in_segment, 2);
            assert_eq!(a.metrics.total_segments, 2);
            assert_eq!(a.holdings[0].symbol, "RELIANCE");
            assert!(a.note.is_none());
        }
        other => panic!("expected portfolio analysis, got {:?}", other),
    }

    // Walking past the end yields an empty segment with metadata, not an error
    let past = broker
        .handle(OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 3,
            segment_size: Some(5),
            include_details: false,
        }))
        .await
        .unwrap();
    match &past.result.payload {
        ResultPayload::PortfolioAnalysis(a) => {
            assert!(a.holdings.is_empty());
            assert_eq!(a.metrics.total_segments, 2);
            assert!(a.note.as_ref().unwrap().contains("past the end"));
        }
        other => panic!("expected portfolio analysis, got {:?}", other),
    }
}

#[tokio::test]
async fn test_portfolio_analysis_stops_accumulating_at_size_cap() {
    let mut config = test_config(5, 500);
    // Cap so tight a single holding overshoots it
    config.shaping.max_response_bytes = 1;
    let broker = Broker::new(
        config,
        Arc::new(ScriptedProvider::new()),
        Arc::new(seven_stock_portfolio()),
    );

    let response = broker
        .handle(OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 1,
            segment_size: Some(5),
            include_details: false,
        }))
        .await
        .unwrap();

    assert!(response.result.was_degraded());
    match &response.result.payload {
        ResultPayload::Minimal(m) => {
            // Accumulation stopped after the first holding, so the
            // summary names one symbol instead of all five
            assert_eq!(m.item_count, 1);
            assert_eq!(m.identifiers, vec!["SBIN".to_string()]);
        }
        other => panic!("expected minimal summary, got {:?}", other),
    }
}

#[tokio::test]
async fn test_portfolio_analysis_details_pull_financials() {
    let broker = broker_with(test_config(5, 500), Arc::new(ScriptedProvider::new()));

    let response = broker
        .handle(OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 2,
            segment_size: Some(5),
            include_details: true,
        }))
        .await
        .unwrap();

    match &response.result.payload {
        ResultPayload::PortfolioAnalysis(a) => {
            // Detail mode caps the segment at the configured ceiling of 3
            assert_eq!(a.metrics.segment_size, 3);
            let reliance = a
                .holdings
                .iter()
                .find(|h| h.symbol == "RELIANCE")
                .expect("segment 2 of size 3 covers RELIANCE");
            let financials = reliance.financials.as_ref().unwrap();
            assert_eq!(financials.quarter, "2024-Q3");
            assert_eq!(financials.pe_ratio.as_deref(), Some("24.1"));
        }
        other => panic!("expected portfolio analysis, got {:?}", other),
    }
}

#[tokio::test]
async fn test_api_status_consumes_no_budget() {
    let provider = Arc::new(ScriptedProvider::new());
    let broker = broker_with(test_config(5, 500), provider.clone());

    for _ in 0..3 {
        let response = broker
            .handle(OperationRequest::new(OperationKind::ApiStatus))
            .await
            .unwrap();
        match &response.result.payload {
            ResultPayload::ApiStatus(status) => {
                assert_eq!(status.remaining_minute, 5);
                assert_eq!(status.used_today, 0);
            }
            other => panic!("expected api status, got {:?}", other),
        }
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_input_surfaces_as_error() {
    let broker = broker_with(test_config(5, 500), Arc::new(ScriptedProvider::new()));

    let err = broker
        .handle(OperationRequest::new(OperationKind::Quote {
            symbol: "".to_string(),
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidInput(_)));

    let err = broker
        .handle(OperationRequest::new(OperationKind::PortfolioAnalysis {
            segment: 0,
            segment_size: None,
            include_details: false,
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidInput(_)));
}

#[tokio::test]
async fn test_telemetry_records_the_request_path() {
    let broker = broker_with(test_config(0, 500), Arc::new(ScriptedProvider::new()));

    broker
        .handle(OperationRequest::new(OperationKind::Trending { limit: 3 }))
        .await
        .unwrap();

    let stats = broker.telemetry().get_stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.budget_denials, 1);
    assert_eq!(stats.fallbacks_served, 1);
    assert!(stats.state_transitions >= 4);
}
