//! Request orchestrator
//!
//! Composes the budget tracker, result cache, segment planner, size
//! governor, fallback provider, and external clients into one request
//! path. Ordering per request:
//!
//! 1. Validate parameters
//! 2. Consult the cache (unless force_refresh)
//! 3. Reserve budget, one check-and-record unit per provider call
//! 4. Fetch under the retry policy
//! 5. On denial or provider failure, serve stale cache or fallback content
//! 6. Shape the chosen payload and emit exactly one result
//!
//! The tracker and the cache each sit behind their own mutex; no lock is
//! held across an await point.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::broker::request::{OperationKind, OperationRequest};
use crate::broker::state::{RequestEvent, RequestState};
use crate::budget::{BudgetDecision, BudgetStatus, BudgetTracker};
use crate::cache::{fingerprint, ResultCache};
use crate::config::Config;
use crate::errors::Result;
use crate::fallback::FallbackProvider;
use crate::provider::{format_symbol, Endpoint, MarketData, RetryPolicy};
use crate::segment::{DetailLevel, SegmentPlanner};
use crate::shaping::types::{
    CompanyOverview, DailyBar, DataSource, FinancialBrief, HoldingAnalysis, IndicatorReading,
    PortfolioAnalysisPayload, PortfolioMetrics, PortfolioSummaryPayload, QuotePayload,
    ResultPayload, SectorCount, SegmentHint, ShapedResult, SymbolMatch, SymbolMatchesPayload,
    TechnicalAnalysisPayload, TrendingPayload, TrendingStock,
};
use crate::shaping::SizeGovernor;
use crate::store::{FinancialMetrics, PortfolioStore};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};

/// Symbols polled for the trending operation, most liquid first
const TRENDING_CANDIDATES: &[&str] = &[
    "RELIANCE",
    "TCS",
    "HDFCBANK",
    "INFY",
    "HINDUNILVR",
    "ICICIBANK",
    "SBIN",
    "BAJFINANCE",
];

/// Upper bound on holdings read per portfolio operation
const PORTFOLIO_FETCH_LIMIT: usize = 100;

/// Daily bars kept on a full quote before any shaping
const DAILY_BARS_FETCHED: usize = 100;

/// Indicator readings kept per technical indicator
const INDICATOR_READINGS_KEPT: usize = 30;

const SMA_PERIOD: u32 = 20;
const RSI_PERIOD: u32 = 14;

/// Retry hint when the provider failed for non-budget reasons
const PROVIDER_FAILURE_RETRY_SECS: u64 = 60;

/// One emitted result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerResponse {
    pub request_id: Uuid,
    pub operation: String,
    pub source: DataSource,
    pub result: ShapedResult,
}

/// The broker itself; cheap to share behind an `Arc`
pub struct Broker {
    config: Config,
    tracker: Arc<Mutex<BudgetTracker>>,
    cache: Arc<Mutex<ResultCache>>,
    planner: SegmentPlanner,
    governor: SizeGovernor,
    fallback: FallbackProvider,
    retry: RetryPolicy,
    provider: Arc<dyn MarketData>,
    store: Arc<dyn PortfolioStore>,
    telemetry: TelemetryCollector,
}

impl Broker {
    pub fn new(
        config: Config,
        provider: Arc<dyn MarketData>,
        store: Arc<dyn PortfolioStore>,
    ) -> Self {
        let tracker = BudgetTracker::new(config.budget.clone());
        let cache = ResultCache::new(config.cache.clone());
        let planner = SegmentPlanner::new(config.segments.clone());
        let governor = SizeGovernor::new(config.shaping.clone());
        let retry = RetryPolicy::new(config.retry.clone());

        Self {
            config,
            tracker: Arc::new(Mutex::new(tracker)),
            cache: Arc::new(Mutex::new(cache)),
            planner,
            governor,
            fallback: FallbackProvider::new(),
            retry,
            provider,
            store,
            telemetry: TelemetryCollector::new(),
        }
    }

    /// Handle to the shared telemetry collector
    pub fn telemetry(&self) -> TelemetryCollector {
        self.telemetry.clone()
    }

    /// Serve one request
    ///
    /// Only malformed input and store failures surface as errors; budget
    /// denials and provider failures degrade into substitute content.
    pub async fn handle(&self, request: OperationRequest) -> Result<BrokerResponse> {
        let mut state = RequestState::Received;

        if let Err(err) = request.validate() {
            self.advance(&mut state, RequestEvent::ValidationFailed)?;
            return Err(err);
        }
        self.advance(&mut state, RequestEvent::Validated)?;

        let (payload, source) = match &request.kind {
            OperationKind::ApiStatus => {
                self.advance(&mut state, RequestEvent::LocalData)?;
                (ResultPayload::ApiStatus(self.budget_status()), DataSource::Live)
            }
            OperationKind::PortfolioSummary => {
                self.advance(&mut state, RequestEvent::LocalData)?;
                (self.portfolio_summary().await?, DataSource::Live)
            }
            OperationKind::PortfolioAnalysis {
                segment,
                segment_size,
                include_details,
            } => {
                self.advance(&mut state, RequestEvent::LocalData)?;
                (
                    self.portfolio_analysis(*segment, *segment_size, *include_details)
                        .await?,
                    DataSource::Live,
                )
            }
            OperationKind::Quote { symbol } => {
                self.quote(&mut state, symbol, request.force_refresh).await?
            }
            OperationKind::TechnicalAnalysis { symbol } => {
                self.technical_analysis(&mut state, symbol, request.force_refresh)
                    .await?
            }
            OperationKind::Trending { limit } => {
                self.trending(&mut state, *limit, request.force_refresh)
                    .await?
            }
            OperationKind::SearchSymbol { keywords } => {
                self.search_symbol(&mut state, keywords, request.force_refresh)
                    .await?
            }
        };

        let operation = request.kind.label().to_string();
        let before_bytes = self.governor.estimate(&payload);
        let shaped = self.governor.shape(payload);
        if shaped.was_degraded() {
            self.telemetry.record(TelemetryEvent::ResponseShaped {
                operation: operation.clone(),
                before_bytes,
                after_bytes: shaped.estimated_bytes,
                timestamp: Instant::now(),
            });
        }
        self.advance(&mut state, RequestEvent::Shaped)?;

        Ok(BrokerResponse {
            request_id: request.id,
            operation,
            source,
            result: shaped,
        })
    }

    // --- Operation handlers ---

    async fn quote(
        &self,
        state: &mut RequestState,
        symbol: &str,
        force_refresh: bool,
    ) -> Result<(ResultPayload, DataSource)> {
        let symbol = format_symbol(symbol, &self.config.provider.default_exchange);
        let key = fingerprint("quote", &[("symbol", symbol.as_str())]);

        if !force_refresh {
            if let Some(payload) = self.cache_read(&key) {
                self.advance(state, RequestEvent::CacheHit)?;
                return Ok((payload, DataSource::Cache));
            }
        } else {
            self.note_cache_miss(&key);
        }
        self.advance(state, RequestEvent::CacheMiss)?;

        // The core quote must be affordable; overview and history are
        // best-effort enrichments.
        let decision = self.reserve(Endpoint::GlobalQuote);
        if !decision.allowed {
            self.advance(state, RequestEvent::Denied)?;
            return Ok(self.degraded("quote", Some(&key), 5, decision.retry_after_secs()));
        }
        self.advance(state, RequestEvent::Admitted)?;

        let quote_value = match self
            .fetch(Endpoint::GlobalQuote, vec![symbol_param(&symbol)])
            .await
        {
            Ok(value) => value,
            Err(err) if err.is_degradable() => {
                self.advance(state, RequestEvent::FetchDegraded)?;
                return Ok(self.degraded("quote", Some(&key), 5, PROVIDER_FAILURE_RETRY_SECS));
            }
            Err(err) => {
                self.advance(state, RequestEvent::Fault)?;
                return Err(err);
            }
        };

        let mut payload = parse_quote(&symbol, &quote_value);
        let mut skipped: Vec<&str> = Vec::new();

        match self.enrich(Endpoint::Overview, vec![symbol_param(&symbol)]).await {
            Some(value) => payload.overview = parse_overview(&value),
            None => skipped.push("company overview"),
        }
        match self
            .enrich(Endpoint::TimeSeriesDaily, vec![symbol_param(&symbol)])
            .await
        {
            Some(value) => payload.daily = parse_daily(&value),
            None => skipped.push("daily history"),
        }

        self.advance(state, RequestEvent::FetchSucceeded)?;

        if skipped.is_empty() {
            let payload = ResultPayload::Quote(payload);
            self.cache_write(&key, &payload);
            Ok((payload, DataSource::Live))
        } else {
            payload.note = Some(format!(
                "Omitted to preserve call budget: {}.",
                skipped.join(", ")
            ));
            // Partial results are never cached; a later request should get
            // the chance to fetch the full picture.
            Ok((ResultPayload::Quote(payload), DataSource::Mixed))
        }
    }

    async fn technical_analysis(
        &self,
        state: &mut RequestState,
        symbol: &str,
        force_refresh: bool,
    ) -> Result<(ResultPayload, DataSource)> {
        let symbol = format_symbol(symbol, &self.config.provider.default_exchange);
        let key = fingerprint("technical_analysis", &[("symbol", symbol.as_str())]);

        if !force_refresh {
            if let Some(payload) = self.cache_read(&key) {
                self.advance(state, RequestEvent::CacheHit)?;
                return Ok((payload, DataSource::Cache));
            }
        } else {
            self.note_cache_miss(&key);
        }
        self.advance(state, RequestEvent::CacheMiss)?;

        let mut indicators: Vec<IndicatorReading> = Vec::new();
        let mut missing: Vec<&str> = Vec::new();
        let mut admitted_any = false;
        let mut last_denial: Option<BudgetDecision> = None;

        for (endpoint, name, period) in [
            (Endpoint::Sma, "SMA", SMA_PERIOD),
            (Endpoint::Rsi, "RSI", RSI_PERIOD),
        ] {
            let decision = self.reserve(endpoint);
            if !decision.allowed {
                missing.push(name);
                last_denial = Some(decision);
                continue;
            }
            if !admitted_any {
                self.advance(state, RequestEvent::Admitted)?;
                admitted_any = true;
            }

            match self.fetch(endpoint, indicator_params(&symbol, period)).await {
                Ok(value) => indicators.extend(parse_indicator(name, period, &value)),
                Err(err) if err.is_degradable() => missing.push(name),
                Err(err) => {
                    self.advance(state, RequestEvent::Fault)?;
                    return Err(err);
                }
            }
        }

        if indicators.is_empty() {
            let retry_after = last_denial
                .map(|d| d.retry_after_secs())
                .unwrap_or(PROVIDER_FAILURE_RETRY_SECS);
            if admitted_any {
                self.advance(state, RequestEvent::FetchDegraded)?;
            } else {
                self.advance(state, RequestEvent::Denied)?;
            }
            return Ok(self.degraded("technical_analysis", Some(&key), 5, retry_after));
        }

        self.advance(state, RequestEvent::FetchSucceeded)?;

        let complete = missing.is_empty();
        let insights = if complete {
            None
        } else {
            Some(format!(
                "Partial analysis: {} unavailable under the current call budget.",
                missing.join(", ")
            ))
        };

        let payload = ResultPayload::TechnicalAnalysis(TechnicalAnalysisPayload {
            symbol,
            indicators,
            insights,
        });

        if complete {
            self.cache_write(&key, &payload);
            Ok((payload, DataSource::Live))
        } else {
            Ok((payload, DataSource::Mixed))
        }
    }

    async fn trending(
        &self,
        state: &mut RequestState,
        limit: usize,
        force_refresh: bool,
    ) -> Result<(ResultPayload, DataSource)> {
        let limit = limit.min(TRENDING_CANDIDATES.len());
        let limit_str = limit.to_string();
        let key = fingerprint("trending", &[("limit", limit_str.as_str())]);

        if !force_refresh {
            if let Some(payload) = self.cache_read(&key) {
                self.advance(state, RequestEvent::CacheHit)?;
                return Ok((payload, DataSource::Cache));
            }
        } else {
            self.note_cache_miss(&key);
        }
        self.advance(state, RequestEvent::CacheMiss)?;

        let mut stocks: Vec<TrendingStock> = Vec::new();
        let mut admitted_any = false;
        let mut cut_short = false;
        let mut retry_after = PROVIDER_FAILURE_RETRY_SECS;

        for candidate in TRENDING_CANDIDATES.iter().take(limit) {
            let decision = self.reserve(Endpoint::GlobalQuote);
            if !decision.allowed {
                retry_after = decision.retry_after_secs();
                cut_short = true;
                break;
            }
            if !admitted_any {
                self.advance(state, RequestEvent::Admitted)?;
                admitted_any = true;
            }

            let symbol = format_symbol(candidate, &self.config.provider.default_exchange);
            match self
                .fetch(Endpoint::GlobalQuote, vec![symbol_param(&symbol)])
                .await
            {
                Ok(value) => stocks.push(trending_from_quote(&symbol, candidate, &value)),
                Err(err) if err.is_degradable() => {
                    cut_short = true;
                    break;
                }
                Err(err) => {
                    self.advance(state, RequestEvent::Fault)?;
                    return Err(err);
                }
            }
        }

        if stocks.is_empty() {
            if admitted_any {
                self.advance(state, RequestEvent::FetchDegraded)?;
            } else {
                self.advance(state, RequestEvent::Denied)?;
            }
            return Ok(self.degraded("trending", Some(&key), limit, retry_after));
        }

        self.advance(state, RequestEvent::FetchSucceeded)?;

        if cut_short {
            // Top up from static reference data, skipping symbols already
            // fetched live.
            let have: Vec<String> = stocks.iter().map(|s| s.symbol.clone()).collect();
            let needed = limit.saturating_sub(stocks.len());
            stocks.extend(
                self.fallback
                    .static_trending(TRENDING_CANDIDATES.len())
                    .stocks
                    .into_iter()
                    .filter(|s| !have.contains(&s.symbol))
                    .take(needed),
            );
            sort_by_change_magnitude(&mut stocks);
            self.telemetry.record(TelemetryEvent::FallbackServed {
                operation: "trending".to_string(),
                stale_cache: false,
                timestamp: Instant::now(),
            });
            return Ok((
                ResultPayload::Trending(TrendingPayload { stocks }),
                DataSource::Mixed,
            ));
        }

        sort_by_change_magnitude(&mut stocks);
        let payload = ResultPayload::Trending(TrendingPayload { stocks });
        self.cache_write(&key, &payload);
        Ok((payload, DataSource::Live))
    }

    async fn search_symbol(
        &self,
        state: &mut RequestState,
        keywords: &str,
        force_refresh: bool,
    ) -> Result<(ResultPayload, DataSource)> {
        let key = fingerprint("search_symbol", &[("keywords", keywords)]);

        if !force_refresh {
            if let Some(payload) = self.cache_read(&key) {
                self.advance(state, RequestEvent::CacheHit)?;
                return Ok((payload, DataSource::Cache));
            }
        } else {
            self.note_cache_miss(&key);
        }
        self.advance(state, RequestEvent::CacheMiss)?;

        let decision = self.reserve(Endpoint::SymbolSearch);
        if !decision.allowed {
            self.advance(state, RequestEvent::Denied)?;
            return Ok(self.degraded(
                "search_symbol",
                Some(&key),
                5,
                decision.retry_after_secs(),
            ));
        }
        self.advance(state, RequestEvent::Admitted)?;

        let params = vec![("keywords".to_string(), keywords.trim().to_string())];
        match self.fetch(Endpoint::SymbolSearch, params).await {
            Ok(value) => {
                self.advance(state, RequestEvent::FetchSucceeded)?;
                let payload = ResultPayload::SymbolMatches(SymbolMatchesPayload {
                    matches: parse_search(&value),
                });
                self.cache_write(&key, &payload);
                Ok((payload, DataSource::Live))
            }
            Err(err) if err.is_degradable() => {
                self.advance(state, RequestEvent::FetchDegraded)?;
                Ok(self.degraded("search_symbol", Some(&key), 5, PROVIDER_FAILURE_RETRY_SECS))
            }
            Err(err) => {
                self.advance(state, RequestEvent::Fault)?;
                Err(err)
            }
        }
    }

    async fn portfolio_summary(&self) -> Result<ResultPayload> {
        let holdings = self.store.get_holdings(PORTFOLIO_FETCH_LIMIT).await?;
        let total = holdings.len();

        let average_price = if total > 0 {
            round2(
                holdings
                    .iter()
                    .map(|h| h.average_price.unwrap_or(h.purchase_price))
                    .sum::<f64>()
                    / total as f64,
            )
        } else {
            0.0
        };

        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for holding in &holdings {
            let sector = holding.sector.clone().unwrap_or_else(|| "Other".to_string());
            *counts.entry(sector).or_insert(0) += 1;
        }
        let mut sector_distribution: Vec<SectorCount> = counts
            .into_iter()
            .map(|(sector, count)| SectorCount { sector, count })
            .collect();
        sector_distribution.sort_by(|a, b| b.count.cmp(&a.count).then(a.sector.cmp(&b.sector)));

        let plan = self.planner.plan(total, 1, None, DetailLevel::Summary)?;
        let analysis_tip = if plan.total_segments > 0 {
            Some(format!(
                "Run portfolio_analysis over segments 1 through {} for per-holding detail.",
                plan.total_segments
            ))
        } else {
            None
        };

        Ok(ResultPayload::PortfolioSummary(PortfolioSummaryPayload {
            total_stocks: total,
            average_price,
            sector_distribution,
            segments: SegmentHint {
                total_segments: plan.total_segments,
                recommended_size: plan.segment_size,
            },
            analysis_tip,
        }))
    }

    async fn portfolio_analysis(
        &self,
        segment: usize,
        segment_size: Option<usize>,
        include_details: bool,
    ) -> Result<ResultPayload> {
        let holdings = self.store.get_holdings(PORTFOLIO_FETCH_LIMIT).await?;
        let detail = if include_details {
            DetailLevel::Full
        } else {
            DetailLevel::Summary
        };
        let plan = self.planner.plan(holdings.len(), segment, segment_size, detail)?;

        let mut analysed: Vec<HoldingAnalysis> = Vec::new();
        let mut total_investment = 0.0;
        let mut total_current_value = 0.0;
        let mut size_estimate = 0usize;
        let mut cut_for_size = false;

        for holding in &holdings[plan.range()] {
            let purchase_value = holding.quantity * holding.purchase_price;
            let current_value = holding.quantity * holding.current_price;
            let profit_loss = current_value - purchase_value;
            let profit_loss_percent = if purchase_value > 0.0 {
                round2(profit_loss / purchase_value * 100.0)
            } else {
                0.0
            };
            total_investment += purchase_value;
            total_current_value += current_value;

            let financials = if include_details {
                self.store
                    .get_detailed_financials(&holding.symbol)
                    .await?
                    .and_then(|f| f.latest_metrics().map(brief_from))
            } else {
                None
            };

            let analysis = HoldingAnalysis {
                symbol: holding.symbol.clone(),
                company_name: holding.company_name.clone(),
                quantity: holding.quantity,
                purchase_price: holding.purchase_price,
                current_price: holding.current_price,
                purchase_value: round2(purchase_value),
                current_value: round2(current_value),
                profit_loss: round2(profit_loss),
                profit_loss_percent,
                sector: holding.sector.clone(),
                financials,
            };
            size_estimate += serde_json::to_string(&analysis).map(|s| s.len()).unwrap_or(0);
            analysed.push(analysis);
            // Stop accumulating once the holdings alone would blow the
            // response cap; the caller can ask for a smaller segment.
            if size_estimate > self.config.shaping.max_response_bytes {
                cut_for_size = true;
                break;
            }
        }

        let total_profit_loss = total_current_value - total_investment;
        let total_profit_loss_percent = if total_investment > 0.0 {
            round2(total_profit_loss / total_investment * 100.0)
        } else {
            0.0
        };

        let note = if plan.is_empty() && !holdings.is_empty() {
            Some(format!(
                "Segment {} is past the end; the portfolio has {} segments of size {}.",
                segment, plan.total_segments, plan.segment_size
            ))
        } else if cut_for_size {
            Some(format!(
                "Stopped after {} of {} holdings to keep the response under {} bytes; request a smaller segment for the rest.",
                analysed.len(),
                plan.end - plan.start,
                self.config.shaping.max_response_bytes
            ))
        } else {
            None
        };

        Ok(ResultPayload::PortfolioAnalysis(PortfolioAnalysisPayload {
            metrics: PortfolioMetrics {
                total_stocks_in_portfolio: holdings.len(),
                stocks_in_segment: analysed.len(),
                segment,
                segment_size: plan.segment_size,
                total_segments: plan.total_segments,
                total_investment: round2(total_investment),
                total_current_value: round2(total_current_value),
                total_profit_loss: round2(total_profit_loss),
                total_profit_loss_percent,
            },
            holdings: analysed,
            note,
        }))
    }

    // --- Shared plumbing ---

    fn advance(&self, state: &mut RequestState, event: RequestEvent) -> Result<()> {
        let next = state.transition(event)?;
        if next != *state {
            self.telemetry.record(TelemetryEvent::StateTransition {
                from: state.display_name().to_string(),
                to: next.display_name().to_string(),
                timestamp: Instant::now(),
            });
        }
        *state = next;
        Ok(())
    }

    /// Read-only budget snapshot
    pub fn budget_status(&self) -> BudgetStatus {
        self.tracker.lock().unwrap().status()
    }

    /// One atomic check-and-record against the budget
    fn reserve(&self, endpoint: Endpoint) -> BudgetDecision {
        let decision = {
            let mut tracker = self.tracker.lock().unwrap();
            tracker.check_and_reserve(endpoint.tag())
        };

        if decision.allowed {
            self.telemetry.record(TelemetryEvent::CallAdmitted {
                endpoint: endpoint.tag().to_string(),
                cost: self.config.budget.cost_of(endpoint.tag()),
                remaining_minute: decision.remaining_minute,
                timestamp: Instant::now(),
            });
        } else {
            self.telemetry.record(TelemetryEvent::BudgetDenied {
                endpoint: endpoint.tag().to_string(),
                retry_after_secs: decision.retry_after_secs(),
                timestamp: Instant::now(),
            });
        }
        decision
    }

    /// Fetch one endpoint under the retry policy
    async fn fetch(&self, endpoint: Endpoint, params: Vec<(String, String)>) -> Result<Value> {
        let provider = Arc::clone(&self.provider);
        self.retry
            .run(|| {
                let provider = Arc::clone(&provider);
                let params = params.clone();
                async move { provider.call(endpoint, &params).await }
            })
            .await
    }

    /// Best-effort enrichment call: reserves its own budget and swallows
    /// degradable failures
    async fn enrich(&self, endpoint: Endpoint, params: Vec<(String, String)>) -> Option<Value> {
        let decision = self.reserve(endpoint);
        if !decision.allowed {
            return None;
        }
        match self.fetch(endpoint, params).await {
            Ok(value) => Some(value),
            Err(_) => None,
        }
    }

    fn cache_read(&self, key: &str) -> Option<ResultPayload> {
        let hit = {
            let mut cache = self.cache.lock().unwrap();
            cache.get(key).map(|value| {
                let age = cache.get_stale(key).map(|(_, age)| age).unwrap_or(0);
                (value, age)
            })
        };

        match hit {
            Some((value, age_secs)) => {
                self.telemetry.record(TelemetryEvent::CacheHit {
                    fingerprint: key.to_string(),
                    age_secs,
                    timestamp: Instant::now(),
                });
                serde_json::from_value(value).ok()
            }
            None => {
                self.note_cache_miss(key);
                None
            }
        }
    }

    fn note_cache_miss(&self, key: &str) {
        self.telemetry.record(TelemetryEvent::CacheMiss {
            fingerprint: key.to_string(),
            timestamp: Instant::now(),
        });
    }

    /// Store a fully-live payload under the configured TTL
    fn cache_write(&self, key: &str, payload: &ResultPayload) {
        if let Ok(value) = serde_json::to_value(payload) {
            self.cache.lock().unwrap().put(key, value);
        }
    }

    /// Substitute content for a denied or failed operation: stale cache
    /// first, static/advisory content second
    fn degraded(
        &self,
        operation: &str,
        key: Option<&str>,
        limit: usize,
        retry_after_secs: u64,
    ) -> (ResultPayload, DataSource) {
        if let Some(key) = key {
            let stale = self.cache.lock().unwrap().get_stale(key);
            if let Some((value, _age)) = stale {
                if let Ok(payload) = serde_json::from_value::<ResultPayload>(value) {
                    self.telemetry.record(TelemetryEvent::FallbackServed {
                        operation: operation.to_string(),
                        stale_cache: true,
                        timestamp: Instant::now(),
                    });
                    return (payload, DataSource::Fallback);
                }
            }
        }

        let status = self.budget_status();
        self.telemetry.record(TelemetryEvent::FallbackServed {
            operation: operation.to_string(),
            stale_cache: false,
            timestamp: Instant::now(),
        });
        (
            self.fallback
                .fallback_for(operation, limit, &status, retry_after_secs),
            DataSource::Fallback,
        )
    }
}

// --- Provider response parsing ---

fn symbol_param(symbol: &str) -> (String, String) {
    ("symbol".to_string(), symbol.to_string())
}

fn indicator_params(symbol: &str, period: u32) -> Vec<(String, String)> {
    vec![
        symbol_param(symbol),
        ("interval".to_string(), "daily".to_string()),
        ("time_period".to_string(), period.to_string()),
        ("series_type".to_string(), "close".to_string()),
    ]
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn num_field(value: &Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn parse_quote(symbol: &str, data: &Value) -> QuotePayload {
    let quote = data.get("Global Quote").unwrap_or(data);
    QuotePayload {
        symbol: symbol.to_string(),
        price: num_field(quote, "05. price"),
        change_percent: str_field(quote, "10. change percent"),
        overview: None,
        daily: Vec::new(),
        note: None,
    }
}

fn parse_overview(data: &Value) -> Option<CompanyOverview> {
    let name = str_field(data, "Name")?;
    Some(CompanyOverview {
        name,
        sector: str_field(data, "Sector"),
        market_cap: str_field(data, "MarketCapitalization"),
        description: str_field(data, "Description"),
    })
}

fn parse_daily(data: &Value) -> Vec<DailyBar> {
    let series = match data.get("Time Series (Daily)").and_then(Value::as_object) {
        Some(series) => series,
        None => return Vec::new(),
    };

    let mut bars: Vec<DailyBar> = series
        .iter()
        .filter_map(|(date, fields)| {
            Some(DailyBar {
                date: date.clone(),
                open: num_field(fields, "1. open")?,
                high: num_field(fields, "2. high")?,
                low: num_field(fields, "3. low")?,
                close: num_field(fields, "4. close")?,
                volume: fields
                    .get("5. volume")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())?,
            })
        })
        .collect();

    // Most recent first
    bars.sort_by(|a, b| b.date.cmp(&a.date));
    bars.truncate(DAILY_BARS_FETCHED);
    bars
}

fn parse_indicator(name: &str, period: u32, data: &Value) -> Vec<IndicatorReading> {
    let section = format!("Technical Analysis: {}", name);
    let series = match data.get(&section).and_then(Value::as_object) {
        Some(series) => series,
        None => return Vec::new(),
    };

    let mut readings: Vec<IndicatorReading> = series
        .iter()
        .filter_map(|(date, fields)| {
            Some(IndicatorReading {
                name: name.to_string(),
                value: num_field(fields, name)?,
                time_period: period,
                date: date.clone(),
            })
        })
        .collect();

    readings.sort_by(|a, b| b.date.cmp(&a.date));
    readings.truncate(INDICATOR_READINGS_KEPT);
    readings
}

fn parse_search(data: &Value) -> Vec<SymbolMatch> {
    data.get("bestMatches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .filter_map(|m| {
                    Some(SymbolMatch {
                        symbol: str_field(m, "1. symbol")?,
                        name: str_field(m, "2. name")?,
                        region: str_field(m, "4. region"),
                        currency: str_field(m, "8. currency"),
                    })
                })
                .filter(is_indian_listing)
                .collect()
        })
        .unwrap_or_default()
}

/// Keep only symbols tradeable on NSE or BSE.
fn is_indian_listing(m: &SymbolMatch) -> bool {
    m.symbol.ends_with(".NSE")
        || m.symbol.ends_with(".BSE")
        || m.region.as_deref().is_some_and(|r| r.contains("India"))
}

/// Strongest movers first, by absolute change percent.
fn sort_by_change_magnitude(stocks: &mut [TrendingStock]) {
    stocks.sort_by(|a, b| {
        change_magnitude(b)
            .partial_cmp(&change_magnitude(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn change_magnitude(stock: &TrendingStock) -> f64 {
    stock
        .change_percentage
        .as_deref()
        .and_then(|s| s.trim_end_matches('%').parse::<f64>().ok())
        .map(f64::abs)
        .unwrap_or(0.0)
}

/// Derive a trending entry from a live quote
fn trending_from_quote(symbol: &str, candidate: &str, data: &Value) -> TrendingStock {
    let quote = data.get("Global Quote").unwrap_or(data);
    let change_str = str_field(quote, "10. change percent");
    let change: f64 = change_str
        .as_deref()
        .and_then(|s| s.trim_end_matches('%').parse().ok())
        .unwrap_or(0.0);

    let strength = if change.abs() >= 2.0 {
        "STRONG"
    } else if change.abs() >= 1.0 {
        "MEDIUM"
    } else {
        "WEAK"
    };
    let momentum = if change >= 0.0 { "BULLISH" } else { "BEARISH" };

    TrendingStock {
        symbol: symbol.to_string(),
        company_name: candidate.to_string(),
        price: num_field(quote, "05. price").map(|p| format!("{:.2}", p)),
        change_percentage: change_str,
        sector: None,
        trend_strength: strength.to_string(),
        price_momentum: momentum.to_string(),
        trend_insights: Some(format!(
            "{} has shown {} {} momentum over recent sessions.",
            candidate,
            strength.to_lowercase(),
            momentum.to_lowercase()
        )),
        is_fallback_data: false,
    }
}

fn brief_from(metrics: &FinancialMetrics) -> FinancialBrief {
    FinancialBrief {
        quarter: metrics.quarter.clone(),
        pe_ratio: metrics.pe_ratio.clone(),
        piotroski_score: metrics.piotroski_score.clone(),
        strengths: metrics.strengths.clone(),
        weaknesses: metrics.weaknesses.clone(),
        insights: metrics.fundamental_insights.clone(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
