//! Stockbridge - Rate-limit-aware market data broker
//!
//! Brokers requests against a quota-limited external market data API.
//! Every provider call passes an admission check against rolling minute
//! and day budgets; results are cached, oversized responses are degraded
//! tier by tier, and denied requests receive substitute content instead
//! of an error.
//!
//! # Architecture
//!
//! - **budget**: rolling-window call admission
//! - **cache**: fingerprint-keyed result cache with TTL and stale reads
//! - **segment**: deterministic slicing of large portfolio workloads
//! - **shaping**: typed payloads and the tiered size governor
//! - **provider**: HTTP client, symbol normalization, retry policy
//! - **fallback**: static and advisory substitute content
//! - **store**: read-side portfolio holdings and financials
//! - **broker**: the orchestrator tying it all together

pub mod broker;
pub mod budget;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod provider;
pub mod segment;
pub mod shaping;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use broker::{Broker, BrokerResponse, OperationKind, OperationRequest};
pub use errors::{BrokerError, Result};
pub use shaping::types::DataSource;
