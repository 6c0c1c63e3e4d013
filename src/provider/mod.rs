//! External market data provider access
//! Trait seam, HTTP client, symbol normalization, and the retry policy

pub mod client;
pub mod retry;
pub mod symbols;

pub use client::{AlphaVantageClient, Endpoint, MarketData};
pub use retry::RetryPolicy;
pub use symbols::{format_symbol, is_supported};
