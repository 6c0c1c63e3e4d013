//! Stock symbol normalization for NSE/BSE markets
//!
//! Bare symbols get the configured default exchange prefix, purely numeric
//! codes are treated as BSE scrip codes, and non-Indian exchange prefixes
//! are rewritten to NSE so every outbound request targets a supported
//! exchange.

/// Exchanges the broker supports
const SUPPORTED_EXCHANGES: [&str; 2] = ["NSE", "BSE"];

/// Normalize a symbol to `EXCHANGE:TICKER` form
pub fn format_symbol(symbol: &str, default_exchange: &str) -> String {
    let symbol = symbol.trim();

    if let Some((exchange, ticker)) = symbol.split_once(':') {
        let exchange = exchange.to_ascii_uppercase();
        if SUPPORTED_EXCHANGES.contains(&exchange.as_str()) {
            return format!("{}:{}", exchange, ticker.to_ascii_uppercase());
        }
        // Unsupported exchange prefix, rewrite to NSE
        return format!("NSE:{}", ticker.to_ascii_uppercase());
    }

    if !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_digit()) {
        return format!("BSE:{}", symbol);
    }

    format!("{}:{}", default_exchange, symbol.to_ascii_uppercase())
}

/// True when the symbol carries a supported exchange prefix (or none,
/// which normalization treats as the default exchange)
pub fn is_supported(symbol: &str) -> bool {
    match symbol.split_once(':') {
        Some((exchange, _)) => {
            SUPPORTED_EXCHANGES.contains(&exchange.to_ascii_uppercase().as_str())
        }
        None => true,
    }
}
