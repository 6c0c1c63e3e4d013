//! Budget system type definitions

use crate::errors::WindowKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted external call, immutable once recorded
///
/// Owned exclusively by the tracker; pruned once older than the longest
/// tracked window.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub timestamp: DateTime<Utc>,
    /// Cost in quota units, always >= 1
    pub cost: u32,
    /// Endpoint tag, e.g. "GLOBAL_QUOTE"
    pub endpoint: String,
}

/// Why an admission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenialReason {
    /// The window that would be exceeded (minute takes precedence)
    pub window: WindowKind,
    /// Seconds until enough of that window has rolled off
    pub retry_after_secs: u64,
}

/// Outcome of a single preflight check, produced per check and discarded
#[derive(Debug, Clone)]
pub struct BudgetDecision {
    pub allowed: bool,
    /// Cost units still available in the minute window
    pub remaining_minute: u32,
    /// Cost units still available in the day window
    pub remaining_day: u32,
    pub reason: Option<DenialReason>,
}

impl BudgetDecision {
    /// Seconds a denied caller should wait before retrying (0 if allowed)
    pub fn retry_after_secs(&self) -> u64 {
        self.reason.map(|r| r.retry_after_secs).unwrap_or(0)
    }
}

/// Summary of a recent call for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub timestamp: String,
    pub endpoint: String,
    pub cost: u32,
}

/// Read-only snapshot of the tracker for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub remaining_minute: u32,
    pub remaining_day: u32,
    pub used_this_minute: u32,
    pub used_today: u32,
    /// Last few accepted calls, most recent last
    pub recent_calls: Vec<CallSummary>,
}
