//! Rolling-window budget tracker
//!
//! Guarantees:
//! - The cost sum inside any sliding window never exceeds that window's limit
//! - A denied reservation leaves the recorded-call sequence untouched
//! - Admission refuses, never clamps: either the full cost fits or nothing
//!   is recorded
//!
//! Windows roll over the trailing 60 seconds / 24 hours rather than fixed
//! calendar buckets, so a burst straddling a boundary cannot double-spend.

use crate::budget::types::{BudgetDecision, BudgetStatus, CallRecord, CallSummary, DenialReason};
use crate::config::BudgetLimits;
use crate::errors::WindowKind;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Recent calls exposed through `status()`
const RECENT_CALLS_SHOWN: usize = 10;

/// Call budget tracker over two rolling windows
///
/// Not internally synchronized: the orchestrator holds it behind a single
/// mutex so that check-and-record is one atomic unit.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    limits: BudgetLimits,

    /// Accepted calls, oldest first, pruned past the day window
    records: VecDeque<CallRecord>,
}

impl BudgetTracker {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            records: VecDeque::new(),
        }
    }

    /// Cost units for an endpoint tag, per configuration
    pub fn cost_of(&self, endpoint: &str) -> u32 {
        self.limits.cost_of(endpoint)
    }

    /// Atomically check affordability and, if affordable, record the call
    ///
    /// The minute window takes precedence in the denial reason when both
    /// windows would be exceeded.
    pub fn check_and_reserve(&mut self, endpoint: &str) -> BudgetDecision {
        self.check_and_reserve_at(endpoint, Utc::now())
    }

    /// Clock-injectable variant of [`check_and_reserve`](Self::check_and_reserve)
    pub fn check_and_reserve_at(&mut self, endpoint: &str, now: DateTime<Utc>) -> BudgetDecision {
        self.prune(now);

        let cost = self.cost_of(endpoint);
        let minute_used = self.window_sum(now, Duration::seconds(60));
        let day_used = self.window_sum(now, Duration::days(1));

        let minute_fits = minute_used + cost <= self.limits.calls_per_minute;
        let day_fits = day_used + cost <= self.limits.calls_per_day;

        if minute_fits && day_fits {
            self.records.push_back(CallRecord {
                timestamp: now,
                cost,
                endpoint: endpoint.to_string(),
            });

            return BudgetDecision {
                allowed: true,
                remaining_minute: self.limits.calls_per_minute - (minute_used + cost),
                remaining_day: self.limits.calls_per_day - (day_used + cost),
                reason: None,
            };
        }

        let reason = if !minute_fits {
            DenialReason {
                window: WindowKind::Minute,
                retry_after_secs: self.retry_after(now, Duration::seconds(60)),
            }
        } else {
            DenialReason {
                window: WindowKind::Day,
                retry_after_secs: self.retry_after(now, Duration::days(1)),
            }
        };

        BudgetDecision {
            allowed: false,
            remaining_minute: self.limits.calls_per_minute.saturating_sub(minute_used),
            remaining_day: self.limits.calls_per_day.saturating_sub(day_used),
            reason: Some(reason),
        }
    }

    /// Read-only snapshot for diagnostics; no side effects on the records
    pub fn status(&self) -> BudgetStatus {
        self.status_at(Utc::now())
    }

    /// Clock-injectable variant of [`status`](Self::status)
    pub fn status_at(&self, now: DateTime<Utc>) -> BudgetStatus {
        let minute_cutoff = now - Duration::seconds(60);
        let day_cutoff = now - Duration::days(1);

        let mut minute_used = 0u32;
        let mut day_used = 0u32;
        for record in &self.records {
            if record.timestamp > day_cutoff {
                day_used += record.cost;
                if record.timestamp > minute_cutoff {
                    minute_used += record.cost;
                }
            }
        }

        let recent_calls = self
            .records
            .iter()
            .rev()
            .take(RECENT_CALLS_SHOWN)
            .map(|r| CallSummary {
                timestamp: r.timestamp.format("%H:%M:%S").to_string(),
                endpoint: r.endpoint.clone(),
                cost: r.cost,
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        BudgetStatus {
            remaining_minute: self.limits.calls_per_minute.saturating_sub(minute_used),
            remaining_day: self.limits.calls_per_day.saturating_sub(day_used),
            used_this_minute: minute_used,
            used_today: day_used,
            recent_calls,
        }
    }

    /// Number of records currently retained
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Drop records older than the longest tracked window
    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(1);
        while let Some(front) = self.records.front() {
            if front.timestamp <= cutoff {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Sum of costs strictly inside the trailing window
    fn window_sum(&self, now: DateTime<Utc>, window: Duration) -> u32 {
        let cutoff = now - window;
        self.records
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .map(|r| r.cost)
            .sum()
    }

    /// Seconds until the oldest in-window record rolls off
    fn retry_after(&self, now: DateTime<Utc>, window: Duration) -> u64 {
        let cutoff = now - window;
        self.records
            .iter()
            .find(|r| r.timestamp > cutoff)
            .map(|r| {
                let rolls_off = r.timestamp + window;
                (rolls_off - now).num_seconds().max(1) as u64
            })
            .unwrap_or(1)
    }
}
