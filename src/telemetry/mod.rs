//! Telemetry for broker request handling
//!
//! Collects per-request events (cache hits, budget decisions, fallback
//! use, shaping) and aggregate counters. Cloned handles share the same
//! underlying collector.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    CacheHit {
        fingerprint: String,
        age_secs: u64,
        timestamp: Instant,
    },
    CacheMiss {
        fingerprint: String,
        timestamp: Instant,
    },
    CallAdmitted {
        endpoint: String,
        cost: u32,
        remaining_minute: u32,
        timestamp: Instant,
    },
    BudgetDenied {
        endpoint: String,
        retry_after_secs: u64,
        timestamp: Instant,
    },
    FallbackServed {
        operation: String,
        stale_cache: bool,
        timestamp: Instant,
    },
    ResponseShaped {
        operation: String,
        before_bytes: usize,
        after_bytes: usize,
        timestamp: Instant,
    },
    StateTransition {
        from: String,
        to: String,
        timestamp: Instant,
    },
}

/// Aggregate counters over all recorded events
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub calls_admitted: usize,
    pub budget_denials: usize,
    pub fallbacks_served: usize,
    pub responses_shaped: usize,
    pub state_transitions: usize,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                TelemetryEvent::CacheHit { .. } => stats.cache_hits += 1,
                TelemetryEvent::CacheMiss { .. } => stats.cache_misses += 1,
                TelemetryEvent::CallAdmitted { .. } => stats.calls_admitted += 1,
                TelemetryEvent::BudgetDenied { .. } => stats.budget_denials += 1,
                TelemetryEvent::FallbackServed { .. } => stats.fallbacks_served += 1,
                TelemetryEvent::ResponseShaped { .. } => stats.responses_shaped += 1,
                TelemetryEvent::StateTransition { .. } => stats.state_transitions += 1,
            }
        }

        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap().clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Fraction of lookups served from cache
    pub fn cache_hit_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap();
        let total = stats.cache_hits + stats.cache_misses;
        if total == 0 {
            0.0
        } else {
            stats.cache_hits as f64 / total as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        let stats = collector.get_stats();
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn test_record_cache_events() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::CacheHit {
            fingerprint: "quote|symbol=sbin".to_string(),
            age_secs: 12,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::CacheMiss {
            fingerprint: "quote|symbol=tcs".to_string(),
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(collector.event_count(), 2);
    }

    #[test]
    fn test_cache_hit_rate() {
        let collector = TelemetryCollector::new();

        collector.record(TelemetryEvent::CacheHit {
            fingerprint: "a".to_string(),
            age_secs: 1,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::CacheHit {
            fingerprint: "b".to_string(),
            age_secs: 2,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::CacheMiss {
            fingerprint: "c".to_string(),
            timestamp: Instant::now(),
        });

        let rate = collector.cache_hit_rate();
        assert!((rate - 0.666).abs() < 0.01); // 2/3 = 0.666...
    }

    #[test]
    fn test_budget_counters() {
        let collector = TelemetryCollector::new();

        collector.record(TelemetryEvent::CallAdmitted {
            endpoint: "GLOBAL_QUOTE".to_string(),
            cost: 1,
            remaining_minute: 4,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::BudgetDenied {
            endpoint: "GLOBAL_QUOTE".to_string(),
            retry_after_secs: 42,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::FallbackServed {
            operation: "trending".to_string(),
            stale_cache: false,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.calls_admitted, 1);
        assert_eq!(stats.budget_denials, 1);
        assert_eq!(stats.fallbacks_served, 1);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();

        for i in 0..10 {
            collector.record(TelemetryEvent::CacheMiss {
                fingerprint: format!("op{}", i),
                timestamp: Instant::now(),
            });
        }

        let recent = collector.recent_events(3);
        assert_eq!(recent.len(), 3);
    }

    #[test]
    fn test_shaping_event() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::ResponseShaped {
            operation: "portfolio_analysis".to_string(),
            before_bytes: 18000,
            after_bytes: 9000,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.responses_shaped, 1);
    }
}
