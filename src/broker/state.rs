//! Request lifecycle state machine
//!
//! Deterministic finite state machine driven by the orchestrator:
//! - Safety: no invalid states reachable
//! - Liveness: every path ends in Done or Failed
//! - Determinism: unique next state per event
//!
//! Budget denials and provider failures are not failure paths here; both
//! route into Shaping with substitute content, because the broker degrades
//! rather than refuses.

use crate::errors::{BrokerError, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle states of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    /// Parameters not yet validated
    Received,

    /// Consulting the result cache
    CacheCheck,

    /// Consulting the call budget
    BudgetCheck,

    /// Calling the external provider
    Fetching,

    /// Applying the size governor to the chosen payload
    Shaping,

    /// Result emitted (terminal)
    Done,

    /// Request rejected or unrecoverable (terminal)
    Failed,
}

/// Events that drive state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// Parameters validated
    Validated,

    /// Parameters malformed
    ValidationFailed,

    /// Fresh cache entry found
    CacheHit,

    /// No usable cache entry
    CacheMiss,

    /// Operation needs no cache or budget access
    LocalData,

    /// Budget reservation succeeded
    Admitted,

    /// Budget reservation refused; substitute content follows
    Denied,

    /// Provider call returned data
    FetchSucceeded,

    /// Provider call failed past retry; substitute content follows
    FetchDegraded,

    /// Shaped result ready
    Shaped,

    /// Unrecoverable fault
    Fault,
}

impl RequestState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Done | RequestState::Failed)
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    /// ```text
    /// 1.  Received    → CacheCheck  (on: Validated)
    /// 2.  Received    → Failed      (on: ValidationFailed)
    /// 3.  CacheCheck  → Shaping     (on: CacheHit)
    /// 4.  CacheCheck  → BudgetCheck (on: CacheMiss)
    /// 5.  CacheCheck  → Shaping     (on: LocalData)
    /// 6.  BudgetCheck → Fetching    (on: Admitted)
    /// 7.  BudgetCheck → Shaping     (on: Denied)
    /// 8.  Fetching    → Shaping     (on: FetchSucceeded | FetchDegraded)
    /// 9.  Shaping     → Done        (on: Shaped)
    /// 10. Done        → Done        (terminal)
    /// 11. Failed      → Failed      (terminal)
    /// 12. *           → Failed      (on: Fault)
    /// ```
    pub fn transition(&self, event: RequestEvent) -> Result<RequestState> {
        use RequestEvent::*;
        use RequestState::*;

        // Faults can occur from any state
        if event == Fault {
            return Ok(Failed);
        }

        let next_state = match (self, event) {
            // From Received
            (Received, Validated) => CacheCheck,
            (Received, ValidationFailed) => Failed,

            // From CacheCheck
            (CacheCheck, CacheHit) => Shaping,
            (CacheCheck, CacheMiss) => BudgetCheck,
            (CacheCheck, LocalData) => Shaping,

            // From BudgetCheck
            (BudgetCheck, Admitted) => Fetching,
            (BudgetCheck, Denied) => Shaping,

            // From Fetching
            (Fetching, FetchSucceeded) => Shaping,
            (Fetching, FetchDegraded) => Shaping,

            // From Shaping
            (Shaping, Shaped) => Done,

            // Terminal states (self-loops)
            (Done, _) => Done,
            (Failed, _) => Failed,

            // Invalid transitions
            (from, event) => {
                return Err(BrokerError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next_state)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            RequestState::Received => "Received",
            RequestState::CacheCheck => "Checking Cache",
            RequestState::BudgetCheck => "Checking Budget",
            RequestState::Fetching => "Fetching",
            RequestState::Shaping => "Shaping Response",
            RequestState::Done => "Completed",
            RequestState::Failed => "Failed",
        }
    }
}
