//! Rolling-window call budget tracking
//! Gates every outbound provider call against minute and day quotas

pub mod tracker;
pub mod types;

pub use tracker::BudgetTracker;
pub use types::{BudgetDecision, BudgetStatus, CallRecord, DenialReason};
