//! Request brokering
//!
//! Entry point of the crate: validates requests, consults the cache and
//! call budget, fetches from the provider, and shapes the outcome. Every
//! request emits exactly one shaped result, degraded rather than refused
//! when the budget or the provider gives out.

pub mod orchestrator;
pub mod request;
pub mod state;

pub use orchestrator::{Broker, BrokerResponse};
pub use request::{OperationKind, OperationRequest};
pub use state::{RequestEvent, RequestState};
