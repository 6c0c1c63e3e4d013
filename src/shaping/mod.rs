//! Adaptive response-size control
//! Typed result payloads and the tiered size governor that bounds them

pub mod governor;
pub mod types;

pub use governor::SizeGovernor;
pub use types::{DegradationTier, ResultPayload, ShapedResult};
