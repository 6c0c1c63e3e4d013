//! Result cache keyed by request fingerprints
//! Absorbs duplicate requests before they ever reach the budget tracker

pub mod fingerprint;
pub mod store;

pub use fingerprint::fingerprint;
pub use store::ResultCache;
