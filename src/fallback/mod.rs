//! Substitute content for budget-denied operations

pub mod provider;

pub use provider::FallbackProvider;
