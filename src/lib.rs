// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod snapshot;
pub mod strategy;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use models::*;
pub use snapshot::MarketSnapshot;
pub use strategy::Strategy;
