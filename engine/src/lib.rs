// Engine library root
// Synthetic market-data engine: catalog, candle generation, support/resistance
// zones, the heartbeat-driven session and the analysis client it calls.

pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod indicators;
pub mod models;
pub mod services;

pub use context::AppContext;
pub use error::{EngineError, Result};
