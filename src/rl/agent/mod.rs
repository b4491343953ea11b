//! Learning agents

pub mod trading_agent;

pub use trading_agent::{ActionSelection, ModelMetadata, ModelSnapshot, TradingAgent, TrainingMetrics};
