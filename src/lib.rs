pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod rl;

pub use config::{AppConfig, LoggingConfig};
pub use error::{Result, TradeGymError};
pub use rl::{
    MultiAgentEnvironment, PriceSeries, RLConfig, TradingAgent, TradingEnvironment,
};
