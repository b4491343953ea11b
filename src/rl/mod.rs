//! Reinforcement Learning Module
//!
//! A simulated single-instrument market for training and evaluating
//! trading agents.
//!
//! # Features
//!
//! - **State Representation**: 50-dimensional normalized observations of
//!   price history, volume, indicators and portfolio
//! - **Action Space**: Seven discrete actions (hold, three buy sizes, three sell sizes)
//! - **Algorithms**: PPO losses with GAE advantages
//! - **Multi-Agent**: Shared price path with market impact, rank bonus and
//!   crowding penalty
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tradegym::rl::{EnvironmentConfig, PriceSeries, RLConfig, TradingAgent, TradingEnvironment};
//!
//! # fn main() -> tradegym::Result<()> {
//! let data = Arc::new(PriceSeries::flat(1500, 100.0, 1_000_000.0)?);
//! let mut env = TradingEnvironment::new(EnvironmentConfig::default(), data)?;
//! let mut agent = TradingAgent::new(RLConfig::default())?;
//! let result = tradegym::rl::run_episode(&mut agent, &mut env)?;
//! println!("return: {:.2}%", result.total_return * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod algorithms;
pub mod config;
pub mod core;
pub mod data;
pub mod environment;
pub mod memory;
pub mod metrics;
pub mod networks;
pub mod training;

// Config exports
pub use config::{
    AgentKind, AgentSpec, EnvironmentConfig, MultiAgentConfig, RLConfig, TrainingConfig,
};

// Core exports
pub use core::{
    Action, ActionType, Indicators, MarketState, PortfolioState, State, NUM_ACTIONS, STATE_SIZE,
};

// Data exports
pub use data::{generate_sample_data, PriceBar, PriceSeries, SampleDataConfig};

// Network exports
pub use networks::{NetworkParameters, PolicyNetwork, PolicyOutput, ValueNetwork, ValueOutput};

// Memory exports
pub use memory::{BufferStats, Experience, ExperienceBatch, ReplayBuffer};

// Algorithm exports
pub use algorithms::{compute_gae, normalize_advantages, PpoLosses, PpoParams};

// Agent exports
pub use agent::{ActionSelection, ModelSnapshot, TradingAgent, TrainingMetrics};

// Environment exports
pub use environment::{
    AgentInfo, GlobalState, LeaderboardEntry, MultiAgentEnvironment, MultiAgentStepResult,
    StepInfo, StepResult, TradingEnvironment,
};

// Training exports
pub use training::{
    evaluate, run_arena, run_episode, summarize_results, train, Checkpointer, EpisodeResult,
    TrainingSummary,
};
