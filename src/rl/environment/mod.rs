//! Simulated Trading Environments for RL Training
//!
//! A single-agent environment over historical bars and a multi-agent arena
//! built from several of them.

mod multi_agent;
mod trading;

pub use multi_agent::{
    AgentInfo, AgentStepInfo, GlobalMetrics, GlobalState, LeaderboardEntry, MultiAgentEnvironment,
    MultiAgentStepResult, PerformanceSummary,
};
pub use trading::{
    EpisodePhase, StepInfo, StepResult, TradingEnvironment, SHARPE_REWARD_WEIGHT,
    VOLATILITY_PENALTY_WEIGHT,
};
