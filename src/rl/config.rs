//! RL Configuration
//!
//! Configuration structs for the agent, the trading environment, the
//! multi-agent arena and the training loop. Every struct deserializes with
//! `#[serde(default)]` so partial config files fall back to the documented
//! defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeGymError};
use crate::rl::core::{NUM_ACTIONS, STATE_SIZE};

/// Agent hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RLConfig {
    /// Length of the normalized state vector
    pub state_size: usize,
    /// Number of discrete actions
    pub action_size: usize,
    /// Learning rate (kept for parity with snapshots; updates are a stub)
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// GAE lambda
    pub gae_lambda: f64,
    /// Initial exploration rate
    pub epsilon: f64,
    /// Multiplicative epsilon decay applied after each learning step
    pub epsilon_decay: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Minimum experiences required before `learn`
    pub batch_size: usize,
    /// Replay buffer capacity
    pub buffer_size: usize,
    /// PPO clip range
    pub clip_epsilon: f64,
    /// Value loss coefficient
    pub value_coef: f64,
    /// Entropy bonus coefficient
    pub entropy_coef: f64,
    /// Surrogate-loss passes per learning step
    pub ppo_epochs: usize,
    /// Hidden layer widths shared by the policy and value networks
    pub hidden_sizes: Vec<usize>,
    /// Optional RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for RLConfig {
    fn default() -> Self {
        Self {
            state_size: STATE_SIZE,
            action_size: NUM_ACTIONS,
            learning_rate: 3e-4,
            gamma: 0.99,
            gae_lambda: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            batch_size: 64,
            buffer_size: 10_000,
            clip_epsilon: 0.2,
            value_coef: 0.5,
            entropy_coef: 0.01,
            ppo_epochs: 4,
            hidden_sizes: vec![128, 64],
            seed: None,
        }
    }
}

impl RLConfig {
    /// Reject values the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.state_size != STATE_SIZE {
            return Err(TradeGymError::InvalidConfig(format!(
                "state_size must be {STATE_SIZE}, got {}",
                self.state_size
            )));
        }
        if self.action_size != NUM_ACTIONS {
            return Err(TradeGymError::InvalidConfig(format!(
                "action_size must be {NUM_ACTIONS}, got {}",
                self.action_size
            )));
        }
        if self.hidden_sizes.len() != 2 || self.hidden_sizes.contains(&0) {
            return Err(TradeGymError::InvalidConfig(
                "hidden_sizes must name exactly two non-empty layers".to_string(),
            ));
        }
        if self.batch_size == 0 || self.buffer_size == 0 {
            return Err(TradeGymError::InvalidConfig(
                "batch_size and buffer_size must be positive".to_string(),
            ));
        }
        if self.batch_size > self.buffer_size {
            return Err(TradeGymError::InvalidConfig(format!(
                "batch_size {} exceeds buffer_size {}",
                self.batch_size, self.buffer_size
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) || !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(TradeGymError::InvalidConfig(
                "gamma and gae_lambda must lie in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) || self.epsilon_min > self.epsilon {
            return Err(TradeGymError::InvalidConfig(
                "epsilon_min must lie in [0, epsilon]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon_decay) {
            return Err(TradeGymError::InvalidConfig(
                "epsilon_decay must lie in [0, 1]".to_string(),
            ));
        }
        if self.ppo_epochs == 0 {
            return Err(TradeGymError::InvalidConfig(
                "ppo_epochs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trading environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Cash at the start of every episode
    pub initial_capital: f64,
    /// Maximum steps per episode
    pub max_steps: usize,
    /// Episode ends once portfolio value falls to this level
    pub min_capital: f64,
    /// Fee as a fraction of trade value
    pub transaction_cost_rate: f64,
    /// Execution price penalty as a fraction of the bar close
    pub slippage_rate: f64,
    /// Annual risk-free rate used in the Sharpe term
    pub risk_free_rate: f64,
    /// Largest fraction of portfolio value a single buy may commit
    pub max_position_size: f64,
    /// Bars in the market observation window
    pub lookback_window: usize,
    /// Bars that must remain after a random episode start
    pub min_remaining_bars: usize,
    /// Trailing bars used for the indicator bundle
    pub indicator_history: usize,
    /// Randomize the start offset on reset
    pub random_start: bool,
    /// Periods per year used to annualize the Sharpe ratio
    pub periods_per_year: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            max_steps: 1000,
            min_capital: 10_000.0,
            transaction_cost_rate: 0.001,
            slippage_rate: 0.0005,
            risk_free_rate: 0.02,
            max_position_size: 0.3,
            lookback_window: 20,
            min_remaining_bars: 200,
            indicator_history: 20,
            random_start: true,
            periods_per_year: 252.0,
        }
    }
}

impl EnvironmentConfig {
    /// Reject values the environment cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= 0.0 {
            return Err(TradeGymError::InvalidConfig(
                "initial_capital must be positive".to_string(),
            ));
        }
        if self.min_capital < 0.0 || self.min_capital >= self.initial_capital {
            return Err(TradeGymError::InvalidConfig(
                "min_capital must lie in [0, initial_capital)".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(TradeGymError::InvalidConfig(
                "max_steps must be positive".to_string(),
            ));
        }
        for (name, rate) in [
            ("transaction_cost_rate", self.transaction_cost_rate),
            ("slippage_rate", self.slippage_rate),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(TradeGymError::InvalidConfig(format!(
                    "{name} must lie in [0, 1), got {rate}"
                )));
            }
        }
        if self.max_position_size <= 0.0 || self.max_position_size > 1.0 {
            return Err(TradeGymError::InvalidConfig(
                "max_position_size must lie in (0, 1]".to_string(),
            ));
        }
        if self.lookback_window < 2 || self.indicator_history < self.lookback_window {
            return Err(TradeGymError::InvalidConfig(
                "lookback_window must be at least 2 and not exceed indicator_history"
                    .to_string(),
            ));
        }
        if self.periods_per_year <= 0.0 {
            return Err(TradeGymError::InvalidConfig(
                "periods_per_year must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Behavioural profile of an arena participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Learns with PPO
    Ppo,
    /// Always trades the largest size in the direction of its policy
    Aggressive,
    /// Prefers holding
    Conservative,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ppo => "ppo",
            Self::Aggressive => "aggressive",
            Self::Conservative => "conservative",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant in a multi-agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    pub kind: AgentKind,
    /// Overrides `EnvironmentConfig::initial_capital` for this agent
    #[serde(default)]
    pub initial_capital: Option<f64>,
}

impl AgentSpec {
    pub fn new(id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            initial_capital: None,
        }
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = Some(capital);
        self
    }
}

/// Multi-agent arena configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiAgentConfig {
    pub agents: Vec<AgentSpec>,
    /// Scale of the square-root impact law
    pub impact_coefficient: f64,
    /// Lower bound of the impact damping factor
    pub min_impact_factor: f64,
    /// Weight of the rank bonus
    pub rank_bonus_weight: f64,
    /// Weight of the crowding penalty
    pub crowding_penalty_weight: f64,
}

impl Default for MultiAgentConfig {
    fn default() -> Self {
        Self {
            agents: vec![
                AgentSpec::new("ppo-1", AgentKind::Ppo),
                AgentSpec::new("ppo-2", AgentKind::Ppo),
            ],
            impact_coefficient: 0.001,
            min_impact_factor: 0.5,
            rank_bonus_weight: 0.1,
            crowding_penalty_weight: 0.05,
        }
    }
}

impl MultiAgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(TradeGymError::InvalidConfig(
                "multi-agent run needs at least one agent".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.agents {
            if !seen.insert(spec.id.as_str()) {
                return Err(TradeGymError::InvalidConfig(format!(
                    "duplicate agent id: {}",
                    spec.id
                )));
            }
            if matches!(spec.initial_capital, Some(c) if c <= 0.0) {
                return Err(TradeGymError::InvalidConfig(format!(
                    "agent {} has non-positive initial capital",
                    spec.id
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.min_impact_factor) {
            return Err(TradeGymError::InvalidConfig(
                "min_impact_factor must be in [0, 1]".to_string(),
            ));
        }
        let weights = [
            ("impact_coefficient", self.impact_coefficient),
            ("rank_bonus_weight", self.rank_bonus_weight),
            ("crowding_penalty_weight", self.crowding_penalty_weight),
        ];
        for (name, value) in weights {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(TradeGymError::InvalidConfig(format!(
                    "{} must be non-negative",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Training loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Episodes per training run
    pub episodes: usize,
    /// Checkpoint save frequency (episodes); 0 disables periodic saves
    pub checkpoint_frequency: usize,
    /// Directory for checkpoints
    pub checkpoint_dir: String,
    /// Checkpoints retained on disk
    pub max_checkpoints: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            checkpoint_frequency: 25,
            checkpoint_dir: "./checkpoints".to_string(),
            max_checkpoints: 5,
        }
    }
}
