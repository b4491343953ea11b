//! Trading Environment for RL Training
//!
//! Provides a gym-like interface with step/reset over a historical price
//! series. Trades fill at the current close adjusted for slippage and pay a
//! proportional transaction cost.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TradeGymError};
use crate::rl::config::EnvironmentConfig;
use crate::rl::core::{Action, Indicators, MarketState, PortfolioState, State};
use crate::rl::data::PriceSeries;
use crate::rl::metrics;

/// Weight of the Sharpe term in the reward
pub const SHARPE_REWARD_WEIGHT: f64 = 0.1;

/// Weight of the volatility penalty in the reward
pub const VOLATILITY_PENALTY_WEIGHT: f64 = 0.5;

/// Episode lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// Constructed but never reset; `step` is rejected
    Uninitialized,
    /// Between `reset` and a terminal step
    Active,
    /// Terminal; further steps return reward 0 and change nothing
    Done,
}

/// Additional step information
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// cash + positions * price after the step
    pub portfolio_value: f64,
    /// Return since the start of the episode
    pub total_return: f64,
    /// Annualized Sharpe over the episode's returns so far
    pub sharpe_ratio: f64,
    /// Fee paid on this step's trade
    pub transaction_cost: f64,
    /// Volatility penalty subtracted from the reward
    pub risk_penalty: f64,
    /// Portfolio return of this step alone
    pub step_return: f64,
}

/// Result of taking a step in the environment
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub state: State,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Single-asset trading environment
#[derive(Debug, Clone)]
pub struct TradingEnvironment {
    config: EnvironmentConfig,
    data: Arc<PriceSeries>,
    rng: StdRng,
    phase: EpisodePhase,
    start_index: usize,
    current_index: usize,
    step_count: usize,
    cash: f64,
    positions: u64,
    /// Total cost (fees included) of the shares currently held
    cost_basis: f64,
    realized_pnl: f64,
    portfolio_value: f64,
    returns: Vec<f64>,
    trades: usize,
    total_transaction_costs: f64,
}

impl TradingEnvironment {
    /// Create an environment over shared price data
    pub fn new(config: EnvironmentConfig, data: Arc<PriceSeries>) -> Result<Self> {
        config.validate()?;
        if data.len() < 2 {
            return Err(TradeGymError::InsufficientData(format!(
                "need at least 2 bars, got {}",
                data.len()
            )));
        }
        let capital = config.initial_capital;
        Ok(Self {
            config,
            data,
            rng: StdRng::from_entropy(),
            phase: EpisodePhase::Uninitialized,
            start_index: 0,
            current_index: 0,
            step_count: 0,
            cash: capital,
            positions: 0,
            cost_basis: 0.0,
            realized_pnl: 0.0,
            portfolio_value: capital,
            returns: Vec::new(),
            trades: 0,
            total_transaction_costs: 0.0,
        })
    }

    /// Seed the start-offset RNG
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Pick an episode start offset.
    ///
    /// The first candidate leaves a full lookback window behind it; with
    /// `random_start` the offset is drawn so that at least
    /// `min_remaining_bars` bars follow it, when the series is long enough.
    pub fn sample_start(&mut self) -> usize {
        let len = self.data.len();
        let earliest = (self.config.lookback_window - 1).min(len - 2);
        if !self.config.random_start {
            return earliest;
        }
        let latest = len.saturating_sub(self.config.min_remaining_bars + 1);
        if latest <= earliest {
            return earliest;
        }
        self.rng.gen_range(earliest..=latest)
    }

    /// Start a new episode at a random offset
    pub fn reset(&mut self) -> Result<State> {
        let start = self.sample_start();
        self.reset_at(start)
    }

    /// Start a new episode at a given bar
    pub fn reset_at(&mut self, start: usize) -> Result<State> {
        if start >= self.data.len() {
            return Err(TradeGymError::InvalidState(format!(
                "start index {start} outside series of {} bars",
                self.data.len()
            )));
        }

        let capital = self.config.initial_capital;
        self.phase = EpisodePhase::Active;
        self.start_index = start;
        self.current_index = start;
        self.step_count = 0;
        self.cash = capital;
        self.positions = 0;
        self.cost_basis = 0.0;
        self.realized_pnl = 0.0;
        self.portfolio_value = capital;
        self.returns.clear();
        self.trades = 0;
        self.total_transaction_costs = 0.0;

        debug!(start, bars = self.data.len(), "Episode reset");
        Ok(self.observe())
    }

    /// Take a step in the environment
    pub fn step(&mut self, action: Action) -> Result<StepResult> {
        match self.phase {
            EpisodePhase::Uninitialized => {
                return Err(TradeGymError::InvalidState(
                    "step called before reset".to_string(),
                ))
            }
            EpisodePhase::Done => return Ok(self.terminal_result(0.0)),
            EpisodePhase::Active => {}
        }

        if self.current_index + 1 >= self.data.len() {
            debug!(index = self.current_index, "Price series exhausted");
            self.phase = EpisodePhase::Done;
            return Ok(self.terminal_result(0.0));
        }

        let previous_value = self.portfolio_value;
        let price = self.current_price();
        let transaction_cost = self.execute_action(action, price);

        // Advance time
        self.current_index += 1;
        self.step_count += 1;
        self.revalue();

        let step_return = if previous_value > 0.0 {
            (self.portfolio_value - previous_value) / previous_value
        } else {
            0.0
        };
        self.returns.push(step_return);

        let sharpe = self.sharpe_ratio();
        let risk_penalty = VOLATILITY_PENALTY_WEIGHT * metrics::volatility(&self.returns);
        let reward = step_return + SHARPE_REWARD_WEIGHT * sharpe
            - risk_penalty
            - transaction_cost / self.config.initial_capital;

        let done = self.step_count >= self.config.max_steps
            || self.portfolio_value <= self.config.min_capital
            || self.current_index + 1 >= self.data.len();
        if done {
            self.phase = EpisodePhase::Done;
            debug!(
                steps = self.step_count,
                portfolio_value = self.portfolio_value,
                "Episode finished"
            );
        }

        Ok(StepResult {
            state: self.observe(),
            reward,
            done,
            info: StepInfo {
                portfolio_value: self.portfolio_value,
                total_return: self.total_return(),
                sharpe_ratio: sharpe,
                transaction_cost,
                risk_penalty,
                step_return,
            },
        })
    }

    /// Fill `action` at `price`; returns the fee paid
    fn execute_action(&mut self, action: Action, price: f64) -> f64 {
        let size = action.size.clamp(0.0, 1.0);
        let tc_rate = self.config.transaction_cost_rate;

        if action.action_type.is_buy() {
            let budget = self
                .cash
                .min(self.config.max_position_size * self.portfolio_value * size);
            let exec_price = price * (1.0 + self.config.slippage_rate);
            let shares = (budget / (exec_price * (1.0 + tc_rate))).floor();
            if !shares.is_finite() || shares < 1.0 {
                return 0.0;
            }
            let shares = shares as u64;
            let trade_value = shares as f64 * exec_price;
            let fee = trade_value * tc_rate;

            self.cash -= trade_value + fee;
            self.positions += shares;
            self.cost_basis += trade_value + fee;
            self.record_trade(fee, price);
            fee
        } else if action.action_type.is_sell() {
            let shares = (self.positions as f64 * size).floor() as u64;
            if shares == 0 {
                return 0.0;
            }
            let exec_price = price * (1.0 - self.config.slippage_rate);
            let proceeds = shares as f64 * exec_price;
            let fee = proceeds * tc_rate;
            let basis = self.cost_basis * shares as f64 / self.positions as f64;

            self.cash += proceeds - fee;
            self.realized_pnl += proceeds - fee - basis;
            self.cost_basis -= basis;
            self.positions -= shares;
            if self.positions == 0 {
                self.cost_basis = 0.0;
            }
            self.record_trade(fee, price);
            fee
        } else {
            0.0
        }
    }

    fn record_trade(&mut self, fee: f64, price: f64) {
        self.trades += 1;
        self.total_transaction_costs += fee;
        self.portfolio_value = self.cash + self.positions as f64 * price;
    }

    fn revalue(&mut self) {
        self.portfolio_value = self.cash + self.positions as f64 * self.current_price();
    }

    fn terminal_result(&self, reward: f64) -> StepResult {
        StepResult {
            state: self.observe(),
            reward,
            done: true,
            info: StepInfo {
                portfolio_value: self.portfolio_value,
                total_return: self.total_return(),
                sharpe_ratio: self.sharpe_ratio(),
                transaction_cost: 0.0,
                risk_penalty: 0.0,
                step_return: 0.0,
            },
        }
    }

    /// Build the observation for the current bar
    fn observe(&self) -> State {
        let window = self
            .data
            .window(self.current_index, self.config.lookback_window);
        let history = self
            .data
            .window(self.current_index, self.config.indicator_history);
        let timestamp = window.last().map(|b| b.date).unwrap_or(NaiveDate::MIN);

        let market = MarketState {
            prices: window.iter().map(|b| b.close).collect(),
            volumes: window.iter().map(|b| b.volume).collect(),
            indicators: Indicators::compute(history),
            timestamp,
        };
        State::new(market, self.portfolio(), self.config.initial_capital)
    }

    /// Current observation; fails before the first reset
    pub fn state(&self) -> Result<State> {
        if self.phase == EpisodePhase::Uninitialized {
            return Err(TradeGymError::InvalidState(
                "environment has not been reset".to_string(),
            ));
        }
        Ok(self.observe())
    }

    /// Snapshot of the ledger at the current price
    pub fn portfolio(&self) -> PortfolioState {
        let price = self.current_price();
        PortfolioState {
            cash: self.cash,
            positions: self.positions,
            portfolio_value: self.portfolio_value,
            unrealized_pnl: self.positions as f64 * price - self.cost_basis,
            realized_pnl: self.realized_pnl,
        }
    }

    pub fn current_price(&self) -> f64 {
        self.data.close(self.current_index).unwrap_or(0.0)
    }

    pub fn current_volume(&self) -> f64 {
        self.data.volume(self.current_index).unwrap_or(0.0)
    }

    pub fn total_return(&self) -> f64 {
        (self.portfolio_value - self.config.initial_capital) / self.config.initial_capital
    }

    pub fn sharpe_ratio(&self) -> f64 {
        metrics::sharpe_ratio(
            &self.returns,
            self.config.risk_free_rate,
            self.config.periods_per_year,
        )
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == EpisodePhase::Done
    }

    /// Index of the current bar in the price series
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Per-step portfolio returns of the current episode
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Number of fills this episode
    pub fn trades(&self) -> usize {
        self.trades
    }

    pub fn total_transaction_costs(&self) -> f64 {
        self.total_transaction_costs
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn data(&self) -> &Arc<PriceSeries> {
        &self.data
    }
}
