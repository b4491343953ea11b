//! Multi-agent trading environment
//!
//! Runs one `TradingEnvironment` per configured agent over a shared price
//! feed. Agents move simultaneously: aggregate order flow produces a single
//! square-root market impact that damps every agent's trade size, and raw
//! rewards are reshaped with a rank bonus and a crowding penalty.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trading::{StepInfo, TradingEnvironment};
use crate::error::{Result, TradeGymError};
use crate::rl::config::{AgentKind, EnvironmentConfig, MultiAgentConfig};
use crate::rl::core::{Action, ActionType, MarketState, PortfolioState, State};
use crate::rl::data::PriceSeries;
use crate::rl::metrics;

/// Running performance of one agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub volatility: f64,
    pub trades: usize,
    pub steps: usize,
    /// Sum of shaped rewards this episode
    pub cumulative_reward: f64,
}

/// Public view of one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub kind: AgentKind,
    pub initial_capital: f64,
    pub portfolio: PortfolioState,
    pub performance: PerformanceSummary,
}

/// Per-agent step details
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStepInfo {
    /// Details from the agent's own environment
    pub step: StepInfo,
    /// Reward before competitive shaping
    pub base_reward: f64,
    pub rank_bonus: f64,
    pub crowding_penalty: f64,
    /// Impact applied to every agent this step
    pub market_impact: f64,
}

/// Result of a simultaneous step, keyed by agent id
#[derive(Debug, Clone, Default)]
pub struct MultiAgentStepResult {
    pub states: HashMap<String, State>,
    pub rewards: HashMap<String, f64>,
    pub dones: HashMap<String, bool>,
    pub infos: HashMap<String, AgentStepInfo>,
}

impl MultiAgentStepResult {
    /// True once every agent's episode has ended
    pub fn all_done(&self) -> bool {
        !self.dones.is_empty() && self.dones.values().all(|d| *d)
    }
}

/// Leaderboard row, rank 1 is best
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub agent_id: String,
    pub agent_type: AgentKind,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub portfolio_value: f64,
}

/// Market-wide figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    /// Intended trade value accumulated since reset
    pub total_volume: f64,
    /// Impact applied on the most recent step
    pub market_impact: f64,
    /// Volume of the current bar
    pub liquidity: f64,
}

/// Shared market view plus every agent's info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub step: usize,
    pub market: MarketState,
    pub agents: Vec<AgentInfo>,
    pub metrics: GlobalMetrics,
}

struct AgentSlot {
    env: TradingEnvironment,
    info: AgentInfo,
}

impl AgentSlot {
    fn reset_info(&mut self) {
        self.info.portfolio = PortfolioState::new(self.info.initial_capital);
        self.info.performance = PerformanceSummary::default();
    }
}

/// Several agents trading one price feed
pub struct MultiAgentEnvironment {
    config: MultiAgentConfig,
    /// Slots in configured order
    slots: Vec<AgentSlot>,
    initialized: bool,
    global_step: usize,
    total_volume: f64,
    market_impact: f64,
}

impl MultiAgentEnvironment {
    pub fn new(
        config: MultiAgentConfig,
        env_config: EnvironmentConfig,
        data: Arc<PriceSeries>,
    ) -> Result<Self> {
        config.validate()?;

        let mut slots = Vec::with_capacity(config.agents.len());
        for spec in &config.agents {
            let capital = spec.initial_capital.unwrap_or(env_config.initial_capital);
            let agent_config = EnvironmentConfig {
                initial_capital: capital,
                ..env_config.clone()
            };
            let env = TradingEnvironment::new(agent_config, Arc::clone(&data))?;
            slots.push(AgentSlot {
                env,
                info: AgentInfo {
                    id: spec.id.clone(),
                    kind: spec.kind,
                    initial_capital: capital,
                    portfolio: PortfolioState::new(capital),
                    performance: PerformanceSummary::default(),
                },
            });
        }

        Ok(Self {
            config,
            slots,
            initialized: false,
            global_step: 0,
            total_volume: 0.0,
            market_impact: 0.0,
        })
    }

    /// Seed the start-offset draw
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.slots = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| AgentSlot {
                env: slot.env.with_seed(seed.wrapping_add(i as u64)),
                info: slot.info,
            })
            .collect();
        self
    }

    /// Reset every agent at one shared start offset
    pub fn reset(&mut self) -> Result<HashMap<String, State>> {
        let start = match self.slots.first_mut() {
            Some(slot) => slot.env.sample_start(),
            None => return Err(TradeGymError::InvalidConfig("no agents configured".to_string())),
        };
        self.reset_at(start)
    }

    /// Reset every agent at a given bar
    pub fn reset_at(&mut self, start: usize) -> Result<HashMap<String, State>> {
        let mut states = HashMap::with_capacity(self.slots.len());
        for slot in &mut self.slots {
            let state = slot.env.reset_at(start)?;
            slot.reset_info();
            states.insert(slot.info.id.clone(), state);
        }

        self.initialized = true;
        self.global_step = 0;
        self.total_volume = 0.0;
        self.market_impact = 0.0;

        debug!(agents = self.slots.len(), start, "Multi-agent reset");
        Ok(states)
    }

    /// Apply every agent's action against the same bar.
    ///
    /// Agents missing from `actions` hold. Unknown ids are rejected.
    pub fn step(&mut self, actions: &HashMap<String, Action>) -> Result<MultiAgentStepResult> {
        if !self.initialized {
            return Err(TradeGymError::InvalidState(
                "multi-agent step called before reset".to_string(),
            ));
        }
        if let Some(unknown) = actions
            .keys()
            .find(|id| !self.slots.iter().any(|s| &s.info.id == *id))
        {
            return Err(TradeGymError::UnknownAgent(unknown.clone()));
        }

        let chosen: Vec<Action> = self
            .slots
            .iter()
            .map(|s| actions.get(&s.info.id).copied().unwrap_or_default())
            .collect();

        // Finished agents place no orders and get no reward shaping
        let finished: Vec<bool> = self.slots.iter().map(|s| s.env.is_done()).collect();

        // Aggregate intended order flow against the current bar
        let step_volume: f64 = self
            .slots
            .iter()
            .zip(&chosen)
            .zip(&finished)
            .filter(|((_, a), done)| !**done && a.action_type != ActionType::Hold)
            .map(|((s, a), _)| s.env.portfolio().portfolio_value.max(0.0) * a.size)
            .sum();
        let liquidity = self.current_volume();
        let impact = if liquidity > 0.0 {
            (step_volume / liquidity).sqrt() * self.config.impact_coefficient
        } else {
            0.0
        };
        let damping = (1.0 - impact).max(self.config.min_impact_factor);
        self.total_volume += step_volume;
        self.market_impact = impact;

        let rank_bonuses = self.rank_bonuses();

        let mut base_results = Vec::with_capacity(self.slots.len());
        for (slot, action) in self.slots.iter_mut().zip(&chosen) {
            let result = slot.env.step(action.scaled(damping))?;
            base_results.push(result);
        }

        let ratios: Vec<f64> = self
            .slots
            .iter()
            .map(|s| s.env.portfolio().position_ratio(s.env.current_price()))
            .collect();

        let mut output = MultiAgentStepResult::default();
        for (i, (slot, result)) in self.slots.iter_mut().zip(base_results).enumerate() {
            let (rank_bonus, crowding_penalty) = if finished[i] {
                (0.0, 0.0)
            } else {
                (
                    rank_bonuses[i],
                    crowding_penalty(&ratios, i, self.config.crowding_penalty_weight),
                )
            };
            let reward = result.reward + rank_bonus - crowding_penalty;

            let returns = slot.env.returns();
            let perf = &mut slot.info.performance;
            perf.total_return = result.info.total_return;
            perf.sharpe_ratio = result.info.sharpe_ratio;
            perf.volatility = metrics::volatility(returns);
            perf.trades = slot.env.trades();
            perf.steps = slot.env.step_count();
            perf.cumulative_reward += reward;
            slot.info.portfolio = slot.env.portfolio();

            let id = slot.info.id.clone();
            output.rewards.insert(id.clone(), reward);
            output.dones.insert(id.clone(), result.done);
            output.infos.insert(
                id.clone(),
                AgentStepInfo {
                    step: result.info,
                    base_reward: result.reward,
                    rank_bonus,
                    crowding_penalty,
                    market_impact: impact,
                },
            );
            output.states.insert(id, result.state);
        }

        self.global_step += 1;
        debug!(
            step = self.global_step,
            volume = step_volume,
            impact,
            "Multi-agent step"
        );
        Ok(output)
    }

    /// Rank bonus per slot from returns accumulated before this step.
    /// Rank 0 is the best return; ties keep configured order.
    fn rank_bonuses(&self) -> Vec<f64> {
        let n = self.slots.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let ra = self.slots[a].info.performance.total_return;
            let rb = self.slots[b].info.performance.total_return;
            rb.total_cmp(&ra)
        });

        let mut bonuses = vec![0.0; n];
        for (rank, &slot) in order.iter().enumerate() {
            bonuses[slot] = (n - rank) as f64 / n as f64 * self.config.rank_bonus_weight;
        }
        bonuses
    }

    /// Agents sorted by total return, best first
    pub fn get_leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut infos: Vec<&AgentInfo> = self.slots.iter().map(|s| &s.info).collect();
        infos.sort_by(|a, b| {
            b.performance
                .total_return
                .total_cmp(&a.performance.total_return)
        });
        infos
            .into_iter()
            .enumerate()
            .map(|(i, info)| LeaderboardEntry {
                rank: i + 1,
                agent_id: info.id.clone(),
                agent_type: info.kind,
                total_return: info.performance.total_return,
                sharpe_ratio: info.performance.sharpe_ratio,
                portfolio_value: info.portfolio.portfolio_value,
            })
            .collect()
    }

    /// Shared market window, agent infos and market-wide metrics
    pub fn get_global_state(&self) -> Result<GlobalState> {
        let slot = self
            .slots
            .first()
            .ok_or_else(|| TradeGymError::InvalidConfig("no agents configured".to_string()))?;
        let market = slot.env.state()?.market;
        Ok(GlobalState {
            step: self.global_step,
            market,
            agents: self.slots.iter().map(|s| s.info.clone()).collect(),
            metrics: GlobalMetrics {
                total_volume: self.total_volume,
                market_impact: self.market_impact,
                liquidity: self.current_volume(),
            },
        })
    }

    fn current_volume(&self) -> f64 {
        self.slots
            .first()
            .map(|s| s.env.current_volume())
            .unwrap_or(0.0)
    }

    /// Agent ids in configured order
    pub fn agent_ids(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.info.id.clone()).collect()
    }

    pub fn agent_info(&self, id: &str) -> Option<&AgentInfo> {
        self.slots.iter().find(|s| s.info.id == id).map(|s| &s.info)
    }

    pub fn environment(&self, id: &str) -> Option<&TradingEnvironment> {
        self.slots.iter().find(|s| s.info.id == id).map(|s| &s.env)
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    pub fn num_agents(&self) -> usize {
        self.slots.len()
    }

    pub fn is_done(&self) -> bool {
        self.initialized && self.slots.iter().all(|s| s.env.is_done())
    }
}

/// `weight` times the mean similarity `1 − |r_i − r_j|` to every other agent
fn crowding_penalty(ratios: &[f64], index: usize, weight: f64) -> f64 {
    if ratios.len() < 2 {
        return 0.0;
    }
    let own = ratios[index];
    let similarity: f64 = ratios
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .map(|(_, r)| 1.0 - (own - r).abs())
        .sum();
    weight * similarity / (ratios.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::config::AgentSpec;

    fn arena(agents: Vec<AgentSpec>, bars: usize) -> MultiAgentEnvironment {
        let data = Arc::new(PriceSeries::flat(bars, 100.0, 1_000_000.0).unwrap());
        let env_config = EnvironmentConfig {
            random_start: false,
            ..Default::default()
        };
        let config = MultiAgentConfig {
            agents,
            ..Default::default()
        };
        MultiAgentEnvironment::new(config, env_config, data).unwrap()
    }

    fn two_agents() -> MultiAgentEnvironment {
        arena(
            vec![
                AgentSpec::new("a", AgentKind::Ppo),
                AgentSpec::new("b", AgentKind::Ppo),
            ],
            200,
        )
    }

    #[test]
    fn test_reset_returns_state_per_agent() {
        let mut env = two_agents();
        let states = env.reset().unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.contains_key("a"));
        assert_eq!(env.global_step(), 0);
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = two_agents();
        assert!(env.step(&HashMap::new()).is_err());
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let mut env = two_agents();
        env.reset().unwrap();
        let mut actions = HashMap::new();
        actions.insert("ghost".to_string(), Action::hold());
        assert!(matches!(env.step(&actions), Err(TradeGymError::UnknownAgent(_))));
    }

    #[test]
    fn test_missing_action_holds() {
        let mut env = two_agents();
        env.reset().unwrap();
        let result = env.step(&HashMap::new()).unwrap();
        assert_eq!(result.rewards.len(), 2);
        assert_eq!(env.agent_info("a").unwrap().portfolio.positions, 0);
        assert_eq!(env.total_volume(), 0.0);
    }

    #[test]
    fn test_rank_bonus_from_previous_returns() {
        let mut env = two_agents();
        env.reset().unwrap();

        // First step: equal (zero) returns, ties keep configured order
        let result = env.step(&HashMap::new()).unwrap();
        assert!((result.infos["a"].rank_bonus - 0.1).abs() < 1e-12);
        assert!((result.infos["b"].rank_bonus - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_identical_positions_are_fully_crowded() {
        let mut env = two_agents();
        env.reset().unwrap();
        let result = env.step(&HashMap::new()).unwrap();
        // Both flat: similarity 1, penalty = weight
        assert!((result.infos["a"].crowding_penalty - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_impact_damps_trade_size() {
        let mut env = two_agents();
        env.reset().unwrap();
        let mut actions = HashMap::new();
        actions.insert("a".to_string(), Action::new(ActionType::BuyLarge));
        actions.insert("b".to_string(), Action::new(ActionType::BuyLarge));
        let result = env.step(&actions).unwrap();

        // 2 * 100k * 0.5 = 100k against 1M bar volume
        let impact = (100_000.0f64 / 1_000_000.0).sqrt() * 0.001;
        assert!((result.infos["a"].market_impact - impact).abs() < 1e-12);
        assert!((env.total_volume() - 100_000.0).abs() < 1e-9);
        assert!(env.agent_info("a").unwrap().portfolio.positions > 0);
    }

    #[test]
    fn test_leaderboard_sorted() {
        let mut env = two_agents();
        env.reset().unwrap();
        let mut actions = HashMap::new();
        actions.insert("b".to_string(), Action::new(ActionType::BuyLarge));
        env.step(&actions).unwrap();

        let board = env.get_leaderboard();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rank, 1);
        assert!(board[0].total_return >= board[1].total_return);
        // Buying on a flat series only pays costs
        assert_eq!(board[0].agent_id, "a");
    }

    #[test]
    fn test_custom_capital() {
        let mut env = arena(
            vec![
                AgentSpec::new("big", AgentKind::Aggressive).with_capital(200_000.0),
                AgentSpec::new("small", AgentKind::Conservative),
            ],
            100,
        );
        env.reset().unwrap();
        assert_eq!(env.agent_info("big").unwrap().portfolio.cash, 200_000.0);
        assert_eq!(env.agent_info("small").unwrap().portfolio.cash, 100_000.0);
    }

    #[test]
    fn test_global_state() {
        let mut env = two_agents();
        assert!(env.get_global_state().is_err());
        env.reset().unwrap();
        let global = env.get_global_state().unwrap();
        assert_eq!(global.agents.len(), 2);
        assert_eq!(global.market.prices.len(), 20);
        assert_eq!(global.metrics.liquidity, 1_000_000.0);
    }

    #[test]
    fn test_finished_agents_add_no_volume_or_shaping() {
        let mut env = arena(
            vec![
                AgentSpec::new("a", AgentKind::Ppo),
                AgentSpec::new("b", AgentKind::Ppo),
            ],
            25,
        );
        env.reset().unwrap();
        let mut actions = HashMap::new();
        actions.insert("a".to_string(), Action::new(ActionType::BuyLarge));

        let mut result = env.step(&actions).unwrap();
        while !result.all_done() {
            result = env.step(&actions).unwrap();
        }
        let volume = env.total_volume();
        let cumulative = env.agent_info("b").unwrap().performance.cumulative_reward;

        let after = env.step(&actions).unwrap();
        assert_eq!(env.total_volume(), volume);
        for id in ["a", "b"] {
            assert_eq!(after.rewards[id], 0.0);
            assert_eq!(after.infos[id].rank_bonus, 0.0);
            assert_eq!(after.infos[id].crowding_penalty, 0.0);
            assert!(after.dones[id]);
        }
        assert_eq!(
            env.agent_info("b").unwrap().performance.cumulative_reward,
            cumulative
        );
    }

    #[test]
    fn test_reset_restores_agent_info() {
        let mut env = arena(
            vec![
                AgentSpec::new("big", AgentKind::Aggressive).with_capital(200_000.0),
                AgentSpec::new("small", AgentKind::Conservative),
            ],
            100,
        );
        env.reset().unwrap();
        let mut actions = HashMap::new();
        actions.insert("big".to_string(), Action::new(ActionType::BuyLarge));
        actions.insert("small".to_string(), Action::new(ActionType::BuySmall));
        for _ in 0..3 {
            env.step(&actions).unwrap();
        }
        assert!(env.agent_info("big").unwrap().portfolio.positions > 0);
        assert!(env.total_volume() > 0.0);

        env.reset().unwrap();
        assert_eq!(env.global_step(), 0);
        assert_eq!(env.total_volume(), 0.0);
        for (id, capital) in [("big", 200_000.0), ("small", 100_000.0)] {
            let info = env.agent_info(id).unwrap();
            assert_eq!(info.portfolio, PortfolioState::new(capital));
            assert_eq!(info.performance, PerformanceSummary::default());
        }
    }

    #[test]
    fn test_crowding_penalty_single_agent() {
        assert_eq!(crowding_penalty(&[0.4], 0, 0.05), 0.0);
        let p = crowding_penalty(&[0.0, 0.5, 1.0], 0, 0.05);
        assert!((p - 0.05 * (0.5 + 0.0) / 2.0).abs() < 1e-12);
    }
}
