//! Training Loop
//!
//! Episode rollouts, training runs, evaluation, and the multi-agent arena.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::checkpointing::{episode_name, Checkpointer};
use crate::error::{Result, TradeGymError};
use crate::rl::agent::{TradingAgent, TrainingMetrics};
use crate::rl::config::AgentKind;
use crate::rl::core::Action;
use crate::rl::environment::{LeaderboardEntry, MultiAgentEnvironment, TradingEnvironment};
use crate::rl::memory::Experience;
use crate::rl::metrics;

/// Outcome of one episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeResult {
    /// Zero-based episode number
    pub episode: usize,
    pub total_reward: f64,
    pub steps: usize,
    pub final_portfolio_value: f64,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub trades: usize,
    /// Present when the episode ended with a learning step
    pub training: Option<TrainingMetrics>,
}

/// Aggregate statistics over many episodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Number of episodes
    pub num_episodes: usize,
    /// Average reward per episode
    pub avg_reward: f64,
    /// Average total return per episode
    pub avg_return: f64,
    pub best_return: f64,
    pub worst_return: f64,
    pub avg_sharpe: f64,
    /// Average episode length
    pub avg_steps: f64,
    /// Average trades per episode
    pub avg_trades: f64,
    /// Fraction of episodes with a positive return
    pub episode_win_rate: f64,
    /// Maximum drawdown across final portfolio values
    pub max_drawdown: f64,
    /// Episodes that ended with a learning step
    pub updates: usize,
}

/// Roll out one episode, learning at the end when enough experience is held.
///
/// Experience below `batch_size` carries over to the next episode.
pub fn run_episode(agent: &mut TradingAgent, env: &mut TradingEnvironment) -> Result<EpisodeResult> {
    let mut state = env.reset()?;
    let mut total_reward = 0.0;

    loop {
        let selection = agent.select_action(&state)?;
        let result = env.step(selection.action)?;
        total_reward += result.reward;

        agent.store_experience(Experience::new(
            state,
            selection.action,
            result.reward,
            result.state.clone(),
            result.done,
            selection.log_prob,
        ));
        state = result.state;

        if result.done {
            break;
        }
    }

    let training = if agent.buffer().len() >= agent.config().batch_size {
        Some(agent.learn()?)
    } else {
        None
    };
    let episode = agent.episode_count();
    agent.finish_episode();

    Ok(EpisodeResult {
        episode,
        total_reward,
        steps: env.step_count(),
        final_portfolio_value: env.portfolio().portfolio_value,
        total_return: env.total_return(),
        sharpe_ratio: env.sharpe_ratio(),
        trades: env.trades(),
        training,
    })
}

/// Train for `episodes` episodes, saving a checkpoint every
/// `checkpoint_frequency` episodes when a checkpointer is given
pub fn train(
    agent: &mut TradingAgent,
    env: &mut TradingEnvironment,
    episodes: usize,
    checkpointer: Option<&Checkpointer>,
    checkpoint_frequency: usize,
) -> Result<Vec<EpisodeResult>> {
    let mut results = Vec::with_capacity(episodes);

    for i in 0..episodes {
        let result = run_episode(agent, env)?;

        info!(
            "Episode {}/{}: reward={:.4}, return={:.2}%, sharpe={:.3}, trades={}, eps={:.3}",
            i + 1,
            episodes,
            result.total_reward,
            result.total_return * 100.0,
            result.sharpe_ratio,
            result.trades,
            agent.epsilon()
        );

        if let Some(checkpointer) = checkpointer {
            if checkpoint_frequency > 0 && (i + 1) % checkpoint_frequency == 0 {
                let name = episode_name("ppo", agent.episode_count());
                checkpointer.save(&agent.save_model(), &name)?;
            }
        }

        results.push(result);
    }

    Ok(results)
}

/// Run greedy episodes without exploration or learning
pub fn evaluate(
    agent: &TradingAgent,
    env: &mut TradingEnvironment,
    episodes: usize,
) -> Result<Vec<EpisodeResult>> {
    let mut results = Vec::with_capacity(episodes);

    for episode in 0..episodes {
        let mut state = env.reset()?;
        let mut total_reward = 0.0;
        loop {
            let action = agent.greedy_action(&state)?;
            let result = env.step(action)?;
            total_reward += result.reward;
            state = result.state;
            if result.done {
                break;
            }
        }

        results.push(EpisodeResult {
            episode,
            total_reward,
            steps: env.step_count(),
            final_portfolio_value: env.portfolio().portfolio_value,
            total_return: env.total_return(),
            sharpe_ratio: env.sharpe_ratio(),
            trades: env.trades(),
            training: None,
        });
    }

    Ok(results)
}

/// Calculate summary statistics
pub fn summarize_results(results: &[EpisodeResult]) -> TrainingSummary {
    if results.is_empty() {
        return TrainingSummary::default();
    }

    let n = results.len() as f64;
    let returns: Vec<f64> = results.iter().map(|r| r.total_return).collect();
    let final_values: Vec<f64> = results.iter().map(|r| r.final_portfolio_value).collect();
    let winning_episodes = results.iter().filter(|r| r.total_return > 0.0).count();

    TrainingSummary {
        num_episodes: results.len(),
        avg_reward: results.iter().map(|r| r.total_reward).sum::<f64>() / n,
        avg_return: metrics::mean(&returns),
        best_return: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        worst_return: returns.iter().copied().fold(f64::INFINITY, f64::min),
        avg_sharpe: results.iter().map(|r| r.sharpe_ratio).sum::<f64>() / n,
        avg_steps: results.iter().map(|r| r.steps as f64).sum::<f64>() / n,
        avg_trades: results.iter().map(|r| r.trades as f64).sum::<f64>() / n,
        episode_win_rate: winning_episodes as f64 / n,
        max_drawdown: metrics::max_drawdown(&final_values),
        updates: results.iter().filter(|r| r.training.is_some()).count(),
    }
}

/// Drive a multi-agent episode for up to `steps` steps with one agent per id.
///
/// `Aggressive` participants trade the largest size in the direction their
/// policy picks; `Conservative` ones the smallest. Returns the final
/// leaderboard.
pub fn run_arena(
    env: &mut MultiAgentEnvironment,
    agents: &mut HashMap<String, TradingAgent>,
    steps: usize,
) -> Result<Vec<LeaderboardEntry>> {
    let ids = env.agent_ids();
    if let Some(missing) = ids.iter().find(|id| !agents.contains_key(*id)) {
        return Err(TradeGymError::UnknownAgent(missing.clone()));
    }

    let mut states = env.reset()?;

    for _ in 0..steps {
        let mut actions = HashMap::with_capacity(ids.len());
        let mut log_probs = HashMap::with_capacity(ids.len());

        for id in &ids {
            let (Some(agent), Some(state), Some(info)) =
                (agents.get_mut(id), states.get(id), env.agent_info(id))
            else {
                continue;
            };
            let selection = agent.select_action(state)?;
            let action = match info.kind {
                AgentKind::Ppo => selection.action,
                AgentKind::Aggressive => Action::new(selection.action.action_type.largest()),
                AgentKind::Conservative => Action::new(selection.action.action_type.smallest()),
            };
            actions.insert(id.clone(), action);
            log_probs.insert(id.clone(), selection.log_prob);
        }

        let result = env.step(&actions)?;

        for id in &ids {
            let (Some(agent), Some(state), Some(next_state)) =
                (agents.get_mut(id), states.remove(id), result.states.get(id))
            else {
                continue;
            };
            agent.store_experience(Experience::new(
                state,
                actions.get(id).copied().unwrap_or_default(),
                result.rewards.get(id).copied().unwrap_or(0.0),
                next_state.clone(),
                result.dones.get(id).copied().unwrap_or(true),
                log_probs.get(id).copied().unwrap_or(0.0),
            ));
            if agent.buffer().len() >= agent.config().batch_size {
                if let Err(e) = agent.learn() {
                    warn!(agent = %id, error = %e, "Arena learning step failed");
                }
            }
        }

        let done = result.all_done();
        states = result.states;
        if done {
            break;
        }
    }

    for agent in agents.values_mut() {
        agent.finish_episode();
    }

    let leaderboard = env.get_leaderboard();
    if let Some(leader) = leaderboard.first() {
        info!(
            leader = %leader.agent_id,
            total_return = format!("{:.4}", leader.total_return),
            steps = env.global_step(),
            "Arena finished"
        );
    }
    Ok(leaderboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::config::{AgentSpec, EnvironmentConfig, MultiAgentConfig, RLConfig};
    use crate::rl::data::{generate_sample_data, PriceSeries, SampleDataConfig};
    use std::sync::Arc;

    fn agent_config(seed: u64) -> RLConfig {
        RLConfig {
            batch_size: 16,
            buffer_size: 256,
            hidden_sizes: vec![16, 8],
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn short_env() -> TradingEnvironment {
        let data = generate_sample_data(&SampleDataConfig {
            bars: 120,
            seed: Some(3),
            ..Default::default()
        })
        .unwrap();
        let config = EnvironmentConfig {
            max_steps: 40,
            random_start: false,
            ..Default::default()
        };
        TradingEnvironment::new(config, Arc::new(data)).unwrap()
    }

    #[test]
    fn test_run_episode_learns_at_end() {
        let mut agent = TradingAgent::new(agent_config(1)).unwrap();
        let mut env = short_env();
        let result = run_episode(&mut agent, &mut env).unwrap();

        assert_eq!(result.episode, 0);
        assert_eq!(result.steps, 40);
        assert!(result.training.is_some());
        assert!(agent.buffer().is_empty());
        assert_eq!(agent.episode_count(), 1);
    }

    #[test]
    fn test_short_episode_keeps_experience() {
        let mut config = agent_config(2);
        config.batch_size = 64;
        let mut agent = TradingAgent::new(config).unwrap();
        let mut env = short_env();
        let result = run_episode(&mut agent, &mut env).unwrap();

        assert!(result.training.is_none());
        assert_eq!(agent.buffer().len(), 40);
    }

    #[test]
    fn test_train_and_summarize() {
        let mut agent = TradingAgent::new(agent_config(3)).unwrap();
        let mut env = short_env();
        let results = train(&mut agent, &mut env, 3, None, 0).unwrap();
        assert_eq!(results.len(), 3);

        let summary = summarize_results(&results);
        assert_eq!(summary.num_episodes, 3);
        assert_eq!(summary.updates, 3);
        assert!(summary.best_return >= summary.worst_return);
        assert!((0.0..=1.0).contains(&summary.episode_win_rate));
    }

    #[test]
    fn test_evaluate_does_not_learn() {
        let agent = TradingAgent::new(agent_config(4)).unwrap();
        let mut env = short_env();
        let results = evaluate(&agent, &mut env, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.training.is_none()));
        assert_eq!(agent.training_step(), 0);
        // Greedy and deterministic on a fixed start
        assert_eq!(results[0], EpisodeResult { episode: 0, ..results[1].clone() });
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize_results(&[]), TrainingSummary::default());
    }

    #[test]
    fn test_run_arena_returns_sorted_leaderboard() {
        let data = Arc::new(PriceSeries::flat(200, 100.0, 1_000_000.0).unwrap());
        let config = MultiAgentConfig {
            agents: vec![
                AgentSpec::new("ppo", AgentKind::Ppo),
                AgentSpec::new("bold", AgentKind::Aggressive),
                AgentSpec::new("calm", AgentKind::Conservative),
            ],
            ..Default::default()
        };
        let env_config = EnvironmentConfig {
            random_start: false,
            ..Default::default()
        };
        let mut env = MultiAgentEnvironment::new(config, env_config, data).unwrap();

        let mut agents: HashMap<String, TradingAgent> = ["ppo", "bold", "calm"]
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), TradingAgent::new(agent_config(10 + i as u64)).unwrap()))
            .collect();

        let board = run_arena(&mut env, &mut agents, 30).unwrap();
        assert_eq!(board.len(), 3);
        assert!(board.windows(2).all(|w| w[0].total_return >= w[1].total_return));
        assert_eq!(env.global_step(), 30);
    }

    #[test]
    fn test_run_arena_requires_every_agent() {
        let data = Arc::new(PriceSeries::flat(100, 100.0, 1_000.0).unwrap());
        let mut env = MultiAgentEnvironment::new(
            MultiAgentConfig::default(),
            EnvironmentConfig::default(),
            data,
        )
        .unwrap();
        let mut agents = HashMap::new();
        agents.insert("ppo-1".to_string(), TradingAgent::new(agent_config(5)).unwrap());
        assert!(matches!(
            run_arena(&mut env, &mut agents, 5),
            Err(TradeGymError::UnknownAgent(_))
        ));
    }
}
