//! PPO Trading Agent
//!
//! Owns the policy and value networks plus the on-policy rollout buffer.
//! Chooses actions ε-greedily and evaluates the PPO objective over the
//! collected rollout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TradeGymError};
use crate::rl::algorithms::{compute_gae, evaluate_losses, normalize_advantages, PpoLosses, PpoParams};
use crate::rl::config::RLConfig;
use crate::rl::core::{Action, State};
use crate::rl::memory::{Experience, ExperienceBatch, ReplayBuffer};
use crate::rl::metrics;
use crate::rl::networks::{NetworkParameters, PolicyNetwork, ValueNetwork};

/// Outcome of `select_action`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSelection {
    pub action: Action,
    /// Policy log-probability of the chosen action, also when exploring
    pub log_prob: f64,
    /// Value estimate of the state the action was chosen in
    pub value: f64,
    /// Whether the action came from the uniform exploration branch
    pub explored: bool,
}

/// Summary of one learning step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Episodes completed before this step
    pub episode: usize,
    /// Reward collected so far in the current episode
    pub episode_reward: f64,
    /// Mean reward over the rollout
    pub average_reward: f64,
    pub policy_loss: f64,
    pub value_loss: f64,
    pub entropy: f64,
    pub total_loss: f64,
    pub approx_kl: f64,
    pub clip_fraction: f64,
    /// Epsilon after decay
    pub epsilon: f64,
    /// Experiences in the rollout
    pub steps: usize,
    pub training_step: usize,
    /// Moments of the normalized advantages
    pub advantage_mean: f64,
    pub advantage_std: f64,
}

/// Counters restored alongside network weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub training_step: usize,
    pub episode_count: usize,
    pub epsilon: f64,
}

/// Serializable agent snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub policy: NetworkParameters,
    pub value: NetworkParameters,
    pub config: RLConfig,
    pub metadata: ModelMetadata,
}

/// Actor-critic agent trained with PPO
#[derive(Debug)]
pub struct TradingAgent {
    config: RLConfig,
    policy: PolicyNetwork,
    value: ValueNetwork,
    buffer: ReplayBuffer,
    rng: StdRng,
    epsilon: f64,
    training_step: usize,
    episode_count: usize,
    episode_reward: f64,
    episode_rewards: Vec<f64>,
}

impl TradingAgent {
    /// Build an agent with freshly initialized networks
    pub fn new(config: RLConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let policy = PolicyNetwork::new(
            config.state_size,
            &config.hidden_sizes,
            config.action_size,
            &mut rng,
        );
        let value = ValueNetwork::new(config.state_size, &config.hidden_sizes, &mut rng);

        Ok(Self {
            buffer: ReplayBuffer::new(config.buffer_size),
            epsilon: config.epsilon,
            policy,
            value,
            rng,
            training_step: 0,
            episode_count: 0,
            episode_reward: 0.0,
            episode_rewards: Vec::new(),
            config,
        })
    }

    /// Rebuild an agent from a snapshot
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Result<Self> {
        let mut agent = Self::new(snapshot.config.clone())?;
        agent.load_model(snapshot)?;
        Ok(agent)
    }

    /// ε-greedy action selection.
    ///
    /// With probability ε a uniformly random action is taken; otherwise the
    /// action is drawn from the policy distribution by inverse-CDF sampling.
    pub fn select_action(&mut self, state: &State) -> Result<ActionSelection> {
        let features = self.check_features(state)?;
        let output = self.policy.forward(features)?;

        let explored = self.rng.gen::<f64>() < self.epsilon;
        let index = if explored {
            self.rng.gen_range(0..self.config.action_size)
        } else {
            output.sample_index(self.rng.gen::<f64>())
        };

        Ok(ActionSelection {
            action: Action::from_index(index),
            log_prob: output.log_probs.get(index).copied().unwrap_or(0.0),
            value: self.value.value(features)?,
            explored,
        })
    }

    /// Most probable action, no exploration
    pub fn greedy_action(&self, state: &State) -> Result<Action> {
        let features = self.check_features(state)?;
        let output = self.policy.forward(features)?;
        Ok(Action::from_index(output.greedy_action()))
    }

    pub fn store_experience(&mut self, experience: Experience) {
        self.episode_reward += experience.reward;
        self.buffer.add(experience);
    }

    /// Run one on-policy learning step over the whole buffer.
    ///
    /// Fails when fewer than `batch_size` experiences are held. On success
    /// epsilon decays and the buffer is cleared.
    pub fn learn(&mut self) -> Result<TrainingMetrics> {
        if self.buffer.len() < self.config.batch_size {
            return Err(TradeGymError::InsufficientExperience {
                available: self.buffer.len(),
                required: self.config.batch_size,
            });
        }

        let experiences = self.buffer.get_all()?;
        let mut batch = ExperienceBatch::from_experiences(&experiences);

        let values = batch
            .states
            .iter()
            .map(|s| self.value.value(s))
            .collect::<Result<Vec<_>>>()?;
        let next_values = batch
            .next_states
            .iter()
            .map(|s| self.value.value(s))
            .collect::<Result<Vec<_>>>()?;

        let (mut advantages, returns) = compute_gae(
            &batch.rewards,
            &values,
            &next_values,
            &batch.dones,
            self.config.gamma,
            self.config.gae_lambda,
        )?;
        normalize_advantages(&mut advantages);
        batch.advantages = advantages;
        batch.returns = returns;

        let params = PpoParams {
            clip_epsilon: self.config.clip_epsilon,
            value_coef: self.config.value_coef,
            entropy_coef: self.config.entropy_coef,
        };

        let mut totals = PpoLosses::default();
        for epoch in 0..self.config.ppo_epochs {
            let losses = evaluate_losses(&self.policy, &self.value, &batch, &params)?;
            debug!(
                epoch,
                policy_loss = losses.policy_loss,
                value_loss = losses.value_loss,
                "PPO epoch"
            );
            self.update_networks(&batch, &losses);
            totals.policy_loss += losses.policy_loss;
            totals.value_loss += losses.value_loss;
            totals.entropy += losses.entropy;
            totals.total_loss += losses.total_loss;
            totals.approx_kl += losses.approx_kl;
            totals.clip_fraction += losses.clip_fraction;
        }
        let epochs = self.config.ppo_epochs as f64;

        self.decay_epsilon();
        self.buffer.clear();

        let metrics = TrainingMetrics {
            episode: self.episode_count,
            episode_reward: self.episode_reward,
            average_reward: metrics::mean(&batch.rewards),
            policy_loss: totals.policy_loss / epochs,
            value_loss: totals.value_loss / epochs,
            entropy: totals.entropy / epochs,
            total_loss: totals.total_loss / epochs,
            approx_kl: totals.approx_kl / epochs,
            clip_fraction: totals.clip_fraction / epochs,
            epsilon: self.epsilon,
            steps: batch.len(),
            training_step: self.training_step,
            advantage_mean: metrics::mean(&batch.advantages),
            advantage_std: metrics::std_dev(&batch.advantages),
        };

        info!(
            training_step = metrics.training_step,
            steps = metrics.steps,
            policy_loss = format!("{:.6}", metrics.policy_loss),
            value_loss = format!("{:.6}", metrics.value_loss),
            entropy = format!("{:.4}", metrics.entropy),
            epsilon = format!("{:.4}", metrics.epsilon),
            "Learning step complete"
        );

        Ok(metrics)
    }

    /// Parameter update hook.
    ///
    /// Counts the update but leaves the weights unchanged: gradient
    /// descent over the dense stacks is not implemented.
    fn update_networks(&mut self, _batch: &ExperienceBatch, _losses: &PpoLosses) {
        self.training_step += 1;
    }

    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
    }

    /// Close the current episode; returns its accumulated reward
    pub fn finish_episode(&mut self) -> f64 {
        let total = self.episode_reward;
        self.episode_rewards.push(total);
        self.episode_reward = 0.0;
        self.episode_count += 1;
        total
    }

    pub fn save_model(&self) -> ModelSnapshot {
        ModelSnapshot {
            policy: self.policy.get_parameters(),
            value: self.value.get_parameters(),
            config: self.config.clone(),
            metadata: ModelMetadata {
                training_step: self.training_step,
                episode_count: self.episode_count,
                epsilon: self.epsilon,
            },
        }
    }

    /// Restore weights, config and counters from a snapshot.
    /// The replay buffer is rebuilt empty when the snapshot changes its capacity.
    pub fn load_model(&mut self, snapshot: &ModelSnapshot) -> Result<()> {
        snapshot.config.validate()?;
        if snapshot.config.hidden_sizes != self.config.hidden_sizes {
            return Err(TradeGymError::Validation(format!(
                "snapshot hidden sizes {:?} do not match agent {:?}",
                snapshot.config.hidden_sizes, self.config.hidden_sizes
            )));
        }
        self.policy.set_parameters(&snapshot.policy)?;
        self.value.set_parameters(&snapshot.value)?;
        self.config = snapshot.config.clone();
        if self.buffer.capacity() != self.config.buffer_size {
            self.buffer = ReplayBuffer::new(self.config.buffer_size);
        }
        self.training_step = snapshot.metadata.training_step;
        self.episode_count = snapshot.metadata.episode_count;
        self.epsilon = snapshot
            .metadata
            .epsilon
            .clamp(self.config.epsilon_min, 1.0);
        Ok(())
    }

    fn check_features<'a>(&self, state: &'a State) -> Result<&'a [f64]> {
        let features = state.features();
        if features.len() != self.config.state_size {
            return Err(TradeGymError::DimensionMismatch {
                expected: self.config.state_size,
                actual: features.len(),
            });
        }
        Ok(features)
    }

    pub fn config(&self) -> &RLConfig {
        &self.config
    }

    pub fn policy_network(&self) -> &PolicyNetwork {
        &self.policy
    }

    pub fn value_network(&self) -> &ValueNetwork {
        &self.value
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Override the exploration rate, clamped to [0, 1]
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn training_step(&self) -> usize {
        self.training_step
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    /// Total reward of every finished episode, oldest first
    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }
}
