//! Proximal Policy Optimization (PPO)
//!
//! Generalized Advantage Estimation and the clipped surrogate objective.
//!
//! Note: the losses are evaluated exactly, but no gradient step is taken
//! from them. Weight updates are left to `TradingAgent::update_networks`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeGymError};
use crate::rl::memory::ExperienceBatch;
use crate::rl::metrics;
use crate::rl::networks::{PolicyNetwork, ValueNetwork};

/// Denominator guard for advantage normalization
pub const ADVANTAGE_EPSILON: f64 = 1e-8;

/// PPO hyperparameters used when evaluating the objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpoParams {
    pub clip_epsilon: f64,
    pub value_coef: f64,
    pub entropy_coef: f64,
}

impl Default for PpoParams {
    fn default() -> Self {
        Self {
            clip_epsilon: 0.2,
            value_coef: 0.5,
            entropy_coef: 0.01,
        }
    }
}

/// Loss terms from one pass over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PpoLosses {
    pub policy_loss: f64,
    pub value_loss: f64,
    /// Mean policy entropy over the batch
    pub entropy: f64,
    /// policy_loss + value_coef * value_loss - entropy_coef * entropy
    pub total_loss: f64,
    /// Approximate KL divergence (diagnostic)
    pub approx_kl: f64,
    /// Fraction of ratios outside the clip range (diagnostic)
    pub clip_fraction: f64,
}

/// Compute Generalized Advantage Estimation (GAE)
///
/// Runs backward from the last timestep:
/// `δ_t = r_t + γ·V(s_{t+1})·(1−done_t) − V(s_t)` and
/// `A_t = δ_t + γ·λ·(1−done_t)·A_{t+1}`. Returns `(advantages, returns)`
/// where `return_t = A_t + V(s_t)`.
pub fn compute_gae(
    rewards: &[f64],
    values: &[f64],
    next_values: &[f64],
    dones: &[bool],
    gamma: f64,
    lambda: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = rewards.len();
    for len in [values.len(), next_values.len(), dones.len()] {
        if len != n {
            return Err(TradeGymError::DimensionMismatch {
                expected: n,
                actual: len,
            });
        }
    }

    let mut advantages = vec![0.0; n];
    let mut returns = vec![0.0; n];
    let mut gae = 0.0;

    for t in (0..n).rev() {
        let mask = if dones[t] { 0.0 } else { 1.0 };
        let delta = rewards[t] + gamma * next_values[t] * mask - values[t];
        gae = delta + gamma * lambda * mask * gae;

        advantages[t] = gae;
        returns[t] = gae + values[t];
    }

    Ok((advantages, returns))
}

/// Shift to zero mean and scale to unit variance in place
pub fn normalize_advantages(advantages: &mut [f64]) {
    if advantages.is_empty() {
        return;
    }
    let mean = metrics::mean(advantages);
    let std = metrics::std_dev(advantages);
    for adv in advantages.iter_mut() {
        *adv = (*adv - mean) / (std + ADVANTAGE_EPSILON);
    }
}

/// `−mean(min(ratio·A, clip(ratio, 1−ε, 1+ε)·A))` with `ratio = exp(new − old)`
pub fn clipped_surrogate_loss(
    new_log_probs: &[f64],
    old_log_probs: &[f64],
    advantages: &[f64],
    clip_epsilon: f64,
) -> f64 {
    let n = new_log_probs.len().min(old_log_probs.len()).min(advantages.len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = (0..n)
        .map(|i| {
            let ratio = (new_log_probs[i] - old_log_probs[i]).exp();
            let clipped = ratio.clamp(1.0 - clip_epsilon, 1.0 + clip_epsilon);
            (ratio * advantages[i]).min(clipped * advantages[i])
        })
        .sum();
    -total / n as f64
}

/// Mean squared error between value estimates and targets
pub fn value_loss(values: &[f64], returns: &[f64]) -> f64 {
    let n = values.len().min(returns.len());
    if n == 0 {
        return 0.0;
    }
    values
        .iter()
        .zip(returns)
        .map(|(v, r)| (v - r).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Evaluate every PPO loss term for `batch` under the current networks.
///
/// `batch.advantages` and `batch.returns` must already be filled.
pub fn evaluate_losses(
    policy: &PolicyNetwork,
    value: &ValueNetwork,
    batch: &ExperienceBatch,
    params: &PpoParams,
) -> Result<PpoLosses> {
    if batch.is_empty() {
        return Ok(PpoLosses::default());
    }

    let n = batch.len();
    let mut new_log_probs = Vec::with_capacity(n);
    let mut estimates = Vec::with_capacity(n);
    let mut entropy_sum = 0.0;

    for (state, &action) in batch.states.iter().zip(&batch.actions) {
        let output = policy.forward(state)?;
        let log_prob = output.log_probs.get(action).copied().ok_or(
            TradeGymError::DimensionMismatch {
                expected: output.log_probs.len(),
                actual: action + 1,
            },
        )?;
        new_log_probs.push(log_prob);
        entropy_sum += output.entropy;
        estimates.push(value.value(state)?);
    }

    let policy_loss = clipped_surrogate_loss(
        &new_log_probs,
        &batch.log_probs,
        &batch.advantages,
        params.clip_epsilon,
    );
    let value_loss = value_loss(&estimates, &batch.returns);
    let entropy = entropy_sum / n as f64;

    let mut kl_sum = 0.0;
    let mut clipped = 0usize;
    for (new, old) in new_log_probs.iter().zip(&batch.log_probs) {
        kl_sum += old - new;
        let ratio = (new - old).exp();
        if (ratio - 1.0).abs() > params.clip_epsilon {
            clipped += 1;
        }
    }

    Ok(PpoLosses {
        policy_loss,
        value_loss,
        entropy,
        total_loss: policy_loss + params.value_coef * value_loss - params.entropy_coef * entropy,
        approx_kl: kl_sum / n as f64,
        clip_fraction: clipped as f64 / n as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gae_single_terminal_step() {
        let (adv, ret) = compute_gae(&[1.0], &[0.5], &[10.0], &[true], 0.99, 0.95).unwrap();
        // Terminal: next value is masked out
        assert!((adv[0] - 0.5).abs() < 1e-12);
        assert!((ret[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gae_two_steps() {
        let gamma = 0.9;
        let lambda = 0.5;
        let (adv, ret) = compute_gae(
            &[1.0, 2.0],
            &[0.0, 1.0],
            &[1.0, 3.0],
            &[false, false],
            gamma,
            lambda,
        )
        .unwrap();

        let delta1 = 2.0 + gamma * 3.0 - 1.0;
        let delta0 = 1.0 + gamma * 1.0 - 0.0;
        assert!((adv[1] - delta1).abs() < 1e-12);
        assert!((adv[0] - (delta0 + gamma * lambda * delta1)).abs() < 1e-12);
        assert!((ret[1] - (adv[1] + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_gae_done_cuts_trace() {
        let (adv, _) = compute_gae(
            &[0.0, 5.0],
            &[0.0, 0.0],
            &[0.0, 0.0],
            &[true, false],
            0.99,
            0.95,
        )
        .unwrap();
        assert_eq!(adv[0], 0.0);
    }

    #[test]
    fn test_gae_length_mismatch() {
        let result = compute_gae(&[1.0, 2.0], &[0.0], &[0.0, 0.0], &[false, false], 0.99, 0.95);
        assert!(result.is_err());
    }

    #[test]
    fn test_normalized_advantages_have_unit_moments() {
        let mut adv = vec![1.0, 2.0, 3.0, 4.0, 10.0];
        normalize_advantages(&mut adv);
        assert!(metrics::mean(&adv).abs() < 1e-9);
        assert!((metrics::std_dev(&adv) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_constant_advantages_is_finite() {
        let mut adv = vec![2.0; 4];
        normalize_advantages(&mut adv);
        assert!(adv.iter().all(|a| *a == 0.0));
    }

    #[test]
    fn test_surrogate_without_policy_change() {
        // ratio == 1 everywhere, so the loss is -mean(A)
        let logp = vec![-1.0, -2.0, -0.5];
        let adv = vec![1.0, -1.0, 3.0];
        let loss = clipped_surrogate_loss(&logp, &logp, &adv, 0.2);
        assert!((loss + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_surrogate_clips_large_ratio() {
        // ratio = e ≈ 2.718, positive advantage takes the clipped 1.2
        let loss = clipped_surrogate_loss(&[0.0], &[-1.0], &[1.0], 0.2);
        assert!((loss + 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_value_loss_is_mse() {
        assert!((value_loss(&[1.0, 2.0], &[0.0, 4.0]) - 2.5).abs() < 1e-12);
        assert_eq!(value_loss(&[], &[]), 0.0);
    }

    #[test]
    fn test_evaluate_losses_total() {
        let mut rng = StdRng::seed_from_u64(21);
        let policy = PolicyNetwork::new(50, &[8, 8], 7, &mut rng);
        let value = ValueNetwork::new(50, &[8, 8], &mut rng);

        let state = vec![0.1; 50];
        let old = policy.forward(&state).unwrap();
        let batch = ExperienceBatch {
            states: vec![state.clone(), state.clone()],
            actions: vec![0, 3],
            rewards: vec![1.0, -1.0],
            next_states: vec![state.clone(), state],
            dones: vec![false, true],
            log_probs: vec![old.log_probs[0], old.log_probs[3]],
            advantages: vec![1.0, -1.0],
            returns: vec![0.5, 0.5],
        };

        let params = PpoParams::default();
        let losses = evaluate_losses(&policy, &value, &batch, &params).unwrap();
        // Unchanged policy: ratio 1, no clipping, zero KL
        assert!(losses.policy_loss.abs() < 1e-12);
        assert_eq!(losses.clip_fraction, 0.0);
        assert!(losses.approx_kl.abs() < 1e-12);
        let expected = losses.policy_loss + 0.5 * losses.value_loss - 0.01 * losses.entropy;
        assert!((losses.total_loss - expected).abs() < 1e-12);
    }
}
