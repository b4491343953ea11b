//! Policy Network (Actor)
//!
//! Maps a normalized state to a categorical distribution over the discrete
//! actions.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::dense::{DenseStack, NetworkParameters};
use crate::error::Result;

/// Floor applied before taking logarithms of probabilities
pub const MIN_PROBABILITY: f64 = 1e-8;

/// Output of a policy forward pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutput {
    /// Softmax probabilities, summing to 1
    pub action_probs: Vec<f64>,
    /// ln of each probability, clamped away from ln(0)
    pub log_probs: Vec<f64>,
    /// -Σ p·ln p
    pub entropy: f64,
}

impl PolicyOutput {
    /// Build from raw logits with a max-shifted softmax
    pub fn from_logits(logits: &[f64]) -> Self {
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        let action_probs: Vec<f64> = if sum > 0.0 && sum.is_finite() {
            exps.iter().map(|e| e / sum).collect()
        } else {
            vec![1.0 / logits.len().max(1) as f64; logits.len()]
        };
        let log_probs: Vec<f64> = action_probs
            .iter()
            .map(|p| p.max(MIN_PROBABILITY).ln())
            .collect();
        let entropy = -action_probs
            .iter()
            .zip(&log_probs)
            .map(|(p, lp)| p * lp)
            .sum::<f64>();

        Self {
            action_probs,
            log_probs,
            entropy: entropy.max(0.0),
        }
    }

    /// Index of the most probable action
    pub fn greedy_action(&self) -> usize {
        self.action_probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Inverse-CDF sample: first index whose cumulative probability exceeds `u`
    pub fn sample_index(&self, u: f64) -> usize {
        let mut cumulative = 0.0;
        for (i, p) in self.action_probs.iter().enumerate() {
            cumulative += p;
            if u < cumulative {
                return i;
            }
        }
        // Rounding can leave the total marginally below 1
        self.action_probs.len().saturating_sub(1)
    }
}

/// Feed-forward policy network with a softmax head
#[derive(Debug, Clone)]
pub struct PolicyNetwork {
    stack: DenseStack,
}

impl PolicyNetwork {
    pub fn new<R: Rng>(
        input_size: usize,
        hidden_sizes: &[usize],
        action_size: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            stack: DenseStack::new(input_size, hidden_sizes, action_size, rng),
        }
    }

    pub fn forward(&self, features: &[f64]) -> Result<PolicyOutput> {
        let logits = self.stack.forward(features)?.to_vec();
        Ok(PolicyOutput::from_logits(&logits))
    }

    pub fn action_size(&self) -> usize {
        self.stack.output_size()
    }

    pub fn get_parameters(&self) -> NetworkParameters {
        self.stack.parameters()
    }

    pub fn set_parameters(&mut self, params: &NetworkParameters) -> Result<()> {
        self.stack.set_parameters(params)
    }
}
