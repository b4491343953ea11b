//! Replay Buffer
//!
//! Fixed-capacity circular experience store. Once full, each insert
//! overwrites the oldest entry.

use rand::seq::index;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeGymError};
use crate::rl::core::{Action, State};

/// A single transition in the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub next_state: State,
    pub done: bool,
    /// Log probability of `action` under the policy that chose it
    pub log_prob: f64,
}

impl Experience {
    pub fn new(
        state: State,
        action: Action,
        reward: f64,
        next_state: State,
        done: bool,
        log_prob: f64,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
            log_prob,
        }
    }
}

/// Parallel arrays over a set of experiences, plus the advantage and
/// return columns filled in by the learning step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceBatch {
    pub states: Vec<Vec<f64>>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f64>,
    pub next_states: Vec<Vec<f64>>,
    pub dones: Vec<bool>,
    pub log_probs: Vec<f64>,
    pub advantages: Vec<f64>,
    pub returns: Vec<f64>,
}

impl ExperienceBatch {
    pub fn from_experiences(experiences: &[Experience]) -> Self {
        let n = experiences.len();
        Self {
            states: experiences.iter().map(|e| e.state.normalized.clone()).collect(),
            actions: experiences.iter().map(|e| e.action.index()).collect(),
            rewards: experiences.iter().map(|e| e.reward).collect(),
            next_states: experiences
                .iter()
                .map(|e| e.next_state.normalized.clone())
                .collect(),
            dones: experiences.iter().map(|e| e.done).collect(),
            log_probs: experiences.iter().map(|e| e.log_prob).collect(),
            advantages: vec![0.0; n],
            returns: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Occupancy summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    pub size: usize,
    pub capacity: usize,
    /// size / capacity
    pub utilization: f64,
    pub average_reward: f64,
}

/// Replay buffer for experience storage
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    storage: Vec<Experience>,
    capacity: usize,
    /// Next slot to overwrite once the buffer is full
    position: usize,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: Vec::with_capacity(capacity.min(16_384)),
            capacity,
            position: 0,
        }
    }

    /// Append, or overwrite the oldest entry when full
    pub fn add(&mut self, experience: Experience) {
        if self.storage.len() < self.capacity {
            self.storage.push(experience);
        } else {
            self.storage[self.position] = experience;
            self.position = (self.position + 1) % self.capacity;
        }
    }

    /// Entry `index` in insertion order (0 = oldest held)
    pub fn get(&self, index: usize) -> Option<&Experience> {
        if index >= self.storage.len() {
            return None;
        }
        let slot = if self.storage.len() < self.capacity {
            index
        } else {
            (self.position + index) % self.capacity
        };
        self.storage.get(slot)
    }

    /// Uniform sample of `batch_size` distinct entries
    pub fn sample(&self, batch_size: usize) -> Result<Vec<Experience>> {
        self.sample_with(batch_size, &mut thread_rng())
    }

    /// `sample` with a caller-supplied RNG
    pub fn sample_with<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<Experience>> {
        if batch_size > self.storage.len() {
            return Err(TradeGymError::InsufficientExperience {
                available: self.storage.len(),
                required: batch_size,
            });
        }
        Ok(index::sample(rng, self.storage.len(), batch_size)
            .into_iter()
            .map(|i| self.storage[i].clone())
            .collect())
    }

    /// Every held entry, oldest first
    pub fn get_all(&self) -> Result<Vec<Experience>> {
        if self.storage.is_empty() {
            return Err(TradeGymError::EmptyBuffer);
        }
        Ok(self.iter().cloned().collect())
    }

    /// Iterate held entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        (0..self.storage.len()).filter_map(move |i| self.get(i))
    }

    /// Drop all entries; capacity is unchanged
    pub fn clear(&mut self) {
        self.storage.clear();
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.storage.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_stats(&self) -> BufferStats {
        let size = self.storage.len();
        let average_reward = if size == 0 {
            0.0
        } else {
            self.storage.iter().map(|e| e.reward).sum::<f64>() / size as f64
        };
        BufferStats {
            size,
            capacity: self.capacity,
            utilization: size as f64 / self.capacity as f64,
            average_reward,
        }
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(10_000)
    }
}
