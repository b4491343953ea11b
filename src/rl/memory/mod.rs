//! Experience Memory
//!
//! Circular replay buffer used as the on-policy rollout store.

pub mod replay_buffer;

pub use replay_buffer::{BufferStats, Experience, ExperienceBatch, ReplayBuffer};
