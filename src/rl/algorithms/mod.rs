//! RL Algorithms
//!
//! Advantage estimation and the PPO objective.

pub mod ppo;

pub use ppo::{
    clipped_surrogate_loss, compute_gae, evaluate_losses, normalize_advantages, value_loss,
    PpoLosses, PpoParams,
};
