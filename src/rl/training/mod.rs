//! Training Infrastructure
//!
//! Training loops, checkpointing, and evaluation utilities.

pub mod checkpointing;
pub mod trainer;

pub use checkpointing::{episode_name, timestamped_name, Checkpointer};
pub use trainer::{
    evaluate, run_arena, run_episode, summarize_results, train, EpisodeResult, TrainingSummary,
};
