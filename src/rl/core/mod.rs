//! Core RL abstractions
//!
//! Fundamental types for state representation, actions, and indicators.

pub mod action;
pub mod indicators;
pub mod state;

pub use action::{Action, ActionType, NUM_ACTIONS};
pub use indicators::Indicators;
pub use state::{normalize, MarketState, PortfolioState, State, STATE_SIZE};
