//! Neural Network Architectures
//!
//! Policy and value networks for the actor-critic agent.

pub mod dense;
pub mod policy;
pub mod value;

pub use dense::{LayerParameters, NetworkParameters};
pub use policy::{PolicyNetwork, PolicyOutput};
pub use value::{ValueNetwork, ValueOutput};
