//! Value Network (Critic)
//!
//! Estimates the expected return from a state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::dense::{DenseStack, NetworkParameters};
use crate::error::Result;

/// Output of a value forward pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueOutput {
    pub value: f64,
}

/// Feed-forward value network with a linear scalar head
#[derive(Debug, Clone)]
pub struct ValueNetwork {
    stack: DenseStack,
}

impl ValueNetwork {
    pub fn new<R: Rng>(input_size: usize, hidden_sizes: &[usize], rng: &mut R) -> Self {
        Self {
            stack: DenseStack::new(input_size, hidden_sizes, 1, rng),
        }
    }

    pub fn forward(&self, features: &[f64]) -> Result<ValueOutput> {
        let output = self.stack.forward(features)?;
        Ok(ValueOutput {
            value: output.get(0).copied().unwrap_or(0.0),
        })
    }

    /// Shorthand for `forward(..).value`
    pub fn value(&self, features: &[f64]) -> Result<f64> {
        Ok(self.forward(features)?.value)
    }

    pub fn get_parameters(&self) -> NetworkParameters {
        self.stack.parameters()
    }

    pub fn set_parameters(&mut self, params: &NetworkParameters) -> Result<()> {
        self.stack.set_parameters(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_value_forward_is_finite_scalar() {
        let mut rng = StdRng::seed_from_u64(9);
        let net = ValueNetwork::new(50, &[16, 8], &mut rng);
        let out = net.forward(&[0.5; 50]).unwrap();
        assert!(out.value.is_finite());
    }

    #[test]
    fn test_zero_input_gives_zero_value() {
        // Biases start at zero, so the zero vector propagates to zero
        let mut rng = StdRng::seed_from_u64(10);
        let net = ValueNetwork::new(50, &[16, 8], &mut rng);
        assert_eq!(net.value(&[0.0; 50]).unwrap(), 0.0);
    }

    #[test]
    fn test_clone_and_restore() {
        let mut rng = StdRng::seed_from_u64(11);
        let net = ValueNetwork::new(50, &[16, 8], &mut rng);
        let mut other = ValueNetwork::new(50, &[16, 8], &mut rng);
        other.set_parameters(&net.get_parameters()).unwrap();

        let features = vec![0.1; 50];
        assert_eq!(net.value(&features).unwrap(), other.value(&features).unwrap());
        assert_eq!(net.clone().get_parameters(), net.get_parameters());
    }
}
