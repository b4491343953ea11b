//! Dense feed-forward stack shared by the policy and value networks.

use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeGymError};

/// Activation applied after a layer's affine transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
        }
    }
}

/// Weights `[input, output]` and biases `[output]` of one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameters {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

/// Deep copy of every layer's parameters, input layer first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub layers: Vec<LayerParameters>,
}

impl NetworkParameters {
    /// Total number of scalar parameters
    pub fn num_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    params: LayerParameters,
    activation: Activation,
}

impl DenseLayer {
    /// Xavier-scaled uniform weights, zero biases
    fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let scale = (2.0 / (input_size + output_size) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((input_size, output_size), |_| rng.gen_range(-scale..=scale));
        Self {
            params: LayerParameters {
                weights,
                biases: Array1::zeros(output_size),
            },
            activation,
        }
    }

    fn forward(&self, input: ArrayView1<'_, f64>) -> Array1<f64> {
        let z = input.dot(&self.params.weights) + &self.params.biases;
        z.mapv(|x| self.activation.apply(x))
    }
}

/// Input → hidden (ReLU) … → output (linear)
#[derive(Debug, Clone)]
pub struct DenseStack {
    layers: Vec<DenseLayer>,
    input_size: usize,
    output_size: usize,
}

impl DenseStack {
    pub fn new<R: Rng>(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        rng: &mut R,
    ) -> Self {
        let mut sizes = Vec::with_capacity(hidden_sizes.len() + 2);
        sizes.push(input_size);
        sizes.extend_from_slice(hidden_sizes);
        sizes.push(output_size);

        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last {
                    Activation::Linear
                } else {
                    Activation::Relu
                };
                DenseLayer::new(pair[0], pair[1], activation, rng)
            })
            .collect();

        Self {
            layers,
            input_size,
            output_size,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Raw output of the final (linear) layer
    pub fn forward(&self, input: &[f64]) -> Result<Array1<f64>> {
        if input.len() != self.input_size {
            return Err(TradeGymError::DimensionMismatch {
                expected: self.input_size,
                actual: input.len(),
            });
        }
        let mut output = Array1::from(input.to_vec());
        for layer in &self.layers {
            output = layer.forward(output.view());
        }
        Ok(output)
    }

    pub fn parameters(&self) -> NetworkParameters {
        NetworkParameters {
            layers: self.layers.iter().map(|l| l.params.clone()).collect(),
        }
    }

    /// Replace all parameters; shapes must match layer for layer
    pub fn set_parameters(&mut self, params: &NetworkParameters) -> Result<()> {
        if params.layers.len() != self.layers.len() {
            return Err(TradeGymError::DimensionMismatch {
                expected: self.layers.len(),
                actual: params.layers.len(),
            });
        }
        for (layer, incoming) in self.layers.iter().zip(&params.layers) {
            let current = &layer.params;
            if current.weights.dim() != incoming.weights.dim() {
                return Err(TradeGymError::DimensionMismatch {
                    expected: current.weights.len(),
                    actual: incoming.weights.len(),
                });
            }
            if current.biases.len() != incoming.biases.len() {
                return Err(TradeGymError::DimensionMismatch {
                    expected: current.biases.len(),
                    actual: incoming.biases.len(),
                });
            }
        }
        for (layer, incoming) in self.layers.iter_mut().zip(&params.layers) {
            layer.params = incoming.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_xavier_bounds_and_zero_biases() {
        let mut rng = StdRng::seed_from_u64(1);
        let stack = DenseStack::new(50, &[128, 64], 7, &mut rng);
        let params = stack.parameters();
        assert_eq!(params.layers.len(), 3);

        let scale = (2.0f64 / (50 + 128) as f64).sqrt();
        let first = &params.layers[0];
        assert_eq!(first.weights.dim(), (50, 128));
        assert!(first.weights.iter().all(|w| w.abs() <= scale));
        for layer in &params.layers {
            assert!(layer.biases.iter().all(|b| *b == 0.0));
        }
    }

    #[test]
    fn test_forward_rejects_wrong_length() {
        let mut rng = StdRng::seed_from_u64(2);
        let stack = DenseStack::new(4, &[3, 3], 2, &mut rng);
        assert!(stack.forward(&[0.0; 3]).is_err());
        assert_eq!(stack.forward(&[0.0; 4]).unwrap().len(), 2);
    }

    #[test]
    fn test_set_parameters_rejects_shape_change() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut a = DenseStack::new(4, &[3, 3], 2, &mut rng);
        let b = DenseStack::new(4, &[5, 3], 2, &mut rng);
        assert!(a.set_parameters(&b.parameters()).is_err());
    }

    #[test]
    fn test_num_parameters() {
        let mut rng = StdRng::seed_from_u64(4);
        let stack = DenseStack::new(2, &[3, 4], 1, &mut rng);
        // (2*3+3) + (3*4+4) + (4*1+1)
        assert_eq!(stack.parameters().num_parameters(), 9 + 16 + 5);
    }
}
