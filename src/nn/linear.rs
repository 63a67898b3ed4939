//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b.

use super::init::xavier_uniform;
use super::module::Module;
use crate::autograd::Tensor;

/// Fully connected layer: y = xW^T + b
///
/// Weight initialization follows Xavier/Glorot (Glorot & Bengio, 2010).
///
/// # Shape
///
/// - Input: `[batch, in_features]`
/// - Output: `[batch, out_features]`
///
/// # Example
///
/// ```
/// use scloss::nn::{Linear, Module};
/// use scloss::autograd::Tensor;
///
/// let layer = Linear::with_seed(20, 30, Some(0));
/// let output = layer.forward(&Tensor::ones(&[8, 20]));
/// assert_eq!(output.shape(), &[8, 30]);
/// ```
pub struct Linear {
    /// Weight matrix, shape: [out_features, in_features]
    weight: Tensor,

    /// Bias vector, shape: [out_features], or None if bias=false
    bias: Option<Tensor>,

    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a new Linear layer with Xavier initialization.
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    /// Create a Linear layer with a specific random seed.
    #[must_use]
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let weight = xavier_uniform(
            &[out_features, in_features],
            in_features,
            out_features,
            seed,
        )
        .requires_grad();
        let bias = Tensor::zeros(&[out_features]).requires_grad();

        Self {
            weight,
            bias: Some(bias),
            in_features,
            out_features,
        }
    }

    /// Create a Linear layer without bias.
    #[must_use]
    pub fn without_bias(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let mut layer = Self::with_seed(in_features, out_features, seed);
        layer.bias = None;
        layer
    }

    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Check if this layer has a bias term.
    #[must_use]
    pub fn has_bias(&self) -> bool {
        self.bias.is_some()
    }

    /// Replace the weight tensor.
    ///
    /// # Panics
    ///
    /// Panics if the shape is not `[out_features, in_features]`.
    pub fn set_weight(&mut self, weight: Tensor) {
        assert_eq!(
            weight.shape(),
            &[self.out_features, self.in_features],
            "Linear weight must be [out_features, in_features]"
        );
        self.weight = weight;
    }

    /// Replace the bias tensor.
    ///
    /// # Panics
    ///
    /// Panics if the shape is not `[out_features]`.
    pub fn set_bias(&mut self, bias: Tensor) {
        assert_eq!(
            bias.shape(),
            &[self.out_features],
            "Linear bias must be [out_features]"
        );
        self.bias = Some(bias);
    }

    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    #[must_use]
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Tensor {
        // The transpose is recorded on every call so the weight stays reachable
        // from the tape after `clear_graph`.
        let output = input.matmul(&self.weight.transpose());

        match &self.bias {
            Some(b) => output.broadcast_add(b),
            None => output,
        }
    }

    fn parameters(&self) -> Vec<&Tensor> {
        match &self.bias {
            Some(b) => vec![&self.weight, b],
            None => vec![&self.weight],
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        match &mut self.bias {
            Some(b) => vec![&mut self.weight, b],
            None => vec![&mut self.weight],
        }
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .field("bias", &self.bias.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad};

    #[test]
    fn test_linear_forward_shape() {
        let layer = Linear::new(10, 5);
        let output = layer.forward(&Tensor::ones(&[32, 10]));
        assert_eq!(output.shape(), &[32, 5]);
    }

    #[test]
    fn test_linear_parameters() {
        let layer = Linear::new(10, 5);
        let params = layer.parameters();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].shape(), &[5, 10]);
        assert_eq!(params[1].shape(), &[5]);
        assert_eq!(layer.num_parameters(), 55);
    }

    #[test]
    fn test_linear_without_bias() {
        let layer = Linear::without_bias(10, 5, Some(1));
        assert_eq!(layer.parameters().len(), 1);
        assert!(!layer.has_bias());
    }

    #[test]
    fn test_linear_reproducible() {
        let layer1 = Linear::with_seed(10, 5, Some(42));
        let layer2 = Linear::with_seed(10, 5, Some(42));
        assert_eq!(layer1.weight.data(), layer2.weight.data());
    }

    #[test]
    fn test_linear_with_bias() {
        let mut layer = Linear::with_seed(2, 2, Some(42));
        layer.set_weight(Tensor::new(&[1.0, 0.0, 0.0, 1.0], &[2, 2]).requires_grad());
        layer.set_bias(Tensor::new(&[10.0, 20.0], &[2]).requires_grad());

        let output = layer.forward(&Tensor::new(&[1.0, 2.0], &[1, 2]));

        // y = [1, 2] @ I + [10, 20]
        let out_data = output.data();
        assert!((out_data[0] - 11.0).abs() < 1e-5);
        assert!((out_data[1] - 22.0).abs() < 1e-5);
    }

    #[test]
    fn test_linear_weight_gradient_after_clear() {
        clear_graph();
        let mut layer = Linear::with_seed(2, 1, Some(0));
        layer.set_weight(Tensor::new(&[1.0, -1.0], &[1, 2]).requires_grad());
        let w_id = layer.weight().id();
        let b_id = layer.bias().expect("bias").id();

        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        layer.forward(&x).sum().backward();

        // ∂/∂W sum(xWᵀ + b) = column sums of x
        assert_eq!(get_grad(w_id).expect("weight grad").data(), &[4.0, 6.0]);
        assert_eq!(get_grad(b_id).expect("bias grad").data(), &[2.0]);
    }
}
