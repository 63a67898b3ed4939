//! Layer normalization (Ba et al., 2016).
//!
//! Composed from tape operations so gradients reach both the input and the
//! affine parameters.

use super::module::Module;
use crate::autograd::Tensor;

/// Layer normalization over the last dimension of a `[batch, features]` input.
///
/// ```text
/// y = (x - E[x]) / sqrt(Var[x] + eps) * gamma + beta
/// ```
///
/// Variance is the biased (population) estimate.
pub struct LayerNorm {
    features: usize,
    eps: f32,
    /// Learnable scale parameter (gamma)
    weight: Tensor,
    /// Learnable shift parameter (beta)
    bias: Tensor,
}

impl LayerNorm {
    /// Create a new `LayerNorm` layer with `eps = 1e-5`.
    #[must_use]
    pub fn new(features: usize) -> Self {
        Self::with_eps(features, 1e-5)
    }

    /// Create `LayerNorm` with custom epsilon.
    #[must_use]
    pub fn with_eps(features: usize, eps: f32) -> Self {
        Self {
            features,
            eps,
            weight: Tensor::ones(&[features]).requires_grad(),
            bias: Tensor::zeros(&[features]).requires_grad(),
        }
    }

    #[must_use]
    pub fn features(&self) -> usize {
        self.features
    }

    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    #[must_use]
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}

impl Module for LayerNorm {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(input.ndim(), 2, "LayerNorm expects [batch, features] input");
        let (batch, features) = (input.shape()[0], input.shape()[1]);
        assert_eq!(
            features, self.features,
            "LayerNorm expected {} features, got {features}",
            self.features
        );

        let inv_n = 1.0 / features as f32;
        let mean = input.row_sum().mul_scalar(inv_n);
        let centered = input.sub(&mean.expand_cols(features));
        let var = centered.pow(2.0).row_sum().mul_scalar(inv_n);
        let std = var.add_scalar(self.eps).sqrt();
        let normed = centered.div(&std.expand_cols(features));

        normed
            .mul(&self.weight.expand_rows(batch))
            .add(&self.bias.expand_rows(batch))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

impl std::fmt::Debug for LayerNorm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerNorm")
            .field("features", &self.features)
            .field("eps", &self.eps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad};

    #[test]
    fn test_layer_norm_zero_mean_unit_variance() {
        let ln = LayerNorm::new(4);
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0, -10.0, 0.0, 10.0, 20.0], &[2, 4]);
        let y = ln.forward(&x);

        for row in y.data().chunks(4) {
            let mean: f32 = row.iter().sum::<f32>() / 4.0;
            let var: f32 = row.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
            assert!(mean.abs() < 1e-5);
            assert!((var - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_layer_norm_parameters() {
        let ln = LayerNorm::new(8);
        assert_eq!(ln.parameters().len(), 2);
        assert_eq!(ln.num_parameters(), 16);
    }

    #[test]
    fn test_layer_norm_is_differentiable() {
        clear_graph();
        let ln = LayerNorm::new(3);
        let (w_id, b_id) = (ln.weight().id(), ln.bias().id());
        let x = Tensor::new(&[0.5, -1.0, 2.0, 3.0, 1.0, 0.0], &[2, 3]).requires_grad();
        let x_id = x.id();

        let target = Tensor::new(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[2, 3]);
        ln.forward(&x).mul(&target).sum().backward();

        let gx = get_grad(x_id).expect("input grad");
        // each row of a layer-norm gradient sums to zero
        for row in gx.data().chunks(3) {
            assert!(row.iter().sum::<f32>().abs() < 1e-4);
        }
        assert!(get_grad(w_id).is_some());
        assert_eq!(get_grad(b_id).expect("bias grad").data(), &[1.0, 1.0, 0.0]);
    }
}
