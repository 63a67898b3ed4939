//! The `Module` trait shared by all layers.

use crate::autograd::Tensor;

/// A differentiable layer with trainable parameters.
///
/// Layers record their forward computation on the autograd tape; gradients
/// of the parameters are read back with [`crate::autograd::get_grad`] using
/// each parameter's id.
pub trait Module {
    /// Forward pass.
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Trainable parameters, in a stable order.
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    /// Mutable access to the trainable parameters, in the same order as [`Module::parameters`].
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }
}
