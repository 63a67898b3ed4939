//! Reverse-mode automatic differentiation engine.
//!
//! Tape-based automatic differentiation following Baydin et al. (2018) and
//! Griewank & Walther (2008).
//!
//! # Architecture
//!
//! The engine uses a define-by-run (dynamic) computational graph:
//! - Operations are recorded to a thread-local tape during the forward pass
//! - Gradients are computed in reverse order during the backward pass
//! - Gradients are accumulated for tensors used more than once
//!
//! The tape is never cleared implicitly; call [`clear_graph`] between steps.
//!
//! # Example
//!
//! ```
//! use scloss::autograd::{clear_graph, get_grad, Tensor};
//!
//! clear_graph();
//! let x = Tensor::from_slice(&[1.0, 2.0, 3.0]).requires_grad();
//! let w = Tensor::from_slice(&[0.5, 0.5, 0.5]);
//! let x_id = x.id();
//!
//! let y = x.mul(&w).sum();
//! y.backward();
//!
//! assert_eq!(get_grad(x_id).unwrap().data(), &[0.5, 0.5, 0.5]);
//! ```
//!
//! # References
//!
//! - Baydin, A. G., et al. (2018). Automatic differentiation in machine learning: a survey. JMLR.
//! - Ganin, Y., & Lempitsky, V. (2015). Unsupervised domain adaptation by backpropagation. ICML.

pub(crate) mod grad_fn;
mod graph;
pub(crate) mod ops;
mod tensor;

pub use grad_fn::GradFn;
pub use graph::ComputationGraph;
pub use tensor::{Tensor, TensorId};

use std::cell::RefCell;

thread_local! {
    /// Computation graph for the current thread.
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());

    /// Flag to disable gradient tracking (for inference).
    static GRAD_ENABLED: RefCell<bool> = const { RefCell::new(true) };
}

/// Execute a closure without gradient tracking.
///
/// # Example
///
/// ```
/// use scloss::autograd::{no_grad, Tensor};
///
/// let x = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
/// let y = no_grad(|| x.mul(&x).sum());
/// assert!(!y.requires_grad_enabled());
/// ```
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    GRAD_ENABLED.with(|enabled| {
        let prev = *enabled.borrow();
        *enabled.borrow_mut() = false;
        let result = f();
        *enabled.borrow_mut() = prev;
        result
    })
}

/// Check if gradient tracking is currently enabled.
#[must_use]
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|enabled| *enabled.borrow())
}

/// Get a reference to the thread-local computation graph.
pub(crate) fn with_graph<F, R>(f: F) -> R
where
    F: FnOnce(&mut ComputationGraph) -> R,
{
    GRAPH.with(|graph| f(&mut graph.borrow_mut()))
}

/// Clear the computation graph and all stored gradients.
pub fn clear_graph() {
    GRAPH.with(|graph| graph.borrow_mut().clear());
}

/// Get gradient for a tensor by ID from the graph.
#[must_use]
pub fn get_grad(id: TensorId) -> Option<Tensor> {
    with_graph(|graph| graph.get_grad(id))
}

/// Clear gradient for a specific tensor by ID.
pub fn clear_grad(id: TensorId) {
    with_graph(|graph| graph.clear_grad(id));
}

/// Gradient reversal layer.
///
/// Forward is the identity; backward multiplies the incoming gradient by
/// `-lambd`. Placing it between a feature extractor and a discriminator makes
/// the extractor maximise the discriminator's loss.
///
/// ```
/// use scloss::autograd::{clear_graph, get_grad, grad_reverse, Tensor};
///
/// clear_graph();
/// let x = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
/// let x_id = x.id();
/// let y = grad_reverse(&x, 2.0);
/// assert_eq!(y.data(), x.data());
///
/// y.sum().backward();
/// assert_eq!(get_grad(x_id).unwrap().data(), &[-2.0, -2.0]);
/// ```
#[must_use]
pub fn grad_reverse(x: &Tensor, lambd: f32) -> Tensor {
    x.grad_reverse(lambd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_grad_context() {
        assert!(is_grad_enabled());

        no_grad(|| {
            assert!(!is_grad_enabled());
        });

        assert!(is_grad_enabled());
    }

    #[test]
    fn test_nested_no_grad() {
        no_grad(|| {
            no_grad(|| {
                assert!(!is_grad_enabled());
            });
            assert!(!is_grad_enabled());
        });

        assert!(is_grad_enabled());
    }

    #[test]
    fn test_clear_grad_by_id() {
        clear_graph();
        let x = Tensor::from_slice(&[1.0]).requires_grad();
        let x_id = x.id();
        x.mul_scalar(3.0).sum().backward();
        assert_eq!(get_grad(x_id).expect("grad").data(), &[3.0]);

        clear_grad(x_id);
        assert!(get_grad(x_id).is_none());
    }

    #[test]
    fn test_gradients_accumulate_across_backward_calls() {
        clear_graph();
        let x = Tensor::from_slice(&[1.0, 1.0]).requires_grad();
        let x_id = x.id();
        x.sum().backward();
        x.sum().backward();
        assert_eq!(get_grad(x_id).expect("grad").data(), &[2.0, 2.0]);
    }

    #[test]
    fn test_grad_reverse_zero_lambda_blocks_gradient() {
        clear_graph();
        let x = Tensor::from_slice(&[4.0]).requires_grad();
        let x_id = x.id();
        grad_reverse(&x, 0.0).sum().backward();
        assert_eq!(get_grad(x_id).expect("grad").data(), &[0.0]);
    }
}
