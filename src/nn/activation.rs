//! Activation functions usable as layers.
//!
//! # References
//!
//! - Nair, V., & Hinton, G. E. (2010). Rectified linear units improve restricted
//!   Boltzmann machines. ICML.
//! - Maas, A. L., et al. (2013). Rectifier nonlinearities improve neural network
//!   acoustic models. ICML.
//! - Hendrycks, D., & Gimpel, K. (2016). Gaussian error linear units (GELUs).

use serde::{Deserialize, Serialize};

use super::module::Module;
use crate::autograd::Tensor;

/// Element-wise activation, selectable from configuration.
///
/// # Example
///
/// ```
/// use scloss::nn::{Activation, Module};
/// use scloss::autograd::Tensor;
///
/// let act = Activation::LeakyReLU { negative_slope: 0.1 };
/// let y = act.forward(&Tensor::from_slice(&[-1.0, 2.0]));
/// assert_eq!(y.data(), &[-0.1, 2.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// max(0, x)
    ReLU,
    /// x if x > 0, else `negative_slope` * x
    LeakyReLU {
        /// Slope for negative inputs
        negative_slope: f32,
    },
    Sigmoid,
    Tanh,
    /// Tanh approximation of GELU
    GELU,
}

impl Default for Activation {
    fn default() -> Self {
        Activation::LeakyReLU {
            negative_slope: 0.01,
        }
    }
}

impl Activation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Activation::ReLU => "relu",
            Activation::LeakyReLU { .. } => "leaky_relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::GELU => "gelu",
        }
    }
}

impl Module for Activation {
    fn forward(&self, input: &Tensor) -> Tensor {
        match *self {
            Activation::ReLU => input.relu(),
            Activation::LeakyReLU { negative_slope } => input.leaky_relu(negative_slope),
            Activation::Sigmoid => input.sigmoid(),
            Activation::Tanh => input.tanh_(),
            Activation::GELU => input.gelu(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_leaky_relu() {
        assert_eq!(
            Activation::default(),
            Activation::LeakyReLU {
                negative_slope: 0.01
            }
        );
        assert_eq!(Activation::default().name(), "leaky_relu");
    }

    #[test]
    fn test_forward_variants() {
        let x = Tensor::from_slice(&[-1.0, 0.0, 1.0]);
        assert_eq!(Activation::ReLU.forward(&x).data(), &[0.0, 0.0, 1.0]);
        let s = Activation::Sigmoid.forward(&x);
        assert!((s.data()[1] - 0.5).abs() < 1e-6);
        let t = Activation::Tanh.forward(&x);
        assert!((t.data()[2] - 1.0_f32.tanh()).abs() < 1e-6);
        let g = Activation::GELU.forward(&x);
        assert!(g.data()[1].abs() < 1e-6);
    }

    #[test]
    fn test_no_parameters() {
        assert_eq!(Activation::ReLU.num_parameters(), 0);
    }

    #[test]
    fn test_serde_roundtrip() {
        let act = Activation::LeakyReLU {
            negative_slope: 0.2,
        };
        let json = serde_json::to_string(&act).unwrap();
        let back: Activation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, act);
    }
}
