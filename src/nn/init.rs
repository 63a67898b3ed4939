//! Weight initialization functions.
//!
//! - Xavier/Glorot (Glorot & Bengio, 2010) for freshly built layers
//! - GPT-2 style normal initialization with residual rescaling
//!   (Radford et al., 2019) via [`init_linear`]
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.
//! - Radford, A., et al. (2019). Language models are unsupervised multitask learners.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::linear::Linear;
use crate::autograd::Tensor;
use crate::error::{LossError, Result};

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Xavier uniform initialization (Glorot & Bengio, 2010).
///
/// Samples from U(-a, a) where a = sqrt(6 / (`fan_in` + `fan_out`)).
#[must_use]
pub fn xavier_uniform(shape: &[usize], fan_in: usize, fan_out: usize, seed: Option<u64>) -> Tensor {
    let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    let numel: usize = shape.iter().product();
    let mut rng = seeded_rng(seed);
    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(-a..=a)).collect();
    Tensor::from_vec(data, shape)
}

/// Samples from N(mean, std).
///
/// # Errors
///
/// Returns `InvalidParameter` if `std` is negative or not finite.
pub fn normal(shape: &[usize], mean: f32, std: f32, seed: Option<u64>) -> Result<Tensor> {
    let dist = Normal::new(mean, std)
        .map_err(|_| LossError::invalid_parameter("std", std, "finite and >= 0"))?;
    let numel: usize = shape.iter().product();
    let mut rng = seeded_rng(seed);
    let data: Vec<f32> = (0..numel).map(|_| dist.sample(&mut rng)).collect();
    Ok(Tensor::from_vec(data, shape))
}

/// Settings for [`init_linear`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Base standard deviation of the weights
    pub initializer_range: f32,
    /// μP width multiplier; the std is scaled by its square root
    pub mup_width_scale: f32,
    /// Shrink residual output projections by `1/sqrt(2·n_layer)`
    pub rescale_prenorm_residual: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            initializer_range: 0.02,
            mup_width_scale: 1.0,
            rescale_prenorm_residual: true,
        }
    }
}

impl InitConfig {
    /// Learning-rate multiplier that pairs with this initialization under μP.
    #[must_use]
    pub fn lr_multiplier(&self) -> f32 {
        self.mup_width_scale
    }

    /// Standard deviation used for a layer.
    ///
    /// `residual_out` marks the output projection of a residual block
    /// (attention output or second feed-forward layer).
    #[must_use]
    pub fn weight_std(&self, n_layer: usize, residual_out: bool) -> f32 {
        let std = self.initializer_range * self.mup_width_scale.sqrt();
        if residual_out && self.rescale_prenorm_residual {
            std / (2.0 * n_layer.max(1) as f32).sqrt()
        } else {
            std
        }
    }
}

/// Re-initialize a linear layer: weights ~ N(0, std), bias = 0.
///
/// # Errors
///
/// Returns `InvalidParameter` for a non-positive `initializer_range` or
/// `mup_width_scale`.
pub fn init_linear(
    layer: &mut Linear,
    n_layer: usize,
    residual_out: bool,
    config: &InitConfig,
    seed: Option<u64>,
) -> Result<()> {
    if !(config.initializer_range > 0.0) {
        return Err(LossError::invalid_parameter(
            "initializer_range",
            config.initializer_range,
            "> 0",
        ));
    }
    if !(config.mup_width_scale > 0.0) {
        return Err(LossError::invalid_parameter(
            "mup_width_scale",
            config.mup_width_scale,
            "> 0",
        ));
    }

    let std = config.weight_std(n_layer, residual_out);
    log::debug!(
        "init_linear {}x{}: std={std:.5} residual_out={residual_out}",
        layer.out_features(),
        layer.in_features()
    );

    let weight = normal(&[layer.out_features(), layer.in_features()], 0.0, std, seed)?;
    layer.set_weight(weight.requires_grad());
    if layer.has_bias() {
        layer.set_bias(Tensor::zeros(&[layer.out_features()]).requires_grad());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_std(t: &Tensor) -> f32 {
        let n = t.numel() as f32;
        let mean: f32 = t.data().iter().sum::<f32>() / n;
        (t.data().iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n).sqrt()
    }

    #[test]
    fn test_xavier_uniform_bounds() {
        let t = xavier_uniform(&[20, 30], 30, 20, Some(1));
        let a = (6.0_f32 / 50.0).sqrt();
        assert!(t.data().iter().all(|&x| x.abs() <= a));
    }

    #[test]
    fn test_xavier_reproducible() {
        let a = xavier_uniform(&[4, 4], 4, 4, Some(7));
        let b = xavier_uniform(&[4, 4], 4, 4, Some(7));
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_normal_rejects_negative_std() {
        assert!(normal(&[2], 0.0, -1.0, Some(0)).is_err());
    }

    #[test]
    fn test_weight_std_rescaling() {
        let config = InitConfig::default();
        assert!((config.weight_std(4, false) - 0.02).abs() < 1e-9);
        assert!((config.weight_std(4, true) - 0.02 / 8.0_f32.sqrt()).abs() < 1e-9);

        let no_rescale = InitConfig {
            rescale_prenorm_residual: false,
            ..InitConfig::default()
        };
        assert!((no_rescale.weight_std(4, true) - 0.02).abs() < 1e-9);

        let mup = InitConfig {
            mup_width_scale: 4.0,
            ..InitConfig::default()
        };
        assert!((mup.weight_std(1, false) - 0.04).abs() < 1e-9);
        assert_eq!(mup.lr_multiplier(), 4.0);
    }

    #[test]
    fn test_init_linear_statistics() {
        let mut layer = Linear::with_seed(64, 64, Some(3));
        init_linear(&mut layer, 2, false, &InitConfig::default(), Some(11)).unwrap();
        let std = sample_std(layer.weight());
        assert!((std - 0.02).abs() < 0.003, "std = {std}");
        let bias = layer.bias().expect("bias");
        assert!(bias.data().iter().all(|&b| b == 0.0));
        assert!(layer.weight().requires_grad_enabled());
    }

    #[test]
    fn test_init_linear_residual_is_smaller() {
        let mut layer = Linear::with_seed(64, 64, Some(3));
        init_linear(&mut layer, 8, true, &InitConfig::default(), Some(11)).unwrap();
        let std = sample_std(layer.weight());
        assert!((std - 0.005).abs() < 0.001, "std = {std}");
    }

    #[test]
    fn test_init_linear_rejects_bad_config() {
        let mut layer = Linear::with_seed(4, 4, Some(3));
        let config = InitConfig {
            initializer_range: 0.0,
            ..InitConfig::default()
        };
        assert!(init_linear(&mut layer, 1, false, &config, None).is_err());
    }
}
