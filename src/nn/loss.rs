//! Differentiable classification losses.
//!
//! Both losses fuse the final non-linearity with the likelihood so the
//! backward pass uses the closed-form gradient (`softmax - onehot` and
//! `sigmoid - target`).
//!
//! # Example
//!
//! ```
//! use scloss::nn::CrossEntropyLoss;
//! use scloss::autograd::Tensor;
//!
//! let criterion = CrossEntropyLoss::new();
//! let logits = Tensor::new(&[1.0, 2.0, 0.5, 0.1, 3.0, 0.2], &[2, 3]).requires_grad();
//! let loss = criterion.forward(&logits, &[1, 1]);
//! assert!(loss.item() > 0.0);
//! ```

use std::sync::Arc;

use crate::autograd::grad_fn::{BceWithLogitsBackward, CrossEntropyBackward};
use crate::autograd::ops::{record_op, softplus_scalar};
use crate::autograd::Tensor;

/// Reduction mode for loss functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Return loss per element (no reduction)
    None,
    /// Return mean of losses (default)
    #[default]
    Mean,
    /// Return sum of losses
    Sum,
}

impl Reduction {
    fn apply(self, losses: Tensor) -> Tensor {
        match self {
            Reduction::None => losses,
            Reduction::Mean => losses.mean(),
            Reduction::Sum => losses.sum(),
        }
    }
}

/// Cross-entropy loss over class logits.
///
/// ```text
/// loss = -log(softmax(logits)[target_class])
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Compute cross-entropy loss.
    ///
    /// # Arguments
    ///
    /// * `logits` - Shape [batch, num_classes]
    /// * `targets` - Class index per row
    ///
    /// # Panics
    ///
    /// Panics if `logits` is not 2-D, the batch sizes differ or a target is
    /// out of range.
    #[must_use]
    pub fn forward(&self, logits: &Tensor, targets: &[usize]) -> Tensor {
        assert_eq!(logits.ndim(), 2, "Logits must be 2D [batch, classes]");
        let (batch, classes) = (logits.shape()[0], logits.shape()[1]);
        assert_eq!(batch, targets.len(), "Batch sizes must match");

        let mut softmax = Vec::with_capacity(batch * classes);
        let mut losses = Vec::with_capacity(batch);
        for (row, &target) in logits.data().chunks(classes).zip(targets) {
            assert!(
                target < classes,
                "Target class {target} out of bounds for {classes} classes"
            );
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let sum_exp: f32 = row.iter().map(|&x| (x - max).exp()).sum();
            let log_norm = max + sum_exp.ln();
            softmax.extend(row.iter().map(|&x| (x - log_norm).exp()));
            losses.push(log_norm - row[target]);
        }

        let mut per_sample = Tensor::from_vec(losses, &[batch]);
        record_op(&mut per_sample, &[logits], || {
            Arc::new(CrossEntropyBackward {
                softmax_output: Tensor::from_vec(softmax, &[batch, classes]),
                targets: targets.to_vec(),
            })
        });

        self.reduction.apply(per_sample)
    }
}

/// Binary cross-entropy with logits, with an optional per-entry weight.
///
/// ```text
/// loss = w · [max(x, 0) - x·y + log(1 + exp(-|x|))]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BCEWithLogitsLoss {
    reduction: Reduction,
}

impl BCEWithLogitsLoss {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reduction(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Compute BCE loss from logits.
    ///
    /// `targets` and `weight` are constants; gradients flow to `logits` only.
    ///
    /// # Panics
    ///
    /// Panics if `targets` or `weight` differ in shape from `logits`.
    #[must_use]
    pub fn forward(&self, logits: &Tensor, targets: &Tensor, weight: Option<&Tensor>) -> Tensor {
        assert_eq!(
            logits.shape(),
            targets.shape(),
            "BCE targets must match logits shape"
        );
        if let Some(w) = weight {
            assert_eq!(
                logits.shape(),
                w.shape(),
                "BCE weight must match logits shape"
            );
        }

        let weights = weight.map(|w| w.data().to_vec());
        let loss_data: Vec<f32> = logits
            .data()
            .iter()
            .zip(targets.data())
            .enumerate()
            .map(|(i, (&x, &y))| {
                let w = weights.as_ref().map_or(1.0, |w| w[i]);
                if w == 0.0 {
                    // zero-weight entries contribute nothing, even for extreme logits
                    return 0.0;
                }
                // max(x, 0) - x*y + log(1 + exp(-|x|))
                w * (softplus_scalar(x) - x * y)
            })
            .collect();

        let mut per_entry = Tensor::from_vec(loss_data, logits.shape());
        record_op(&mut per_entry, &[logits], || {
            Arc::new(BceWithLogitsBackward {
                logits: logits.clone(),
                targets: targets.data().to_vec(),
                weights,
            })
        });

        self.reduction.apply(per_entry)
    }
}

/// Mean cross-entropy of `logits` against class indices.
#[must_use]
pub fn cross_entropy(logits: &Tensor, targets: &[usize]) -> Tensor {
    CrossEntropyLoss::new().forward(logits, targets)
}

/// Mean (optionally weighted) binary cross-entropy with logits over all entries.
#[must_use]
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor, weight: Option<&Tensor>) -> Tensor {
    BCEWithLogitsLoss::new().forward(logits, targets, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad};

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let logits = Tensor::zeros(&[2, 4]);
        let loss = cross_entropy(&logits, &[0, 3]);
        assert!((loss.item() - 4.0_f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_gradient() {
        clear_graph();
        let logits = Tensor::new(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0], &[2, 3]).requires_grad();
        let id = logits.id();
        cross_entropy(&logits, &[2, 0]).backward();

        let grad = get_grad(id).expect("grad");
        // rows of softmax - onehot sum to zero; mean divides by batch
        for row in grad.data().chunks(3) {
            assert!(row.iter().sum::<f32>().abs() < 1e-6);
        }
        assert!((grad.data()[3] - (1.0 / 3.0 - 1.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_reductions() {
        let logits = Tensor::new(&[0.0, 1.0, 1.0, 0.0], &[2, 2]);
        let none = CrossEntropyLoss::with_reduction(Reduction::None).forward(&logits, &[1, 1]);
        assert_eq!(none.shape(), &[2]);
        let sum = CrossEntropyLoss::with_reduction(Reduction::Sum).forward(&logits, &[1, 1]);
        assert!((sum.item() - none.data().iter().sum::<f32>()).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_cross_entropy_bad_target() {
        let _ = cross_entropy(&Tensor::zeros(&[1, 2]), &[2]);
    }

    #[test]
    fn test_bce_matches_reference() {
        let x = Tensor::from_slice(&[2.0, -1.0, 0.0]);
        let y = Tensor::from_slice(&[1.0, 0.0, 1.0]);
        let loss = bce_with_logits(&x, &y, None);

        let expected: f32 = [(2.0_f32, 1.0_f32), (-1.0, 0.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| {
                let p = 1.0 / (1.0 + (-x).exp());
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f32>()
            / 3.0;
        assert!((loss.item() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_bce_weight_zero_ignores_entry() {
        clear_graph();
        let x = Tensor::from_slice(&[f32::MIN, 0.5]).requires_grad();
        let id = x.id();
        let y = Tensor::from_slice(&[1.0, 1.0]);
        let w = Tensor::from_slice(&[0.0, 1.0]);
        let loss = bce_with_logits(&x, &y, Some(&w));
        assert!(loss.item().is_finite());
        loss.backward();
        let grad = get_grad(id).expect("grad");
        assert_eq!(grad.data()[0], 0.0);
        let s = 1.0 / (1.0 + (-0.5_f32).exp());
        assert!((grad.data()[1] - (s - 1.0) / 2.0).abs() < 1e-6);
    }
}
