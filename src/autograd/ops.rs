//! Differentiable operations for tensors.
//!
//! Each operation:
//! 1. Computes the forward result
//! 2. Records a `GradFn` to the computation graph (if gradient tracking is enabled)
//!
//! Matrix multiplication uses trueno's SIMD kernels.

use std::sync::Arc;

use super::grad_fn::{
    stable_sigmoid, AbsBackward, AddBackward, AddScalarBackward, BroadcastAddBackward,
    CatColumnBackward, ClampBackward, DivBackward, ExpBackward, ExpandColsBackward,
    ExpandRowsBackward, GeluBackward, GradFn, GradReverseBackward, LeakyReluBackward,
    LgammaBackward, LogBackward, LogSumExpRowsBackward, MaskedFillBackward, MatmulBackward,
    MeanBackward, MulBackward, NegBackward, PowBackward, ReluBackward, RowSumBackward,
    ScaleBackward, SelectBackward, SigmoidBackward, SoftplusBackward, SoftplusShiftBackward,
    SqrtBackward, SubBackward, SumBackward, TanhBackward, TransposeBackward, ViewBackward,
};
use super::tensor::Tensor;
use super::{is_grad_enabled, with_graph};
use crate::mask::Mask;
use crate::special;

/// Record `result` as the output of an operation over `inputs`.
///
/// Nothing is recorded when gradient tracking is disabled or no input
/// requires gradients; `make_grad_fn` is only invoked when recording.
pub(crate) fn record_op(
    result: &mut Tensor,
    inputs: &[&Tensor],
    make_grad_fn: impl FnOnce() -> Arc<dyn GradFn>,
) {
    if !is_grad_enabled() || !inputs.iter().any(|t| t.requires_grad_enabled()) {
        return;
    }

    result.requires_grad_(true);
    let grad_fn = make_grad_fn();
    result.set_grad_fn(grad_fn.clone());

    with_graph(|graph| {
        for input in inputs {
            graph.register_tensor((*input).clone());
        }
        graph.record(
            result.id(),
            grad_fn,
            inputs.iter().map(|t| t.id()).collect(),
        );
    });
}

/// Row-major `[m, k] @ [k, n]` on raw buffers.
pub(crate) fn matmul_raw(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    if m == 0 || k == 0 || n == 0 {
        return vec![0.0; m * n];
    }
    // Dimensions are validated by the callers, so trueno cannot reject them.
    let a_matrix = trueno::Matrix::from_vec(m, k, a.to_vec()).expect("valid matrix dimensions");
    let b_matrix = trueno::Matrix::from_vec(k, n, b.to_vec()).expect("valid matrix dimensions");
    let result = a_matrix
        .matmul(&b_matrix)
        .expect("matmul should succeed");
    result.as_slice().to_vec()
}

/// Numerically stable softplus: max(x, 0) + ln(1 + e^-|x|).
pub(crate) fn softplus_scalar(x: f32) -> f32 {
    if x == f32::NEG_INFINITY {
        return 0.0;
    }
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// softplus(x + a) - softplus(x), exact as x goes to ±∞.
fn softplus_shift_scalar(x: f32, a: f32) -> f32 {
    if x > 0.0 {
        // softplus(y) = y + softplus(-y)
        a + softplus_scalar(-x - a) - softplus_scalar(-x)
    } else {
        softplus_scalar(x + a) - softplus_scalar(x)
    }
}

impl Tensor {
    fn map(&self, f: impl Fn(f32) -> f32) -> Vec<f32> {
        self.data().iter().map(|&x| f(x)).collect()
    }

    fn zip_map(&self, other: &Tensor, op: &str, f: impl Fn(f32, f32) -> f32) -> Vec<f32> {
        assert_eq!(
            self.shape(),
            other.shape(),
            "{op}: shape mismatch {:?} vs {:?}",
            self.shape(),
            other.shape()
        );
        self.data()
            .iter()
            .zip(other.data().iter())
            .map(|(&a, &b)| f(a, b))
            .collect()
    }

    fn matrix_dims(&self, op: &str) -> (usize, usize) {
        assert_eq!(self.ndim(), 2, "{op} requires 2D tensor, got {:?}", self.shape());
        (self.shape()[0], self.shape()[1])
    }
}

// ============================================================================
// Element-wise Operations
// ============================================================================

impl Tensor {
    /// Element-wise addition: z = self + other
    #[must_use]
    pub fn add(&self, other: &Tensor) -> Tensor {
        let data = self.zip_map(other, "add", |a, b| a + b);
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self, other], || Arc::new(AddBackward));
        result
    }

    /// Element-wise subtraction: z = self - other
    #[must_use]
    pub fn sub(&self, other: &Tensor) -> Tensor {
        let data = self.zip_map(other, "sub", |a, b| a - b);
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self, other], || Arc::new(SubBackward));
        result
    }

    /// Element-wise multiplication: z = self * other
    #[must_use]
    pub fn mul(&self, other: &Tensor) -> Tensor {
        let data = self.zip_map(other, "mul", |a, b| a * b);
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self, other], || {
            Arc::new(MulBackward {
                x: self.clone(),
                y: other.clone(),
            })
        });
        result
    }

    /// Element-wise division: z = self / other
    #[must_use]
    pub fn div(&self, other: &Tensor) -> Tensor {
        let data = self.zip_map(other, "div", |a, b| a / b);
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self, other], || {
            Arc::new(DivBackward {
                x: self.clone(),
                y: other.clone(),
            })
        });
        result
    }

    /// Element-wise negation: z = -self
    #[must_use]
    pub fn neg(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(|a| -a), self.shape());
        record_op(&mut result, &[self], || Arc::new(NegBackward));
        result
    }

    /// Scalar multiplication: z = self * scalar
    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let mut result = Tensor::from_vec(self.map(|a| a * scalar), self.shape());
        record_op(&mut result, &[self], || Arc::new(ScaleBackward { scalar }));
        result
    }

    /// Scalar addition: z = self + scalar
    #[must_use]
    pub fn add_scalar(&self, scalar: f32) -> Tensor {
        let mut result = Tensor::from_vec(self.map(|a| a + scalar), self.shape());
        record_op(&mut result, &[self], || Arc::new(AddScalarBackward));
        result
    }
}

// ============================================================================
// Transcendental Operations
// ============================================================================

impl Tensor {
    /// Element-wise exponential: z = exp(self)
    #[must_use]
    pub fn exp(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(f32::exp), self.shape());
        let output = result.clone();
        record_op(&mut result, &[self], || Arc::new(ExpBackward { output }));
        result
    }

    /// Element-wise natural logarithm: z = ln(self)
    #[must_use]
    pub fn log(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(f32::ln), self.shape());
        record_op(&mut result, &[self], || Arc::new(LogBackward { x: self.clone() }));
        result
    }

    /// Element-wise power: z = self^n
    #[must_use]
    pub fn pow(&self, n: f32) -> Tensor {
        let mut result = Tensor::from_vec(self.map(|x| x.powf(n)), self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(PowBackward {
                x: self.clone(),
                n,
            })
        });
        result
    }

    /// Element-wise square root: z = sqrt(self)
    #[must_use]
    pub fn sqrt(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(f32::sqrt), self.shape());
        let output = result.clone();
        record_op(&mut result, &[self], || Arc::new(SqrtBackward { output }));
        result
    }

    /// Element-wise absolute value.
    #[must_use]
    pub fn abs(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(f32::abs), self.shape());
        record_op(&mut result, &[self], || Arc::new(AbsBackward { x: self.clone() }));
        result
    }

    /// Element-wise log-gamma: z = ln Γ(self). Evaluated in `f64`.
    #[must_use]
    pub fn lgamma(&self) -> Tensor {
        let data = self.map(|x| special::ln_gamma(f64::from(x)) as f32);
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(LgammaBackward { x: self.clone() })
        });
        result
    }

    /// Numerically stable softplus: z = ln(1 + e^self)
    #[must_use]
    pub fn softplus(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(softplus_scalar), self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(SoftplusBackward { x: self.clone() })
        });
        result
    }

    /// z = softplus(self + shift) - softplus(self)
    ///
    /// Evaluated without cancellation for large `|self|`: it tends to `shift`
    /// as `self → +∞` and to `0` as `self → -∞`.
    #[must_use]
    pub fn softplus_shift(&self, shift: &Tensor) -> Tensor {
        let data = self.zip_map(shift, "softplus_shift", softplus_shift_scalar);
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self, shift], || {
            Arc::new(SoftplusShiftBackward {
                x: self.clone(),
                shift: shift.clone(),
            })
        });
        result
    }

    /// Clamp every element into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, min: f32, max: f32) -> Tensor {
        assert!(min <= max, "clamp: min {min} > max {max}");
        let mut result = Tensor::from_vec(self.map(|x| x.clamp(min, max)), self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(ClampBackward {
                x: self.clone(),
                min,
                max,
            })
        });
        result
    }

    /// Clamp every element to at least `min`.
    #[must_use]
    pub fn clamp_min(&self, min: f32) -> Tensor {
        let mut result = Tensor::from_vec(self.map(|x| x.max(min)), self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(ClampBackward {
                x: self.clone(),
                min,
                max: f32::INFINITY,
            })
        });
        result
    }

    /// Replace entries where `mask` is true with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the mask shape differs from the tensor shape.
    #[must_use]
    pub fn masked_fill(&self, mask: &Mask, value: f32) -> Tensor {
        assert_eq!(
            self.shape(),
            mask.shape(),
            "masked_fill: mask shape {:?} doesn't match tensor shape {:?}",
            mask.shape(),
            self.shape()
        );
        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(mask.data())
            .map(|(&x, &filled)| if filled { value } else { x })
            .collect();
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(MaskedFillBackward {
                mask: mask.data().to_vec(),
            })
        });
        result
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

impl Tensor {
    /// Sum all elements to a scalar.
    #[must_use]
    pub fn sum(&self) -> Tensor {
        let total: f32 = self.data().iter().sum();
        let mut result = Tensor::new(&[total], &[1]);
        record_op(&mut result, &[self], || {
            Arc::new(SumBackward {
                input_shape: self.shape().to_vec(),
            })
        });
        result
    }

    /// Mean of all elements as a scalar.
    #[must_use]
    pub fn mean(&self) -> Tensor {
        let total: f32 = self.data().iter().sum();
        let mut result = Tensor::new(&[total / self.numel() as f32], &[1]);
        record_op(&mut result, &[self], || {
            Arc::new(MeanBackward {
                input_shape: self.shape().to_vec(),
            })
        });
        result
    }

    /// Per-row sum: `[B, F] -> [B]`.
    #[must_use]
    pub fn row_sum(&self) -> Tensor {
        let (rows, cols) = self.matrix_dims("row_sum");
        let data: Vec<f32> = if cols == 0 {
            vec![0.0; rows]
        } else {
            self.data().chunks(cols).map(|r| r.iter().sum()).collect()
        };
        let mut result = Tensor::from_vec(data, &[rows]);
        record_op(&mut result, &[self], || Arc::new(RowSumBackward { cols }));
        result
    }

    /// Per-row log-sum-exp: `[B, F] -> [B]`, shifted by the row maximum.
    #[must_use]
    pub fn logsumexp_rows(&self) -> Tensor {
        let (rows, cols) = self.matrix_dims("logsumexp_rows");
        assert!(cols > 0, "logsumexp_rows requires at least one column");
        let data: Vec<f32> = self
            .data()
            .chunks(cols)
            .map(|row| {
                let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                if max == f32::NEG_INFINITY {
                    return f32::NEG_INFINITY;
                }
                let s: f32 = row.iter().map(|&x| (x - max).exp()).sum();
                max + s.ln()
            })
            .collect();
        let mut result = Tensor::from_vec(data, &[rows]);
        let output = result.clone();
        record_op(&mut result, &[self], || {
            Arc::new(LogSumExpRowsBackward {
                x: self.clone(),
                output,
            })
        });
        result
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

impl Tensor {
    /// `ReLU`: max(0, x)
    #[must_use]
    pub fn relu(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(|x| x.max(0.0)), self.shape());
        record_op(&mut result, &[self], || Arc::new(ReluBackward { x: self.clone() }));
        result
    }

    /// Sigmoid: 1 / (1 + e^-x)
    #[must_use]
    pub fn sigmoid(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(stable_sigmoid), self.shape());
        let output = result.clone();
        record_op(&mut result, &[self], || Arc::new(SigmoidBackward { output }));
        result
    }

    /// Hyperbolic tangent.
    #[must_use]
    pub fn tanh_(&self) -> Tensor {
        let mut result = Tensor::from_vec(self.map(f32::tanh), self.shape());
        let output = result.clone();
        record_op(&mut result, &[self], || Arc::new(TanhBackward { output }));
        result
    }

    /// `LeakyReLU`: x if x > 0, else `negative_slope` * x
    #[must_use]
    pub fn leaky_relu(&self, negative_slope: f32) -> Tensor {
        let data = self.map(|x| if x > 0.0 { x } else { negative_slope * x });
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self], || {
            Arc::new(LeakyReluBackward {
                x: self.clone(),
                negative_slope,
            })
        });
        result
    }

    /// GELU (tanh approximation).
    #[must_use]
    pub fn gelu(&self) -> Tensor {
        let sqrt_2_over_pi = (2.0_f32 / std::f32::consts::PI).sqrt();
        let data = self.map(|x| {
            let inner = sqrt_2_over_pi * (x + 0.044715 * x.powi(3));
            0.5 * x * (1.0 + inner.tanh())
        });
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self], || Arc::new(GeluBackward { x: self.clone() }));
        result
    }
}

// ============================================================================
// Shape Operations
// ============================================================================

impl Tensor {
    /// Transpose a 2D tensor.
    ///
    /// # Example
    ///
    /// ```
    /// use scloss::autograd::Tensor;
    ///
    /// let a = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
    /// assert_eq!(a.transpose().data(), &[1.0, 3.0, 2.0, 4.0]);
    /// ```
    #[must_use]
    pub fn transpose(&self) -> Tensor {
        let (rows, cols) = self.matrix_dims("transpose");
        let mut result = Tensor::from_vec(self.transpose_data(), &[cols, rows]);
        record_op(&mut result, &[self], || Arc::new(TransposeBackward));
        result
    }

    /// Reshape tensor to a new shape (view).
    ///
    /// The total number of elements must remain the same.
    #[must_use]
    pub fn view(&self, new_shape: &[usize]) -> Tensor {
        let new_numel: usize = new_shape.iter().product();
        assert_eq!(
            self.numel(),
            new_numel,
            "view: number of elements must match ({} vs {new_numel})",
            self.numel()
        );
        let mut result = Tensor::new(self.data(), new_shape);
        record_op(&mut result, &[self], || {
            Arc::new(ViewBackward {
                input_shape: self.shape().to_vec(),
            })
        });
        result
    }

    /// Repeat a `[F]` vector over `batch` rows: `[F] -> [batch, F]`.
    #[must_use]
    pub fn expand_rows(&self, batch: usize) -> Tensor {
        assert_eq!(self.ndim(), 1, "expand_rows requires 1D tensor");
        let features = self.numel();
        let mut data = Vec::with_capacity(batch * features);
        for _ in 0..batch {
            data.extend_from_slice(self.data());
        }
        let mut result = Tensor::from_vec(data, &[batch, features]);
        record_op(&mut result, &[self], || Arc::new(ExpandRowsBackward));
        result
    }

    /// Repeat a `[B]` vector over `features` columns: `[B] -> [B, features]`.
    #[must_use]
    pub fn expand_cols(&self, features: usize) -> Tensor {
        assert_eq!(self.ndim(), 1, "expand_cols requires 1D tensor");
        let rows = self.numel();
        let data: Vec<f32> = self
            .data()
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(features))
            .collect();
        let mut result = Tensor::from_vec(data, &[rows, features]);
        record_op(&mut result, &[self], || Arc::new(ExpandColsBackward));
        result
    }

    /// Append a `[B]` column to a `[B, F]` matrix: `[B, F+1]`.
    #[must_use]
    pub fn cat_column(&self, column: &Tensor) -> Tensor {
        let (rows, cols) = self.matrix_dims("cat_column");
        assert_eq!(
            column.shape(),
            &[rows],
            "cat_column: column shape {:?} doesn't match {rows} rows",
            column.shape()
        );
        let mut data = Vec::with_capacity(rows * (cols + 1));
        for r in 0..rows {
            data.extend_from_slice(&self.data()[r * cols..(r + 1) * cols]);
            data.push(column.data()[r]);
        }
        let mut result = Tensor::from_vec(data, &[rows, cols + 1]);
        record_op(&mut result, &[self, column], || {
            Arc::new(CatColumnBackward { cols })
        });
        result
    }

    /// Gather the entries selected by `mask` into a 1-D tensor (row-major order).
    #[must_use]
    pub fn select(&self, mask: &Mask) -> Tensor {
        assert_eq!(
            self.shape(),
            mask.shape(),
            "select: mask shape {:?} doesn't match tensor shape {:?}",
            mask.shape(),
            self.shape()
        );
        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(mask.data())
            .filter_map(|(&x, &keep)| keep.then_some(x))
            .collect();
        let len = data.len();
        let mut result = Tensor::from_vec(data, &[len]);
        record_op(&mut result, &[self], || {
            Arc::new(SelectBackward {
                mask: mask.data().to_vec(),
                input_shape: self.shape().to_vec(),
            })
        });
        result
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

impl Tensor {
    /// Matrix multiplication: z = self @ other (2D only).
    #[must_use]
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let (m, k1) = self.matrix_dims("matmul");
        let (k2, n) = other.matrix_dims("matmul");
        assert_eq!(k1, k2, "matmul dimension mismatch: {k1} vs {k2}");

        let data = matmul_raw(self.data(), other.data(), m, k1, n);
        let mut result = Tensor::from_vec(data, &[m, n]);
        record_op(&mut result, &[self, other], || {
            Arc::new(MatmulBackward {
                x: self.clone(),
                y: other.clone(),
            })
        });
        result
    }

    /// Broadcast addition of a bias vector over rows: `[N, M] + [M]`.
    #[must_use]
    pub fn broadcast_add(&self, other: &Tensor) -> Tensor {
        let (rows, cols) = self.matrix_dims("broadcast_add");
        assert_eq!(other.ndim(), 1, "broadcast_add requires 1D vector");
        assert_eq!(
            cols,
            other.shape()[0],
            "Matrix columns {cols} must match vector length {}",
            other.shape()[0]
        );

        let mut data = self.data().to_vec();
        for r in 0..rows {
            for (v, b) in data[r * cols..(r + 1) * cols].iter_mut().zip(other.data()) {
                *v += b;
            }
        }
        let mut result = Tensor::from_vec(data, self.shape());
        record_op(&mut result, &[self, other], || Arc::new(BroadcastAddBackward));
        result
    }
}

// ============================================================================
// Gradient Reversal
// ============================================================================

impl Tensor {
    /// Identity in the forward pass; multiplies the gradient by `-lambd`
    /// in the backward pass.
    #[must_use]
    pub fn grad_reverse(&self, lambd: f32) -> Tensor {
        let mut result = Tensor::new(self.data(), self.shape());
        record_op(&mut result, &[self], || Arc::new(GradReverseBackward { lambd }));
        result
    }
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
