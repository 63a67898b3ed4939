//! Gradient function trait and implementations.
//!
//! Each differentiable operation implements `GradFn` to define
//! how gradients flow backward through the operation.

use super::ops::matmul_raw;
use super::tensor::Tensor;
use crate::special;

/// Trait for functions that compute gradients during backward pass.
///
/// Each differentiable operation creates a `GradFn` implementation
/// that captures the necessary context for gradient computation.
///
/// # Example Implementation
///
/// For element-wise addition z = x + y:
/// - ∂z/∂x = 1
/// - ∂z/∂y = 1
///
/// So `backward(grad_output)` returns [`grad_output`, `grad_output`].
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs.
    ///
    /// # Arguments
    ///
    /// * `grad_output` - Gradient flowing back from downstream operations
    ///
    /// # Returns
    ///
    /// Vector of gradients, one for each input tensor.
    /// The order must match the input order used during forward pass.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

/// Apply `f(g, x)` element-wise over the upstream gradient and a saved tensor.
fn zip_grad(grad_output: &Tensor, saved: &Tensor, f: impl Fn(f32, f32) -> f32) -> Tensor {
    let data: Vec<f32> = grad_output
        .data()
        .iter()
        .zip(saved.data().iter())
        .map(|(&g, &x)| f(g, x))
        .collect();
    Tensor::new(&data, grad_output.shape())
}

/// Sum a `[rows, cols]` gradient over its rows, producing `[cols]`.
fn sum_over_rows(grad: &Tensor) -> Tensor {
    let (rows, cols) = (grad.shape()[0], grad.shape()[1]);
    let mut out = vec![0.0; cols];
    for r in 0..rows {
        for (c, acc) in out.iter_mut().enumerate() {
            *acc += grad.data()[r * cols + c];
        }
    }
    Tensor::new(&out, &[cols])
}

pub(crate) fn stable_sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

// ============================================================================
// Element-wise Operations
// ============================================================================

/// Gradient function for addition: z = x + y
pub(crate) struct AddBackward;

impl GradFn for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x+y)/∂x = 1, ∂(x+y)/∂y = 1
        vec![grad_output.clone(), grad_output.clone()]
    }

    fn name(&self) -> &'static str {
        "AddBackward"
    }
}

/// Gradient function for subtraction: z = x - y
pub(crate) struct SubBackward;

impl GradFn for SubBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x-y)/∂x = 1, ∂(x-y)/∂y = -1
        let grad_y: Vec<f32> = grad_output.data().iter().map(|&g| -g).collect();
        vec![
            grad_output.clone(),
            Tensor::new(&grad_y, grad_output.shape()),
        ]
    }

    fn name(&self) -> &'static str {
        "SubBackward"
    }
}

/// Gradient function for multiplication: z = x * y
pub(crate) struct MulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x*y)/∂x = y, ∂(x*y)/∂y = x
        vec![
            zip_grad(grad_output, &self.y, |g, y| g * y),
            zip_grad(grad_output, &self.x, |g, x| g * x),
        ]
    }

    fn name(&self) -> &'static str {
        "MulBackward"
    }
}

/// Gradient function for division: z = x / y
pub(crate) struct DivBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for DivBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x/y)/∂x = 1/y, ∂(x/y)/∂y = -x/y²
        let grad_x = zip_grad(grad_output, &self.y, |g, y| g / y);
        let grad_y_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .zip(self.y.data().iter())
            .map(|((&g, &x), &y)| -g * x / (y * y))
            .collect();
        vec![grad_x, Tensor::new(&grad_y_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "DivBackward"
    }
}

/// Gradient function for negation: z = -x
pub(crate) struct NegBackward;

impl GradFn for NegBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad_data: Vec<f32> = grad_output.data().iter().map(|&g| -g).collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "NegBackward"
    }
}

/// Gradient function for scalar multiplication: z = x * c
pub(crate) struct ScaleBackward {
    pub(crate) scalar: f32,
}

impl GradFn for ScaleBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad_data: Vec<f32> = grad_output.data().iter().map(|&g| g * self.scalar).collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "ScaleBackward"
    }
}

/// Gradient function for scalar addition: z = x + c
pub(crate) struct AddScalarBackward;

impl GradFn for AddScalarBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![grad_output.clone()]
    }

    fn name(&self) -> &'static str {
        "AddScalarBackward"
    }
}

// ============================================================================
// Transcendental Operations
// ============================================================================

/// Gradient function for exp: z = exp(x)
pub(crate) struct ExpBackward {
    pub(crate) output: Tensor, // exp(x) - we save the output, not input
}

impl GradFn for ExpBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.output, |g, exp_x| g * exp_x)]
    }

    fn name(&self) -> &'static str {
        "ExpBackward"
    }
}

/// Gradient function for log: z = log(x)
pub(crate) struct LogBackward {
    pub(crate) x: Tensor,
}

impl GradFn for LogBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.x, |g, x| g / x)]
    }

    fn name(&self) -> &'static str {
        "LogBackward"
    }
}

/// Gradient function for pow: z = x^n
pub(crate) struct PowBackward {
    pub(crate) x: Tensor,
    pub(crate) n: f32,
}

impl GradFn for PowBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x^n)/∂x = n * x^(n-1)
        let n = self.n;
        vec![zip_grad(grad_output, &self.x, |g, x| g * n * x.powf(n - 1.0))]
    }

    fn name(&self) -> &'static str {
        "PowBackward"
    }
}

/// Gradient function for sqrt: z = sqrt(x)
pub(crate) struct SqrtBackward {
    pub(crate) output: Tensor, // sqrt(x)
}

impl GradFn for SqrtBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.output, |g, s| g * 0.5 / s)]
    }

    fn name(&self) -> &'static str {
        "SqrtBackward"
    }
}

/// Gradient function for abs: z = |x|
pub(crate) struct AbsBackward {
    pub(crate) x: Tensor,
}

impl GradFn for AbsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // sign(0) = 0, matching the subgradient convention of most frameworks
        vec![zip_grad(grad_output, &self.x, |g, x| {
            if x > 0.0 {
                g
            } else if x < 0.0 {
                -g
            } else {
                0.0
            }
        })]
    }

    fn name(&self) -> &'static str {
        "AbsBackward"
    }
}

/// Gradient function for the log-gamma function: ∂lnΓ(x)/∂x = ψ(x)
pub(crate) struct LgammaBackward {
    pub(crate) x: Tensor,
}

impl GradFn for LgammaBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.x, |g, x| {
            g * special::digamma(f64::from(x)) as f32
        })]
    }

    fn name(&self) -> &'static str {
        "LgammaBackward"
    }
}

/// Gradient function for softplus: ∂log(1+eˣ)/∂x = σ(x)
pub(crate) struct SoftplusBackward {
    pub(crate) x: Tensor,
}

impl GradFn for SoftplusBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.x, |g, x| g * stable_sigmoid(x))]
    }

    fn name(&self) -> &'static str {
        "SoftplusBackward"
    }
}

/// Gradient function for z = softplus(x + a) - softplus(x)
///
/// - ∂z/∂x = σ(x + a) - σ(x)
/// - ∂z/∂a = σ(x + a)
pub(crate) struct SoftplusShiftBackward {
    pub(crate) x: Tensor,
    pub(crate) shift: Tensor,
}

impl GradFn for SoftplusShiftBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let n = grad_output.numel();
        let mut grad_x = Vec::with_capacity(n);
        let mut grad_a = Vec::with_capacity(n);
        for ((&g, &x), &a) in grad_output
            .data()
            .iter()
            .zip(self.x.data().iter())
            .zip(self.shift.data().iter())
        {
            let s_shifted = stable_sigmoid(x + a);
            grad_x.push(g * (s_shifted - stable_sigmoid(x)));
            grad_a.push(g * s_shifted);
        }
        vec![
            Tensor::new(&grad_x, grad_output.shape()),
            Tensor::new(&grad_a, grad_output.shape()),
        ]
    }

    fn name(&self) -> &'static str {
        "SoftplusShiftBackward"
    }
}

/// Gradient function for clamp: passes gradient where min <= x <= max
pub(crate) struct ClampBackward {
    pub(crate) x: Tensor,
    pub(crate) min: f32,
    pub(crate) max: f32,
}

impl GradFn for ClampBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (min, max) = (self.min, self.max);
        vec![zip_grad(grad_output, &self.x, |g, x| {
            if x >= min && x <= max {
                g
            } else {
                0.0
            }
        })]
    }

    fn name(&self) -> &'static str {
        "ClampBackward"
    }
}

/// Gradient function for masked fill: filled positions receive no gradient
pub(crate) struct MaskedFillBackward {
    pub(crate) mask: Vec<bool>,
}

impl GradFn for MaskedFillBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.mask.iter())
            .map(|(&g, &filled)| if filled { 0.0 } else { g })
            .collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "MaskedFillBackward"
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

/// Gradient function for sum: z = sum(x)
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        vec![Tensor::new(&vec![g; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}

/// Gradient function for mean: z = mean(x)
pub(crate) struct MeanBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for MeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        let grad_val = g / numel as f32;
        vec![Tensor::new(&vec![grad_val; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "MeanBackward"
    }
}

/// Gradient function for per-row sum: `[B, F] -> [B]`
pub(crate) struct RowSumBackward {
    pub(crate) cols: usize,
}

impl GradFn for RowSumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let rows = grad_output.numel();
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .flat_map(|&g| std::iter::repeat(g).take(self.cols))
            .collect();
        vec![Tensor::new(&grad_data, &[rows, self.cols])]
    }

    fn name(&self) -> &'static str {
        "RowSumBackward"
    }
}

/// Gradient function for per-row log-sum-exp: ∂z_b/∂x_bj = exp(x_bj - z_b)
pub(crate) struct LogSumExpRowsBackward {
    pub(crate) x: Tensor,
    pub(crate) output: Tensor,
}

impl GradFn for LogSumExpRowsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (rows, cols) = (self.x.shape()[0], self.x.shape()[1]);
        let mut grad_data = vec![0.0; rows * cols];
        for r in 0..rows {
            let g = grad_output.data()[r];
            let lse = self.output.data()[r];
            for c in 0..cols {
                let idx = r * cols + c;
                grad_data[idx] = g * (self.x.data()[idx] - lse).exp();
            }
        }
        vec![Tensor::new(&grad_data, self.x.shape())]
    }

    fn name(&self) -> &'static str {
        "LogSumExpRowsBackward"
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

/// Gradient function for `ReLU`: z = max(0, x)
pub(crate) struct ReluBackward {
    pub(crate) x: Tensor,
}

impl GradFn for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.x, |g, x| if x > 0.0 { g } else { 0.0 })]
    }

    fn name(&self) -> &'static str {
        "ReluBackward"
    }
}

/// Gradient function for `LeakyReLU`: z = `max(negative_slope` * x, x)
pub(crate) struct LeakyReluBackward {
    pub(crate) x: Tensor,
    pub(crate) negative_slope: f32,
}

impl GradFn for LeakyReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let slope = self.negative_slope;
        vec![zip_grad(grad_output, &self.x, |g, x| {
            if x > 0.0 {
                g
            } else {
                g * slope
            }
        })]
    }

    fn name(&self) -> &'static str {
        "LeakyReluBackward"
    }
}

/// Gradient function for sigmoid: ∂σ/∂x = σ(1 - σ)
pub(crate) struct SigmoidBackward {
    pub(crate) output: Tensor,
}

impl GradFn for SigmoidBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.output, |g, s| g * s * (1.0 - s))]
    }

    fn name(&self) -> &'static str {
        "SigmoidBackward"
    }
}

/// Gradient function for tanh: ∂tanh/∂x = 1 - tanh²
pub(crate) struct TanhBackward {
    pub(crate) output: Tensor,
}

impl GradFn for TanhBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.output, |g, t| g * (1.0 - t * t))]
    }

    fn name(&self) -> &'static str {
        "TanhBackward"
    }
}

/// Gradient function for GELU (tanh approximation)
/// GELU(x) ≈ 0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))
pub(crate) struct GeluBackward {
    pub(crate) x: Tensor,
}

impl GradFn for GeluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let sqrt_2_over_pi = (2.0_f32 / std::f32::consts::PI).sqrt();
        vec![zip_grad(grad_output, &self.x, |g, x| {
            let inner = sqrt_2_over_pi * (x + 0.044715 * x.powi(3));
            let tanh_inner = inner.tanh();
            let inner_deriv = sqrt_2_over_pi * (1.0 + 3.0 * 0.044715 * x.powi(2));
            let gelu_deriv =
                0.5 * (1.0 + tanh_inner) + 0.5 * x * (1.0 - tanh_inner.powi(2)) * inner_deriv;
            g * gelu_deriv
        })]
    }

    fn name(&self) -> &'static str {
        "GeluBackward"
    }
}

// ============================================================================
// Shape Operations
// ============================================================================

/// Gradient function for 2-D transpose
pub(crate) struct TransposeBackward;

impl GradFn for TransposeBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (rows, cols) = (grad_output.shape()[0], grad_output.shape()[1]);
        let mut data = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = grad_output.data()[i * cols + j];
            }
        }
        vec![Tensor::new(&data, &[cols, rows])]
    }

    fn name(&self) -> &'static str {
        "TransposeBackward"
    }
}

/// Gradient function for view/reshape
pub(crate) struct ViewBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for ViewBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![Tensor::new(grad_output.data(), &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "ViewBackward"
    }
}

/// Gradient function for `[F] -> [B, F]` row expansion
pub(crate) struct ExpandRowsBackward;

impl GradFn for ExpandRowsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![sum_over_rows(grad_output)]
    }

    fn name(&self) -> &'static str {
        "ExpandRowsBackward"
    }
}

/// Gradient function for `[B] -> [B, F]` column expansion
pub(crate) struct ExpandColsBackward;

impl GradFn for ExpandColsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (rows, cols) = (grad_output.shape()[0], grad_output.shape()[1]);
        let data: Vec<f32> = grad_output
            .data()
            .chunks(cols)
            .map(|row| row.iter().sum())
            .collect();
        vec![Tensor::new(&data, &[rows])]
    }

    fn name(&self) -> &'static str {
        "ExpandColsBackward"
    }
}

/// Gradient function for appending a column: `[B, F] ++ [B] -> [B, F+1]`
pub(crate) struct CatColumnBackward {
    pub(crate) cols: usize,
}

impl GradFn for CatColumnBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let rows = grad_output.shape()[0];
        let width = self.cols + 1;
        let mut grad_x = Vec::with_capacity(rows * self.cols);
        let mut grad_c = Vec::with_capacity(rows);
        for row in grad_output.data().chunks(width) {
            grad_x.extend_from_slice(&row[..self.cols]);
            grad_c.push(row[self.cols]);
        }
        vec![
            Tensor::new(&grad_x, &[rows, self.cols]),
            Tensor::new(&grad_c, &[rows]),
        ]
    }

    fn name(&self) -> &'static str {
        "CatColumnBackward"
    }
}

/// Gradient function for gathering masked entries into a 1-D tensor
pub(crate) struct SelectBackward {
    pub(crate) mask: Vec<bool>,
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SelectBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let mut upstream = grad_output.data().iter();
        let grad_data: Vec<f32> = self
            .mask
            .iter()
            .map(|&selected| {
                if selected {
                    upstream.next().copied().unwrap_or(0.0)
                } else {
                    0.0
                }
            })
            .collect();
        vec![Tensor::new(&grad_data, &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SelectBackward"
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

/// Gradient function for matmul: z = x @ y
///
/// - ∂L/∂x = ∂L/∂z @ yᵀ
/// - ∂L/∂y = xᵀ @ ∂L/∂z
pub(crate) struct MatmulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (m, k) = (self.x.shape()[0], self.x.shape()[1]);
        let n = self.y.shape()[1];

        let y_t = self.y.transpose_data();
        let x_t = self.x.transpose_data();

        let grad_x = matmul_raw(grad_output.data(), &y_t, m, n, k);
        let grad_y = matmul_raw(&x_t, grad_output.data(), k, m, n);

        vec![
            Tensor::new(&grad_x, &[m, k]),
            Tensor::new(&grad_y, &[k, n]),
        ]
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// Gradient function for bias addition: `[N, M] + [M]`
pub(crate) struct BroadcastAddBackward;

impl GradFn for BroadcastAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![grad_output.clone(), sum_over_rows(grad_output)]
    }

    fn name(&self) -> &'static str {
        "BroadcastAddBackward"
    }
}

// ============================================================================
// Gradient Reversal
// ============================================================================

/// Gradient function for gradient reversal: identity forward, `-λ·g` backward.
///
/// Used to train a feature extractor adversarially against a discriminator
/// (Ganin & Lempitsky, 2015).
pub(crate) struct GradReverseBackward {
    pub(crate) lambd: f32,
}

impl GradFn for GradReverseBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad_data: Vec<f32> = grad_output
            .data()
            .iter()
            .map(|&g| -self.lambd * g)
            .collect();
        vec![Tensor::new(&grad_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "GradReverseBackward"
    }
}

// ============================================================================
// Fused Losses
// ============================================================================

/// Gradient function for per-sample cross-entropy (combined softmax + NLL)
///
/// ∂L_b/∂x_bi = softmax(x_b)_i - 1[i == target_b]
pub(crate) struct CrossEntropyBackward {
    pub(crate) softmax_output: Tensor, // softmax(logits)
    pub(crate) targets: Vec<usize>,    // target class indices
}

impl GradFn for CrossEntropyBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (batch, classes) = (
            self.softmax_output.shape()[0],
            self.softmax_output.shape()[1],
        );
        let mut grad = self.softmax_output.data().to_vec();
        for (b, &target) in self.targets.iter().enumerate() {
            grad[b * classes + target] -= 1.0;
            let g = grad_output.data()[b];
            for v in &mut grad[b * classes..(b + 1) * classes] {
                *v *= g;
            }
        }
        vec![Tensor::new(&grad, &[batch, classes])]
    }

    fn name(&self) -> &'static str {
        "CrossEntropyBackward"
    }
}

/// Gradient function for weighted binary cross-entropy with logits
///
/// ∂L/∂x = w · (σ(x) - y)
pub(crate) struct BceWithLogitsBackward {
    pub(crate) logits: Tensor,
    pub(crate) targets: Vec<f32>,
    pub(crate) weights: Option<Vec<f32>>,
}

impl GradFn for BceWithLogitsBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad_data: Vec<f32> = self
            .logits
            .data()
            .iter()
            .zip(self.targets.iter())
            .zip(grad_output.data().iter())
            .enumerate()
            .map(|(i, ((&x, &y), &g))| {
                let w = self.weights.as_ref().map_or(1.0, |w| w[i]);
                g * w * (stable_sigmoid(x) - y)
            })
            .collect();
        vec![Tensor::new(&grad_data, self.logits.shape())]
    }

    fn name(&self) -> &'static str {
        "BceWithLogitsBackward"
    }
}
