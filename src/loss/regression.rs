//! Expression regression losses.
//!
//! ```text
//! mse            = mean((norm(log2(x+1)) - norm(log2(y+1)))²)
//! masked_mse     = Σ m·(x - y)² / Σ m
//! masked_mae     = Σ m·|x - y| / Σ m
//! relative_error = mean(|x - y| / (y + 1e-6))   over masked entries
//! ```
//!
//! `norm` rescales every row to sum to 10 000.

use std::f32::consts::LN_2;

use crate::autograd::Tensor;
use crate::error::{ensure_matrix, ensure_same_shape, LossError, Result};
use crate::mask::Mask;

const ROW_TOTAL: f32 = 1e4;
const RELATIVE_EPS: f32 = 1e-6;

fn log2_row_normalized(x: &Tensor, features: usize) -> Tensor {
    let logged = x.add_scalar(1.0).log().mul_scalar(1.0 / LN_2);
    logged
        .div(&logged.row_sum().expand_cols(features))
        .mul_scalar(ROW_TOTAL)
}

/// Mean squared error between log2-transformed, row-normalised profiles.
///
/// A row whose log2 transform sums to zero (an all-zero profile) divides by
/// zero and yields NaN.
///
/// # Errors
///
/// Returns [`LossError::ShapeMismatch`] unless both operands are the same
/// `[batch, features]` matrix.
///
/// # Example
///
/// ```
/// use scloss::autograd::Tensor;
/// use scloss::loss::mse;
///
/// let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
/// let loss = mse(&x, &x).unwrap();
/// assert!(loss.item().abs() < 1e-6);
/// ```
pub fn mse(input: &Tensor, target: &Tensor) -> Result<Tensor> {
    let (_, features) = ensure_matrix(input.shape())?;
    ensure_same_shape(input.shape(), target.shape())?;

    let x = log2_row_normalized(input, features);
    let y = log2_row_normalized(target, features);
    Ok(x.sub(&y).pow(2.0).mean())
}

/// Broadcast `mask` to `shape` and reject it if nothing is selected.
pub(crate) fn checked_mask(mask: &Mask, shape: &[usize], context: &str) -> Result<Mask> {
    let mask = mask.broadcast_to(shape)?;
    if mask.any() {
        Ok(mask)
    } else {
        Err(LossError::empty_mask(context))
    }
}

/// `Σ m·(input - target)² / Σ m`, shared by the masked regression and graph losses.
pub(crate) fn masked_squared_error(
    input: &Tensor,
    target: &Tensor,
    mask: &Mask,
    context: &str,
) -> Result<Tensor> {
    ensure_same_shape(input.shape(), target.shape())?;
    let mask = checked_mask(mask, input.shape(), context)?;
    let weights = mask.to_tensor();
    let diff = input.mul(&weights).sub(&target.mul(&weights));
    Ok(diff.pow(2.0).sum().mul_scalar(1.0 / mask.count() as f32))
}

/// Masked mean squared error.
///
/// `mask` may match `input` or be a `[features]` vector applied to every row.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] for incompatible operands or mask
/// - [`LossError::EmptyMask`] when no entry is selected
pub fn masked_mse(input: &Tensor, target: &Tensor, mask: &Mask) -> Result<Tensor> {
    masked_squared_error(input, target, mask, "masked_mse")
}

/// Masked mean absolute error.
///
/// # Errors
///
/// Same conditions as [`masked_mse`].
pub fn masked_mae(input: &Tensor, target: &Tensor, mask: &Mask) -> Result<Tensor> {
    ensure_same_shape(input.shape(), target.shape())?;
    let mask = checked_mask(mask, input.shape(), "masked_mae")?;
    let weights = mask.to_tensor();
    let diff = input.mul(&weights).sub(&target.mul(&weights));
    Ok(diff.abs().sum().mul_scalar(1.0 / mask.count() as f32))
}

/// Mean relative error over the masked entries only.
///
/// # Errors
///
/// Same conditions as [`masked_mse`].
pub fn masked_relative_error(input: &Tensor, target: &Tensor, mask: &Mask) -> Result<Tensor> {
    ensure_same_shape(input.shape(), target.shape())?;
    let mask = checked_mask(mask, input.shape(), "masked_relative_error")?;
    let x = input.select(&mask);
    let y = target.select(&mask);
    Ok(x.sub(&y).abs().div(&y.add_scalar(RELATIVE_EPS)).mean())
}
