//! Contrastive and structural losses over cell embeddings and gene graphs.

use crate::autograd::Tensor;
use crate::error::{ensure_matrix, ensure_same_shape, LossError, Result};
use crate::mask::Mask;
use crate::nn::cross_entropy;

use super::regression::masked_squared_error;

/// Norm floor used by cosine similarity.
const COSINE_EPS: f32 = 1e-8;
/// Norm floor used by L2 row normalisation.
const NORMALIZE_EPS: f32 = 1e-12;

/// Divide every row by `max(||row||, eps)`.
///
/// The floor is applied to the squared norm so a zero row has a finite
/// gradient.
fn l2_normalize_rows(x: &Tensor, eps: f32) -> Tensor {
    let features = x.shape()[1];
    let norm = x.pow(2.0).row_sum().clamp_min(eps * eps).sqrt();
    x.div(&norm.expand_cols(features))
}

fn ensure_batch(rows: usize) -> Result<()> {
    if rows == 0 {
        Err(LossError::invalid_parameter("batch", rows, ">= 1"))
    } else {
        Ok(())
    }
}

/// InfoNCE-style similarity loss between two views of the same cells.
///
/// Builds the `[B, B]` cosine-similarity matrix between rows of `x` and `y`,
/// divides it by `temperature` and applies cross-entropy with row `i`
/// matched to column `i`.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] unless `x` and `y` are the same `[B, D]` matrix
/// - [`LossError::InvalidParameter`] for an empty batch or non-positive temperature
///
/// # Example
///
/// ```
/// use scloss::autograd::Tensor;
/// use scloss::loss::similarity;
///
/// let x = Tensor::new(&[1.0, 0.0, 0.0, 1.0], &[2, 2]);
/// let aligned = similarity(&x, &x, 0.1).unwrap();
/// let swapped = Tensor::new(&[0.0, 1.0, 1.0, 0.0], &[2, 2]);
/// let crossed = similarity(&x, &swapped, 0.1).unwrap();
/// assert!(aligned.item() < crossed.item());
/// ```
pub fn similarity(x: &Tensor, y: &Tensor, temperature: f32) -> Result<Tensor> {
    let (batch, _) = ensure_matrix(x.shape())?;
    ensure_same_shape(x.shape(), y.shape())?;
    ensure_batch(batch)?;
    if temperature.is_nan() || temperature <= 0.0 {
        return Err(LossError::invalid_parameter(
            "temperature",
            temperature,
            "> 0",
        ));
    }

    let xn = l2_normalize_rows(x, COSINE_EPS);
    let yn = l2_normalize_rows(y, COSINE_EPS);
    let logits = xn.matmul(&yn.transpose()).mul_scalar(1.0 / temperature);
    let labels: Vec<usize> = (0..batch).collect();
    Ok(cross_entropy(&logits, &labels))
}

/// Elastic cell similarity.
///
/// Pushes off-diagonal cosine similarities of the batch away from
/// `threshold`:
///
/// ```text
/// cos = relu(normalize(E) · normalize(E)ᵀ)   with zero diagonal
/// loss = mean(1 - (cos - threshold)²)
/// ```
///
/// # Errors
///
/// Returns [`LossError::ShapeMismatch`] for a non-matrix input and
/// [`LossError::InvalidParameter`] for an empty batch.
pub fn ecs(cell_emb: &Tensor, threshold: f32) -> Result<Tensor> {
    let (batch, _) = ensure_matrix(cell_emb.shape())?;
    ensure_batch(batch)?;

    let normed = l2_normalize_rows(cell_emb, NORMALIZE_EPS);
    let diagonal = Mask::from_tensor(&Tensor::eye(batch), |v| v != 0.0);
    let cos = normed
        .matmul(&normed.transpose())
        .masked_fill(&diagonal, 0.0)
        .relu();

    Ok(cos
        .add_scalar(-threshold)
        .pow(2.0)
        .neg()
        .add_scalar(1.0)
        .mean())
}

/// Masked squared error between two gene-graph adjacency predictions.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] for incompatible operands or mask
/// - [`LossError::EmptyMask`] when no entry is selected
pub fn graph_similarity(a: &Tensor, b: &Tensor, mask: &Mask) -> Result<Tensor> {
    masked_squared_error(a, b, mask, "graph_similarity")
}

/// Masked squared magnitude of a gene-graph adjacency, pulling it towards zero.
///
/// # Errors
///
/// Same conditions as [`graph_similarity`].
pub fn graph_sparsity(a: &Tensor, mask: &Mask) -> Result<Tensor> {
    masked_squared_error(a, &Tensor::zeros_like(a), mask, "graph_sparsity")
}
