//! Count-distribution likelihoods for UMI matrices.
//!
//! All parameters are tensors congruent to the `[batch, features]` count
//! matrix, except the dispersion `theta`, which may also be a per-gene
//! `[features]` vector shared by every cell.
//!
//! # References
//!
//! - Lopez, R., et al. (2018). Deep generative modeling for single-cell
//!   transcriptomics. Nature Methods.
//! - Eraslan, G., et al. (2019). Single-cell RNA-seq denoising using a deep
//!   count autoencoder. Nature Communications.

use crate::autograd::Tensor;
use crate::error::{ensure_matrix, ensure_same_shape, LossError, Result};
use crate::mask::Mask;
use crate::special::ln_gamma;

use super::regression::checked_mask;

/// Broadcast a per-gene dispersion to the count matrix shape.
fn broadcast_theta(theta: &Tensor, shape: &[usize]) -> Result<Tensor> {
    let (batch, features) = ensure_matrix(shape)?;
    if theta.shape() == shape {
        Ok(theta.clone())
    } else if theta.shape() == [features] {
        Ok(theta.expand_rows(batch))
    } else {
        Err(LossError::shape_mismatch(shape, theta.shape()))
    }
}

/// Per-entry NB log-likelihood.
fn nb_log_likelihood(target: &Tensor, mu: &Tensor, theta: &Tensor, eps: f32) -> Result<Tensor> {
    ensure_matrix(target.shape())?;
    ensure_same_shape(target.shape(), mu.shape())?;
    let theta = broadcast_theta(theta, target.shape())?;

    let log_theta_mu_eps = theta.add(mu).add_scalar(eps).log();
    let res = theta
        .mul(&theta.add_scalar(eps).log().sub(&log_theta_mu_eps))
        .add(&target.mul(&mu.add_scalar(eps).log().sub(&log_theta_mu_eps)))
        .add(&target.add(&theta).lgamma())
        .sub(&theta.lgamma())
        .sub(&target.add_scalar(1.0).lgamma());
    Ok(res)
}

/// Negative binomial loss parametrised by mean `mu` and inverse dispersion `theta`.
///
/// ```text
/// ll = θ·(log(θ+ε) - log(θ+μ+ε)) + x·(log(μ+ε) - log(θ+μ+ε))
///      + lgamma(x+θ) - lgamma(θ) - lgamma(x+1)
/// loss = -mean(ll)
/// ```
///
/// # Errors
///
/// Returns [`LossError::ShapeMismatch`] when `mu` differs from `target` or
/// `theta` is neither congruent nor a `[features]` vector.
///
/// # Example
///
/// ```
/// use scloss::autograd::Tensor;
/// use scloss::loss::nb;
///
/// let x = Tensor::new(&[0.0, 3.0, 1.0, 5.0], &[2, 2]);
/// let mu = Tensor::new(&[0.5, 3.0, 1.0, 4.0], &[2, 2]);
/// let theta = Tensor::from_slice(&[2.0, 2.0]);
/// let loss = nb(&x, &mu, &theta, 1e-8).unwrap();
/// assert!(loss.item().is_finite());
/// ```
pub fn nb(target: &Tensor, mu: &Tensor, theta: &Tensor, eps: f32) -> Result<Tensor> {
    Ok(nb_log_likelihood(target, mu, theta, eps)?.neg().mean())
}

/// Unreduced NB negative log-likelihood, one value per entry.
///
/// # Errors
///
/// Same conditions as [`nb`].
pub fn nb_nll(target: &Tensor, mu: &Tensor, theta: &Tensor, eps: f32) -> Result<Tensor> {
    Ok(nb_log_likelihood(target, mu, theta, eps)?.neg())
}

/// Zero-inflated negative binomial loss; `pi` is the dropout logit.
///
/// Entries with `target < eps` use the zero branch
/// `softplus(-π + θ·(log(θ+ε) - log(θ+μ+ε))) - softplus(-π)`, the others use
/// `-softplus(π) + θ·(…) + x·(…) + lgamma(x+θ) - lgamma(θ) - lgamma(x+1)`.
/// Both branches are evaluated in a form that stays finite at `π = -∞`,
/// where the loss equals [`nb`].
///
/// # Errors
///
/// Returns [`LossError::ShapeMismatch`] when `mu` or `pi` differ from `target`
/// or `theta` cannot be broadcast.
pub fn zinb(target: &Tensor, mu: &Tensor, theta: &Tensor, pi: &Tensor, eps: f32) -> Result<Tensor> {
    ensure_matrix(target.shape())?;
    ensure_same_shape(target.shape(), mu.shape())?;
    ensure_same_shape(target.shape(), pi.shape())?;
    let theta = broadcast_theta(theta, target.shape())?;

    let log_theta_mu_eps = theta.add(mu).add_scalar(eps).log();
    let theta_term = theta.mul(&theta.add_scalar(eps).log().sub(&log_theta_mu_eps));

    let case_zero = pi.neg().softplus_shift(&theta_term);
    let case_non_zero = pi
        .softplus()
        .neg()
        .add(&theta_term)
        .add(&target.mul(&mu.add_scalar(eps).log().sub(&log_theta_mu_eps)))
        .add(&target.add(&theta).lgamma())
        .sub(&theta.lgamma())
        .sub(&target.add_scalar(1.0).lgamma());

    let zero = Mask::from_tensor(target, |x| x < eps);
    let res = case_zero
        .mul(&zero.to_tensor())
        .add(&case_non_zero.mul(&zero.not().to_tensor()));
    Ok(res.neg().mean())
}

/// Probabilities clamped away from 0 and 1.
fn clamp_probs(input: &Tensor) -> Tensor {
    input.clamp(f32::EPSILON, 1.0 - f32::EPSILON)
}

/// Masked NB loss with `total_count = target` and success probability `input`.
///
/// ```text
/// ll = r·log(1-p) + k·log(p) + lgamma(r+k) - lgamma(1+k) - lgamma(r)   (r = k = target)
/// ```
///
/// The normalisation term is zero where `r + k == 0` and carries no gradient.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] for incompatible operands or mask
/// - [`LossError::EmptyMask`] when no entry is selected
pub fn masked_nb(input: &Tensor, target: &Tensor, mask: &Mask) -> Result<Tensor> {
    ensure_same_shape(input.shape(), target.shape())?;
    let mask = checked_mask(mask, input.shape(), "masked_nb")?;

    let normalization: Vec<f32> = target
        .data()
        .iter()
        .map(|&count| {
            // total_count and the evaluated value are both the observed count
            let (r, k) = (f64::from(count), f64::from(count));
            if r + k == 0.0 {
                0.0
            } else {
                (ln_gamma(r + k) - ln_gamma(1.0 + k) - ln_gamma(r)) as f32
            }
        })
        .collect();
    let normalization = Tensor::from_vec(normalization, target.shape());

    let p = clamp_probs(input);
    let ll = p
        .neg()
        .add_scalar(1.0)
        .log()
        .mul(target)
        .add(&p.log().mul(target))
        .add(&normalization);

    log::debug!(
        "masked_nb over {} of {} entries",
        mask.count(),
        input.numel()
    );
    Ok(ll
        .mul(&mask.to_tensor())
        .sum()
        .neg()
        .mul_scalar(1.0 / mask.count() as f32))
}

/// Bernoulli negative log-likelihood of `target > 0` under probability `input`.
///
/// # Errors
///
/// Same conditions as [`masked_nb`].
pub fn criterion_neg_log_bernoulli(input: &Tensor, target: &Tensor, mask: &Mask) -> Result<Tensor> {
    ensure_same_shape(input.shape(), target.shape())?;
    let mask = checked_mask(mask, input.shape(), "criterion_neg_log_bernoulli")?;

    let expressed = Mask::from_tensor(target, |x| x > 0.0);
    let p = clamp_probs(input);
    let ll = p
        .log()
        .mul(&expressed.to_tensor())
        .add(&p.neg().add_scalar(1.0).log().mul(&expressed.not().to_tensor()));

    Ok(ll
        .mul(&mask.to_tensor())
        .sum()
        .neg()
        .mul_scalar(1.0 / mask.count() as f32))
}
