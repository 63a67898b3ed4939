//! Stochastic augmentation of count matrices.
//!
//! Every function takes the random source explicitly so runs can be
//! reproduced with a seeded generator:
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use scloss::sampling::masker;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mask = masker(100, 4, 0.15, None, &mut rng).unwrap();
//! assert_eq!(mask.count(), 4 * 15);
//! ```

use rand::seq::index;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::autograd::Tensor;
use crate::error::{ensure_matrix, ensure_same_shape, LossError, Result};
use crate::mask::Mask;

/// Upper bound on Gamma draws fed to the Poisson sampler.
const MAX_POISSON_RATE: f64 = 1e8;

fn poisson<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> Result<f64> {
    if rate > 0.0 {
        let dist = Poisson::new(rate)
            .map_err(|e| LossError::invalid_parameter("poisson rate", rate, &e.to_string()))?;
        Ok(dist.sample(rng))
    } else {
        Ok(0.0)
    }
}

/// Draw counts from a zero-inflated negative binomial.
///
/// Each draw is a Gamma–Poisson mixture with shape `theta` and rate
/// `theta / mu`, set to zero with probability `zi_probs`. Entries with
/// `mu == 0` are always zero. The output has shape `sample_shape ++ mu.shape()`.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] if `theta` or `zi_probs` differ from `mu`
/// - [`LossError::InvalidParameter`] for negative `mu`, non-positive `theta`
///   or `zi_probs` outside `[0, 1]`
pub fn zinb_sample<R>(
    mu: &Tensor,
    theta: &Tensor,
    zi_probs: &Tensor,
    sample_shape: &[usize],
    rng: &mut R,
) -> Result<Tensor>
where
    R: Rng + ?Sized,
{
    ensure_same_shape(mu.shape(), theta.shape())?;
    ensure_same_shape(mu.shape(), zi_probs.shape())?;

    let gammas = mu
        .data()
        .iter()
        .zip(theta.data())
        .map(|(&m, &t)| {
            if !(m >= 0.0 && m.is_finite()) {
                return Err(LossError::invalid_parameter("mu", m, ">= 0"));
            }
            if !(t > 0.0 && t.is_finite()) {
                return Err(LossError::invalid_parameter("theta", t, "> 0"));
            }
            if m == 0.0 {
                return Ok(None);
            }
            let (shape, scale) = (f64::from(t), f64::from(m) / f64::from(t));
            Gamma::new(shape, scale)
                .map(Some)
                .map_err(|e| LossError::invalid_parameter("theta", t, &e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    if let Some(&p) = zi_probs.data().iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(LossError::invalid_parameter("zi_probs", p, "in [0, 1]"));
    }

    let draws: usize = sample_shape.iter().product();
    let mut samples = Vec::with_capacity(draws * mu.numel());
    let mut clamped = 0usize;
    for _ in 0..draws {
        for (gamma, &zi) in gammas.iter().zip(zi_probs.data()) {
            let rate = match gamma {
                Some(g) => {
                    let r = g.sample(rng);
                    if r > MAX_POISSON_RATE {
                        clamped += 1;
                        MAX_POISSON_RATE
                    } else {
                        r
                    }
                }
                None => 0.0,
            };
            let count = poisson(rate, rng)?;
            let dropout = rng.gen::<f32>() <= zi;
            samples.push(if dropout { 0.0 } else { count as f32 });
        }
    }
    if clamped > 0 {
        log::warn!("zinb_sample: clamped {clamped} gamma draws to {MAX_POISSON_RATE}");
    }

    let mut shape = sample_shape.to_vec();
    shape.extend_from_slice(mu.shape());
    Ok(Tensor::from_vec(samples, &shape))
}

/// Simulate shallower sequencing of a `[cells, genes]` count matrix.
///
/// With `tnoise = 1 - sqrt(1 - renoise)`, every entry loses
/// `Poisson(U · tnoise · rowsum / (0.5 · genes))` counts (sampling zeros)
/// and is dropped entirely with probability `tnoise` (technical zeros).
/// Results are clamped at zero and truncated to whole counts.
///
/// # Errors
///
/// Returns [`LossError::ShapeMismatch`] for a non-matrix input and
/// [`LossError::InvalidParameter`] if `renoise` is outside `[0, 1]`.
pub fn downsample_profile<R>(mat: &Tensor, renoise: f32, rng: &mut R) -> Result<Tensor>
where
    R: Rng + ?Sized,
{
    let (cells, genes) = ensure_matrix(mat.shape())?;
    if !(0.0..=1.0).contains(&renoise) {
        return Err(LossError::invalid_parameter("renoise", renoise, "in [0, 1]"));
    }
    if genes == 0 {
        return Ok(Tensor::zeros(mat.shape()));
    }

    let tnoise = 1.0 - (1.0 - f64::from(renoise)).sqrt();
    let mut out = Vec::with_capacity(cells * genes);
    for row in mat.data().chunks(genes) {
        let total: f64 = row.iter().map(|&x| f64::from(x)).sum();
        let scale = tnoise * total / (0.5 * genes as f64);
        for &x in row {
            let removed = poisson(rng.gen::<f64>() * scale, rng)?;
            let kept = rng.gen::<f64>() > tnoise;
            let value = if kept {
                (f64::from(x) - removed).max(0.0).trunc()
            } else {
                0.0
            };
            out.push(value as f32);
        }
    }
    log::debug!("downsample_profile: {cells} cells x {genes} genes, tnoise={tnoise:.4}");
    Ok(Tensor::from_vec(out, mat.shape()))
}

/// Random masking of gene positions for masked-expression pretraining.
///
/// Each of the `batch_size` rows masks `floor(length · mask_ratio)` distinct
/// positions, drawn uniformly or, when `mask_prob` is given, in proportion to
/// its (not necessarily normalised) weights without replacement.
///
/// # Errors
///
/// - [`LossError::InvalidParameter`] if `mask_ratio` is outside `[0, 1]`, a
///   weight is negative or non-finite, or fewer positions have positive
///   weight than must be masked
/// - [`LossError::ShapeMismatch`] if `mask_prob` is not `length` long
pub fn masker<R>(
    length: usize,
    batch_size: usize,
    mask_ratio: f32,
    mask_prob: Option<&[f32]>,
    rng: &mut R,
) -> Result<Mask>
where
    R: Rng + ?Sized,
{
    if !(0.0..=1.0).contains(&mask_ratio) {
        return Err(LossError::invalid_parameter("mask_ratio", mask_ratio, "in [0, 1]"));
    }
    let amount = ((length as f32 * mask_ratio).floor() as usize).min(length);

    if let Some(weights) = mask_prob {
        if weights.len() != length {
            return Err(LossError::shape_mismatch(&[length], &[weights.len()]));
        }
        if let Some(&w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
            return Err(LossError::invalid_parameter("mask_prob", w, "finite and >= 0"));
        }
        let positive = weights.iter().filter(|&&w| w > 0.0).count();
        if positive < amount {
            return Err(LossError::invalid_parameter(
                "mask_prob",
                format!("{positive} positive weights"),
                &format!(">= {amount} positive weights"),
            ));
        }
    }

    let mut data = vec![false; batch_size * length];
    for row in data.chunks_mut(length.max(1)).take(batch_size) {
        let picked = match mask_prob {
            None => index::sample(rng, length, amount),
            Some(weights) => index::sample_weighted(rng, length, |i| weights[i], amount)
                .map_err(|e| LossError::invalid_parameter("mask_prob", e, "valid weights"))?,
        };
        for i in picked.iter() {
            row[i] = true;
        }
    }
    Ok(Mask::new(data, &[batch_size, length]))
}
