//! Training losses for single-cell foundation models.
//!
//! Every loss takes [`Tensor`](crate::autograd::Tensor) operands, records
//! itself on the autograd tape and returns a scalar tensor ready for
//! `backward()`. Inputs are validated up front and reported as
//! [`LossError`](crate::error::LossError).
//!
//! - **Regression**: [`mse`], [`masked_mse`], [`masked_mae`], [`masked_relative_error`]
//! - **Count likelihoods**: [`nb`], [`nb_nll`], [`zinb`], [`masked_nb`],
//!   [`criterion_neg_log_bernoulli`]
//! - **Contrastive / structural**: [`similarity`], [`ecs`], [`graph_similarity`],
//!   [`graph_sparsity`]
//! - **Classification**: [`classification`] over a [`LabelHierarchy`]
//! - **Adversarial**: [`AdversarialDiscriminator`]
//!
//! # Usage
//!
//! ```
//! use scloss::autograd::Tensor;
//! use scloss::loss::masked_mse;
//! use scloss::mask::Mask;
//!
//! let pred = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).requires_grad();
//! let target = Tensor::new(&[1.0, 0.0, 3.0, 0.0], &[2, 2]);
//! let mask = Mask::from_slice(&[true, false]);
//!
//! let loss = masked_mse(&pred, &target, &mask).unwrap();
//! assert_eq!(loss.item(), 0.0);
//! loss.backward();
//! ```

mod adversarial;
mod contrastive;
mod count;
mod hierarchy;
mod regression;

pub use adversarial::{AdversarialDiscriminator, DiscriminatorConfig};
pub use contrastive::{ecs, graph_similarity, graph_sparsity, similarity};
pub use count::{criterion_neg_log_bernoulli, masked_nb, nb, nb_nll, zinb};
pub use hierarchy::{classification, LabelHierarchies, LabelHierarchy, UNKNOWN_CODE};
pub use regression::{masked_mae, masked_mse, masked_relative_error, mse};
