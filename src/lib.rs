//! scloss: training losses for single-cell foundation models in pure Rust.
//!
//! scloss provides count-likelihood, contrastive, hierarchical and
//! adversarial losses over expression matrices, together with the small
//! tape-based autograd engine they run on and the augmentation utilities
//! used to build pretraining batches.
//!
//! # Quick Start
//!
//! ```
//! use scloss::prelude::*;
//!
//! // Two cells, three genes
//! let counts = Tensor::new(&[0.0, 3.0, 1.0, 5.0, 0.0, 2.0], &[2, 3]);
//! let mu = Tensor::new(&[0.5, 2.5, 1.0, 4.0, 0.2, 2.0], &[2, 3]).requires_grad();
//! let theta = Tensor::from_slice(&[2.0, 2.0, 2.0]);
//! let pi = Tensor::full(&[2, 3], -2.0);
//!
//! let loss = zinb(&counts, &mu, &theta, &pi, 1e-8).unwrap();
//! loss.backward();
//! assert!(get_grad(mu.id()).is_some());
//! ```
//!
//! # Modules
//!
//! - [`autograd`]: Tensors, the thread-local tape and differentiable ops
//! - [`nn`]: Linear / LayerNorm layers, activations, cross-entropy, initialisation
//! - [`loss`]: Regression, count, contrastive, hierarchical and adversarial losses
//! - [`mask`]: Boolean masks for masked reductions
//! - [`sampling`]: ZINB sampling, dropout simulation, random masking
//! - [`metrics`]: Label decoding and hierarchy-aware accuracy
//! - [`special`]: Log-gamma and digamma
//! - [`config`]: JSON-loadable hyper-parameters
//! - [`logging`]: Opt-in `env_logger` initialisation

pub mod autograd;
pub mod config;
pub mod error;
pub mod logging;
pub mod loss;
pub mod mask;
pub mod metrics;
pub mod nn;
pub mod prelude;
pub mod sampling;
pub mod special;

pub use error::{LossError, Result};
