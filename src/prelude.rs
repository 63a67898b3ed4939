//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use scloss::prelude::*;
//! ```

pub use crate::autograd::{clear_graph, get_grad, grad_reverse, no_grad, Tensor};
pub use crate::config::LossConfig;
pub use crate::error::{LossError, Result};
pub use crate::loss::{
    classification, criterion_neg_log_bernoulli, ecs, graph_similarity, graph_sparsity,
    masked_mae, masked_mse, masked_nb, masked_relative_error, mse, nb, nb_nll, similarity, zinb,
    AdversarialDiscriminator, DiscriminatorConfig, LabelHierarchies, LabelHierarchy,
};
pub use crate::mask::Mask;
pub use crate::nn::Module;
pub use crate::sampling::{downsample_profile, masker, zinb_sample};
