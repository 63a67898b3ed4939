//! Neural network building blocks on top of the autograd engine.
//!
//! Organised around the [`Module`] trait:
//!
//! - **Layers**: [`Linear`], [`LayerNorm`]
//! - **Activations**: [`Activation`]
//! - **Losses**: [`CrossEntropyLoss`], [`BCEWithLogitsLoss`]
//! - **Initialization**: [`xavier_uniform`], [`init_linear`]
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style, high-performance
//!   deep learning library. `NeurIPS`.
//! - Ba, J. L., Kiros, J. R., & Hinton, G. E. (2016). Layer normalization.

mod activation;
pub mod init;
mod linear;
pub mod loss;
mod module;
mod normalization;

pub use activation::Activation;
pub use init::{init_linear, xavier_uniform, InitConfig};
pub use linear::Linear;
pub use loss::{bce_with_logits, cross_entropy, BCEWithLogitsLoss, CrossEntropyLoss, Reduction};
pub use module::Module;
pub use normalization::LayerNorm;
