//! Adversarial batch discriminator.
//!
//! A small MLP tries to predict the batch (sequencing run, donor, ...) of
//! each cell from its embedding. With gradient reversal enabled the
//! embedding is pushed to make that prediction harder (Ganin & Lempitsky,
//! 2015).

use serde::{Deserialize, Serialize};

use crate::autograd::{grad_reverse, Tensor};
use crate::error::{ensure_matrix, LossError, Result};
use crate::nn::{cross_entropy, Activation, LayerNorm, Linear, Module};

fn default_nlayers() -> usize {
    3
}

fn default_reverse_grad() -> bool {
    true
}

fn default_lambd() -> f32 {
    1.0
}

/// Shape and behaviour of an [`AdversarialDiscriminator`].
///
/// # Example
///
/// ```
/// use scloss::loss::DiscriminatorConfig;
///
/// let config: DiscriminatorConfig =
///     serde_json::from_str(r#"{"d_model": 16, "n_cls": 4}"#).unwrap();
/// assert_eq!(config.nlayers, 3);
/// assert!(config.reverse_grad);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    /// Embedding width
    pub d_model: usize,
    /// Number of batch classes
    pub n_cls: usize,
    /// Total linear layers, including the output layer
    #[serde(default = "default_nlayers")]
    pub nlayers: usize,
    #[serde(default)]
    pub activation: Activation,
    /// Insert a gradient reversal in front of the network
    #[serde(default = "default_reverse_grad")]
    pub reverse_grad: bool,
    /// Gradient reversal strength
    #[serde(default = "default_lambd")]
    pub lambd: f32,
    /// Seed for weight initialisation
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DiscriminatorConfig {
    #[must_use]
    pub fn new(d_model: usize, n_cls: usize) -> Self {
        Self {
            d_model,
            n_cls,
            nlayers: default_nlayers(),
            activation: Activation::default(),
            reverse_grad: default_reverse_grad(),
            lambd: default_lambd(),
            seed: None,
        }
    }

    #[must_use]
    pub fn with_nlayers(mut self, nlayers: usize) -> Self {
        self.nlayers = nlayers;
        self
    }

    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    #[must_use]
    pub fn with_reverse_grad(mut self, reverse_grad: bool) -> Self {
        self.reverse_grad = reverse_grad;
        self
    }

    #[must_use]
    pub fn with_lambd(mut self, lambd: f32) -> Self {
        self.lambd = lambd;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check that every dimension is non-zero and `lambd` is finite.
    ///
    /// # Errors
    ///
    /// Returns [`LossError::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.d_model == 0 {
            return Err(LossError::invalid_parameter("d_model", self.d_model, ">= 1"));
        }
        if self.n_cls == 0 {
            return Err(LossError::invalid_parameter("n_cls", self.n_cls, ">= 1"));
        }
        if self.nlayers == 0 {
            return Err(LossError::invalid_parameter("nlayers", self.nlayers, ">= 1"));
        }
        if !self.lambd.is_finite() {
            return Err(LossError::invalid_parameter("lambd", self.lambd, "finite"));
        }
        Ok(())
    }
}

/// `Linear → LayerNorm → activation` repeated `nlayers - 1` times, then a
/// `Linear(d_model, n_cls)` classifier trained with cross-entropy.
pub struct AdversarialDiscriminator {
    blocks: Vec<(Linear, LayerNorm)>,
    out_layer: Linear,
    config: DiscriminatorConfig,
}

impl AdversarialDiscriminator {
    /// Build the network described by `config`.
    ///
    /// Layer `i` is seeded with `seed + i` when a seed is given.
    ///
    /// # Errors
    ///
    /// Returns [`LossError::InvalidParameter`] if the configuration is invalid.
    pub fn new(config: DiscriminatorConfig) -> Result<Self> {
        config.validate()?;
        let seed_for = |layer: usize| config.seed.map(|s| s.wrapping_add(layer as u64));

        let blocks = (0..config.nlayers - 1)
            .map(|i| {
                (
                    Linear::with_seed(config.d_model, config.d_model, seed_for(i)),
                    LayerNorm::new(config.d_model),
                )
            })
            .collect();
        let out_layer = Linear::with_seed(
            config.d_model,
            config.n_cls,
            seed_for(config.nlayers - 1),
        );
        log::debug!(
            "adversarial discriminator: d_model={} n_cls={} nlayers={} reverse_grad={}",
            config.d_model,
            config.n_cls,
            config.nlayers,
            config.reverse_grad
        );

        Ok(Self {
            blocks,
            out_layer,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }

    /// Mutable access to the output classifier, e.g. to load weights.
    pub fn out_layer_mut(&mut self) -> &mut Linear {
        &mut self.out_layer
    }

    fn run(&self, x: &Tensor) -> Tensor {
        let mut h = if self.config.reverse_grad {
            grad_reverse(x, self.config.lambd)
        } else {
            x.clone()
        };
        for (linear, norm) in &self.blocks {
            h = self.config.activation.forward(&norm.forward(&linear.forward(&h)));
        }
        self.out_layer.forward(&h)
    }

    /// Class logits `[batch, n_cls]` for embeddings `x`.
    ///
    /// # Errors
    ///
    /// Returns [`LossError::ShapeMismatch`] unless `x` is `[batch, d_model]`.
    pub fn logits(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, width) = ensure_matrix(x.shape())?;
        if width != self.config.d_model {
            return Err(LossError::shape_mismatch(
                &[batch, self.config.d_model],
                x.shape(),
            ));
        }
        Ok(self.run(x))
    }

    /// Mean cross-entropy of the predicted batch against `batch_labels`.
    ///
    /// # Errors
    ///
    /// - [`LossError::ShapeMismatch`] for a wrong embedding shape or label count
    /// - [`LossError::InvalidParameter`] for a label `>= n_cls`
    pub fn forward(&self, x: &Tensor, batch_labels: &[usize]) -> Result<Tensor> {
        let logits = self.logits(x)?;
        let batch = logits.shape()[0];
        if batch_labels.len() != batch {
            return Err(LossError::shape_mismatch(&[batch], &[batch_labels.len()]));
        }
        if let Some(&label) = batch_labels.iter().find(|&&l| l >= self.config.n_cls) {
            return Err(LossError::invalid_parameter(
                "batch_labels",
                label,
                &format!("< {}", self.config.n_cls),
            ));
        }
        Ok(cross_entropy(&logits, batch_labels))
    }
}

impl Module for AdversarialDiscriminator {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.run(input)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params: Vec<&Tensor> = self
            .blocks
            .iter()
            .flat_map(|(linear, norm)| linear.parameters().into_iter().chain(norm.parameters()))
            .collect();
        params.extend(self.out_layer.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params: Vec<&mut Tensor> = Vec::new();
        for (linear, norm) in &mut self.blocks {
            params.extend(linear.parameters_mut());
            params.extend(norm.parameters_mut());
        }
        params.extend(self.out_layer.parameters_mut());
        params
    }
}

impl std::fmt::Debug for AdversarialDiscriminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdversarialDiscriminator")
            .field("config", &self.config)
            .field("hidden_blocks", &self.blocks.len())
            .finish_non_exhaustive()
    }
}
