//! Loss hyper-parameters.
//!
//! [`LossConfig`] gathers the scalar knobs used across the losses and the
//! augmentation utilities so a training driver can load them from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{LossError, Result};
use crate::loss::DiscriminatorConfig;

/// Hyper-parameters shared by the losses and augmentation utilities.
///
/// # Example
///
/// ```
/// use scloss::config::LossConfig;
///
/// let config = LossConfig::from_json_str(r#"{"ecs_threshold": 0.3}"#).unwrap();
/// assert_eq!(config.ecs_threshold, 0.3);
/// assert_eq!(config.eps, 1e-8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    /// Stability epsilon for the count likelihoods (> 0)
    pub eps: f32,

    /// Cosine-similarity threshold for the elastic cell similarity loss ([-1, 1])
    pub ecs_threshold: f32,

    /// Temperature dividing the cosine similarities in the contrastive loss (> 0)
    pub similarity_temperature: f32,

    /// Gradient reversal strength for the adversarial discriminator (>= 0)
    pub grad_reverse_lambda: f32,

    /// Fraction of positions masked per row ([0, 1])
    pub mask_ratio: f32,

    /// Dropout simulation strength ([0, 1])
    pub renoise: f32,

    /// Number of layers of the adversarial discriminator (>= 1)
    pub discriminator_layers: usize,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            eps: 1e-8,
            ecs_threshold: 0.5,
            similarity_temperature: 1.0,
            grad_reverse_lambda: 1.0,
            mask_ratio: 0.15,
            renoise: 0.6,
            discriminator_layers: 3,
        }
    }
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LossError::InvalidConfig(format!(
            "{name} must be finite and > 0, got {value}"
        )))
    }
}

fn check_range(name: &str, value: f32, lo: f32, hi: f32) -> Result<()> {
    if (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(LossError::InvalidConfig(format!(
            "{name} must be in [{lo}, {hi}], got {value}"
        )))
    }
}

impl LossConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        check_positive("eps", self.eps)?;
        check_range("ecs_threshold", self.ecs_threshold, -1.0, 1.0)?;
        check_positive("similarity_temperature", self.similarity_temperature)?;
        if !(self.grad_reverse_lambda.is_finite() && self.grad_reverse_lambda >= 0.0) {
            return Err(LossError::InvalidConfig(format!(
                "grad_reverse_lambda must be finite and >= 0, got {}",
                self.grad_reverse_lambda
            )));
        }
        check_range("mask_ratio", self.mask_ratio, 0.0, 1.0)?;
        check_range("renoise", self.renoise, 0.0, 1.0)?;
        if self.discriminator_layers == 0 {
            return Err(LossError::InvalidConfig(
                "discriminator_layers must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the stability epsilon with validation
    pub fn with_eps(mut self, eps: f32) -> Result<Self> {
        check_positive("eps", eps)?;
        self.eps = eps;
        Ok(self)
    }

    /// Set the ECS threshold with validation
    pub fn with_ecs_threshold(mut self, threshold: f32) -> Result<Self> {
        check_range("ecs_threshold", threshold, -1.0, 1.0)?;
        self.ecs_threshold = threshold;
        Ok(self)
    }

    /// Set the contrastive temperature with validation
    pub fn with_similarity_temperature(mut self, temperature: f32) -> Result<Self> {
        check_positive("similarity_temperature", temperature)?;
        self.similarity_temperature = temperature;
        Ok(self)
    }

    /// Set the gradient reversal strength
    pub fn with_grad_reverse_lambda(mut self, lambd: f32) -> Result<Self> {
        if !(lambd.is_finite() && lambd >= 0.0) {
            return Err(LossError::InvalidConfig(format!(
                "grad_reverse_lambda must be finite and >= 0, got {lambd}"
            )));
        }
        self.grad_reverse_lambda = lambd;
        Ok(self)
    }

    /// Set the mask ratio with validation
    pub fn with_mask_ratio(mut self, ratio: f32) -> Result<Self> {
        check_range("mask_ratio", ratio, 0.0, 1.0)?;
        self.mask_ratio = ratio;
        Ok(self)
    }

    /// Set the dropout simulation strength with validation
    pub fn with_renoise(mut self, renoise: f32) -> Result<Self> {
        check_range("renoise", renoise, 0.0, 1.0)?;
        self.renoise = renoise;
        Ok(self)
    }

    /// Set the discriminator depth
    pub fn with_discriminator_layers(mut self, layers: usize) -> Result<Self> {
        if layers == 0 {
            return Err(LossError::InvalidConfig(
                "discriminator_layers must be >= 1".to_string(),
            ));
        }
        self.discriminator_layers = layers;
        Ok(self)
    }

    /// Discriminator settings for embeddings of width `d_model` and `n_cls` batches.
    #[must_use]
    pub fn discriminator(&self, d_model: usize, n_cls: usize) -> DiscriminatorConfig {
        DiscriminatorConfig::new(d_model, n_cls)
            .with_nlayers(self.discriminator_layers)
            .with_lambd(self.grad_reverse_lambda)
    }

    /// Parse from JSON; missing fields take their defaults. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LossConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.eps, 1e-8);
        assert_eq!(config.discriminator_layers, 3);
    }

    #[test]
    fn test_validate_rejects_zero_temperature() {
        let config = LossConfig {
            similarity_temperature: 0.0,
            ..LossConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("similarity_temperature"));
    }

    #[test]
    fn test_validate_rejects_renoise_out_of_range() {
        let config = LossConfig {
            renoise: 1.5,
            ..LossConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LossError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builder_setters() {
        let config = LossConfig::default()
            .with_ecs_threshold(0.2)
            .and_then(|c| c.with_mask_ratio(0.3))
            .and_then(|c| c.with_discriminator_layers(2))
            .unwrap();
        assert_eq!(config.ecs_threshold, 0.2);
        assert_eq!(config.mask_ratio, 0.3);
        assert_eq!(config.discriminator_layers, 2);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(LossConfig::default().with_eps(-1.0).is_err());
        assert!(LossConfig::default().with_eps(f32::NAN).is_err());
        assert!(LossConfig::default().with_ecs_threshold(1.5).is_err());
        assert!(LossConfig::default().with_grad_reverse_lambda(-0.1).is_err());
        assert!(LossConfig::default().with_renoise(-0.1).is_err());
        assert!(LossConfig::default().with_discriminator_layers(0).is_err());
        assert!(LossConfig::default().with_similarity_temperature(0.0).is_err());
    }

    #[test]
    fn test_discriminator_settings() {
        let config = LossConfig::default()
            .with_grad_reverse_lambda(0.5)
            .and_then(|c| c.with_discriminator_layers(2))
            .unwrap();
        let disc = config.discriminator(16, 4);
        assert_eq!(disc.nlayers, 2);
        assert_eq!(disc.lambd, 0.5);
        assert!(disc.reverse_grad);
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = LossConfig::from_json_str(r#"{"renoise": 0.25}"#).unwrap();
        assert_eq!(config.renoise, 0.25);
        assert_eq!(config.mask_ratio, 0.15);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LossConfig::default().with_mask_ratio(0.4).unwrap();
        let json = config.to_json_string().unwrap();
        assert_eq!(LossConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_json_invalid_value_rejected() {
        let err = LossConfig::from_json_str(r#"{"mask_ratio": 2.0}"#).unwrap_err();
        assert!(matches!(err, LossError::InvalidConfig(_)));
    }

    #[test]
    fn test_json_malformed() {
        let err = LossConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, LossError::Serialization(_)));
    }
}
