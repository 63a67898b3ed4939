//! Error types for scloss operations.
//!
//! Loss functions validate shapes, masks and label tables before touching
//! the tape and report failures through [`LossError`].

use thiserror::Error;

/// Main error type for loss, sampling and configuration operations.
///
/// # Examples
///
/// ```
/// use scloss::error::LossError;
///
/// let err = LossError::ShapeMismatch {
///     expected: "[4, 10]".to_string(),
///     actual: "[4, 5]".to_string(),
/// };
/// assert!(err.to_string().contains("shape mismatch"));
/// ```
#[derive(Debug, Error)]
pub enum LossError {
    /// Operand shapes are incompatible for the requested loss.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape description
        expected: String,
        /// Actual shape found
        actual: String,
    },

    /// A masked reduction was requested with no selected entries.
    #[error("empty mask: {context} requires at least one selected entry")]
    EmptyMask {
        /// Name of the reduction that received the mask
        context: String,
    },

    /// Internal (non-leaf) labels were used without a hierarchy table.
    #[error("label '{label}' has non-leaf codes but no hierarchy was supplied")]
    MissingHierarchy {
        /// Label name
        label: String,
    },

    /// A label code is neither a known class nor a known internal node.
    #[error("unknown code {code} for label '{label}'")]
    UnknownLabel {
        /// Label name
        label: String,
        /// Offending code
        code: i64,
    },

    /// A hierarchy table failed validation.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Invalid numeric parameter.
    #[error("invalid parameter: {param} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LossError {
    /// Create a shape mismatch error from two shapes.
    #[must_use]
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Create an empty mask error for the named reduction.
    #[must_use]
    pub fn empty_mask(context: &str) -> Self {
        Self::EmptyMask {
            context: context.to_string(),
        }
    }

    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(param: &str, value: impl ToString, constraint: &str) -> Self {
        Self::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, LossError>;

/// Check that two shapes are identical.
pub(crate) fn ensure_same_shape(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LossError::shape_mismatch(expected, actual))
    }
}

/// Check that a tensor shape is a 2-D matrix.
pub(crate) fn ensure_matrix(shape: &[usize]) -> Result<(usize, usize)> {
    match shape {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(LossError::ShapeMismatch {
            expected: "[rows, cols]".to_string(),
            actual: format!("{shape:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_display() {
        let err = LossError::shape_mismatch(&[2, 3], &[2, 4]);
        let msg = err.to_string();
        assert!(msg.contains("shape mismatch"));
        assert!(msg.contains("[2, 3]"));
        assert!(msg.contains("[2, 4]"));
    }

    #[test]
    fn test_empty_mask_display() {
        let err = LossError::empty_mask("masked_mse");
        assert!(err.to_string().contains("masked_mse"));
    }

    #[test]
    fn test_missing_hierarchy_display() {
        let err = LossError::MissingHierarchy {
            label: "cell_type".to_string(),
        };
        assert!(err.to_string().contains("cell_type"));
        assert!(err.to_string().contains("hierarchy"));
    }

    #[test]
    fn test_unknown_label_display() {
        let err = LossError::UnknownLabel {
            label: "tissue".to_string(),
            code: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("tissue"));
    }

    #[test]
    fn test_invalid_parameter_helper() {
        let err = LossError::invalid_parameter("renoise", 1.5, "[0, 1]");
        let msg = err.to_string();
        assert!(msg.contains("renoise"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("[0, 1]"));
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: LossError = json_err.into();
        assert!(matches!(err, LossError::Serialization(_)));
    }

    #[test]
    fn test_ensure_same_shape() {
        assert!(ensure_same_shape(&[2, 2], &[2, 2]).is_ok());
        assert!(ensure_same_shape(&[2, 2], &[4]).is_err());
    }

    #[test]
    fn test_ensure_matrix() {
        assert_eq!(ensure_matrix(&[3, 4]).unwrap(), (3, 4));
        assert!(ensure_matrix(&[12]).is_err());
    }
}
