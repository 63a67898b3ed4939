//! Evaluation helpers for label predictions.
//!
//! Decodes integer class codes back to names and scores predictions with
//! credit for landing inside an internal ontology node.

use std::collections::BTreeMap;

use crate::error::{LossError, Result};
use crate::loss::LabelHierarchy;

/// Code → name table for one label.
///
/// # Examples
///
/// ```
/// use scloss::metrics::LabelDecoder;
///
/// let decoder = LabelDecoder::from_names("cell_type", ["T cell", "B cell"]);
/// assert_eq!(decoder.decode(&[1, 0]).unwrap(), vec!["B cell", "T cell"]);
/// assert!(decoder.decode(&[2]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDecoder {
    label: String,
    names: BTreeMap<i64, String>,
}

impl LabelDecoder {
    #[must_use]
    pub fn new(label: impl Into<String>, names: BTreeMap<i64, String>) -> Self {
        Self {
            label: label.into(),
            names,
        }
    }

    /// Assign codes `0..n` to `names` in order.
    #[must_use]
    pub fn from_names<I, S>(label: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .enumerate()
            .map(|(code, name)| (code as i64, name.into()))
            .collect();
        Self::new(label, names)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn name(&self, code: i64) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Decode every code.
    ///
    /// # Errors
    ///
    /// Returns [`LossError::UnknownLabel`] for the first code without a name.
    pub fn decode(&self, codes: &[i64]) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|&code| {
                self.name(code)
                    .map(str::to_string)
                    .ok_or_else(|| LossError::UnknownLabel {
                        label: self.label.clone(),
                        code,
                    })
            })
            .collect()
    }
}

/// Fraction of correct predictions, crediting predictions inside an internal node.
///
/// A prediction is correct when it equals the truth, or when the truth is an
/// internal node of `hierarchy` that covers the predicted leaf.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] if `pred` and `truth` differ in length
/// - [`LossError::InvalidParameter`] if there are no observations
/// - [`LossError::UnknownLabel`] if a truth code is neither a class below
///   `n_classes` nor an internal node
///
/// # Examples
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use scloss::loss::LabelHierarchy;
/// use scloss::metrics::hierarchical_accuracy;
///
/// let h = LabelHierarchy::new(3, BTreeMap::from([(3, BTreeSet::from([0, 2]))])).unwrap();
/// let acc = hierarchical_accuracy("cell_type", &[0, 2, 1], &[0, 3, 3], 3, Some(&h)).unwrap();
/// assert!((acc - 2.0 / 3.0).abs() < 1e-6);
/// ```
pub fn hierarchical_accuracy(
    label: &str,
    pred: &[i64],
    truth: &[i64],
    n_classes: usize,
    hierarchy: Option<&LabelHierarchy>,
) -> Result<f32> {
    if pred.len() != truth.len() {
        return Err(LossError::shape_mismatch(&[truth.len()], &[pred.len()]));
    }
    if truth.is_empty() {
        return Err(LossError::invalid_parameter("truth", "[]", "non-empty"));
    }

    let mut correct = 0usize;
    for (&p, &t) in pred.iter().zip(truth) {
        if p == t {
            correct += 1;
            continue;
        }
        match hierarchy {
            Some(h) if h.is_internal(t) => {
                if usize::try_from(p).is_ok_and(|leaf| h.covers(t, leaf)) {
                    correct += 1;
                }
            }
            _ if t < 0 || t >= n_classes as i64 => {
                return Err(LossError::UnknownLabel {
                    label: label.to_string(),
                    code: t,
                });
            }
            _ => {}
        }
    }
    Ok(correct as f32 / truth.len() as f32)
}
