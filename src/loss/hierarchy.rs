//! Hierarchical multi-label classification over an ontology.
//!
//! Label codes below `maxsize` are leaf classes with their own logit. Codes
//! at or above `maxsize` are internal ontology nodes that cover a set of
//! leaves; a cell annotated with an internal node is trained to put its mass
//! somewhere inside that set without being penalised on the individual
//! covered leaves. `-1` marks an unannotated cell.

use std::collections::{BTreeMap, BTreeSet};

use crate::autograd::Tensor;
use crate::error::{ensure_matrix, LossError, Result};
use crate::mask::Mask;
use crate::nn::bce_with_logits;

/// Code of an unannotated cell.
pub const UNKNOWN_CODE: i64 = -1;

/// Mapping from internal node codes to the leaf classes they cover.
///
/// # Example
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use scloss::loss::LabelHierarchy;
///
/// let nodes = BTreeMap::from([(3, BTreeSet::from([0, 2]))]);
/// let hierarchy = LabelHierarchy::new(3, nodes).unwrap();
/// assert!(hierarchy.covers(3, 2));
/// assert!(!hierarchy.covers(3, 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelHierarchy {
    maxsize: usize,
    nodes: BTreeMap<i64, BTreeSet<usize>>,
}

impl LabelHierarchy {
    /// Build and validate a hierarchy over `maxsize` leaf classes.
    ///
    /// # Errors
    ///
    /// Returns [`LossError::InvalidHierarchy`] if a node code is below
    /// `maxsize`, covers no leaves or covers a leaf `>= maxsize`.
    pub fn new(maxsize: usize, nodes: BTreeMap<i64, BTreeSet<usize>>) -> Result<Self> {
        let first_internal = maxsize as i64;
        for (&code, leaves) in &nodes {
            if code < first_internal {
                return Err(LossError::InvalidHierarchy(format!(
                    "internal code {code} must be >= {maxsize}"
                )));
            }
            if leaves.is_empty() {
                return Err(LossError::InvalidHierarchy(format!(
                    "internal code {code} covers no leaves"
                )));
            }
            if let Some(&leaf) = leaves.iter().find(|&&leaf| leaf >= maxsize) {
                return Err(LossError::InvalidHierarchy(format!(
                    "internal code {code} covers leaf {leaf}, expected < {maxsize}"
                )));
            }
        }
        Ok(Self { maxsize, nodes })
    }

    /// Build from a dense coverage matrix where row `i` describes code `maxsize + i`.
    ///
    /// # Errors
    ///
    /// Returns [`LossError::InvalidHierarchy`] if a row is not `maxsize` wide
    /// or covers nothing.
    pub fn from_matrix(maxsize: usize, rows: &[Vec<bool>]) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != maxsize {
                return Err(LossError::InvalidHierarchy(format!(
                    "row {i} has {} columns, expected {maxsize}",
                    row.len()
                )));
            }
            let leaves: BTreeSet<usize> = row
                .iter()
                .enumerate()
                .filter_map(|(leaf, &covered)| covered.then_some(leaf))
                .collect();
            nodes.insert((maxsize + i) as i64, leaves);
        }
        Self::new(maxsize, nodes)
    }

    /// Number of leaf classes.
    #[must_use]
    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    /// Leaves covered by an internal node.
    #[must_use]
    pub fn leaves(&self, code: i64) -> Option<&BTreeSet<usize>> {
        self.nodes.get(&code)
    }

    #[must_use]
    pub fn is_internal(&self, code: i64) -> bool {
        self.nodes.contains_key(&code)
    }

    /// Whether `leaf` is a descendant of the internal node `code`.
    #[must_use]
    pub fn covers(&self, code: i64, leaf: usize) -> bool {
        self.nodes.get(&code).is_some_and(|l| l.contains(&leaf))
    }

    /// Number of internal nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over `(internal code, covered leaves)`.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &BTreeSet<usize>)> {
        self.nodes.iter().map(|(&code, leaves)| (code, leaves))
    }
}

/// Hierarchies keyed by label name (cell type, tissue, disease, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelHierarchies {
    by_label: BTreeMap<String, LabelHierarchy>,
}

impl LabelHierarchies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hierarchy for `label`, returning any previous one.
    pub fn insert(
        &mut self,
        label: impl Into<String>,
        hierarchy: LabelHierarchy,
    ) -> Option<LabelHierarchy> {
        self.by_label.insert(label.into(), hierarchy)
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&LabelHierarchy> {
        self.by_label.get(label)
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, LabelHierarchy)> for LabelHierarchies {
    fn from_iter<I: IntoIterator<Item = (S, LabelHierarchy)>>(iter: I) -> Self {
        Self {
            by_label: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Hierarchy-aware binary cross-entropy for one label.
///
/// `pred` holds `[batch, maxsize]` leaf logits and `cl` one code per cell.
///
/// - leaf codes get a one-hot target with unit weight
/// - `-1` rows get zero weight everywhere
/// - internal codes (only if present in the batch) keep their non-covered
///   leaves as negatives, drop the covered leaves from the loss, and add one
///   extra column whose logit is the log-sum-exp of the covered leaves with
///   target 1 and weight 1 on those rows only
///
/// The result is the weighted BCE averaged over every entry.
///
/// # Errors
///
/// - [`LossError::ShapeMismatch`] if `pred` is not `[cl.len(), maxsize]`
/// - [`LossError::MissingHierarchy`] if an internal code occurs and `clsname`
///   has no hierarchy
/// - [`LossError::UnknownLabel`] for codes below `-1` or internal codes absent
///   from the hierarchy
/// - [`LossError::InvalidHierarchy`] if the hierarchy was built for a different
///   `maxsize`
pub fn classification(
    clsname: &str,
    pred: &Tensor,
    cl: &[i64],
    maxsize: usize,
    hierarchies: &LabelHierarchies,
) -> Result<Tensor> {
    let (batch, classes) = ensure_matrix(pred.shape())?;
    if batch != cl.len() || classes != maxsize {
        return Err(LossError::shape_mismatch(&[cl.len(), maxsize], pred.shape()));
    }

    let unknown = |code: i64| LossError::UnknownLabel {
        label: clsname.to_string(),
        code,
    };

    let mut target = vec![0.0; batch * maxsize];
    let mut weight = vec![1.0; batch * maxsize];
    let mut internal_rows = Vec::new();
    for (row, &code) in cl.iter().enumerate() {
        let span = row * maxsize..(row + 1) * maxsize;
        match code {
            UNKNOWN_CODE => weight[span].fill(0.0),
            c if c < UNKNOWN_CODE => return Err(unknown(c)),
            c if c < maxsize as i64 => target[span.start + c as usize] = 1.0,
            c => internal_rows.push((row, c)),
        }
    }

    let target = Tensor::from_vec(target, &[batch, maxsize]);
    if internal_rows.is_empty() {
        let weight = Tensor::from_vec(weight, &[batch, maxsize]);
        return Ok(bce_with_logits(pred, &target, Some(&weight)));
    }

    let hierarchy = hierarchies
        .get(clsname)
        .ok_or_else(|| LossError::MissingHierarchy {
            label: clsname.to_string(),
        })?;
    if hierarchy.maxsize() != maxsize {
        return Err(LossError::InvalidHierarchy(format!(
            "hierarchy for '{clsname}' has {} leaves, expected {maxsize}",
            hierarchy.maxsize()
        )));
    }

    // logits outside the covered set are excluded from the extra column
    let mut outside = vec![false; batch * maxsize];
    let mut extra_weight = vec![0.0; batch];
    for &(row, code) in &internal_rows {
        let leaves = hierarchy.leaves(code).ok_or_else(|| unknown(code))?;
        for leaf in 0..maxsize {
            let idx = row * maxsize + leaf;
            if leaves.contains(&leaf) {
                weight[idx] = 0.0;
            } else {
                outside[idx] = true;
            }
        }
        extra_weight[row] = 1.0;
    }
    log::debug!(
        "classification '{clsname}': {} of {batch} cells annotated with internal nodes",
        internal_rows.len()
    );

    let extra_logit = pred
        .masked_fill(&Mask::new(outside, pred.shape()), f32::MIN)
        .logsumexp_rows();
    let logits = pred.cat_column(&extra_logit);
    let target = target.cat_column(&Tensor::ones(&[batch]));
    let weight = Tensor::from_vec(weight, &[batch, maxsize])
        .cat_column(&Tensor::from_vec(extra_weight, &[batch]));

    Ok(bce_with_logits(&logits, &target, Some(&weight)))
}
