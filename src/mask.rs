//! Boolean masks congruent to a tensor.
//!
//! Masked losses accept either a mask with exactly the tensor's shape or a
//! 1-D `[features]` mask that is broadcast over the rows of a `[batch, features]`
//! tensor.

use crate::autograd::Tensor;
use crate::error::{LossError, Result};

/// A row-major boolean mask with a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Vec<bool>,
    shape: Vec<usize>,
}

impl Mask {
    /// Create a mask from values and a shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn new(data: Vec<bool>, shape: &[usize]) -> Self {
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "Mask length {} doesn't match shape {:?}",
            data.len(),
            shape
        );
        Self {
            data,
            shape: shape.to_vec(),
        }
    }

    /// Create a 1-D mask.
    #[must_use]
    pub fn from_slice(data: &[bool]) -> Self {
        Self::new(data.to_vec(), &[data.len()])
    }

    /// Mask with every entry set to `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: bool) -> Self {
        let len = shape.iter().product();
        Self::new(vec![value; len], shape)
    }

    /// Mask from a predicate over a tensor's entries.
    #[must_use]
    pub fn from_tensor(tensor: &Tensor, pred: impl Fn(f32) -> bool) -> Self {
        Self::new(tensor.data().iter().map(|&v| pred(v)).collect(), tensor.shape())
    }

    #[must_use]
    pub fn data(&self) -> &[bool] {
        &self.data
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of selected (true) entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }

    /// Whether any entry is selected.
    #[must_use]
    pub fn any(&self) -> bool {
        self.data.iter().any(|&m| m)
    }

    /// Logical negation.
    #[must_use]
    pub fn not(&self) -> Self {
        Self::new(self.data.iter().map(|&m| !m).collect(), &self.shape)
    }

    /// Convert to a constant `0.0` / `1.0` tensor.
    #[must_use]
    pub fn to_tensor(&self) -> Tensor {
        let data: Vec<f32> = self.data.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect();
        Tensor::from_vec(data, &self.shape)
    }

    /// Broadcast to `shape`.
    ///
    /// A mask already of that shape is returned unchanged; a 1-D `[F]` mask is
    /// repeated over the rows of a `[B, F]` shape.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Mask> {
        if self.shape == shape {
            return Ok(self.clone());
        }
        match (self.shape.as_slice(), shape) {
            ([features], [batch, cols]) if features == cols => {
                let mut data = Vec::with_capacity(batch * cols);
                for _ in 0..*batch {
                    data.extend_from_slice(&self.data);
                }
                Ok(Mask::new(data, shape))
            }
            _ => Err(LossError::shape_mismatch(shape, &self.shape)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_any() {
        let m = Mask::from_slice(&[true, false, true]);
        assert_eq!(m.count(), 2);
        assert!(m.any());
        assert!(!Mask::full(&[2, 2], false).any());
    }

    #[test]
    fn test_to_tensor() {
        let m = Mask::new(vec![true, false, false, true], &[2, 2]);
        let t = m.to_tensor();
        assert_eq!(t.data(), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(t.shape(), &[2, 2]);
    }

    #[test]
    fn test_broadcast_feature_mask() {
        let m = Mask::from_slice(&[true, false, true]);
        let b = m.broadcast_to(&[2, 3]).unwrap();
        assert_eq!(b.shape(), &[2, 3]);
        assert_eq!(b.count(), 4);
        assert_eq!(b.data(), &[true, false, true, true, false, true]);
    }

    #[test]
    fn test_broadcast_incompatible() {
        let m = Mask::from_slice(&[true, false]);
        assert!(matches!(
            m.broadcast_to(&[2, 3]),
            Err(LossError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_tensor_and_not() {
        let t = Tensor::from_slice(&[0.0, 2.0, 0.0]);
        let nonzero = Mask::from_tensor(&t, |v| v > 0.0);
        assert_eq!(nonzero.data(), &[false, true, false]);
        assert_eq!(nonzero.not().count(), 2);
    }
}
