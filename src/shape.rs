use serde::{ Serialize, Deserialize };
use itertools::Itertools;

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Storage is always row-major, so dimensions are all a shape needs to carry.
/// A dimension of `0` stands for "not known yet" in [Parameter](crate::Parameter) shapes.

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self { dims: dims.to_vec() }
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  /// Whether every dimension is known.

  pub fn is_complete(&self) -> bool {
    self.dims.iter().all(|&n| n != 0 )
  }

  /// Fill unknown dimensions from `other`, keeping known ones.
  ///
  /// Returns [None] if ranks differ or a known dimension contradicts `other`.
  /// Unknown dimensions in `other` never match known ones.

  pub fn complete(&self, other: &[usize]) -> Option<Self> {
    if self.rank() != other.len() { return None }
    let dims = self.dims.iter()
      .zip(other)
      .map(|(&a, &b)| match (a, b) {
        (0, b) => Some(b),
        (a, b) if a == b => Some(a),
        _ => None,
      })
      .collect::<Option<Vec<_>>>()?;
    Some(Self { dims })
  }

  /// Collapse all dimensions behind the first one into a single one.

  pub fn flatten(&self) -> Self {
    match self.rank() {
      0 => Self::new(&[1, 1]),
      1 => Self::new(&[1, self.dims[0]]),
      _ => Self::new(&[self.dims[0], self.dims[1..].iter().product()]),
    }
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank());
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape[{}]", self.dims.iter().join(", "))
  }
}
