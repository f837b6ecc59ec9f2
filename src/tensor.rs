use std::rc::Rc;
use std::cell::{ Ref, RefMut, RefCell };

use rand::Rng;
use serde::{ Serialize, Deserialize };

pub(crate) mod kernels;

use crate::{
  internal::*,
  shape::Shape,
  scalar::{ Inner, Numeric, Real },
  ops::ActType,
};


/// Dense, row-major multidimensional array.
///
/// Cloning a Tensor is cheap and shares its storage with the clone, which
/// is how [Parameter](crate::Parameter) values are shared between a
/// network's layers and its compiled graph. Use [detach](Tensor::detach)
/// for an independent copy.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.shape == rhs.shape && *self.data.borrow() == *rhs.data.borrow()
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn shape(&self) -> &Shape {
    &self.shape
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn dim(&self, idx: isize) -> usize {
    self.shape[idx]
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub fn raw_mut(&self) -> RefMut<Vec<T>> {
    self.data.borrow_mut()
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.raw()[0]
  }

  /// Whether both tensors are backed by the same storage.

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's contents in place, so every clone sees the change.

  pub fn feed(&self, other: &Self) {
    assert!(self.shape == other.shape,
      "Could not feed {} tensor with {} tensor", self.shape, other.shape);
    if self.shared_with(other) { return }
    self.raw_mut().copy_from_slice(&other.raw());
  }

  pub fn detach(&self) -> Self {
    Self::from_shape(self.shape.clone(), self.raw().clone())
  }

  /// View the same storage with different dimensions.

  pub fn reshape(&self, dims: &[usize]) -> Self {
    let shape = Shape::new(dims);
    assert_eq!(shape.size(), self.size(),
      "Could not reshape {} tensor to {}", self.shape, shape);
    Self { shape, data: self.data.clone() }
  }

  pub fn vectorize<O, F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.raw().iter().copied().map(cb).collect();
    Tensor::from_shape(self.shape.clone(), data)
  }

}

impl<T: Numeric> Tensor<T> {
  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn mul_scalar(&self, factor: T) -> Self {
    self.vectorize(|a| a * factor )
  }
}

impl<T: Real> Tensor<T> {
  pub fn uniform(shape: &[usize], low: T, high: T) -> Self {
    let mut rng = rand::thread_rng();
    let len = shape.iter().product();
    Self::new(shape, (0..len).map(|_| rng.gen_range(low, high) ).collect())
  }

  pub fn randn(shape: &[usize]) -> Self {
    let len = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len as f64 / 2.0).ceil() as usize {
      let j = i * 2;
      let (r1, r2): (T, T) = randn();
      data[j] = r1;
      data[(j + 1) % len] = r2;
    }
    Self::new(shape, data)
  }

  /// Uniform in `±sqrt(6 / (fan_in + fan_out))`.

  pub fn glorot_uniform(shape: &[usize]) -> Self {
    let fan_in = shape.first().copied().unwrap_or(1);
    let fan_out = shape.last().copied().unwrap_or(1);
    let limit = T::from(6.0 / (fan_in + fan_out) as f64).unwrap().sqrt();
    Self::uniform(shape, -limit, limit)
  }

  /// Element-wise comparison with relative and absolute tolerance.

  pub fn allclose(&self, rhs: &Self, rtol: T, atol: T) -> bool {
    self.shape == rhs.shape && self.raw().iter()
      .zip(rhs.raw().iter())
      .all(|(&a, &b)| (a - b).abs() <= atol + rtol * b.abs() )
  }

  /// `self · weight + bias`, with `self` of shape `(batch, in)` and `weight` of shape `(in, out)`.

  pub fn fully_connected(&self, weight: &Self, bias: Option<&Self>) -> Self {
    let out = Self::zeros(&[self.dim(0), weight.dim(-1)]);
    self.fully_connected_into(weight, bias, &out);
    out
  }

  pub fn fully_connected_into(&self, weight: &Self, bias: Option<&Self>, out: &Self) {
    kernels::fully_connected(self, weight, bias, out)
  }

  pub fn activation(&self, act: ActType) -> Self {
    self.vectorize(|a| kernels::activate(act, a) )
  }

  pub fn activation_into(&self, act: ActType, out: &Self) {
    kernels::activation(self, act, out)
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.raw(), f)
  }
}

fn print_chunks<T: std::fmt::Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = " ".repeat(idx * 2);
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 {
    writeln!(f, "{indent}{:?}", vec)?;
  } else if !vec.is_empty() {
    writeln!(f, "{indent}[")?;
    for chunk in vec.chunks(vec.len() / shape.dims[idx]) {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    writeln!(f, "{indent}]")?;
  }
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shared_storage() {
    let a = Tensor::vec(&[1.0, 2.0]);
    let b = a.clone();
    a.feed(&Tensor::vec(&[3.0, 4.0]));
    assert_eq!(b, Tensor::vec(&[3.0, 4.0]));
    assert!(a.shared_with(&b));
    assert!(!a.shared_with(&a.detach()));
  }

  #[test]
  fn reshape_is_a_view() {
    let a = Tensor::new(&[2,3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let b = a.reshape(&[3,2]);
    assert!(a.shared_with(&b));
    assert_eq!(b.shape().dims, vec![3,2]);
  }

  #[test]
  #[should_panic]
  fn feed_mismatch() {
    Tensor::<f32>::zeros(&[2]).feed(&Tensor::zeros(&[3]));
  }

  #[test]
  fn fully_connected() {
    let x = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let w = Tensor::new(&[3,2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = Tensor::vec(&[1.0, -1.0]);
    assert_eq!(x.fully_connected(&w, None), Tensor::new(&[2,2], vec![22.0, 28.0, 49.0, 64.0]));
    assert_eq!(x.fully_connected(&w, Some(&b)), Tensor::new(&[2,2], vec![23.0, 27.0, 50.0, 63.0]));
  }

  #[test]
  fn fully_connected_into_overwrites() {
    let x = Tensor::new(&[1,2], vec![1.0, 1.0]);
    let w = Tensor::new(&[2,1], vec![2.0, 3.0]);
    let out = Tensor::fill(&[1,1], 100.0);
    x.fully_connected_into(&w, None, &out);
    assert_eq!(out.item(), 5.0);
  }

  #[test]
  fn activations() {
    let x = Tensor::vec(&[-1.0, 0.0, 2.0]);
    assert_eq!(x.activation(ActType::Relu), Tensor::vec(&[0.0, 0.0, 2.0]));
    assert_eq!(x.activation(ActType::Sigmoid).raw()[1], 0.5);
  }

  #[test]
  fn glorot_bounds() {
    let w = Tensor::<f32>::glorot_uniform(&[512, 256]);
    let limit = (6.0f32 / 768.0).sqrt();
    assert!(w.raw().iter().all(|&a| a.abs() <= limit ));
  }

  #[test]
  fn randn_moments() {
    let x = Tensor::<f64>::randn(&[10_000]);
    let mean = x.raw().iter().sum::<f64>() / 10_000.0;
    assert!(mean.abs() < 0.1);
  }

  #[test]
  fn allclose() {
    let a = Tensor::vec(&[1.0, 2.0]);
    assert!(a.allclose(&Tensor::vec(&[1.0 + 1e-7, 2.0]), 1e-5, 1e-6));
    assert!(!a.allclose(&Tensor::vec(&[1.1, 2.0]), 1e-5, 1e-6));
  }

}
