use std::fs;
use std::rc::Rc;
use std::path::Path;
use std::cell::{ Cell, RefCell };
use std::collections::BTreeMap;

use serde::{ Serialize, Deserialize };

use crate::{
  error::{ Error, Result },
  scalar::Real,
  Shape,
  Tensor,
};


/// Strategy for filling a [Parameter] once its shape is known.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
  Zeros,
  Ones,
  Constant(f64),
  /// Uniform in `±scale`.
  Uniform(f64),
  /// Normal with the given standard deviation.
  Normal(f64),
  /// Glorot uniform.
  Xavier,
}

impl Default for Initializer {
  fn default() -> Self {
    Self::Uniform(0.07)
  }
}

impl Initializer {
  pub fn generate<T: Real>(&self, dims: &[usize]) -> Tensor<T> {
    let cast = |value: f64| T::from(value).unwrap();
    match *self {
      Self::Zeros => Tensor::zeros(dims),
      Self::Ones => Tensor::ones(dims),
      Self::Constant(value) => Tensor::fill(dims, cast(value)),
      Self::Uniform(scale) => Tensor::uniform(dims, cast(-scale), cast(scale)),
      Self::Normal(sigma) => Tensor::randn(dims).mul_scalar(cast(sigma)),
      Self::Xavier => Tensor::glorot_uniform(dims),
    }
  }
}


/// Parameters are shared between the layer owning them and any graph
/// compiled from that layer.

pub type Param<T> = Rc<Parameter<T>>;


/// Named weight tensor of a layer.
///
/// Dimensions given as `0` are unknown until the first forward pass
/// infers them from the layer's input, so the tensor gets allocated late.
/// Allocation also waits for [initialize](Parameter::initialize), which
/// supplies the initializer to use when the parameter has none of its own.

#[derive(Debug)]
pub struct Parameter<T: Real> {
  name: String,
  shape: RefCell<Shape>,
  init: Option<Initializer>,
  default_init: Cell<Option<Initializer>>,
  data: RefCell<Option<Tensor<T>>>,
}

impl<T: Real> Parameter<T> {
  pub fn new(name: impl Into<String>, dims: &[usize], init: Option<Initializer>) -> Param<T> {
    Rc::new(Self {
      name: name.into(),
      shape: RefCell::new(Shape::new(dims)),
      init,
      default_init: Cell::new(None),
      data: RefCell::new(None),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn shape(&self) -> Shape {
    self.shape.borrow().clone()
  }

  pub fn is_initialized(&self) -> bool {
    self.data.borrow().is_some()
  }

  /// Allocate now if the shape is known, or as soon as it gets inferred.

  pub fn initialize(&self, default: Initializer) {
    self.default_init.set(Some(default));
    self.allocate();
  }

  /// Complete unknown dimensions from an observed input.

  pub fn infer_shape(&self, dims: &[usize]) -> Result<()> {
    let shape = self.shape();
    let completed = shape.complete(dims)
      .ok_or_else(|| Error::shape(format!("parameter {}", self.name), Shape::new(dims).to_string(), &shape) )?;
    *self.shape.borrow_mut() = completed;
    self.allocate();
    Ok(())
  }

  fn allocate(&self) {
    let shape = self.shape();
    if self.is_initialized() || !shape.is_complete() { return }
    let Some(default) = self.default_init.get() else { return };
    let init = self.init.unwrap_or(default);
    *self.data.borrow_mut() = Some(init.generate(&shape.dims));
  }

  /// Handle to the parameter's values, sharing storage with the parameter.

  pub fn data(&self) -> Result<Tensor<T>> {
    self.data.borrow().clone()
      .ok_or_else(|| Error::UninitializedParameter(self.name.clone()) )
  }

  /// Shape this parameter would take on when set to `tensor`.
  ///
  /// Fails unless `tensor` is fully shaped and agrees with all known dimensions.

  pub fn check_data(&self, tensor: &Tensor<T>) -> Result<Shape> {
    let shape = self.shape();
    shape.complete(&tensor.shape().dims)
      .filter(Shape::is_complete)
      .ok_or_else(|| Error::shape(format!("parameter {}", self.name), shape.to_string(), tensor.shape()) )
  }

  /// Replace the parameter's values.
  ///
  /// Values get written in place, so graphs compiled from this parameter see them.

  pub fn set_data(&self, tensor: &Tensor<T>) -> Result<()> {
    let completed = self.check_data(tensor)?;
    let mut data = self.data.borrow_mut();
    match &*data {
      Some(current) => current.feed(tensor),
      None => *data = Some(tensor.detach()),
    }
    *self.shape.borrow_mut() = completed;
    Ok(())
  }
}


/// Write parameter values to a postcard-encoded name to tensor map.

pub(crate) fn save<T: Real>(path: impl AsRef<Path>, params: &[Param<T>]) -> Result<()> {
  let values = params.iter()
    .map(|param| -> Result<(String, Tensor<T>)> { Ok((param.name().to_string(), param.data()?)) })
    .collect::<Result<BTreeMap<String, Tensor<T>>>>()?;
  fs::write(path, postcard::to_allocvec(&values)?)?;
  Ok(())
}

pub(crate) fn load<T: Real>(path: impl AsRef<Path>) -> Result<BTreeMap<String, Tensor<T>>> {
  let bytes = fs::read(path)?;
  Ok(postcard::from_bytes(&bytes)?)
}
