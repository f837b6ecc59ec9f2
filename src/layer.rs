use crate::{
  internal::make_name,
  error::Result,
  scalar::Real,
  ops::ActType,
  parameter::{ Parameter, Param, Initializer },
  backend::{ Backend, Eager, Symbolic },
};


/// Anything owning parameters under a name.

pub trait Block<T: Real> {
  fn name(&self) -> &str;

  fn parameters(&self) -> Vec<Param<T>> {
    vec![]
  }

  /// Allocate all parameters whose shape is already known and
  /// let the others follow once their shape gets inferred.

  fn initialize(&self, default: Initializer) {
    for param in self.parameters() {
      param.initialize(default);
    }
  }
}


/// Forward logic written once, for both concrete and symbolic values.
///
/// Implementors must not branch on which [Backend] they are given. Any
/// control flow happening here gets baked into the graph when tracing.

pub trait HybridBlock<T: Real>: Block<T> {
  fn hybrid_forward<B: Backend<T>>(&self, f: &mut B, x: &B::Value) -> Result<B::Value>;
}


/// Forward pass on one particular backend.
///
/// Implemented for every [HybridBlock], which makes that block's generic
/// forward logic callable through a trait object.

pub trait Forward<T: Real, B: Backend<T>> {
  fn forward(&self, f: &mut B, x: &B::Value) -> Result<B::Value>;
}

impl<T: Real, B: Backend<T>, L: HybridBlock<T>> Forward<T, B> for L {
  fn forward(&self, f: &mut B, x: &B::Value) -> Result<B::Value> {
    self.hybrid_forward(f, x)
  }
}


/// A block that can run both eagerly and symbolically, and hence be stored in a [Network](crate::Network).

pub trait Layer<T: Real>: Block<T> + Forward<T, Eager> + Forward<T, Symbolic<T>> {}
impl<T: Real, L: Block<T> + Forward<T, Eager> + Forward<T, Symbolic<T>>> Layer<T> for L {}


/// Fully connected layer computing `activation(x · weight + bias)`.
///
/// Inputs with more than two dimensions get flattened to `(batch, rest)`.
/// The number of input units gets inferred from the first input,
/// unless given with [in_units](Dense::in_units).

#[derive(Debug)]
pub struct Dense<T: Real> {
  name: String,
  units: usize,
  in_units: usize,
  activation: Option<ActType>,
  use_bias: bool,
  weight_init: Option<Initializer>,
  bias_init: Initializer,
  weight: Param<T>,
  bias: Option<Param<T>>,
}

impl<T: Real> Dense<T> {
  pub fn new(units: usize) -> Self {
    Self::named(&make_name("dense"), units)
  }

  pub fn named(name: &str, units: usize) -> Self {
    Self {
      name: name.to_string(),
      units,
      in_units: 0,
      activation: None,
      use_bias: true,
      weight_init: None,
      bias_init: Initializer::Zeros,
      weight: Parameter::new(format!("{name}_weight"), &[0, units], None),
      bias: None,
    }.rebuilt()
  }

  fn rebuilt(mut self) -> Self {
    self.weight = Parameter::new(format!("{}_weight", self.name), &[self.in_units, self.units], self.weight_init);
    self.bias = self.use_bias.then(|| {
      Parameter::new(format!("{}_bias", self.name), &[self.units], Some(self.bias_init))
    });
    self
  }

  pub fn activation(mut self, act: ActType) -> Self {
    self.activation = Some(act);
    self
  }

  pub fn in_units(mut self, in_units: usize) -> Self {
    self.in_units = in_units;
    self.rebuilt()
  }

  pub fn use_bias(mut self, use_bias: bool) -> Self {
    self.use_bias = use_bias;
    self.rebuilt()
  }

  pub fn weight_initializer(mut self, init: Initializer) -> Self {
    self.weight_init = Some(init);
    self.rebuilt()
  }

  pub fn bias_initializer(mut self, init: Initializer) -> Self {
    self.bias_init = init;
    self.rebuilt()
  }

  pub fn units(&self) -> usize {
    self.units
  }

  pub fn weight(&self) -> &Param<T> {
    &self.weight
  }

  pub fn bias(&self) -> Option<&Param<T>> {
    self.bias.as_ref()
  }
}

impl<T: Real> Block<T> for Dense<T> {
  fn name(&self) -> &str {
    &self.name
  }

  fn parameters(&self) -> Vec<Param<T>> {
    std::iter::once(self.weight.clone())
      .chain(self.bias.clone())
      .collect()
  }
}

impl<T: Real> HybridBlock<T> for Dense<T> {
  fn hybrid_forward<B: Backend<T>>(&self, f: &mut B, x: &B::Value) -> Result<B::Value> {
    let in_units = f.shape(x).flatten()[-1];
    self.weight.infer_shape(&[in_units, self.units])?;
    let weight = f.param(&self.weight)?;
    let bias = match &self.bias {
      Some(bias) => Some(f.param(bias)?),
      None => None,
    };
    let out = f.fully_connected(&format!("{}_fwd", self.name), x, &weight, bias.as_ref(), self.units)?;
    match self.activation {
      Some(act) => f.activation(&format!("{}_{act}_fwd", self.name), &out, act),
      None => Ok(out),
    }
  }
}


/// Stand-alone element-wise non-linearity.

#[derive(Debug)]
pub struct Activation {
  name: String,
  act: ActType,
}

impl Activation {
  pub fn new(act: ActType) -> Self {
    Self { name: make_name(act.name()), act }
  }
}

impl<T: Real> Block<T> for Activation {
  fn name(&self) -> &str {
    &self.name
  }
}

impl<T: Real> HybridBlock<T> for Activation {
  fn hybrid_forward<B: Backend<T>>(&self, f: &mut B, x: &B::Value) -> Result<B::Value> {
    f.activation(&format!("{}_fwd", self.name), x, self.act)
  }
}


/// Reshape `(batch, ...)` to `(batch, rest)`.

#[derive(Debug)]
pub struct Flatten {
  name: String,
}

impl Flatten {
  pub fn new() -> Self {
    Self { name: make_name("flatten") }
  }
}

impl Default for Flatten {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Real> Block<T> for Flatten {
  fn name(&self) -> &str {
    &self.name
  }
}

impl<T: Real> HybridBlock<T> for Flatten {
  fn hybrid_forward<B: Backend<T>>(&self, f: &mut B, x: &B::Value) -> Result<B::Value> {
    f.flatten(&format!("{}_fwd", self.name), x)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ Error, Shape, Tensor };

  #[test]
  fn dense_parameter_names() {
    let dense = Dense::<f32>::named("hidden", 8);
    let names: Vec<String> = dense.parameters().iter().map(|param| param.name().to_string() ).collect();
    assert_eq!(names, vec!["hidden_weight", "hidden_bias"]);
    assert_eq!(Dense::<f32>::named("out", 2).use_bias(false).parameters().len(), 1);
  }

  #[test]
  fn dense_infers_input_units() {
    let dense = Dense::<f64>::new(2).activation(ActType::Relu);
    dense.initialize(Initializer::Ones);
    assert!(!dense.weight().is_initialized());
    let y = dense.hybrid_forward(&mut Eager, &Tensor::new(&[1, 3], vec![1.0, -2.0, 4.0])).unwrap();
    assert_eq!(dense.weight().shape().dims, vec![3, 2]);
    assert_eq!(y, Tensor::new(&[1, 2], vec![3.0, 3.0]));
  }

  #[test]
  fn dense_flattens_input() {
    let dense = Dense::<f32>::new(4).weight_initializer(Initializer::Ones);
    dense.initialize(Initializer::default());
    let y = dense.hybrid_forward(&mut Eager, &Tensor::ones(&[2, 3, 5])).unwrap();
    assert_eq!(y, Tensor::fill(&[2, 4], 15.0));
  }

  #[test]
  fn dense_requires_initialize() {
    let dense = Dense::<f32>::new(4).in_units(3);
    let result = dense.hybrid_forward(&mut Eager, &Tensor::ones(&[1, 3]));
    assert!(matches!(result, Err(Error::UninitializedParameter(name)) if name.ends_with("_weight")));
  }

  #[test]
  fn dense_rejects_wrong_input() {
    let dense = Dense::<f32>::new(4).in_units(3);
    dense.initialize(Initializer::default());
    let result = dense.hybrid_forward(&mut Eager, &Tensor::ones(&[1, 5]));
    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
  }

  #[test]
  fn dense_records_symbolically() {
    let dense = Dense::<f32>::named("fc", 4).activation(ActType::Tanh);
    dense.initialize(Initializer::default());
    let mut f = Symbolic::new();
    let x = f.placeholder("data", &Shape::new(&[1, 3]));
    let y = dense.hybrid_forward(&mut f, &x).unwrap();
    assert_eq!(y.shape.dims, vec![1, 4]);
    let graph = f.finish(&y).unwrap();
    let names: Vec<&str> = graph.nodes().iter().map(|node| node.name.as_str() ).collect();
    assert_eq!(names, vec!["data", "fc_weight", "fc_bias", "fc_fwd", "fc_tanh_fwd"]);
  }

  #[test]
  fn activation_and_flatten() {
    let flatten = Flatten::new();
    let y = HybridBlock::<f32>::hybrid_forward(&flatten, &mut Eager, &Tensor::ones(&[2, 2, 2])).unwrap();
    assert_eq!(y.shape().dims, vec![2, 4]);

    let sigmoid = Activation::new(ActType::Sigmoid);
    let y = HybridBlock::<f32>::hybrid_forward(&sigmoid, &mut Eager, &Tensor::zeros(&[1, 2])).unwrap();
    assert_eq!(y, Tensor::fill(&[1, 2], 0.5));
    assert!(Block::<f32>::name(&sigmoid).starts_with("sigmoid"));
  }
}
