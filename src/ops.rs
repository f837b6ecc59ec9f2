
use serde::{ Serialize, Deserialize };

use crate::{
  error::{ Error, Result },
  scalar::Real,
  Shape,
  Tensor,
};


/// Element-wise non-linearity.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActType {
  Relu,
  Sigmoid,
  Tanh,
  SoftRelu,
}

impl ActType {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Relu => "relu",
      Self::Sigmoid => "sigmoid",
      Self::Tanh => "tanh",
      Self::SoftRelu => "softrelu",
    }
  }
}

impl std::fmt::Display for ActType {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.write_str(self.name())
  }
}


/// Operation performed by a node of a computation graph.
///
/// Ops know how to infer their output shape from their input shapes,
/// which is where all shape validation happens, and how to compute
/// their output from already validated inputs.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Op {
  /// Placeholder or parameter. Gets bound rather than computed.
  #[serde(rename = "null")]
  Null,
  /// Inputs: data, weight and (unless `no_bias`) bias.
  FullyConnected { num_hidden: usize, no_bias: bool },
  Activation { act_type: ActType },
  Flatten,
}

impl Op {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::FullyConnected { .. } => "FullyConnected",
      Self::Activation { .. } => "Activation",
      Self::Flatten => "Flatten",
    }
  }

  pub fn arity(&self) -> usize {
    match self {
      Self::Null => 0,
      Self::FullyConnected { no_bias, .. } => if *no_bias { 2 } else { 3 },
      Self::Activation { .. } | Self::Flatten => 1,
    }
  }

  /// Validate input shapes and compute the resulting output shape.

  pub fn infer_shape(&self, inputs: &[&Shape]) -> Result<Shape> {
    if inputs.len() != self.arity() {
      return Err(Error::InvalidGraph(format!("{} takes {} inputs, got {}", self.name(), self.arity(), inputs.len())))
    }
    match self {
      Self::Null => Err(Error::InvalidGraph("variables have no inferable shape".into())),
      Self::FullyConnected { num_hidden, no_bias } => {
        let data = inputs[0].flatten();
        let expected = Shape::new(&[data[-1], *num_hidden]);
        if *inputs[1] != expected {
          return Err(Error::shape("FullyConnected weight", expected.to_string(), inputs[1]))
        }
        if !no_bias && inputs[2].dims != [*num_hidden] {
          return Err(Error::shape("FullyConnected bias", format!("Shape[{num_hidden}]"), inputs[2]))
        }
        Ok(Shape::new(&[data[0], *num_hidden]))
      },
      Self::Activation { .. } => Ok(inputs[0].clone()),
      Self::Flatten => Ok(inputs[0].flatten()),
    }
  }

  /// Compute this op's output, writing into `buffer` when it has the right shape.
  ///
  /// Inputs must have passed [infer_shape](Op::infer_shape).

  pub fn compute<T: Real>(&self, inputs: &[&Tensor<T>], buffer: Option<&Tensor<T>>) -> Tensor<T> {
    let reuse = |dims: &[usize]| match buffer {
      Some(buffer) if buffer.shape().dims == dims => buffer.clone(),
      _ => Tensor::zeros(dims),
    };
    match self {
      Self::Null => panic!("Variables get bound, not computed"),
      Self::FullyConnected { num_hidden, no_bias } => {
        let data = inputs[0].reshape(&inputs[0].shape().flatten().dims);
        let out = reuse(&[data.dim(0), *num_hidden]);
        let bias = if *no_bias { None } else { Some(inputs[2]) };
        data.fully_connected_into(inputs[1], bias, &out);
        out
      },
      Self::Activation { act_type } => {
        let out = reuse(&inputs[0].shape().dims);
        inputs[0].activation_into(*act_type, &out);
        out
      },
      Self::Flatten => inputs[0].reshape(&inputs[0].shape().flatten().dims),
    }
  }
}
