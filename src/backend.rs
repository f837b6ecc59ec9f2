use std::rc::Rc;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  ops::{ Op, ActType },
  parameter::Param,
  graph::{ Node, CompiledGraph },
  Shape,
  Tensor,
};


/// The values a layer's forward logic gets run on.
///
/// Layers are written once against this trait. [Eager] runs every
/// operation immediately on concrete tensors, while [Symbolic] records
/// operations on placeholders into a [CompiledGraph].

pub trait Backend<T: Real> {
  type Value: Clone;

  fn shape(&self, value: &Self::Value) -> Shape;

  /// Make a parameter available as a value.

  fn param(&mut self, param: &Param<T>) -> Result<Self::Value>;

  fn apply(&mut self, op: Op, name: &str, inputs: &[&Self::Value]) -> Result<Self::Value>;

  fn fully_connected(&mut self, name: &str, data: &Self::Value, weight: &Self::Value, bias: Option<&Self::Value>, num_hidden: usize) -> Result<Self::Value> {
    let op = Op::FullyConnected { num_hidden, no_bias: bias.is_none() };
    match bias {
      Some(bias) => self.apply(op, name, &[data, weight, bias]),
      None => self.apply(op, name, &[data, weight]),
    }
  }

  fn activation(&mut self, name: &str, data: &Self::Value, act_type: ActType) -> Result<Self::Value> {
    self.apply(Op::Activation { act_type }, name, &[data])
  }

  fn flatten(&mut self, name: &str, data: &Self::Value) -> Result<Self::Value> {
    self.apply(Op::Flatten, name, &[data])
  }
}


/// Immediate execution on concrete tensors.

#[derive(Debug, Clone, Copy, Default)]
pub struct Eager;

impl<T: Real> Backend<T> for Eager {
  type Value = Tensor<T>;

  fn shape(&self, value: &Tensor<T>) -> Shape {
    value.shape().clone()
  }

  fn param(&mut self, param: &Param<T>) -> Result<Tensor<T>> {
    param.data()
  }

  fn apply(&mut self, op: Op, _name: &str, inputs: &[&Tensor<T>]) -> Result<Tensor<T>> {
    let shapes: Vec<&Shape> = inputs.iter().map(|input| input.shape() ).collect();
    op.infer_shape(&shapes)?;
    Ok(op.compute(inputs, None))
  }
}


/// Reference to a recorded node, together with its inferred shape.

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
  pub id: usize,
  pub shape: Shape,
}


/// Records operations into a graph instead of running them.

#[derive(Debug)]
pub struct Symbolic<T: Real> {
  nodes: Vec<Node>,
  shapes: Vec<Shape>,
  params: Vec<Option<Param<T>>>,
  placeholder: Option<usize>,
}

impl<T: Real> Default for Symbolic<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Real> Symbolic<T> {
  pub fn new() -> Self {
    Self {
      nodes: vec![],
      shapes: vec![],
      params: vec![],
      placeholder: None,
    }
  }

  fn push(&mut self, node: Node, shape: Shape, param: Option<Param<T>>) -> Symbol {
    let id = self.nodes.len();
    self.nodes.push(node);
    self.shapes.push(shape.clone());
    self.params.push(param);
    Symbol { id, shape }
  }

  /// Stand-in for the graph's input, shaped like the data it will be fed.

  pub fn placeholder(&mut self, name: &str, shape: &Shape) -> Symbol {
    assert!(self.placeholder.is_none(), "Graphs have a single input");
    let symbol = self.push(Node::variable(name), shape.clone(), None);
    self.placeholder = Some(symbol.id);
    symbol
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Freeze the recording into an executable graph producing `output`.

  pub fn finish(self, output: &Symbol) -> Result<CompiledGraph<T>> {
    let placeholder = self.placeholder
      .ok_or_else(|| Error::InvalidGraph("no placeholder was recorded".into()) )?;
    let input_shape = self.shapes[placeholder].clone();
    CompiledGraph::new(self.nodes, self.params, placeholder, output.id, input_shape)
  }
}

impl<T: Real> Backend<T> for Symbolic<T> {
  type Value = Symbol;

  fn shape(&self, value: &Symbol) -> Shape {
    value.shape.clone()
  }

  fn param(&mut self, param: &Param<T>) -> Result<Symbol> {
    // Shared parameters map to a single node
    let existing = self.params.iter()
      .position(|known| known.as_ref().map_or(false, |known| Rc::ptr_eq(known, param) ));
    if let Some(id) = existing {
      return Ok(Symbol { id, shape: self.shapes[id].clone() })
    }
    let shape = param.shape();
    if !shape.is_complete() {
      return Err(Error::shape(format!("parameter {}", param.name()), "a fully inferred shape", &shape))
    }
    Ok(self.push(Node::variable(param.name()), shape, Some(param.clone())))
  }

  fn apply(&mut self, op: Op, name: &str, inputs: &[&Symbol]) -> Result<Symbol> {
    let shapes: Vec<&Shape> = inputs.iter().map(|input| &input.shape ).collect();
    let shape = op.infer_shape(&shapes)?;
    let node = Node {
      name: name.to_string(),
      op,
      inputs: inputs.iter().map(|input| input.id ).collect(),
    };
    Ok(self.push(node, shape, None))
  }
}
