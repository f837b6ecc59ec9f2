use std::fs;
use std::path::{ Path, PathBuf };
use std::collections::BTreeMap;

use serde::{ Serialize, Deserialize };

use crate::{
  error::{ Error, Result },
  scalar::Real,
  ops::Op,
  parameter::{ self, Parameter, Param },
  Shape,
  Tensor,
};


/// Node of a computation graph. Inputs refer to earlier nodes by index.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub name: String,
  #[serde(flatten)]
  pub op: Op,
  pub inputs: Vec<usize>,
}

impl Node {
  pub fn variable(name: &str) -> Self {
    Self { name: name.to_string(), op: Op::Null, inputs: vec![] }
  }
}


/// On-disk form of a graph's structure. Parameter values live in a separate file.

#[derive(Debug, Serialize, Deserialize)]
struct GraphDump {
  nodes: Vec<Node>,
  arg_nodes: Vec<usize>,
  placeholder: usize,
  input_shape: Vec<usize>,
  heads: Vec<usize>,
}


/// Computation recorded from a single trace of a network.
///
/// Nodes are stored in recording order, which is a valid evaluation order.
/// Every op node owns an output buffer that gets reused by later runs as long
/// as the batch size stays the same.

#[derive(Debug)]
pub struct CompiledGraph<T: Real> {
  nodes: Vec<Node>,
  params: Vec<Option<Param<T>>>,
  placeholder: usize,
  output: usize,
  input_shape: Shape,
  buffers: Vec<Option<Tensor<T>>>,
  runs: usize,
}

impl<T: Real> CompiledGraph<T> {
  pub(crate) fn new(nodes: Vec<Node>, params: Vec<Option<Param<T>>>, placeholder: usize, output: usize, input_shape: Shape) -> Result<Self> {
    let graph = Self {
      buffers: vec![None; nodes.len()],
      nodes,
      params,
      placeholder,
      output,
      input_shape,
      runs: 0,
    };
    graph.validate()?;
    Ok(graph)
  }

  /// Check structure and shapes once, so runs only need to check their input.

  fn validate(&self) -> Result<()> {
    let invalid = |reason: String| Err(Error::InvalidGraph(reason));
    if self.placeholder >= self.nodes.len() || self.output >= self.nodes.len() {
      return invalid("input or output refers to a missing node".into())
    }
    if self.params.len() != self.nodes.len() || self.nodes[self.placeholder].op != Op::Null {
      return invalid("malformed variable nodes".into())
    }
    let mut shapes: Vec<Shape> = Vec::with_capacity(self.nodes.len());
    for (i, node) in self.nodes.iter().enumerate() {
      if let Some(&j) = node.inputs.iter().find(|&&j| j >= i ) {
        return invalid(format!("node {} depends on later node {j}", node.name))
      }
      let shape = match (&node.op, &self.params[i]) {
        (Op::Null, _) if i == self.placeholder => self.input_shape.clone(),
        (Op::Null, Some(param)) => param.data()?.shape().clone(),
        (Op::Null, None) => return invalid(format!("variable {} is neither input nor parameter", node.name)),
        (_, Some(_)) => return invalid(format!("op node {} cannot hold a parameter", node.name)),
        (op, None) => {
          let inputs: Vec<&Shape> = node.inputs.iter().map(|&j| &shapes[j] ).collect();
          op.infer_shape(&inputs)?
        },
      };
      shapes.push(shape);
    }
    Ok(())
  }

  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn input_shape(&self) -> &Shape {
    &self.input_shape
  }

  /// Number of times this graph has been evaluated.

  pub fn runs(&self) -> usize {
    self.runs
  }

  pub fn parameters(&self) -> Vec<Param<T>> {
    self.params.iter().flatten().cloned().collect()
  }

  /// Inputs of rank two or more may change their leading dimension.
  /// Lower ranks have no batch dimension and must match exactly.

  fn bind(&self, input: &Tensor<T>) -> Result<()> {
    let dims = &input.shape().dims;
    let expected = &self.input_shape.dims;
    let batched = expected.len() > 1;
    let fits = dims.len() == expected.len() && dims.iter()
      .zip(expected)
      .enumerate()
      .all(|(i, (a, b))| (batched && i == 0) || a == b );
    if !fits {
      let pattern: Vec<String> = expected.iter()
        .enumerate()
        .map(|(i, n)| if batched && i == 0 { "*".to_string() } else { n.to_string() } )
        .collect();
      return Err(Error::shape("graph input", format!("Shape[{}]", pattern.join(", ")), input.shape()))
    }
    Ok(())
  }

  /// Evaluate the graph with new input data.
  ///
  /// The leading (batch) dimension of inputs with rank two or more may differ
  /// from the traced one. All other dimensions must match.

  pub fn run(&mut self, input: &Tensor<T>) -> Result<Tensor<T>> {
    self.bind(input)?;
    let mut values: Vec<Tensor<T>> = Vec::with_capacity(self.nodes.len());
    for (i, node) in self.nodes.iter().enumerate() {
      let value = match (&node.op, &self.params[i]) {
        (Op::Null, _) if i == self.placeholder => input.clone(),
        (Op::Null, Some(param)) => param.data()?,
        (Op::Null, None) => return Err(Error::InvalidGraph(format!("unbound variable {}", node.name))),
        (op, _) => {
          let inputs: Vec<&Tensor<T>> = node.inputs.iter().map(|&j| &values[j] ).collect();
          let out = op.compute(&inputs, self.buffers[i].as_ref());
          self.buffers[i] = Some(out.clone());
          out
        },
      };
      values.push(value);
    }
    self.runs += 1;
    Ok(values[self.output].detach())
  }

  /// Serialize the graph's structure as JSON.

  pub fn to_json(&self) -> Result<String> {
    let dump = GraphDump {
      nodes: self.nodes.clone(),
      arg_nodes: self.nodes.iter()
        .enumerate()
        .filter(|(_, node)| node.op == Op::Null )
        .map(|(i, _)| i )
        .collect(),
      placeholder: self.placeholder,
      input_shape: self.input_shape.dims.clone(),
      heads: vec![self.output],
    };
    Ok(serde_json::to_string_pretty(&dump)?)
  }

  pub fn from_json(json: &str, params: &BTreeMap<String, Tensor<T>>) -> Result<Self> {
    let dump: GraphDump = serde_json::from_str(json)?;
    let output = match dump.heads[..] {
      [output] => output,
      _ => return Err(Error::InvalidGraph(format!("expected a single head, found {}", dump.heads.len()))),
    };
    let params = dump.nodes.iter()
      .enumerate()
      .map(|(i, node)| -> Result<Option<Param<T>>> {
        if node.op != Op::Null || i == dump.placeholder { return Ok(None) }
        let values = params.get(&node.name)
          .ok_or_else(|| Error::MissingParameter(node.name.clone()) )?;
        let param = Parameter::new(node.name.clone(), &values.shape().dims, None);
        param.set_data(values)?;
        Ok(Some(param))
      })
      .collect::<Result<Vec<_>>>()?;
    Self::new(dump.nodes, params, dump.placeholder, output, Shape::new(&dump.input_shape))
  }

  pub fn save_parameters(&self, path: impl AsRef<Path>) -> Result<()> {
    parameter::save(path, &self.parameters())
  }

  /// Write `<prefix>-symbol.json` and `<prefix>-<epoch>.params`, returning both paths.

  pub fn export(&self, prefix: impl AsRef<Path>, epoch: usize) -> Result<(PathBuf, PathBuf)> {
    let prefix = prefix.as_ref().to_string_lossy().into_owned();
    let symbol_file = PathBuf::from(format!("{prefix}-symbol.json"));
    let params_file = PathBuf::from(format!("{prefix}-{epoch:04}.params"));
    fs::write(&symbol_file, self.to_json()?)?;
    self.save_parameters(&params_file)?;
    Ok((symbol_file, params_file))
  }

  /// Load a graph written by [export](CompiledGraph::export), without access to the code that built it.

  pub fn import(symbol_file: impl AsRef<Path>, params_file: impl AsRef<Path>) -> Result<Self> {
    let json = fs::read_to_string(symbol_file)?;
    let params = parameter::load(params_file)?;
    Self::from_json(&json, &params)
  }
}

impl<T: Real> std::fmt::Display for CompiledGraph<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    writeln!(f, "Graph({} -> {})", self.input_shape, self.nodes[self.output].name)?;
    for (i, node) in self.nodes.iter().enumerate() {
      if node.op == Op::Null {
        let kind = if i == self.placeholder { "input" } else { "param" };
        writeln!(f, "  {i:>3}: {} ({kind})", node.name)?;
      } else {
        let inputs: Vec<&str> = node.inputs.iter().map(|&j| self.nodes[j].name.as_str() ).collect();
        writeln!(f, "  {i:>3}: {} = {}({})", node.name, node.op.name(), inputs.join(", "))?;
      }
    }
    Ok(())
  }
}
