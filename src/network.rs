use std::path::{ Path, PathBuf };

use crate::{
  error::{ Error, Result },
  scalar::Real,
  parameter::{ self, Param, Initializer },
  backend::{ Backend, Eager, Symbolic },
  graph::CompiledGraph,
  layer::{ Layer, Forward },
  Shape,
  Tensor,
};


/// How a [Network] executes its layers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Every call runs every layer on concrete data.
  Eager,
  /// The first call traces the layers into a graph; all calls evaluate that graph.
  Compiled,
}


/// Execution counters of a [Network].

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
  /// Invocations of any layer's forward logic, eager or symbolic.
  pub layer_calls: usize,
  pub eager_runs: usize,
  pub graph_builds: usize,
  pub graph_runs: usize,
}


/// Ordered sequence of layers, run either eagerly or as a compiled graph.
///
/// ```
/// use hybridize::{ Network, Dense, ActType, Initializer, Tensor };
///
/// let mut net = Network::new();
/// net.add(Dense::new(16).activation(ActType::Relu))
///    .add(Dense::new(2));
/// net.initialize(Initializer::Xavier);
///
/// let x = Tensor::<f32>::randn(&[1, 8]);
/// let eager = net.forward(&x).unwrap();
///
/// net.hybridize();
/// let compiled = net.forward(&x).unwrap();
/// assert!(eager.allclose(&compiled, 1e-5, 1e-6));
/// ```

pub struct Network<T: Real> {
  layers: Vec<Box<dyn Layer<T>>>,
  mode: Mode,
  graph: Option<CompiledGraph<T>>,
  stats: Statistics,
}

impl<T: Real> Default for Network<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Real> Network<T> {
  pub fn new() -> Self {
    Self {
      layers: vec![],
      mode: Mode::Eager,
      graph: None,
      stats: Statistics::default(),
    }
  }

  /// Append a layer.
  ///
  /// Layers added after the network has been traced are not part of its graph.

  pub fn add(&mut self, layer: impl Layer<T> + 'static) -> &mut Self {
    self.layers.push(Box::new(layer));
    self
  }

  pub fn len(&self) -> usize {
    self.layers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.layers.is_empty()
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn is_hybridized(&self) -> bool {
    self.mode == Mode::Compiled
  }

  /// Switch to compiled execution. There is no way back.

  pub fn hybridize(&mut self) {
    self.mode = Mode::Compiled;
  }

  /// The cached graph, once the first compiled call has traced it.

  pub fn graph(&self) -> Option<&CompiledGraph<T>> {
    self.graph.as_ref()
  }

  pub fn statistics(&self) -> Statistics {
    Statistics {
      graph_runs: self.graph.as_ref().map_or(0, |graph| graph.runs() ),
      ..self.stats
    }
  }

  pub fn initialize(&self, default: Initializer) {
    for layer in &self.layers {
      layer.initialize(default);
    }
  }

  pub fn parameters(&self) -> Vec<Param<T>> {
    self.layers.iter()
      .flat_map(|layer| layer.parameters() )
      .collect()
  }

  pub fn forward(&mut self, input: &Tensor<T>) -> Result<Tensor<T>> {
    match self.mode {
      Mode::Eager => {
        let output = self.run_layers(&mut Eager, input)?;
        self.stats.eager_runs += 1;
        // Views of the input must not leak out
        if output.shared_with(input) {
          Ok(output.detach())
        } else {
          Ok(output)
        }
      },
      Mode::Compiled => {
        if self.graph.is_none() {
          let traced = Self::trace(&self.layers, &mut self.stats, input.shape())?;
          self.graph = Some(traced);
        }
        self.graph.as_mut()
          .ok_or(Error::NotTraced)?
          .run(input)
      },
    }
  }

  fn run_layers<B>(&mut self, f: &mut B, x: &B::Value) -> Result<B::Value>
  where
    B: Backend<T>,
    dyn Layer<T>: Forward<T, B>,
  {
    Self::run_with(&self.layers, &mut self.stats, f, x)
  }

  fn run_with<B>(layers: &[Box<dyn Layer<T>>], stats: &mut Statistics, f: &mut B, x: &B::Value) -> Result<B::Value>
  where
    B: Backend<T>,
    dyn Layer<T>: Forward<T, B>,
  {
    let mut x = x.clone();
    for layer in layers {
      x = Forward::<T, B>::forward(&**layer, f, &x)?;
      stats.layer_calls += 1;
    }
    Ok(x)
  }

  fn trace(layers: &[Box<dyn Layer<T>>], stats: &mut Statistics, shape: &Shape) -> Result<CompiledGraph<T>> {
    let mut f = Symbolic::new();
    let x = f.placeholder("data", shape);
    let y = Self::run_with(layers, stats, &mut f, &x)?;
    let graph = f.finish(&y)?;
    stats.graph_builds += 1;
    Ok(graph)
  }

  pub fn save_parameters(&self, path: impl AsRef<Path>) -> Result<()> {
    parameter::save(path, &self.parameters())
  }

  /// Overwrite parameters with values saved by [save_parameters](Network::save_parameters).
  ///
  /// Values are written in place, so an already compiled graph picks them up.
  /// Nothing gets written unless every parameter has a matching entry in the file.

  pub fn load_parameters(&self, path: impl AsRef<Path>) -> Result<()> {
    let values = parameter::load::<T>(path)?;
    let params = self.parameters();
    let mut staged = Vec::with_capacity(params.len());
    for param in &params {
      let value = values.get(param.name())
        .ok_or_else(|| Error::MissingParameter(param.name().to_string()) )?;
      param.check_data(value)?;
      staged.push((param, value));
    }
    for (param, value) in staged {
      param.set_data(value)?;
    }
    Ok(())
  }

  /// Export the compiled graph and its parameters.
  ///
  /// Requires a hybridized network that has been run at least once.

  pub fn export(&self, prefix: impl AsRef<Path>, epoch: usize) -> Result<(PathBuf, PathBuf)> {
    self.graph.as_ref()
      .ok_or(Error::NotTraced)?
      .export(prefix, epoch)
  }
}

impl<T: Real> std::fmt::Debug for Network<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Network")
      .field("layers", &self.layers.iter().map(|layer| layer.name() ).collect::<Vec<_>>())
      .field("mode", &self.mode)
      .field("stats", &self.statistics())
      .finish()
  }
}

impl<T: Real> std::fmt::Display for Network<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    writeln!(f, "Network({:?})", self.mode)?;
    for layer in &self.layers {
      write!(f, "  {}", layer.name())?;
      for param in layer.parameters() {
        write!(f, " {} {}", param.name(), param.shape())?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use std::cell::Cell;
  use std::rc::Rc;

  use super::*;
  use crate::{ ActType, Block, Dense, Flatten, HybridBlock };

  fn mlp() -> Network<f32> {
    let mut net = Network::new();
    net.add(Dense::new(256).activation(ActType::Relu))
       .add(Dense::new(128).activation(ActType::Relu))
       .add(Dense::new(2));
    net.initialize(Initializer::default());
    net
  }

  fn temp_prefix(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hybridize-{tag}-{}", std::process::id()))
  }

  /// Wraps a layer and counts how often its forward logic runs.

  struct Counted {
    inner: Dense<f32>,
    calls: Rc<Cell<usize>>,
  }

  impl Block<f32> for Counted {
    fn name(&self) -> &str {
      self.inner.name()
    }

    fn parameters(&self) -> Vec<Param<f32>> {
      self.inner.parameters()
    }
  }

  impl HybridBlock<f32> for Counted {
    fn hybrid_forward<B: Backend<f32>>(&self, f: &mut B, x: &B::Value) -> Result<B::Value> {
      self.calls.set(self.calls.get() + 1);
      self.inner.hybrid_forward(f, x)
    }
  }

  #[test]
  fn eager_matches_compiled() {
    let mut net = mlp();
    let x = Tensor::randn(&[1, 512]);
    let eager = net.forward(&x).unwrap();
    assert_eq!(eager.shape().dims, vec![1, 2]);

    net.hybridize();
    let compiled = net.forward(&x).unwrap();
    assert_eq!(compiled.shape().dims, vec![1, 2]);
    assert!(eager.allclose(&compiled, 1e-5, 1e-6));
  }

  #[test]
  fn layers_run_once_after_hybridize() {
    let calls = Rc::new(Cell::new(0));
    let mut net = Network::new();
    net.add(Counted { inner: Dense::new(8).activation(ActType::Tanh), calls: calls.clone() })
       .add(Counted { inner: Dense::new(3), calls: calls.clone() });
    net.initialize(Initializer::Xavier);

    net.forward(&Tensor::randn(&[2, 4])).unwrap();
    net.forward(&Tensor::randn(&[2, 4])).unwrap();
    assert_eq!(calls.get(), 4);

    net.hybridize();
    for _ in 0..5 {
      net.forward(&Tensor::randn(&[2, 4])).unwrap();
    }
    assert_eq!(calls.get(), 6);

    let stats = net.statistics();
    assert_eq!(stats, Statistics { layer_calls: 6, eager_runs: 2, graph_builds: 1, graph_runs: 5 });
  }

  #[test]
  fn compiled_outputs_follow_inputs() {
    let mut net = mlp();
    net.hybridize();
    let a = Tensor::randn(&[1, 512]);
    let b = Tensor::randn(&[1, 512]);
    let out_a = net.forward(&a).unwrap();
    let out_b = net.forward(&b).unwrap();
    assert!(!out_a.allclose(&out_b, 0.0, 0.0));
    assert!(net.forward(&a).unwrap().allclose(&out_a, 1e-6, 1e-7));
  }

  #[test]
  fn hybridize_is_sticky() {
    let mut net = mlp();
    assert_eq!(net.mode(), Mode::Eager);
    net.hybridize();
    net.hybridize();
    assert!(net.is_hybridized());
    assert!(net.graph().is_none());
    net.forward(&Tensor::randn(&[1, 512])).unwrap();
    assert_eq!(net.graph().unwrap().nodes().len(), 12);
  }

  #[test]
  fn shape_mismatch_fails_fast() {
    let mut net = mlp();
    net.forward(&Tensor::randn(&[1, 512])).unwrap();
    let err = net.forward(&Tensor::randn(&[1, 100])).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    net.hybridize();
    net.forward(&Tensor::randn(&[1, 512])).unwrap();
    let err = net.forward(&Tensor::randn(&[1, 100])).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert_eq!(net.statistics().graph_builds, 1);
  }

  #[test]
  fn unbatched_input_mismatch() {
    let mut net = Network::<f32>::new();
    net.add(Dense::new(2).in_units(4));
    net.initialize(Initializer::Ones);
    let err = net.forward(&Tensor::ones(&[3])).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    net.hybridize();
    assert_eq!(net.forward(&Tensor::ones(&[4])).unwrap(), Tensor::fill(&[1, 2], 4.0));
    let err = net.forward(&Tensor::ones(&[3])).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
  }

  #[test]
  fn eager_output_never_aliases_input() {
    let mut net = Network::<f32>::new();
    let x = Tensor::ones(&[2, 3]);
    assert!(!net.forward(&x).unwrap().shared_with(&x));
    net.add(Flatten::new());
    let y = net.forward(&x).unwrap();
    assert!(!y.shared_with(&x));
    assert_eq!(y, x);
  }

  #[test]
  fn uninitialized_network() {
    let mut net = Network::<f32>::new();
    net.add(Dense::new(2));
    let err = net.forward(&Tensor::ones(&[1, 3])).unwrap_err();
    assert!(matches!(err, Error::UninitializedParameter(_)));

    net.hybridize();
    let err = net.forward(&Tensor::ones(&[1, 3])).unwrap_err();
    assert!(matches!(err, Error::UninitializedParameter(_)));
    assert!(net.graph().is_none());
  }

  #[test]
  fn parameter_updates_reach_the_graph() {
    let mut net = Network::<f32>::new();
    net.add(Dense::named("scale", 1).in_units(2));
    net.initialize(Initializer::Zeros);
    net.hybridize();
    let x = Tensor::new(&[1, 2], vec![1.0, 2.0]);
    assert_eq!(net.forward(&x).unwrap().item(), 0.0);

    net.parameters()[0].set_data(&Tensor::new(&[2, 1], vec![1.0, 1.0])).unwrap();
    assert_eq!(net.forward(&x).unwrap().item(), 3.0);
  }

  #[test]
  fn flatten_and_batches() {
    let mut net = Network::<f64>::new();
    net.add(Flatten::new()).add(Dense::new(3));
    net.initialize(Initializer::Xavier);
    net.hybridize();
    assert_eq!(net.forward(&Tensor::randn(&[4, 2, 2])).unwrap().shape().dims, vec![4, 3]);
    assert_eq!(net.forward(&Tensor::randn(&[9, 2, 2])).unwrap().shape().dims, vec![9, 3]);
  }

  #[test]
  fn save_and_load_parameters() {
    let mut source = mlp();
    let x = Tensor::randn(&[1, 512]);
    let expected = source.forward(&x).unwrap();
    let path = temp_prefix("params").with_extension("params");
    source.save_parameters(&path).unwrap();

    let mut target = Network::<f32>::new();
    for layer in &source.layers {
      let params = layer.parameters();
      let weight = &params[0];
      let mut dense = Dense::named(layer.name(), weight.shape()[-1]);
      if layer.name() != source.layers[2].name() {
        dense = dense.activation(ActType::Relu);
      }
      target.add(dense);
    }
    target.hybridize();
    target.load_parameters(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(target.forward(&x).unwrap().allclose(&expected, 1e-5, 1e-6));
  }

  #[test]
  fn failed_load_changes_nothing() {
    let mut source = Network::<f32>::new();
    source.add(Dense::named("a", 2).in_units(2));
    source.initialize(Initializer::Ones);
    let path = temp_prefix("partial").with_extension("params");
    source.save_parameters(&path).unwrap();

    let mut target = Network::<f32>::new();
    target.add(Dense::named("a", 2).in_units(2))
          .add(Dense::named("b", 2).in_units(2));
    target.initialize(Initializer::Zeros);
    let err = target.load_parameters(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, Error::MissingParameter(name) if name == "b_weight"));
    for param in target.parameters() {
      assert_eq!(param.data().unwrap(), Tensor::zeros(&param.shape().dims));
    }
  }

  #[test]
  fn export_and_import() {
    let mut net = mlp();
    assert!(matches!(net.export(temp_prefix("untraced"), 0), Err(Error::NotTraced)));

    net.hybridize();
    let x = Tensor::randn(&[1, 512]);
    let expected = net.forward(&x).unwrap();
    let (symbol_file, params_file) = net.export(temp_prefix("mlp"), 0).unwrap();
    assert!(params_file.to_string_lossy().ends_with("-0000.params"));

    let mut imported = CompiledGraph::<f32>::import(&symbol_file, &params_file).unwrap();
    std::fs::remove_file(&symbol_file).unwrap();
    std::fs::remove_file(&params_file).unwrap();
    assert!(imported.run(&x).unwrap().allclose(&expected, 1e-6, 1e-7));
  }
}
