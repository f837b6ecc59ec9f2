// This example exports a hybridized network's graph and parameters to files.

// The graph can then be loaded elsewhere in its entirety,
// without access to the code of the layers that produced it.

use hybridize::{ Network, Dense, ActType, Initializer, Tensor, CompiledGraph };

fn main() -> hybridize::Result<()> {
  let prefix = std::env::temp_dir().join("mlp");

  let input = Tensor::<f32>::randn(&[1, 512]);
  let expected = build_model(&prefix, &input)?;
  let output = load_model(&prefix, &input)?;

  println!("match: {}", expected.allclose(&output, 1e-6, 1e-7));
  Ok(())
}

fn build_model(prefix: &std::path::Path, input: &Tensor<f32>) -> hybridize::Result<Tensor<f32>> {
  let mut net = Network::new();
  net.add(Dense::new(256).activation(ActType::Relu))
     .add(Dense::new(128).activation(ActType::Relu))
     .add(Dense::new(2));
  net.initialize(Initializer::Xavier);

  // Exporting needs a graph, so hybridize and run once
  net.hybridize();
  let output = net.forward(input)?;

  // Writes mlp-symbol.json and mlp-0000.params
  let (symbol_file, params_file) = net.export(prefix, 0)?;
  println!("wrote {} and {}", symbol_file.display(), params_file.display());
  Ok(output)
}

fn load_model(prefix: &std::path::Path, input: &Tensor<f32>) -> hybridize::Result<Tensor<f32>> {
  let prefix = prefix.display();
  let mut graph = CompiledGraph::<f32>::import(
    format!("{prefix}-symbol.json"),
    format!("{prefix}-0000.params"),
  )?;
  graph.run(input)
}
