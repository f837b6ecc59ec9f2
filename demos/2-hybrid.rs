// This example builds the same perceptron as /demos/1-eager.rs, then hybridizes it.

// The first call after Network::hybridize runs each layer once against a placeholder,
// recording a computation graph. This and all later calls only evaluate that graph with
// the real input, so layer code doesn't get executed anymore.

// Note that control statements inside layers are *baked in* during that first call.

use hybridize::{ Network, Dense, ActType, Initializer, Tensor };

fn main() -> hybridize::Result<()> {
  let mut net = Network::new();
  net.add(Dense::new(256).activation(ActType::Relu))
     .add(Dense::new(128).activation(ActType::Relu))
     .add(Dense::new(2));
  net.initialize(Initializer::Xavier);

  let input = Tensor::<f32>::randn(&[1, 512]);
  let eager = net.forward(&input)?;

  net.hybridize();
  let compiled = net.forward(&input)?;

  // Feed some more data through the cached graph
  for _ in 0..10 {
    net.forward(&Tensor::randn(&[1, 512]))?;
  }

  if let Some(graph) = net.graph() {
    println!("{graph}");
  }
  println!("eager:    {eager}");
  println!("compiled: {compiled}");
  println!("match: {}", eager.allclose(&compiled, 1e-5, 1e-6));
  println!("{:?}", net.statistics());
  Ok(())
}
