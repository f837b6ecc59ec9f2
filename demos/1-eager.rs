// This example builds a small multilayer perceptron and runs it eagerly.

// Every call to Network::forward runs every layer's code again, on concrete data.
// That makes it easy to debug (print intermediate tensors, set breakpoints in layers)
// at the cost of re-dispatching and re-allocating everything per call.

use hybridize::{ Network, Dense, ActType, Initializer, Tensor };

fn main() -> hybridize::Result<()> {
  let mut net = Network::new();
  net.add(Dense::new(256).activation(ActType::Relu))
     .add(Dense::new(128).activation(ActType::Relu))
     .add(Dense::new(2));

  // Input sizes are unknown until the first batch arrives,
  // so weights get allocated during the first forward pass
  net.initialize(Initializer::Xavier);

  // --- Insert real data here ---
  let input = Tensor::<f32>::randn(&[1, 512]);

  let output = net.forward(&input)?;
  println!("{net}");
  println!("{output}");
  println!("{:?}", net.statistics());
  Ok(())
}
