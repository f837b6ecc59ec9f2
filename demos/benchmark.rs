// Compares average call latency of the same network in eager and in compiled mode.

// Run with `cargo run --release --example benchmark`.

use std::time::{ Duration, Instant };

use hybridize::{ Network, Dense, ActType, Initializer, Tensor };

const RUNS: u32 = 1000;

fn mlp() -> Network<f32> {
  let mut net = Network::new();
  net.add(Dense::new(256).activation(ActType::Relu))
     .add(Dense::new(128).activation(ActType::Relu))
     .add(Dense::new(2));
  net.initialize(Initializer::Xavier);
  net
}

fn bench(net: &mut Network<f32>, input: &Tensor<f32>) -> hybridize::Result<Duration> {
  let start = Instant::now();
  for _ in 0..RUNS {
    net.forward(input)?;
  }
  Ok(start.elapsed() / RUNS)
}

fn main() -> hybridize::Result<()> {
  let input = Tensor::randn(&[1, 512]);
  let mut net = mlp();

  // Warm up & allocate deferred parameters
  net.forward(&input)?;
  let eager = bench(&mut net, &input)?;

  net.hybridize();
  let start = Instant::now();
  net.forward(&input)?;
  let first = start.elapsed();
  let compiled = bench(&mut net, &input)?;

  println!("eager:          {eager:?} per call");
  println!("first compiled: {first:?} (includes tracing)");
  println!("compiled:       {compiled:?} per call");
  println!("{:?}", net.statistics());
  Ok(())
}
