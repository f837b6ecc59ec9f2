//! Tiny CPU perceptrons that run either eagerly or as a traced, cached computation graph.
//!
//! # Features
//!
//! - **One forward, two modes**: Layers implement their forward logic once, against
//! the [Backend] trait. [Eager] runs each operation immediately on concrete tensors,
//! [Symbolic] records operations on a placeholder into a graph instead.
//!
//! - **Hybridization**: Calling [hybridize](Network::hybridize) on a [Network] makes its
//! next call trace all layers into a [CompiledGraph]. From then on, every call only
//! evaluates that graph. Layer code never runs again.
//!
//! - **Buffer reuse**: Compiled graphs keep one output buffer per node and
//! recompute into them, instead of allocating fresh tensors for every call.
//!
//! - **Deferred initialization**: Input sizes of [Dense] layers get inferred from
//! the first batch they see.
//!
//! - **Graph export**: Compiled graphs can be written to disc and loaded elsewhere,
//! without access to the code that built them.
//!
//! # Examples
//!
//! ```
//! use hybridize::{ Network, Dense, ActType, Initializer, Tensor };
//!
//! let mut net = Network::new();
//! net.add(Dense::new(256).activation(ActType::Relu))
//!    .add(Dense::new(128).activation(ActType::Relu))
//!    .add(Dense::new(2));
//! net.initialize(Initializer::Xavier);
//!
//! let x = Tensor::<f32>::randn(&[1, 512]);
//!
//! // Runs all three layers
//! let eager = net.forward(&x).unwrap();
//!
//! // Traces all three layers once, then only evaluates the cached graph
//! net.hybridize();
//! let compiled = net.forward(&x).unwrap();
//!
//! assert_eq!(compiled.shape().dims, vec![1, 2]);
//! assert!(eager.allclose(&compiled, 1e-5, 1e-6));
//! ```
//!
//! Custom layers implement [Block] and [HybridBlock]:
//!
//! ```
//! use hybridize::{ Backend, Block, HybridBlock, ActType, Result, scalar::Real };
//!
//! struct Squash;
//!
//! impl<T: Real> Block<T> for Squash {
//!   fn name(&self) -> &str { "squash" }
//! }
//!
//! impl<T: Real> HybridBlock<T> for Squash {
//!   fn hybrid_forward<B: Backend<T>>(&self, f: &mut B, x: &B::Value) -> Result<B::Value> {
//!     f.activation("squash_fwd", x, ActType::Sigmoid)
//!   }
//! }
//! ```
//!
//! Check the `/demos` folder for more example code.
//!
//! # Optional features
//!
//! - `unsafe` *(default)*: Accelerated matrix math using the [matrixmultiply] crate.
//! - `rayon`: Multi-threaded matrix math over rows when `unsafe` is disabled.

mod internal;
mod error;
mod shape;
mod tensor;
mod parameter;
mod backend;
mod graph;
mod layer;
mod network;

pub mod ops;
pub mod scalar;

pub use error::{ Error, Result };
pub use shape::Shape;
pub use tensor::Tensor;
pub use ops::{ Op, ActType };
pub use parameter::{ Parameter, Param, Initializer };
pub use backend::{ Backend, Eager, Symbolic, Symbol };
pub use graph::{ CompiledGraph, Node };
pub use layer::{ Block, HybridBlock, Forward, Layer, Dense, Activation, Flatten };
pub use network::{ Network, Mode, Statistics };
