use std::io;

use thiserror::Error;

use crate::Shape;


pub type Result<T> = std::result::Result<T, Error>;


/// Everything that can go wrong while building, running or persisting a network.

#[derive(Debug, Error)]
pub enum Error {
  #[error("{op}: expected {expected}, found {found}")]
  ShapeMismatch { op: String, expected: String, found: Shape },

  #[error("parameter `{0}` has not been initialized")]
  UninitializedParameter(String),

  #[error("parameter `{0}` is missing")]
  MissingParameter(String),

  #[error("network has not been traced yet, hybridize it and call forward first")]
  NotTraced,

  #[error("invalid graph: {0}")]
  InvalidGraph(String),

  #[error(transparent)]
  Io(#[from] io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Encoding(#[from] postcard::Error),
}

impl Error {
  pub(crate) fn shape(op: impl Into<String>, expected: impl Into<String>, found: &Shape) -> Self {
    Self::ShapeMismatch { op: op.into(), expected: expected.into(), found: found.clone() }
  }
}
