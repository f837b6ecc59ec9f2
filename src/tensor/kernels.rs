#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
  tensor::Tensor,
  scalar::{ Numeric, Real },
  ops::ActType,
};


/// Matrix multiplication for builds without the `unsafe` feature.

#[allow(dead_code)]
pub(crate) fn portable_gemm<T: Numeric>(m: usize, k: usize, n: usize, a: &[T], b: &[T], c: &mut [T], accumulate: bool) {
  assert!(a.len() >= m * k && b.len() >= k * n && c.len() >= m * n);
  let row = |i: usize, out: &mut [T]| {
    if !accumulate { out.fill(T::zero()) }
    for p in 0..k {
      let lhs = a[i * k + p];
      for (o, &rhs) in out.iter_mut().zip(&b[p * n..(p + 1) * n]) {
        *o += lhs * rhs;
      }
    }
  };

  #[cfg(feature = "rayon")]
  c[..m * n].par_chunks_mut(n).enumerate().for_each(|(i, out)| row(i, out) );

  #[cfg(not(feature = "rayon"))]
  c[..m * n].chunks_mut(n).enumerate().for_each(|(i, out)| row(i, out) );
}

pub(crate) fn fully_connected<T: Real>(input: &Tensor<T>, weight: &Tensor<T>, bias: Option<&Tensor<T>>, out: &Tensor<T>) {
  let (batch, in_units) = (input.dim(0), input.dim(-1));
  let units = weight.dim(-1);
  assert!(input.rank() == 2 && weight.shape().dims == [in_units, units],
    "Could not multiply {} with {}", input.shape(), weight.shape());
  assert!(out.shape().dims == [batch, units], "Output buffer has wrong {}", out.shape());

  let mut out_data = out.raw_mut();
  match bias {
    Some(bias) => {
      let bias = bias.raw();
      assert_eq!(bias.len(), units, "Bias doesn't match {units} units");
      for row in out_data.chunks_mut(units) {
        row.copy_from_slice(&bias);
      }
    },
    None => out_data.fill(T::zero()),
  }
  T::gemm(batch, in_units, units, &input.raw(), &weight.raw(), &mut out_data, true);
}

pub(crate) fn activation<T: Real>(input: &Tensor<T>, act: ActType, out: &Tensor<T>) {
  assert!(input.shape() == out.shape(), "Output buffer has wrong {}", out.shape());
  if input.shared_with(out) {
    for a in out.raw_mut().iter_mut() {
      *a = activate(act, *a);
    }
  } else {
    for (o, &a) in out.raw_mut().iter_mut().zip(input.raw().iter()) {
      *o = activate(act, a);
    }
  }
}

#[inline]
pub(crate) fn activate<T: Real>(act: ActType, a: T) -> T {
  match act {
    ActType::Relu => a.max(T::zero()),
    ActType::Sigmoid => T::one() / (T::one() + (-a).exp()),
    ActType::Tanh => a.tanh(),
    ActType::SoftRelu => (T::one() + a.exp()).ln(),
  }
}
