use rand::distributions::uniform::SampleUniform;
use num_traits::{ Float, NumAssignOps, Num, NumCast };
use serde::{ Serialize, de::DeserializeOwned };


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// Floating point types that layers can compute with.
///
/// Implemented for [f32] and [f64], which is where an accelerated
/// matrix multiplication is available.

pub trait Real: Numeric + Float + SampleUniform + Serialize + DeserializeOwned + 'static {
  /// Row-major `c = a · b`, or `c += a · b` when `accumulate` is set.
  ///
  /// `a` is `m × k`, `b` is `k × n`, `c` is `m × n`.

  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self], accumulate: bool);
}

macro_rules! impl_real {
  ($type:ty, $gemm:ident) => {
    impl Real for $type {
      #[cfg(feature = "unsafe")]
      fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self], accumulate: bool) {
        assert!(a.len() >= m * k && b.len() >= k * n && c.len() >= m * n);
        let beta = if accumulate { 1.0 } else { 0.0 };
        unsafe {
          matrixmultiply::$gemm(
            m, k, n,
            1.0,
            a.as_ptr(), k as isize, 1,
            b.as_ptr(), n as isize, 1,
            beta,
            c.as_mut_ptr(), n as isize, 1,
          );
        }
      }

      #[cfg(not(feature = "unsafe"))]
      fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self], accumulate: bool) {
        crate::tensor::kernels::portable_gemm(m, k, n, a, b, c, accumulate)
      }
    }
  };
}

impl_real!(f32, sgemm);
impl_real!(f64, dgemm);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gemm() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut c = [0.0f32; 4];
    f32::gemm(2, 3, 2, &a, &b, &mut c, false);
    assert_eq!(c, [22.0, 28.0, 49.0, 64.0]);

    // Accumulate on top of existing values
    let mut c = [1.0f64; 4];
    f64::gemm(2, 3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &mut c, true);
    assert_eq!(c, [23.0, 29.0, 50.0, 65.0]);
  }
}
