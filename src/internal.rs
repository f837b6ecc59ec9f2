use std::cell::RefCell;
use std::collections::HashMap;

use rand::Rng;

use crate::scalar::Real;


#[inline]
pub fn negative_index(i: isize, n: usize) -> usize {
  if i < 0 {
    (n as isize + i) as usize
  } else {
    i as usize
  }
}


// Polar Box-Muller transformation

pub fn randn<T: Real>() -> (T, T) {
  let mut rng = rand::thread_rng();
  let u = rng.gen_range(-T::one(), T::one());
  let v = rng.gen_range(-T::one(), T::one());
  let r = u * u + v * v;
  // Try again if outside interval
  if r == T::zero() || r >= T::one() { return randn() }
  let c = (T::from(-2.0).unwrap() * r.ln() / r).sqrt();
  (u * c, v * c)
}


thread_local! {
  static NAME_COUNTERS: RefCell<HashMap<&'static str, usize>> = RefCell::new(HashMap::new());
}

/// Generate a fresh name like `dense0`, `dense1`, counting per prefix.

pub fn make_name(prefix: &'static str) -> String {
  NAME_COUNTERS.with(|counters| {
    let mut counters = counters.borrow_mut();
    let count = counters.entry(prefix).or_insert(0);
    let name = format!("{prefix}{count}");
    *count += 1;
    name
  })
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_count_per_prefix() {
    let a = make_name("layer");
    let b = make_name("layer");
    let c = make_name("other_layer");
    assert_ne!(a, b);
    assert!(a.starts_with("layer"));
    assert!(c.starts_with("other_layer"));
  }

  #[test]
  fn negative() {
    assert_eq!(negative_index(-1, 3), 2);
    assert_eq!(negative_index(1, 3), 1);
  }
}
