//! Seeded train/test partitioning.

use rand::{SeedableRng, seq::SliceRandom};
use rand_pcg::Pcg64;

use crate::{Error, Result};

/// Row indices of each side of a split, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
  pub train: Vec<usize>,
  pub test:  Vec<usize>,
}

/// Shuffle `0..n` with a `Pcg64` seeded from `seed`, then take the first
/// `ceil(n * test_fraction)` indices as the test side. At least one row always
/// stays on the training side.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
  if n < 2 {
    return Err(Error::TooFewRows { needed: 2, found: n });
  }
  if !(test_fraction > 0.0 && test_fraction < 1.0) {
    return Err(Error::InvalidParameter {
      name:   "test_fraction",
      reason: format!("{test_fraction} is not in (0, 1)"),
    });
  }

  let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

  let mut indices: Vec<usize> = (0..n).collect();
  let mut rng = Pcg64::seed_from_u64(seed);
  indices.shuffle(&mut rng);

  let train = indices.split_off(n_test);
  Ok(Split { train, test: indices })
}
