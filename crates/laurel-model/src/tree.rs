//! Second-order regression trees for gradient boosting.
//!
//! Nodes are stored as parallel arrays. A child reference `>= 0` is an
//! internal node index; a negative reference `-(k + 1)` is leaf `k`. Rows go
//! left when `value <= threshold`.

use serde::{Deserialize, Serialize};

use crate::{Error, Matrix, Result};

/// Minimum gain for a split to be taken.
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
  pub max_depth:        usize,
  pub min_samples_leaf: usize,
  /// Minimum hessian sum on each side of a split.
  pub min_child_weight: f64,
  /// L2 penalty on leaf weights.
  pub lambda:           f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
  split_features: Vec<usize>,
  thresholds:     Vec<f64>,
  left_child:     Vec<i32>,
  right_child:    Vec<i32>,
  leaf_values:    Vec<f64>,
  root:           i32,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
  feature:   usize,
  threshold: f64,
  gain:      f64,
}

fn leaf_ref(k: usize) -> i32 { -(k as i32) - 1 }

struct Grower<'a> {
  x:       &'a Matrix,
  grad:    &'a [f64],
  hess:    &'a [f64],
  columns: &'a [usize],
  params:  &'a TreeParams,
  tree:    RegressionTree,
}

impl Grower<'_> {
  fn score(&self, g: f64, h: f64) -> f64 { g * g / (h + self.params.lambda).max(1e-12) }

  fn leaf_weight(&self, g: f64, h: f64) -> f64 { -g / (h + self.params.lambda).max(1e-12) }

  fn grow(&mut self, rows: &mut [usize], depth: usize) -> i32 {
    let g: f64 = rows.iter().map(|r| self.grad[*r]).sum();
    let h: f64 = rows.iter().map(|r| self.hess[*r]).sum();

    if depth < self.params.max_depth
      && let Some(split) = self.best_split(rows, g, h)
    {
      let mut mid = 0;
      for i in 0..rows.len() {
        if self.x.row(rows[i])[split.feature] <= split.threshold {
          rows.swap(i, mid);
          mid += 1;
        }
      }

      let node = self.tree.split_features.len();
      self.tree.split_features.push(split.feature);
      self.tree.thresholds.push(split.threshold);
      self.tree.left_child.push(0);
      self.tree.right_child.push(0);

      let (left, right) = rows.split_at_mut(mid);
      let l = self.grow(left, depth + 1);
      let r = self.grow(right, depth + 1);
      self.tree.left_child[node] = l;
      self.tree.right_child[node] = r;
      return node as i32;
    }

    let leaf = self.tree.leaf_values.len();
    self.tree.leaf_values.push(self.leaf_weight(g, h));
    leaf_ref(leaf)
  }

  /// Exhaustive search over every allowed column and every boundary between
  /// distinct sorted values. Ties keep the first candidate found.
  fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
    let min_leaf = self.params.min_samples_leaf.max(1);
    if rows.len() < 2 * min_leaf {
      return None;
    }

    let parent = self.score(g_total, h_total);
    let mut best: Option<SplitCandidate> = None;
    let mut order = rows.to_vec();

    for &f in self.columns {
      order.sort_by(|a, b| self.x.row(*a)[f].total_cmp(&self.x.row(*b)[f]));
      let (mut gl, mut hl) = (0.0, 0.0);

      for k in 0..order.len() - 1 {
        let r = order[k];
        gl += self.grad[r];
        hl += self.hess[r];

        let v = self.x.row(r)[f];
        let next = self.x.row(order[k + 1])[f];
        if v == next {
          continue;
        }
        let n_left = k + 1;
        if n_left < min_leaf || order.len() - n_left < min_leaf {
          continue;
        }
        let (gr, hr) = (g_total - gl, h_total - hl);
        if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
          continue;
        }

        let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent);
        if gain > MIN_SPLIT_GAIN && best.is_none_or(|b| gain > b.gain) {
          best = Some(SplitCandidate { feature: f, threshold: (v + next) / 2.0, gain });
        }
      }
    }

    best
  }
}

impl RegressionTree {
  /// Fit one tree to per-row gradients and hessians. Only `rows` are used for
  /// fitting and only `columns` are considered for splits; `rows` is
  /// reordered in place.
  pub fn fit(
    x:       &Matrix,
    grad:    &[f64],
    hess:    &[f64],
    rows:    &mut [usize],
    columns: &[usize],
    params:  &TreeParams,
  ) -> Self {
    let mut grower = Grower {
      x,
      grad,
      hess,
      columns,
      params,
      tree: RegressionTree {
        split_features: Vec::new(),
        thresholds:     Vec::new(),
        left_child:     Vec::new(),
        right_child:    Vec::new(),
        leaf_values:    Vec::new(),
        root:           0,
      },
    };
    let root = grower.grow(rows, 0);
    grower.tree.root = root;
    grower.tree
  }

  pub fn predict(&self, row: &[f64]) -> f64 {
    let mut node = self.root;
    while node >= 0 {
      let n = node as usize;
      node = if row[self.split_features[n]] <= self.thresholds[n] {
        self.left_child[n]
      } else {
        self.right_child[n]
      };
    }
    self.leaf_values[(-node - 1) as usize]
  }

  pub fn n_leaves(&self) -> usize { self.leaf_values.len() }

  /// Check that every reference points inside the arrays, so a tree read from
  /// disk cannot index out of bounds in [`RegressionTree::predict`].
  pub fn validate(&self, n_features: usize) -> Result<()> {
    let nodes = self.split_features.len();
    let corrupt = |reason: String| Error::InvalidParameter { name: "tree", reason };

    if self.thresholds.len() != nodes || self.left_child.len() != nodes || self.right_child.len() != nodes {
      return Err(corrupt("split/child/threshold length mismatch".into()));
    }
    if let Some(f) = self.split_features.iter().find(|f| **f >= n_features) {
      return Err(corrupt(format!("split on feature {f} of {n_features}")));
    }
    let in_range = |c: i32| {
      if c >= 0 { (c as usize) < nodes } else { ((-c - 1) as usize) < self.leaf_values.len() }
    };
    let children = self.left_child.iter().chain(&self.right_child).copied();
    if !in_range(self.root) || children.clone().any(|c| !in_range(c)) {
      return Err(corrupt("child reference out of range".into()));
    }
    // Internal nodes are pushed before their children, so every edge must
    // point forward; this rules out cycles.
    for (n, (l, r)) in self.left_child.iter().zip(&self.right_child).enumerate() {
      if (*l >= 0 && *l as usize <= n) || (*r >= 0 && *r as usize <= n) {
        return Err(corrupt(format!("node {n} points backwards")));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARAMS: TreeParams =
    TreeParams { max_depth: 3, min_samples_leaf: 1, min_child_weight: 0.0, lambda: 0.0 };

  #[test]
  fn splits_on_the_informative_column() {
    // Column 0 is noise, column 1 separates the gradients.
    let x = Matrix::from_rows(&[[5.0, 0.0], [1.0, 0.1], [4.0, 0.9], [2.0, 1.0]]).unwrap();
    let grad = [1.0, 1.0, -1.0, -1.0];
    let hess = [1.0; 4];
    let mut rows: Vec<usize> = (0..4).collect();
    let tree = RegressionTree::fit(&x, &grad, &hess, &mut rows, &[0, 1], &PARAMS);

    assert_eq!(tree.n_leaves(), 2);
    assert_eq!(tree.predict(&[0.0, 0.05]), -1.0);
    assert_eq!(tree.predict(&[0.0, 0.95]), 1.0);
    assert!(tree.validate(2).is_ok());
  }

  #[test]
  fn depth_zero_is_a_single_leaf() {
    let x = Matrix::from_rows(&[[0.0], [1.0]]).unwrap();
    let params = TreeParams { max_depth: 0, ..PARAMS };
    let mut rows = vec![0, 1];
    let tree = RegressionTree::fit(&x, &[1.0, 3.0], &[1.0, 1.0], &mut rows, &[0], &params);
    assert_eq!(tree.n_leaves(), 1);
    assert_eq!(tree.predict(&[0.0]), -2.0);
  }

  #[test]
  fn min_samples_leaf_blocks_small_splits() {
    let x = Matrix::from_rows(&[[0.0], [1.0], [2.0]]).unwrap();
    let params = TreeParams { min_samples_leaf: 2, ..PARAMS };
    let mut rows = vec![0, 1, 2];
    let tree = RegressionTree::fit(&x, &[1.0, -1.0, 1.0], &[1.0; 3], &mut rows, &[0], &params);
    assert_eq!(tree.n_leaves(), 1);
  }

  #[test]
  fn lambda_shrinks_leaf_weight() {
    let x = Matrix::from_rows(&[[0.0]]).unwrap();
    let params = TreeParams { lambda: 1.0, ..PARAMS };
    let tree = RegressionTree::fit(&x, &[2.0], &[1.0], &mut [0], &[0], &params);
    assert_eq!(tree.predict(&[0.0]), -1.0);
  }

  #[test]
  fn validate_rejects_out_of_range_feature() {
    let x = Matrix::from_rows(&[[0.0, 0.0], [0.0, 1.0]]).unwrap();
    let mut rows = vec![0, 1];
    let tree = RegressionTree::fit(&x, &[1.0, -1.0], &[1.0, 1.0], &mut rows, &[1], &PARAMS);
    assert!(tree.validate(2).is_ok());
    assert!(tree.validate(1).is_err());
  }
}
