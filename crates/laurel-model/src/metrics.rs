//! Retrospective accuracy metrics for binary outcomes.

use crate::{Error, Result};

fn check(y: &[f64], p: &[f64]) -> Result<()> {
  if y.len() != p.len() {
    return Err(Error::LabelMismatch { rows: p.len(), labels: y.len() });
  }
  if y.is_empty() {
    return Err(Error::EmptyDataset);
  }
  Ok(())
}

/// Indices ordered by descending score; equal scores keep input order.
fn ranked(p: &[f64]) -> Vec<usize> {
  let mut order: Vec<usize> = (0..p.len()).collect();
  order.sort_by(|a, b| p[*b].total_cmp(&p[*a]));
  order
}

/// Mean squared difference between probability and outcome.
pub fn brier_score(y: &[f64], p: &[f64]) -> Result<f64> {
  check(y, p)?;
  Ok(y.iter().zip(p).map(|(t, q)| (q - t).powi(2)).sum::<f64>() / y.len() as f64)
}

/// Area under the precision–recall curve with step interpolation:
/// `Σ (Rₖ − Rₖ₋₁)·Pₖ` over distinct score thresholds, highest first. Rows
/// with equal scores enter together. `0.0` when there are no positives.
pub fn average_precision(y: &[f64], p: &[f64]) -> Result<f64> {
  check(y, p)?;
  let positives = y.iter().filter(|t| **t == 1.0).count();
  if positives == 0 {
    return Ok(0.0);
  }

  let order = ranked(p);
  let (mut tp, mut fp) = (0usize, 0usize);
  let mut prev_recall = 0.0;
  let mut ap = 0.0;

  let mut k = 0;
  while k < order.len() {
    let score = p[order[k]];
    while k < order.len() && p[order[k]] == score {
      if y[order[k]] == 1.0 {
        tp += 1;
      } else {
        fp += 1;
      }
      k += 1;
    }
    let recall = tp as f64 / positives as f64;
    let precision = tp as f64 / (tp + fp) as f64;
    ap += (recall - prev_recall) * precision;
    prev_recall = recall;
  }

  Ok(ap)
}

/// Share of positives ranked within the top `k` by probability. `0.0` when
/// there are no positives.
pub fn hit_at_k(y: &[f64], p: &[f64], k: usize) -> Result<f64> {
  check(y, p)?;
  let positives = y.iter().filter(|t| **t == 1.0).count();
  if positives == 0 {
    return Ok(0.0);
  }
  let hits = ranked(p).into_iter().take(k).filter(|i| y[*i] == 1.0).count();
  Ok(hits as f64 / positives as f64)
}
