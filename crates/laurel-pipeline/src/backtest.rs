//! Retrospective accuracy of a field's ensemble, recorded per metric.

use std::{collections::BTreeMap, sync::Arc};

use laurel_core::{
  prediction::{BacktestMetric, NewBacktestMetric},
  store::PredictionStore,
};
use laurel_model::metrics;
use serde_json::json;
use tracing::info;

use crate::{
  Error, Result,
  artifact::{self, METRICS_ARTIFACT},
  config::PipelineConfig,
  stage::Stage,
};

pub const HIT_AT: usize = 10;

/// Metric name → value, in name order.
pub fn compute_metrics(labels: &[f64], probabilities: &[f64]) -> Result<BTreeMap<&'static str, f64>> {
  Ok(BTreeMap::from([
    ("brier_score", metrics::brier_score(labels, probabilities)?),
    ("average_precision", metrics::average_precision(labels, probabilities)?),
    ("hit_at_10", metrics::hit_at_k(labels, probabilities, HIT_AT)?),
  ]))
}

pub struct BacktestInput {
  pub field:         String,
  pub run_id:        String,
  /// Outcome per candidate, `1.0` for laureates.
  pub labels:        Vec<f64>,
  /// Ensemble probability per candidate, aligned with `labels`.
  pub probabilities: Vec<f64>,
}

pub struct BacktestStage<S> {
  store:  Arc<S>,
  config: Arc<PipelineConfig>,
}

impl<S> BacktestStage<S> {
  pub fn new(store: Arc<S>, config: Arc<PipelineConfig>) -> Self { Self { store, config } }
}

impl<S: PredictionStore> Stage for BacktestStage<S> {
  type Input = BacktestInput;
  type Output = Vec<BacktestMetric>;

  async fn run(&self, input: BacktestInput) -> Result<Vec<BacktestMetric>> {
    let BacktestInput { field, run_id, labels, probabilities } = input;
    let values = compute_metrics(&labels, &probabilities)?;
    let details = json!({
      "samples": labels.len(),
      "positives": labels.iter().filter(|y| **y == 1.0).count(),
      "run_id": run_id,
    });

    let rows = values
      .iter()
      .map(|(metric, value)| NewBacktestMetric {
        field:   field.clone(),
        metric:  (*metric).to_owned(),
        value:   *value,
        details: details.clone(),
      })
      .collect();
    let recorded = self.store.upsert_backtest_metrics(rows).await.map_err(Error::store)?;

    let path = self.config.artifact_path(&field, METRICS_ARTIFACT, "json");
    artifact::write_json(&path, &values).await?;
    info!(%field, ?values, "recorded backtest metrics");
    Ok(recorded)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn metrics_are_named_and_computed() {
    let values = compute_metrics(&[1.0, 0.0, 1.0, 0.0], &[0.9, 0.8, 0.7, 0.1]).unwrap();
    assert_eq!(values.keys().copied().collect::<Vec<_>>(), [
      "average_precision",
      "brier_score",
      "hit_at_10"
    ]);
    assert!((values["average_precision"] - (0.5 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
    assert_eq!(values["hit_at_10"], 1.0);
  }

  #[test]
  fn no_positives_scores_zero_precision() {
    let values = compute_metrics(&[0.0, 0.0], &[0.3, 0.2]).unwrap();
    assert_eq!(values["average_precision"], 0.0);
    assert_eq!(values["hit_at_10"], 0.0);
  }

  #[test]
  fn empty_input_is_rejected() {
    assert!(compute_metrics(&[], &[]).unwrap_err().is_bad_input());
  }
}
