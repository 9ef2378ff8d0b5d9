//! Writes a field's scored candidates to the store.

use std::{collections::HashMap, sync::Arc};

use laurel_core::{
  candidate::Candidate,
  prediction::{Horizon, NewPrediction},
  store::{PersistSummary, PredictionStore},
};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  config::{PersistMode, PipelineConfig},
  predict::CandidatePrediction,
  stage::Stage,
};

/// Turn scored candidates into store rows: one per horizon for every known,
/// non-laureate candidate. A candidate counts as a laureate if either the
/// stored flag or the scored row says so.
pub fn prediction_rows(
  candidates: &[Candidate],
  predictions: &[CandidatePrediction],
  year: i32,
) -> Vec<NewPrediction> {
  let by_external: HashMap<&str, &Candidate> =
    candidates.iter().map(|c| (c.external_id.as_str(), c)).collect();

  let mut rows = Vec::with_capacity(predictions.len() * Horizon::ALL.len());
  for p in predictions {
    let Some(candidate) = by_external.get(p.external_id.as_str()) else {
      warn!(external_id = %p.external_id, field = %p.field, "no stored candidate for prediction, skipping");
      continue;
    };
    if candidate.is_laureate || p.is_laureate {
      debug!(external_id = %p.external_id, "skipping laureate");
      continue;
    }
    for horizon in Horizon::ALL {
      let probability = match horizon {
        Horizon::OneYear => p.one_year,
        Horizon::ThreeYear => p.three_year,
      };
      rows.push(NewPrediction {
        candidate_id: candidate.candidate_id,
        prediction_year: year,
        horizon,
        probability,
        attributions: p.attributions.clone(),
      });
    }
  }
  rows
}

pub struct PersistInput {
  pub field:       String,
  pub predictions: Vec<CandidatePrediction>,
}

pub struct PersistStage<S> {
  store:  Arc<S>,
  config: Arc<PipelineConfig>,
}

impl<S> PersistStage<S> {
  pub fn new(store: Arc<S>, config: Arc<PipelineConfig>) -> Self { Self { store, config } }
}

impl<S: PredictionStore> Stage for PersistStage<S> {
  type Input = PersistInput;
  type Output = PersistSummary;

  async fn run(&self, input: PersistInput) -> Result<PersistSummary> {
    let PersistInput { field, predictions } = input;
    let candidates = self
      .store
      .list_candidates(Some(field.clone()))
      .await
      .map_err(Error::store)?;
    let rows = prediction_rows(&candidates, &predictions, self.config.prediction_year());

    let mode = self.config.persist_mode;
    let summary = match mode {
      PersistMode::Replace => self.store.replace_predictions(field.clone(), rows).await,
      PersistMode::Upsert => self.store.upsert_predictions(field.clone(), rows).await,
    }
    .map_err(Error::store)?;

    info!(%field, ?mode, ?summary, "persisted predictions");
    Ok(summary)
  }
}
