//! Merges a validated seed batch into the store.

use std::sync::Arc;

use laurel_core::{
  candidate::SeedBatch,
  store::{IngestSummary, PredictionStore},
};
use tracing::info;

use crate::{Error, Result, stage::Stage};

pub struct IngestStage<S> {
  store: Arc<S>,
}

impl<S> IngestStage<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }
}

impl<S: PredictionStore> Stage for IngestStage<S> {
  type Input = SeedBatch;
  type Output = IngestSummary;

  async fn run(&self, batch: SeedBatch) -> Result<IngestSummary> {
    let field = batch.field().to_owned();
    let records = batch.len();
    let summary = self.store.ingest_batch(batch).await.map_err(Error::store)?;
    info!(%field, records, ?summary, "ingested seed batch");
    Ok(summary)
  }
}
