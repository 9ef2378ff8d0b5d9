//! [`SqliteStore`] — the SQLite implementation of [`PredictionStore`].

use std::path::Path;

use chrono::Utc;
use laurel_core::{
  candidate::{Candidate, CandidateDetail, FeatureSnapshot, SeedBatch, SeedRecord},
  prediction::{
    BacktestMetric, Horizon, NewBacktestMetric, NewPrediction, Prediction,
    ShapAttribution, ShortlistEntry,
  },
  store::{IngestSummary, PersistSummary, PredictionStore},
};
use rusqlite::{OptionalExtension as _, Transaction, params};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    CANDIDATE_COLUMNS, EncodedPrediction, PREDICTION_COLUMNS, RawCandidate,
    RawMetric, RawPrediction, RawShap, RawSnapshot, SNAPSHOT_COLUMNS, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Laurel prediction store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL against the connection.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self.conn.call(move |conn| Ok(conn.execute_batch(sql)?)).await?;
    Ok(())
  }

  fn encode_all(predictions: &[NewPrediction]) -> Result<Vec<EncodedPrediction>> {
    predictions.iter().map(EncodedPrediction::encode).collect()
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────
//
// These run on the connection thread inside an open transaction. Returning an
// error drops the transaction uncommitted, which rolls it back.

fn upsert_record(
  tx: &Transaction<'_>,
  record: &SeedRecord,
  now: &str,
  summary: &mut IngestSummary,
) -> rusqlite::Result<()> {
  let existing: Option<String> = tx
    .query_row(
      "SELECT candidate_id FROM candidates WHERE external_id = ?1",
      params![record.external_id],
      |r| r.get(0),
    )
    .optional()?;

  let candidate_id = match existing {
    Some(id) => {
      // The laureate flag is sticky: an update may set it, never clear it.
      tx.execute(
        "UPDATE candidates
            SET full_name = ?2, field = ?3, affiliation = ?4, country = ?5,
                headshot_url = ?6, is_laureate = MAX(is_laureate, ?7)
          WHERE candidate_id = ?1",
        params![
          id,
          record.full_name,
          record.field,
          record.affiliation,
          record.country,
          record.headshot_url,
          record.is_laureate,
        ],
      )?;
      summary.candidates_updated += 1;
      id
    }
    None => {
      let id = encode_uuid(Uuid::new_v4());
      tx.execute(
        "INSERT INTO candidates (
           candidate_id, external_id, full_name, field, affiliation,
           country, headshot_url, is_laureate, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
          id,
          record.external_id,
          record.full_name,
          record.field,
          record.affiliation,
          record.country,
          record.headshot_url,
          record.is_laureate,
          now,
        ],
      )?;
      summary.candidates_created += 1;
      id
    }
  };

  let features = &record.features.values;
  let snapshot: Option<String> = tx
    .query_row(
      "SELECT snapshot_id FROM feature_snapshots
        WHERE candidate_id = ?1 AND as_of_year = ?2",
      params![candidate_id, record.features.as_of_year],
      |r| r.get(0),
    )
    .optional()?;

  match snapshot {
    Some(snapshot_id) => {
      tx.execute(
        "UPDATE feature_snapshots
            SET total_citations = ?2, h_index = ?3, recent_trend = ?4,
                seminal_score = ?5, award_count = ?6
          WHERE snapshot_id = ?1",
        params![
          snapshot_id,
          features.total_citations,
          features.h_index,
          features.recent_trend,
          features.seminal_score,
          features.award_count,
        ],
      )?;
      summary.snapshots_updated += 1;
    }
    None => {
      tx.execute(
        "INSERT INTO feature_snapshots (
           snapshot_id, candidate_id, as_of_year, total_citations, h_index,
           recent_trend, seminal_score, award_count
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          encode_uuid(Uuid::new_v4()),
          candidate_id,
          record.features.as_of_year,
          features.total_citations,
          features.h_index,
          features.recent_trend,
          features.seminal_score,
          features.award_count,
        ],
      )?;
      summary.snapshots_created += 1;
    }
  }

  Ok(())
}

fn insert_prediction(
  tx: &Transaction<'_>,
  field: &str,
  p: &EncodedPrediction,
  now: &str,
) -> rusqlite::Result<usize> {
  tx.execute(
    "INSERT INTO predictions (
       prediction_id, candidate_id, prediction_year, field, horizon,
       probability, top_features, attributions, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      p.prediction_id,
      p.candidate_id,
      p.prediction_year,
      field,
      p.horizon,
      p.probability,
      p.top_features,
      p.attributions,
      now,
    ],
  )?;
  insert_shap_rows(tx, &p.prediction_id, p)
}

fn insert_shap_rows(
  tx: &Transaction<'_>,
  prediction_id: &str,
  p: &EncodedPrediction,
) -> rusqlite::Result<usize> {
  let mut stmt = tx.prepare_cached(
    "INSERT INTO shap_values (
       prediction_id, position, feature_name, feature_value, shap_value
     ) VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for (position, name, value, shap) in &p.shap_rows {
    stmt.execute(params![prediction_id, position, name, value, shap])?;
  }
  Ok(p.shap_rows.len())
}

/// Remove the prediction keyed by (candidate, year, horizon), if any, along
/// with its attribution rows. Returns the number of predictions removed.
fn delete_prediction_key(
  tx: &Transaction<'_>,
  p: &EncodedPrediction,
) -> rusqlite::Result<usize> {
  tx.execute(
    "DELETE FROM shap_values WHERE prediction_id IN (
       SELECT prediction_id FROM predictions
        WHERE candidate_id = ?1 AND prediction_year = ?2 AND horizon = ?3)",
    params![p.candidate_id, p.prediction_year, p.horizon],
  )?;
  tx.execute(
    "DELETE FROM predictions
      WHERE candidate_id = ?1 AND prediction_year = ?2 AND horizon = ?3",
    params![p.candidate_id, p.prediction_year, p.horizon],
  )
}

fn query_shap(
  conn: &rusqlite::Connection,
  prediction_id: &str,
) -> rusqlite::Result<Vec<RawShap>> {
  let mut stmt = conn.prepare_cached(
    "SELECT prediction_id, feature_name, feature_value, shap_value
       FROM shap_values WHERE prediction_id = ?1 ORDER BY position",
  )?;
  stmt
    .query_map(params![prediction_id], |row| {
      Ok(RawShap {
        prediction_id: row.get(0)?,
        feature_name:  row.get(1)?,
        feature_value: row.get(2)?,
        shap_value:    row.get(3)?,
      })
    })?
    .collect()
}

// ─── PredictionStore impl ────────────────────────────────────────────────────

impl PredictionStore for SqliteStore {
  type Error = crate::Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn ingest_batch(&self, batch: SeedBatch) -> Result<IngestSummary> {
    let records = batch.into_records();
    let now = encode_dt(Utc::now());

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = IngestSummary::default();
        for record in &records {
          upsert_record(&tx, record, &now, &mut summary)?;
        }
        tx.commit()?;
        Ok(summary)
      })
      .await?;

    debug!(?summary, "ingested seed batch");
    Ok(summary)
  }

  // ── Candidates ────────────────────────────────────────────────────────────

  async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCandidate> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE candidate_id = ?1"),
              params![id_str],
              RawCandidate::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCandidate::into_candidate).transpose()
  }

  async fn find_candidate(&self, external_id: String) -> Result<Option<Candidate>> {
    let raw: Option<RawCandidate> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE external_id = ?1"),
              params![external_id],
              RawCandidate::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCandidate::into_candidate).transpose()
  }

  async fn list_candidates(&self, field: Option<String>) -> Result<Vec<Candidate>> {
    let raws: Vec<RawCandidate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CANDIDATE_COLUMNS} FROM candidates
            WHERE (?1 IS NULL OR field = ?1)
            ORDER BY full_name, external_id"
        ))?;
        let rows = stmt
          .query_map(params![field], RawCandidate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCandidate::into_candidate).collect()
  }

  async fn candidate_detail(&self, id: Uuid) -> Result<Option<CandidateDetail>> {
    let Some(candidate) = self.get_candidate(id).await? else {
      return Ok(None);
    };

    let id_str = encode_uuid(id);
    let raw: Option<RawSnapshot> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM feature_snapshots
                  WHERE candidate_id = ?1
                  ORDER BY as_of_year DESC LIMIT 1"
              ),
              params![id_str],
              RawSnapshot::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    let Some(raw) = raw else { return Ok(None) };
    Ok(Some(CandidateDetail { candidate, snapshot: raw.into_snapshot()? }))
  }

  async fn list_snapshots(&self, candidate_id: Uuid) -> Result<Vec<FeatureSnapshot>> {
    let id_str = encode_uuid(candidate_id);

    let raws: Vec<RawSnapshot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SNAPSHOT_COLUMNS} FROM feature_snapshots
            WHERE candidate_id = ?1 ORDER BY as_of_year"
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawSnapshot::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSnapshot::into_snapshot).collect()
  }

  // ── Predictions ───────────────────────────────────────────────────────────

  async fn replace_predictions(
    &self,
    field:       String,
    predictions: Vec<NewPrediction>,
  ) -> Result<PersistSummary> {
    let encoded = Self::encode_all(&predictions)?;
    let now = encode_dt(Utc::now());
    let field_log = field.clone();

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = PersistSummary::default();

        tx.execute(
          "DELETE FROM shap_values WHERE prediction_id IN (
             SELECT prediction_id FROM predictions WHERE field = ?1)",
          params![field],
        )?;
        summary.deleted += tx.execute("DELETE FROM predictions WHERE field = ?1", params![field])?;

        for p in &encoded {
          // A candidate that moved field still owns rows under its old one.
          summary.deleted += delete_prediction_key(&tx, p)?;
          summary.attribution_rows += insert_prediction(&tx, &field, p, &now)?;
          summary.inserted += 1;
        }

        tx.commit()?;
        Ok(summary)
      })
      .await?;

    debug!(field = %field_log, ?summary, "replaced predictions");
    Ok(summary)
  }

  async fn upsert_predictions(
    &self,
    field:       String,
    predictions: Vec<NewPrediction>,
  ) -> Result<PersistSummary> {
    let encoded = Self::encode_all(&predictions)?;
    let now = encode_dt(Utc::now());
    let field_log = field.clone();

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = PersistSummary::default();

        for p in &encoded {
          let existing: Option<String> = tx
            .query_row(
              "SELECT prediction_id FROM predictions
                WHERE candidate_id = ?1 AND prediction_year = ?2 AND horizon = ?3",
              params![p.candidate_id, p.prediction_year, p.horizon],
              |r| r.get(0),
            )
            .optional()?;

          match existing {
            Some(prediction_id) => {
              tx.execute(
                "UPDATE predictions
                    SET field = ?2, probability = ?3, top_features = ?4,
                        attributions = ?5
                  WHERE prediction_id = ?1",
                params![prediction_id, field, p.probability, p.top_features, p.attributions],
              )?;
              tx.execute(
                "DELETE FROM shap_values WHERE prediction_id = ?1",
                params![prediction_id],
              )?;
              summary.attribution_rows += insert_shap_rows(&tx, &prediction_id, p)?;
              summary.updated += 1;
            }
            None => {
              summary.attribution_rows += insert_prediction(&tx, &field, p, &now)?;
              summary.inserted += 1;
            }
          }
        }

        tx.execute(
          "DELETE FROM shap_values WHERE prediction_id IN (
             SELECT p.prediction_id FROM predictions p
               JOIN candidates c ON c.candidate_id = p.candidate_id
              WHERE p.field = ?1 AND c.is_laureate = 1)",
          params![field],
        )?;
        summary.deleted += tx.execute(
          "DELETE FROM predictions
            WHERE field = ?1 AND candidate_id IN (
              SELECT candidate_id FROM candidates WHERE is_laureate = 1)",
          params![field],
        )?;

        tx.commit()?;
        Ok(summary)
      })
      .await?;

    debug!(field = %field_log, ?summary, "upserted predictions");
    Ok(summary)
  }

  async fn list_predictions(
    &self,
    field:   String,
    horizon: Option<Horizon>,
  ) -> Result<Vec<Prediction>> {
    let horizon_str = horizon.map(Horizon::as_str);

    let raws: Vec<RawPrediction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PREDICTION_COLUMNS} FROM predictions p
            WHERE p.field = ?1 AND (?2 IS NULL OR p.horizon = ?2)
            ORDER BY p.probability DESC, p.candidate_id, p.horizon"
        ))?;
        let rows = stmt
          .query_map(params![field, horizon_str], |row| RawPrediction::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPrediction::into_prediction).collect()
  }

  async fn get_attributions(&self, prediction_id: Uuid) -> Result<Vec<ShapAttribution>> {
    let id_str = encode_uuid(prediction_id);

    let raws = self
      .conn
      .call(move |conn| Ok(query_shap(conn, &id_str)?))
      .await?;

    raws.into_iter().map(RawShap::into_shap).collect()
  }

  async fn shortlist(
    &self,
    field:   String,
    horizon: Horizon,
    limit:   usize,
  ) -> Result<Vec<ShortlistEntry>> {
    let horizon_str = horizon.as_str();
    let limit_val = limit as i64;

    let rows: Vec<(RawCandidate, RawPrediction, Vec<RawShap>)> = self
      .conn
      .call(move |conn| {
        let candidate_cols = CANDIDATE_COLUMNS
          .split(", ")
          .map(|c| format!("c.{}", c.trim()))
          .collect::<Vec<_>>()
          .join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT {candidate_cols}, {PREDICTION_COLUMNS}
             FROM predictions p
             JOIN candidates c ON c.candidate_id = p.candidate_id
            WHERE p.field = ?1 AND p.horizon = ?2 AND c.is_laureate = 0
            ORDER BY p.probability DESC, c.full_name
            LIMIT ?3"
        ))?;
        let joined = stmt
          .query_map(params![field, horizon_str, limit_val], |row| {
            Ok((RawCandidate::from_row(row)?, RawPrediction::from_row(row, 9)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(joined.len());
        for (candidate, prediction) in joined {
          let shap = query_shap(conn, &prediction.prediction_id)?;
          out.push((candidate, prediction, shap));
        }
        Ok(out)
      })
      .await?;

    rows
      .into_iter()
      .map(|(candidate, prediction, shap)| {
        let candidate = candidate.into_candidate()?;
        let prediction = prediction.into_prediction()?;
        Ok(ShortlistEntry {
          candidate_id:   candidate.candidate_id,
          candidate_name: candidate.full_name,
          affiliation:    candidate.affiliation,
          field:          candidate.field,
          headshot_url:   candidate.headshot_url,
          probability:    prediction.probability,
          horizon:        prediction.horizon,
          year:           prediction.prediction_year,
          shap_values:    shap.into_iter().map(RawShap::into_shap).collect::<Result<_>>()?,
          top_features:   prediction.top_features,
        })
      })
      .collect()
  }

  // ── Backtests ─────────────────────────────────────────────────────────────

  async fn upsert_backtest_metrics(
    &self,
    metrics: Vec<NewBacktestMetric>,
  ) -> Result<Vec<BacktestMetric>> {
    let now = Utc::now();
    let stored: Vec<BacktestMetric> = metrics
      .into_iter()
      .map(|m| BacktestMetric {
        field:      m.field,
        metric:     m.metric,
        value:      m.value,
        details:    m.details,
        updated_at: now,
      })
      .collect();

    let encoded = stored
      .iter()
      .map(|m| {
        Ok((m.field.clone(), m.metric.clone(), m.value, serde_json::to_string(&m.details)?))
      })
      .collect::<Result<Vec<_>>>()?;
    let at_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (field, metric, value, details) in &encoded {
          tx.execute(
            "INSERT INTO backtest_metrics (field, metric, value, details, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (field, metric) DO UPDATE
                SET value = excluded.value,
                    details = excluded.details,
                    updated_at = excluded.updated_at",
            params![field, metric, value, details, at_str],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(metrics = stored.len(), "upserted backtest metrics");
    Ok(stored)
  }

  async fn list_backtest_metrics(&self, field: Option<String>) -> Result<Vec<BacktestMetric>> {
    let raws: Vec<RawMetric> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT field, metric, value, details, updated_at FROM backtest_metrics
            WHERE (?1 IS NULL OR field = ?1)
            ORDER BY field, metric",
        )?;
        let rows = stmt
          .query_map(params![field], |row| {
            Ok(RawMetric {
              field:      row.get(0)?,
              metric:     row.get(1)?,
              value:      row.get(2)?,
              details:    row.get(3)?,
              updated_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetric::into_metric).collect()
  }
}
