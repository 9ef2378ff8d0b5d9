//! The staged feature table: one CSV per field, written during ETL and read
//! back by training and prediction.

use std::path::{Path, PathBuf};

use laurel_core::{
  candidate::SeedBatch,
  feature::{Feature, FeatureVector},
};
use laurel_table::{Record, Table};
use tracing::debug;

use crate::{Error, Result};

/// Header of every staged feature table.
pub const STAGING_COLUMNS: [&str; 9] = [
  "external_id",
  "field",
  "is_laureate",
  "as_of_year",
  "total_citations",
  "h_index",
  "recent_trend",
  "seminal_score",
  "award_count",
];

/// One typed row of a feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
  pub external_id: String,
  pub field:       String,
  pub is_laureate: bool,
  pub as_of_year:  i32,
  pub features:    FeatureVector,
}

impl FeatureRow {
  /// The outcome label: `1.0` for laureates.
  pub fn label(&self) -> f64 { if self.is_laureate { 1.0 } else { 0.0 } }
}

/// Build the staging table for a seed batch, one row per record.
pub fn feature_table(batch: &SeedBatch) -> Result<Table> {
  let mut table = Table::new(STAGING_COLUMNS)?;
  for record in batch.records() {
    let f = &record.features.values;
    table.push_row([
      record.external_id.clone(),
      record.field.clone(),
      record.is_laureate.to_string(),
      record.features.as_of_year.to_string(),
      f.total_citations.to_string(),
      f.h_index.to_string(),
      f.recent_trend.to_string(),
      f.seminal_score.to_string(),
      f.award_count.to_string(),
    ])?;
  }
  Ok(table)
}

pub async fn write_feature_table(path: &Path, table: &Table) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| Error::io("staging directory", parent, e))?;
  }
  tokio::fs::write(path, laurel_table::serialize(table))
    .await
    .map_err(|e| Error::io("feature table", path, e))?;
  debug!(?path, rows = table.len(), "wrote feature table");
  Ok(())
}

pub async fn load_feature_table(path: &Path) -> Result<Table> {
  let text = tokio::fs::read_to_string(path)
    .await
    .map_err(|e| Error::io("feature table", path, e))?;
  Ok(laurel_table::parse(&text)?)
}

const STAGING_SUFFIX: &str = "_features.csv";

/// Every `{slug}_features.csv` in `dir` as `(slug, path)`, sorted by slug.
pub async fn discover_feature_tables(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
  let mut entries = tokio::fs::read_dir(dir)
    .await
    .map_err(|e| Error::io("staging directory", dir, e))?;

  let mut tables = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io("staging directory", dir, e))? {
    let path = entry.path();
    if let Some(slug) = path
      .file_name()
      .and_then(|n| n.to_str())
      .and_then(|n| n.strip_suffix(STAGING_SUFFIX))
    {
      tables.push((slug.to_owned(), path));
    }
  }

  if tables.is_empty() {
    return Err(Error::MissingDependency { what: "feature tables", path: dir.to_owned() });
  }
  tables.sort();
  Ok(tables)
}

fn integer(record: &Record<'_>, column: &str) -> Result<i64> {
  let raw = record.get(column)?;
  raw.trim().parse::<i64>().map_err(|_| {
    Error::Table(laurel_table::Error::NotNumeric {
      row:    record.index(),
      column: column.to_owned(),
      value:  raw.to_owned(),
    })
  })
}

/// Type every row of a feature table. Integer columns must hold integers.
pub fn read_feature_rows(table: &Table) -> Result<Vec<FeatureRow>> {
  table
    .records()
    .map(|record| -> Result<FeatureRow> {
      let as_of_year = i32::try_from(integer(&record, "as_of_year")?).map_err(|_| {
        laurel_table::Error::NotNumeric {
          row:    record.index(),
          column: "as_of_year".into(),
          value:  record.get("as_of_year").unwrap_or_default().to_owned(),
        }
      })?;
      Ok(FeatureRow {
        external_id: record.get("external_id")?.to_owned(),
        field: record.get("field")?.to_owned(),
        is_laureate: record.flag("is_laureate")?,
        as_of_year,
        features: FeatureVector {
          total_citations: integer(&record, Feature::TotalCitations.name())?,
          h_index:         record.number(Feature::HIndex.name())?,
          recent_trend:    record.number(Feature::RecentTrend.name())?,
          seminal_score:   record.number(Feature::SeminalScore.name())?,
          award_count:     integer(&record, Feature::AwardCount.name())?,
        },
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use laurel_core::candidate::{SeedFeatures, SeedRecord};

  use super::*;

  fn record(id: &str, name: &str, laureate: bool) -> SeedRecord {
    SeedRecord {
      external_id:  id.into(),
      full_name:    name.into(),
      field:        "Physics".into(),
      affiliation:  "Institute, with comma".into(),
      country:      None,
      headshot_url: None,
      is_laureate:  laureate,
      features:     SeedFeatures {
        as_of_year: 2024,
        values:     FeatureVector {
          total_citations: 15_000,
          h_index:         72.5,
          recent_trend:    -0.25,
          seminal_score:   0.9,
          award_count:     3,
        },
      },
    }
  }

  #[tokio::test]
  async fn staged_rows_read_back_typed() {
    let batch = SeedBatch::new(vec![record("A1", "Ada", false), record("A2", "Bo", true)]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staging").join("physics_features.csv");

    write_feature_table(&path, &feature_table(&batch).unwrap()).await.unwrap();
    let table = load_feature_table(&path).await.unwrap();
    assert_eq!(table.header(), STAGING_COLUMNS);

    let rows = read_feature_rows(&table).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].external_id, "A1");
    assert_eq!(rows[0].features, batch.records()[0].features.values);
    assert_eq!(rows[0].label(), 0.0);
    assert_eq!(rows[1].label(), 1.0);
    assert_eq!(rows[1].as_of_year, 2024);
  }

  #[tokio::test]
  async fn missing_table_is_a_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_feature_table(&dir.path().join("nope.csv")).await.unwrap_err();
    assert!(err.is_not_ready());
  }

  #[tokio::test]
  async fn discovers_staged_tables_by_slug() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["physics_features.csv", "chemistry_features.csv", "notes.txt"] {
      tokio::fs::write(dir.path().join(name), "x\n").await.unwrap();
    }
    let tables = discover_feature_tables(dir.path()).await.unwrap();
    let slugs: Vec<&str> = tables.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(slugs, ["chemistry", "physics"]);

    let empty = tempfile::tempdir().unwrap();
    assert!(discover_feature_tables(empty.path()).await.unwrap_err().is_not_ready());
  }

  #[test]
  fn fractional_integer_column_is_rejected() {
    let table = laurel_table::parse(
      "external_id,field,is_laureate,as_of_year,total_citations,h_index,recent_trend,seminal_score,award_count\n\
       A1,Physics,0,2024,10.5,1,0,0,0\n",
    )
    .unwrap();
    let err = read_feature_rows(&table).unwrap_err();
    assert!(err.is_bad_input());
  }
}
