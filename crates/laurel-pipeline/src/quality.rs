//! Data quality gate for staged feature tables.
//!
//! Checks, per required column in order: the column exists; no cell is null;
//! and for magnitude columns, every cell is a non-negative number. Checks on a
//! missing column are skipped rather than failed. The gate reports; it never
//! errors on content, so callers must look at [`QualityReport::success`].

use std::path::{Path, PathBuf};

use laurel_core::feature::Feature;
use laurel_table::{Table, is_null};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result, stage::Stage};

/// Columns every feature table must carry, in check order.
pub const REQUIRED_COLUMNS: [&str; 7] = [
  "external_id",
  "field",
  "total_citations",
  "h_index",
  "recent_trend",
  "seminal_score",
  "award_count",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationResult {
  /// `"<check>::<column>"`, e.g. `"not_null::h_index"`.
  pub expectation: String,
  pub success:     bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
  pub success: bool,
  pub results: Vec<ExpectationResult>,
}

impl QualityReport {
  fn from_results(results: Vec<ExpectationResult>) -> Self {
    Self { success: results.iter().all(|r| r.success), results }
  }

  /// Names of the failed expectations.
  pub fn failed(&self) -> Vec<String> {
    self
      .results
      .iter()
      .filter(|r| !r.success)
      .map(|r| r.expectation.clone())
      .collect()
  }
}

fn is_magnitude(column: &str) -> bool {
  Feature::ALL.iter().any(|f| f.is_magnitude() && f.name() == column)
}

fn non_negative(cell: &str) -> bool { cell.trim().parse::<f64>().is_ok_and(|v| v >= 0.0) }

/// Run every expectation against an in-memory table.
pub fn validate_table(table: &Table) -> QualityReport {
  let mut results = Vec::new();
  let mut record = |check: &str, column: &str, success: bool| {
    results.push(ExpectationResult { expectation: format!("{check}::{column}"), success });
  };

  for column in REQUIRED_COLUMNS {
    let Ok(cells) = table.column(column) else {
      record("column_exists", column, false);
      continue;
    };
    record("column_exists", column, true);

    let cells: Vec<&str> = cells.collect();
    record("not_null", column, cells.iter().all(|c| !is_null(c)));
    if is_magnitude(column) {
      record("non_negative", column, cells.iter().all(|c| non_negative(c)));
    }
  }

  QualityReport::from_results(results)
}

/// Run the gate against a file. An unreadable or unparsable file yields a
/// failed `readable` expectation plus a failed `column_exists` per column.
pub async fn validate_feature_file(path: &Path) -> QualityReport {
  let table = match tokio::fs::read_to_string(path).await {
    Ok(text) => laurel_table::parse(&text).map_err(|e| e.to_string()),
    Err(e) => Err(e.to_string()),
  };

  match table {
    Ok(table) => validate_table(&table),
    Err(reason) => {
      warn!(?path, %reason, "feature table unreadable");
      let mut results = vec![ExpectationResult { expectation: "readable".into(), success: false }];
      results.extend(REQUIRED_COLUMNS.iter().map(|c| ExpectationResult {
        expectation: format!("column_exists::{c}"),
        success:     false,
      }));
      QualityReport::from_results(results)
    }
  }
}

pub struct GateInput {
  pub field: String,
  pub path:  PathBuf,
}

/// The gate as a pipeline stage: an absent table is
/// [`Error::MissingDependency`] and a failed report becomes
/// [`Error::DataQuality`].
pub struct QualityGate;

impl Stage for QualityGate {
  type Input = GateInput;
  type Output = QualityReport;

  async fn run(&self, input: GateInput) -> Result<QualityReport> {
    tokio::fs::metadata(&input.path)
      .await
      .map_err(|e| Error::io("feature table", &input.path, e))?;
    let report = validate_feature_file(&input.path).await;
    if !report.success {
      return Err(Error::DataQuality { field: input.field, failed: report.failed() });
    }
    info!(field = %input.field, checks = report.results.len(), "data quality gate passed");
    Ok(report)
  }
}
