//! The run state machine and the report it produces.
//!
//! ```text
//! Idle → Validating → Ingesting → Training → Predicting → Persisting → Done
//!   └──────────┴───────────┴──────────┴────────────┴────────────┴──→ Failed
//! ```
//!
//! Transitions only move forward. A run may start past `Validating` or stop
//! before `Training` (an ETL-only run goes `Ingesting → Done`), but it can
//! never revisit a stage. `Done` and `Failed` are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
  Idle,
  Validating,
  Ingesting,
  Training,
  Predicting,
  Persisting,
  Done,
  Failed,
}

impl PipelineState {
  pub fn is_terminal(self) -> bool { matches!(self, Self::Done | Self::Failed) }

  pub fn can_advance_to(self, next: PipelineState) -> bool {
    if self.is_terminal() {
      return false;
    }
    next == Self::Failed || next > self
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Idle => "idle",
      Self::Validating => "validating",
      Self::Ingesting => "ingesting",
      Self::Training => "training",
      Self::Predicting => "predicting",
      Self::Persisting => "persisting",
      Self::Done => "done",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One entered state and when it was entered.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
  pub state:      PipelineState,
  pub entered_at: DateTime<Utc>,
}

/// The transition history of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub run_id:      String,
  pub field:       String,
  pub stages:      Vec<StageRecord>,
  pub final_state: PipelineState,
}

impl RunReport {
  pub fn new(run_id: impl Into<String>, field: impl Into<String>) -> Self {
    Self {
      run_id:      run_id.into(),
      field:       field.into(),
      stages:      Vec::new(),
      final_state: PipelineState::Idle,
    }
  }

  pub fn state(&self) -> PipelineState { self.final_state }

  pub fn advance(&mut self, next: PipelineState) -> Result<()> {
    let from = self.final_state;
    if !from.can_advance_to(next) {
      return Err(Error::Transition { from, to: next });
    }
    info!(run_id = %self.run_id, field = %self.field, %from, to = %next, "pipeline transition");
    self.stages.push(StageRecord { state: next, entered_at: Utc::now() });
    self.final_state = next;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use PipelineState::*;

  #[test]
  fn full_run_is_accepted() {
    let mut report = RunReport::new("r", "Physics");
    for s in [Validating, Ingesting, Training, Predicting, Persisting, Done] {
      report.advance(s).unwrap();
    }
    assert_eq!(report.state(), Done);
    assert_eq!(report.stages.len(), 6);
  }

  #[test]
  fn partial_runs_skip_forward() {
    let mut etl = RunReport::new("r", "Physics");
    etl.advance(Validating).unwrap();
    etl.advance(Ingesting).unwrap();
    etl.advance(Done).unwrap();

    let mut train = RunReport::new("r", "Physics");
    train.advance(Validating).unwrap();
    train.advance(Training).unwrap();
  }

  #[test]
  fn backwards_and_terminal_transitions_are_rejected() {
    let mut report = RunReport::new("r", "Physics");
    report.advance(Training).unwrap();
    assert!(matches!(
      report.advance(Ingesting),
      Err(Error::Transition { from: Training, to: Ingesting })
    ));
    report.advance(Failed).unwrap();
    assert!(report.advance(Done).is_err());
    assert!(!Done.can_advance_to(Failed));
  }

  #[test]
  fn failed_is_reachable_from_idle() {
    assert!(Idle.can_advance_to(Failed));
  }
}
