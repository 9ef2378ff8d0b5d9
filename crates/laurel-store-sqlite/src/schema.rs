//! SQL schema for the Laurel SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Created only by ingestion; external_id is the natural key.
CREATE TABLE IF NOT EXISTS candidates (
    candidate_id  TEXT PRIMARY KEY,
    external_id   TEXT NOT NULL UNIQUE,
    full_name     TEXT NOT NULL,
    field         TEXT NOT NULL,
    affiliation   TEXT NOT NULL,
    country       TEXT,
    headshot_url  TEXT,
    is_laureate   INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS feature_snapshots (
    snapshot_id      TEXT PRIMARY KEY,
    candidate_id     TEXT NOT NULL REFERENCES candidates(candidate_id),
    as_of_year       INTEGER NOT NULL,
    total_citations  INTEGER NOT NULL CHECK (total_citations >= 0),
    h_index          REAL    NOT NULL CHECK (h_index >= 0),
    recent_trend     REAL    NOT NULL,
    seminal_score    REAL    NOT NULL,
    award_count      INTEGER NOT NULL CHECK (award_count >= 0),
    UNIQUE (candidate_id, as_of_year)
);

-- Regenerated per field on every run; never partially updated in replace mode.
CREATE TABLE IF NOT EXISTS predictions (
    prediction_id    TEXT PRIMARY KEY,
    candidate_id     TEXT NOT NULL REFERENCES candidates(candidate_id),
    prediction_year  INTEGER NOT NULL,
    field            TEXT NOT NULL,
    horizon          TEXT NOT NULL,   -- 'one_year' | 'three_year'
    probability      REAL NOT NULL CHECK (probability >= 0.0 AND probability <= 1.0),
    top_features     TEXT NOT NULL DEFAULT '[]',   -- JSON array of attributions
    attributions     TEXT NOT NULL DEFAULT '[]',   -- JSON array of attributions
    created_at       TEXT NOT NULL,
    UNIQUE (candidate_id, prediction_year, horizon)
);

CREATE TABLE IF NOT EXISTS shap_values (
    prediction_id  TEXT NOT NULL REFERENCES predictions(prediction_id) ON DELETE CASCADE,
    position       INTEGER NOT NULL,   -- tracked-feature order
    feature_name   TEXT NOT NULL,
    feature_value  REAL NOT NULL,
    shap_value     REAL NOT NULL,
    PRIMARY KEY (prediction_id, feature_name)
);

CREATE TABLE IF NOT EXISTS backtest_metrics (
    field       TEXT NOT NULL,
    metric      TEXT NOT NULL,
    value       REAL NOT NULL,
    details     TEXT NOT NULL DEFAULT '{}',
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (field, metric)
);

CREATE INDEX IF NOT EXISTS candidates_field_idx   ON candidates(field);
CREATE INDEX IF NOT EXISTS predictions_field_idx  ON predictions(field, horizon);
CREATE INDEX IF NOT EXISTS snapshots_candidate_idx ON feature_snapshots(candidate_id);

PRAGMA user_version = 1;
";
