//! The Laurel prediction pipeline.
//!
//! Seed files are staged as feature tables, checked by the data quality gate
//! and merged into a [`PredictionStore`]; staged tables then train the
//! ensemble, whose verified artifacts score every candidate. Scores are
//! persisted per field and evaluated by the backtest recorder. Each step is a
//! [`Stage`]; [`Pipeline`] composes them and records every run as a
//! [`RunReport`].
//!
//! [`PredictionStore`]: laurel_core::store::PredictionStore

pub mod artifact;
pub mod backtest;
pub mod config;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod persist;
pub mod predict;
pub mod provenance;
pub mod quality;
pub mod report;
pub mod seed;
pub mod stage;
pub mod staging;
pub mod state;
pub mod train;


pub use config::{PersistMode, PipelineConfig, ScalerFit};
pub use error::{Error, PipelineFailure, Result};
pub use orchestrator::{BatchOutcome, EtlOutcome, ModelOutcome, Pipeline, TrainOutcome};
pub use quality::{QualityReport, validate_feature_file};
pub use stage::Stage;
pub use state::{PipelineState, RunReport};
