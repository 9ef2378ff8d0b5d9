//! Numeric core of the Laurel forecasting pipeline.
//!
//! Standardisation, seeded splitting, the three ensemble members (an
//! elastic-net logistic regression and two gradient-boosted tree models),
//! retrospective metrics and per-feature attribution. Pure synchronous; the
//! only parallelism is [`fit_ensemble`] on the rayon pool. Every fitted type
//! is `serde`-serialisable so the pipeline can persist it as an artifact.

pub mod attribution;
pub mod boost;
pub mod ensemble;
pub mod error;
pub mod logistic;
mod matrix;
pub mod metrics;
pub mod scaler;
pub mod split;
pub mod tree;

pub use attribution::AttributionMethod;
pub use boost::{BoostParams, BoostedModel};
pub use ensemble::{
  Classifier, Ensemble, EnsembleConfig, EnsembleOutput, FittedModel, Member,
  ModelKind, fit_ensemble, mean_probability,
};
pub use error::{Error, Result};
pub use logistic::{LogisticModel, LogisticParams};
pub use matrix::Matrix;
pub use scaler::StandardScaler;
pub use split::{Split, train_test_split};
