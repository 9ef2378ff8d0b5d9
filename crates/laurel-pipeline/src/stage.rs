//! The unit of composition for [`crate::Pipeline`].

use std::future::Future;

use crate::Result;

/// One step of a run: typed input in, typed output out.
///
/// Stages hold only shared handles (store, config) and keep no per-run state,
/// so one instance can serve any number of runs.
pub trait Stage {
  type Input: Send;
  type Output: Send;

  fn run(&self, input: Self::Input) -> impl Future<Output = Result<Self::Output>> + Send + '_;
}
