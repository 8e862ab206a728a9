//! Ordered stage pipeline
//!
//! Steps run strictly one after another: prepare the working directory,
//! then alternate simulator stages with checkpoint promotions. There is no
//! branching and no re-entry; any error ends the run.

mod runner;
mod types;


pub use runner::{Aborted, NoopObserver, Pipeline, PipelineObserver};
pub use types::{PipelineState, Promotion, RunReport, Step};
