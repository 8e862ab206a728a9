pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod simulator;
pub mod workdir;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineState, RunReport, Step};
