//! The runtime around a pipeline instance: effect execution, background
//! persistence and generation polling.

mod driver;
mod persistence;

pub use driver::{DriverBuilder, PipelineDriver};
