//! Generation jobs: trigger once, then poll for the produced artifact.

mod job;
mod tracker;

pub use job::{AsyncJob, JobSignal, JobState};
pub use tracker::{AsyncJobTracker, SignalHandler};
