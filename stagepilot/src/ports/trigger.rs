//! External job triggering.

use crate::errors::ExternalIoError;
use async_trait::async_trait;
use tracing::debug;

/// Fires an external job (document generation, notification) for a subject.
///
/// Triggering is fire-and-forget: the job's result is discovered later by
/// polling an [`ArtifactLookup`](super::ArtifactLookup).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobTrigger: Send + Sync {
    /// Triggers `job_name` for `subject_id`.
    async fn trigger(&self, job_name: &str, subject_id: &str) -> Result<(), ExternalIoError>;
}

/// Accepts every trigger and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpJobTrigger;

#[async_trait]
impl JobTrigger for NoOpJobTrigger {
    async fn trigger(&self, job_name: &str, subject_id: &str) -> Result<(), ExternalIoError> {
        debug!(job = job_name, subject_id, "Job trigger ignored");
        Ok(())
    }
}
