//! Pipeline completion notification.

use crate::errors::ExternalIoError;
use async_trait::async_trait;

/// Told once when a subject's pipeline completes.
#[async_trait]
pub trait CompletionListener: Send + Sync {
    /// Called after the pipeline reaches completion for the first time.
    async fn on_pipeline_complete(&self, subject_id: &str) -> Result<(), ExternalIoError>;
}

/// Ignores completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCompletionListener;

#[async_trait]
impl CompletionListener for NoOpCompletionListener {
    async fn on_pipeline_complete(&self, _subject_id: &str) -> Result<(), ExternalIoError> {
        Ok(())
    }
}
