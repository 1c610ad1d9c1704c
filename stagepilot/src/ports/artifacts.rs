//! Artifact discovery.

use crate::core::ArtifactRef;
use crate::errors::ExternalIoError;
use async_trait::async_trait;

/// Finds a subject's files by artifact key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactLookup: Send + Sync {
    /// Returns the newest artifact of type `artifact_key`, if one exists yet.
    async fn find_by_type(
        &self,
        subject_id: &str,
        artifact_key: &str,
    ) -> Result<Option<ArtifactRef>, ExternalIoError>;
}
