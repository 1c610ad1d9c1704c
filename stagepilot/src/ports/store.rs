//! Per-stage key/value persistence.

use crate::errors::ExternalIoError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Keys the engine writes under each stage.
pub mod keys {
    /// Stage status; the only value written is [`COMPLETED`].
    pub const STATUS: &str = "status";
    /// The status value of a completed stage.
    pub const COMPLETED: &str = "completed";
    /// `true` when a confirmation stage was confirmed.
    pub const CONFIRMED: &str = "confirmed";
    /// The `ArtifactRef` that completed a file stage.
    pub const ARTIFACT: &str = "artifact";
    /// `{ "outcome", "payload" }` of a decision stage.
    pub const BRANCH_OUTCOME: &str = "branch_outcome";
}

/// Stores stage data for a subject.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageDataStore: Send + Sync {
    /// Reads one value.
    async fn get(
        &self,
        subject_id: &str,
        stage: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, ExternalIoError>;

    /// Writes one value.
    async fn set(
        &self,
        subject_id: &str,
        stage: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ExternalIoError>;

    /// Deletes every key under the stage.
    async fn delete_all(&self, subject_id: &str, stage: &str) -> Result<(), ExternalIoError>;
}

type StageKeyTuple = (String, String);

/// In-memory store backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStageDataStore {
    entries: DashMap<StageKeyTuple, serde_json::Map<String, serde_json::Value>>,
}

impl InMemoryStageDataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every key stored for a stage.
    #[must_use]
    pub fn stage_data(&self, subject_id: &str, stage: &str) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .get(&(subject_id.to_string(), stage.to_string()))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Returns the number of stages with data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StageDataStore for InMemoryStageDataStore {
    async fn get(
        &self,
        subject_id: &str,
        stage: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, ExternalIoError> {
        Ok(self
            .entries
            .get(&(subject_id.to_string(), stage.to_string()))
            .and_then(|entry| entry.value().get(key).cloned()))
    }

    async fn set(
        &self,
        subject_id: &str,
        stage: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ExternalIoError> {
        self.entries
            .entry((subject_id.to_string(), stage.to_string()))
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_all(&self, subject_id: &str, stage: &str) -> Result<(), ExternalIoError> {
        self.entries.remove(&(subject_id.to_string(), stage.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryStageDataStore::new();
        store
            .set("lead-1", "upload", keys::STATUS, serde_json::json!(keys::COMPLETED))
            .await
            .unwrap();
        store
            .set("lead-1", "upload", keys::ARTIFACT, serde_json::json!({"id": "f1"}))
            .await
            .unwrap();

        assert_eq!(
            store.get("lead-1", "upload", keys::STATUS).await.unwrap(),
            Some(serde_json::json!("completed"))
        );
        assert_eq!(store.stage_data("lead-1", "upload").len(), 2);
        assert!(store.get("lead-2", "upload", keys::STATUS).await.unwrap().is_none());

        store.delete_all("lead-1", "upload").await.unwrap();
        assert!(store.get("lead-1", "upload", keys::STATUS).await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
