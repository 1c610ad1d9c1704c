//! Best-effort persistence of stage data.
//!
//! Writes are queued and applied by one background task per driver, in the
//! order transitions produced them. A failed write is logged and reported as
//! a `persistence.failed` event; the in-memory state is never rolled back.

use crate::core::{PipelineEvent, StageKey};
use crate::events::EventSink;
use crate::pipeline::{Hydration, StoreWrite};
use crate::ports::{keys, StageDataStore};
use crate::registry::StageRegistry;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum WriteCommand<S: StageKey> {
    Write(StoreWrite<S>),
    Flush(oneshot::Sender<()>),
}

/// Handle to a driver's background writer.
#[derive(Debug)]
pub(crate) struct PersistenceWriter<S: StageKey> {
    tx: mpsc::UnboundedSender<WriteCommand<S>>,
}

impl<S: StageKey> std::fmt::Debug for WriteCommand<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write(write) => f.debug_tuple("Write").field(write).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl<S: StageKey> PersistenceWriter<S> {
    /// Spawns the writer task. Must be called within a Tokio runtime.
    pub(crate) fn spawn(
        store: Arc<dyn StageDataStore>,
        subject_id: String,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteCommand<S>>();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    WriteCommand::Write(write) => {
                        apply_write(store.as_ref(), &subject_id, &write, sink.as_ref()).await;
                    }
                    WriteCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!(subject_id = %subject_id, "Persistence writer stopped");
        });
        Self { tx }
    }

    /// Queues a write.
    pub(crate) fn submit(&self, write: StoreWrite<S>) {
        if let Err(err) = self.tx.send(WriteCommand::Write(write)) {
            warn!(write = ?err.0, "Persistence writer is gone; write dropped");
        }
    }

    /// Resolves once every write queued before the call was attempted.
    pub(crate) async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn apply_write<S: StageKey>(
    store: &dyn StageDataStore,
    subject_id: &str,
    write: &StoreWrite<S>,
    sink: &dyn EventSink,
) {
    let stage = write.stage().as_str();
    let (operation, result) = match write {
        StoreWrite::Set { key, value, .. } => {
            ("set", store.set(subject_id, stage, key, value.clone()).await)
        }
        StoreWrite::DeleteAll { .. } => ("delete_all", store.delete_all(subject_id, stage).await),
    };
    if let Err(error) = result {
        warn!(subject_id, stage, operation, error = %error, "Stage data write failed");
        sink.emit(
            PipelineEvent::persistence_failed(stage, operation, &error.to_string())
                .for_subject(subject_id),
        )
        .await;
    }
}

/// Reads persisted completion flags and decisions for every stage.
///
/// Stages are read concurrently. Read failures are logged and reported, and
/// the stage is treated as having no data.
pub(crate) async fn load_hydration<S: StageKey>(
    store: &dyn StageDataStore,
    registry: &StageRegistry<S>,
    subject_id: &str,
    sink: &dyn EventSink,
) -> Hydration<S> {
    let reads = registry.ordered_stages().iter().map(|def| async move {
        let key = if def.is_branch() { keys::BRANCH_OUTCOME } else { keys::STATUS };
        (def, read(store, subject_id, def.id.as_str(), key, sink).await)
    });

    let mut hydration = Hydration::default();
    for (def, value) in join_all(reads).await {
        let Some(value) = value else {
            continue;
        };
        let stage = def.id.as_str();
        if def.is_branch() {
            match value.get("outcome").and_then(serde_json::Value::as_str) {
                Some(outcome) => {
                    let payload = value
                        .get("payload")
                        .cloned()
                        .unwrap_or(serde_json::Value::Null);
                    hydration.decisions.push((def.id, outcome.to_string(), payload));
                }
                None => warn!(subject_id, stage, "Persisted decision has no outcome; ignored"),
            }
        } else if value.as_str() == Some(keys::COMPLETED) {
            hydration.completed.push(def.id);
        }
    }
    hydration
}

async fn read(
    store: &dyn StageDataStore,
    subject_id: &str,
    stage: &str,
    key: &str,
    sink: &dyn EventSink,
) -> Option<serde_json::Value> {
    match store.get(subject_id, stage, key).await {
        Ok(value) => value,
        Err(error) => {
            warn!(subject_id, stage, key, error = %error, "Stage data read failed");
            sink.emit(
                PipelineEvent::persistence_failed(stage, "get", &error.to_string())
                    .for_subject(subject_id),
            )
            .await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::ports::{InMemoryStageDataStore, MockStageDataStore};
    use crate::testing::{review_registry, FailingStageDataStore, ReviewFlow};

    #[tokio::test]
    async fn test_writes_apply_in_order() {
        let store = Arc::new(InMemoryStageDataStore::new());
        let sink = Arc::new(CollectingEventSink::new());
        let writer = PersistenceWriter::spawn(store.clone(), "lead-1".to_string(), sink.clone());

        writer.submit(StoreWrite::Set {
            stage: ReviewFlow::Upload,
            key: keys::STATUS,
            value: serde_json::json!(keys::COMPLETED),
        });
        writer.submit(StoreWrite::DeleteAll {
            stage: ReviewFlow::Upload,
        });
        writer.submit(StoreWrite::Set {
            stage: ReviewFlow::Upload,
            key: keys::CONFIRMED,
            value: serde_json::json!(true),
        });
        writer.flush().await;

        let data = store.stage_data("lead-1", "upload");
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(keys::CONFIRMED), Some(&serde_json::json!(true)));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let store = Arc::new(FailingStageDataStore::new());
        let sink = Arc::new(CollectingEventSink::new());
        let writer = PersistenceWriter::spawn(store.clone(), "lead-1".to_string(), sink.clone());

        writer.submit(StoreWrite::<ReviewFlow>::DeleteAll {
            stage: ReviewFlow::Setup,
        });
        writer.flush().await;

        let failed = sink.of_type("persistence.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].stage(), Some("setup"));
        assert_eq!(failed[0].subject_id.as_deref(), Some("lead-1"));
    }

    #[tokio::test]
    async fn test_delete_all_targets_subject_and_stage() {
        let mut store = MockStageDataStore::new();
        store
            .expect_delete_all()
            .withf(|subject, stage| subject == "lead-1" && stage == "review")
            .times(1)
            .returning(|_, _| Ok(()));
        let sink = Arc::new(CollectingEventSink::new());
        let writer = PersistenceWriter::spawn(Arc::new(store), "lead-1".to_string(), sink.clone());

        writer.submit(StoreWrite::DeleteAll {
            stage: ReviewFlow::Review,
        });
        writer.flush().await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_load_hydration_reads_flags_and_decisions() {
        let store = InMemoryStageDataStore::new();
        let sink = CollectingEventSink::new();
        store
            .set("lead-1", "upload", keys::STATUS, serde_json::json!(keys::COMPLETED))
            .await
            .unwrap();
        store
            .set(
                "lead-1",
                "review",
                keys::BRANCH_OUTCOME,
                serde_json::json!({"outcome": "approve", "payload": {"tier": "gold"}}),
            )
            .await
            .unwrap();

        let hydration = load_hydration(&store, &review_registry(), "lead-1", &sink).await;
        assert_eq!(hydration.completed, vec![ReviewFlow::Upload]);
        assert_eq!(
            hydration.decisions,
            vec![(
                ReviewFlow::Review,
                "approve".to_string(),
                serde_json::json!({"tier": "gold"})
            )]
        );
    }

    #[tokio::test]
    async fn test_load_hydration_survives_store_failure() {
        let store = FailingStageDataStore::new();
        let sink = CollectingEventSink::new();
        let hydration = load_hydration(&store, &review_registry(), "lead-1", &sink).await;

        assert!(hydration.completed.is_empty());
        assert!(hydration.decisions.is_empty());
        assert!(!sink.of_type("persistence.failed").is_empty());
    }
}
