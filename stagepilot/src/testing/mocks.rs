//! Scripted collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::ArtifactRef;
use crate::errors::ExternalIoError;
use crate::ports::{ArtifactLookup, CompletionListener, JobTrigger, StageDataStore};

#[derive(Debug, Default)]
struct LookupScript {
    errors_left: u32,
    misses_left: u32,
    artifact: Option<ArtifactRef>,
}

/// An artifact lookup that misses a fixed number of times, then finds.
#[derive(Debug, Default)]
pub struct ScriptedArtifactLookup {
    script: Mutex<LookupScript>,
    calls: AtomicU32,
}

impl ScriptedArtifactLookup {
    /// Returns `None` `misses` times, then `artifact` on every later call.
    #[must_use]
    pub fn found_after(misses: u32, artifact: ArtifactRef) -> Self {
        Self {
            script: Mutex::new(LookupScript {
                errors_left: 0,
                misses_left: misses,
                artifact: Some(artifact),
            }),
            calls: AtomicU32::new(0),
        }
    }

    /// Never finds anything.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// Fails the first `errors` calls before following the script.
    #[must_use]
    pub fn with_errors(self, errors: u32) -> Self {
        self.script.lock().errors_left = errors;
        self
    }

    /// Makes `artifact` available from the next call on.
    pub fn publish(&self, artifact: ArtifactRef) {
        let mut script = self.script.lock();
        script.misses_left = 0;
        script.artifact = Some(artifact);
    }

    /// Number of lookups performed.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactLookup for ScriptedArtifactLookup {
    async fn find_by_type(
        &self,
        _subject_id: &str,
        artifact_key: &str,
    ) -> Result<Option<ArtifactRef>, ExternalIoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        if script.errors_left > 0 {
            script.errors_left -= 1;
            return Err(ExternalIoError::lookup(format!("lookup of '{artifact_key}' failed")));
        }
        if script.misses_left > 0 {
            script.misses_left -= 1;
            return Ok(None);
        }
        Ok(script.artifact.clone())
    }
}

/// A job trigger that records every call.
#[derive(Debug, Default)]
pub struct RecordingJobTrigger {
    calls: Mutex<Vec<(String, String)>>,
    failure: Option<String>,
}

impl RecordingJobTrigger {
    /// Accepts every trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every trigger with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    /// `(job_name, subject_id)` of every call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    /// Job names triggered, in order.
    #[must_use]
    pub fn job_names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(job, _)| job.clone()).collect()
    }
}

#[async_trait]
impl JobTrigger for RecordingJobTrigger {
    async fn trigger(&self, job_name: &str, subject_id: &str) -> Result<(), ExternalIoError> {
        self.calls
            .lock()
            .push((job_name.to_string(), subject_id.to_string()));
        match &self.failure {
            Some(message) => Err(ExternalIoError::trigger(message.clone())),
            None => Ok(()),
        }
    }
}

/// A store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStageDataStore {
    attempts: AtomicU32,
}

impl FailingStageDataStore {
    /// Creates the store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self, op: &str) -> ExternalIoError {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        ExternalIoError::store(format!("{op}: store unavailable"))
    }
}

#[async_trait]
impl StageDataStore for FailingStageDataStore {
    async fn get(
        &self,
        _subject_id: &str,
        _stage: &str,
        _key: &str,
    ) -> Result<Option<serde_json::Value>, ExternalIoError> {
        Err(self.fail("get"))
    }

    async fn set(
        &self,
        _subject_id: &str,
        _stage: &str,
        _key: &str,
        _value: serde_json::Value,
    ) -> Result<(), ExternalIoError> {
        Err(self.fail("set"))
    }

    async fn delete_all(&self, _subject_id: &str, _stage: &str) -> Result<(), ExternalIoError> {
        Err(self.fail("delete_all"))
    }
}

/// A completion listener that records subjects.
#[derive(Debug, Default)]
pub struct RecordingCompletionListener {
    completed: Mutex<Vec<String>>,
}

impl RecordingCompletionListener {
    /// Creates the listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subjects reported complete, in order.
    #[must_use]
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl CompletionListener for RecordingCompletionListener {
    async fn on_pipeline_complete(&self, subject_id: &str) -> Result<(), ExternalIoError> {
        self.completed.lock().push(subject_id.to_string());
        Ok(())
    }
}
