//! # Stagepilot
//!
//! A stage pipeline engine for wizard-style workflows: onboarding timelines,
//! content builders and similar multi-step flows where each stage is
//! completed by a file, a confirmation, a decision or an external job.
//!
//! Stagepilot provides:
//!
//! - **Typed stages**: stage ids are a closed enum declared with [`stage_keys!`]
//! - **A pure state machine**: transitions return their side effects as data
//! - **Cascade skips**: terminating decisions skip downstream stages, reversibly
//! - **Artifact polling**: cancellable tokio tasks watch for generated files
//! - **Best-effort persistence**: writes never block or roll back a transition
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagepilot::prelude::*;
//! use stagepilot::catalogs::{onboarding_registry, OnboardingStage};
//!
//! let registry = Arc::new(onboarding_registry()?);
//! let driver = PipelineDriver::builder(registry, "lead-42")
//!     .store(my_store)
//!     .lookup(my_artifacts)
//!     .build();
//!
//! driver.complete_stage(OnboardingStage::Proposal, CompletionEvidence::UserConfirmed)?;
//! driver.resolve_branch(OnboardingStage::FitReview, "fit", serde_json::Value::Null)?;
//! let snapshot = driver.snapshot();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod catalogs;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod jobs;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod registry;
pub mod runtime;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EngineConfig, LoggingConfig, PollConfig, WebhookConfig};
    pub use crate::core::{
        ArtifactRef, CompletionEvidence, CompletionKind, OutcomeSpec, PipelineEvent,
        StageDefinition, StageKey, StageStatus,
    };
    pub use crate::errors::{
        ExternalIoError, InvalidTransitionError, PipelineError, ValidationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::jobs::{AsyncJob, AsyncJobTracker, JobState};
    pub use crate::pipeline::{
        reduce, Effect, PipelineCommand, PipelineInstance, PipelineSnapshot, Transition,
    };
    pub use crate::ports::{
        ArtifactLookup, CompletionListener, InMemoryStageDataStore, JobTrigger, StageDataStore,
    };
    pub use crate::registry::StageRegistry;
    pub use crate::runtime::PipelineDriver;
    pub use crate::stage_keys;
    pub use std::sync::Arc;
}
