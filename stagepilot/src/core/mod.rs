//! Core domain model types for stagepilot.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage identity (`StageKey`) and the `stage_keys!` declaration macro
//! - Stage status and completion-criterion enums
//! - Immutable stage definitions and branch outcome specs
//! - Completion evidence, artifact references and pipeline events

mod definition;
mod event;
mod evidence;
mod key;
mod status;

pub use definition::{BranchSpec, OutcomeSpec, StageDefinition};
pub use event::PipelineEvent;
pub use evidence::{ArtifactRef, CompletionEvidence};
pub use key::StageKey;
pub use status::{CompletionKind, StageStatus};
