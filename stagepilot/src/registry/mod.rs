//! Stage definition registry.
//!
//! A registry is the static, ordered catalog of a pipeline's stages. It is
//! built once through [`StageRegistryBuilder`], which validates the
//! definitions, and is shared read-only afterwards.

mod builder;

pub use builder::StageRegistryBuilder;

use crate::core::{StageDefinition, StageKey};
use crate::errors::ValidationError;
use std::collections::HashMap;

/// Ordered, immutable catalog of stage definitions.
#[derive(Debug, Clone)]
pub struct StageRegistry<S: StageKey> {
    /// Pipeline name, used in logs.
    name: String,
    /// Definitions sorted by `order`.
    stages: Vec<StageDefinition<S>>,
    /// Stage id to position in `stages`.
    index: HashMap<S, usize>,
}

impl<S: StageKey> StageRegistry<S> {
    /// Starts building a registry.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StageRegistryBuilder<S> {
        StageRegistryBuilder::new(name)
    }

    pub(crate) fn from_sorted(name: String, stages: Vec<StageDefinition<S>>) -> Self {
        let index = stages
            .iter()
            .enumerate()
            .map(|(i, def)| (def.id, i))
            .collect();
        Self { name, stages, index }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the definition of `stage`.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_STAGE` if the stage is not registered.
    pub fn definition_of(&self, stage: S) -> Result<&StageDefinition<S>, ValidationError> {
        self.position(stage).map(|i| &self.stages[i])
    }

    /// Returns all definitions in pipeline order.
    #[must_use]
    pub fn ordered_stages(&self) -> &[StageDefinition<S>] {
        &self.stages
    }

    /// Returns all stage ids in pipeline order.
    pub fn ordered_ids(&self) -> impl Iterator<Item = S> + '_ {
        self.stages.iter().map(|def| def.id)
    }

    /// Returns the stage that follows `stage`: its explicit `next_stage`,
    /// otherwise the next stage by order.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_STAGE` if the stage is not registered.
    pub fn successor_of(&self, stage: S) -> Result<Option<S>, ValidationError> {
        let pos = self.position(stage)?;
        let def = &self.stages[pos];
        Ok(def
            .next_stage
            .or_else(|| self.stages.get(pos + 1).map(|next| next.id)))
    }

    /// Returns the index of `stage` in pipeline order.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_STAGE` if the stage is not registered.
    pub fn position(&self, stage: S) -> Result<usize, ValidationError> {
        self.index
            .get(&stage)
            .copied()
            .ok_or_else(|| ValidationError::unknown_stage(stage.as_str()))
    }

    /// Returns the definitions strictly after `stage` in pipeline order.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_STAGE` if the stage is not registered.
    pub fn stages_after(&self, stage: S) -> Result<&[StageDefinition<S>], ValidationError> {
        let pos = self.position(stage)?;
        Ok(&self.stages[pos + 1..])
    }

    /// Returns the definitions strictly between `from` and `to`.
    ///
    /// Empty when `to` does not come after `from`.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_STAGE` if either stage is not registered.
    pub fn stages_between(&self, from: S, to: S) -> Result<&[StageDefinition<S>], ValidationError> {
        let start = self.position(from)?;
        let end = self.position(to)?;
        if end <= start + 1 {
            return Ok(&[]);
        }
        Ok(&self.stages[start + 1..end])
    }

    /// Returns true if `stage` is registered.
    #[must_use]
    pub fn contains(&self, stage: S) -> bool {
        self.index.contains_key(&stage)
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if there are no stages. A built registry is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
