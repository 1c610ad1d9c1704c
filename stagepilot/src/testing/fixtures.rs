//! Reference pipelines for tests and benchmarks.

use crate::core::{OutcomeSpec, StageDefinition};
use crate::registry::StageRegistry;
use std::sync::Arc;

crate::stage_keys! {
    /// Upload a file, approve or reject it, then confirm setup.
    pub enum ReviewFlow {
        /// File upload, artifact key `upload`.
        Upload => "upload",
        /// Decision: `approve` continues, `reject` terminates.
        Review => "review",
        /// User confirmation.
        Setup => "setup",
    }
}

crate::stage_keys! {
    /// A generated contract, then a signature confirmation.
    pub enum ContractFlow {
        /// Composite: generated by `generate_contract` or uploaded manually.
        Contract => "contract",
        /// User confirmation.
        Sign => "sign",
    }
}

/// Reason recorded when `reject` is chosen at [`ReviewFlow::Review`].
pub const REJECTED: &str = "rejected";

/// Registry for [`ReviewFlow`].
#[must_use]
pub fn review_registry() -> Arc<StageRegistry<ReviewFlow>> {
    let registry = StageRegistry::builder("review")
        .stage(StageDefinition::file_upload(ReviewFlow::Upload, 10, "upload"))
        .stage(StageDefinition::decision(
            ReviewFlow::Review,
            20,
            vec![
                OutcomeSpec::proceed("approve"),
                OutcomeSpec::terminate("reject", REJECTED),
            ],
        ))
        .stage(StageDefinition::confirmation(ReviewFlow::Setup, 30))
        .build();
    match registry {
        Ok(registry) => Arc::new(registry),
        Err(err) => panic!("review fixture is invalid: {err}"),
    }
}

/// Registry for [`ContractFlow`].
#[must_use]
pub fn contract_registry() -> Arc<StageRegistry<ContractFlow>> {
    let registry = StageRegistry::builder("contract")
        .stage(StageDefinition::composite(
            ContractFlow::Contract,
            10,
            "contract",
            "generate_contract",
        ))
        .stage(StageDefinition::confirmation(ContractFlow::Sign, 20))
        .build();
    match registry {
        Ok(registry) => Arc::new(registry),
        Err(err) => panic!("contract fixture is invalid: {err}"),
    }
}
