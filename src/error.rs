//! Error types for the stage engine.
//!
//! Only configuration problems and persistence failures are errors. Lookup
//! misses, illegal transitions and unknown comparisons are ordinary return
//! values (`None` / `Ok(false)`), see `workflow::StageEngine`.

use thiserror::Error;

use crate::models::StageId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The catalog source produced no rows for the variant.
    #[error("Stage catalog is empty")]
    CatalogEmpty,

    /// Two different ids share one stage name.
    #[error("Duplicate stage name '{name}' (ids {first} and {second})")]
    DuplicateStageName {
        name: String,
        first: StageId,
        second: StageId,
    },

    /// Catalog row with id 0, which is reserved for "no sub-stage".
    #[error("Invalid stage id {0} for stage '{1}'")]
    InvalidStageId(u32, String),

    /// A stage the engine itself relies on is not in the catalog.
    #[error("Stage '{0}' is not defined in the catalog")]
    MissingStage(String),

    /// No workflow variant registered under this name.
    #[error("Unknown workflow variant: {0}")]
    UnknownVariant(String),

    /// The subject failed to persist; its in-memory state was rolled back.
    #[error("Failed to save statement: {0:#}")]
    Save(anyhow::Error),
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
