use photochain_api::ApiError;

use crate::types::Stage;

/// Why a file was refused before upload.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported file type: {0:?}")]
    UnsupportedType(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

/// Errors returned by a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("an upload is already in progress")]
    Busy,

    #[error("invalid file: {0}")]
    Validation(#[from] ValidationError),

    #[error("{stage} failed: {source}")]
    Step {
        stage: Stage,
        #[source]
        source: ApiError,
    },
}

impl PipelineError {
    /// Stage in which the run stopped, if it got past validation.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Step { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Errors from the node registry.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("unknown node: {0}")]
    UnknownNode(u32),

    #[error("failure simulation on node {node_id} failed: {source}")]
    Api {
        node_id: u32,
        #[source]
        source: ApiError,
    },
}
