//! Photo upload pipeline for the photochain client.
//!
//! Validates a picked image, uploads it, registers it on the chain, mines
//! a block and confirms by fetching the chain, publishing observable state
//! throughout. Also keeps the latest chain for display and tracks the
//! nodes of the network for failure simulation.

pub mod backend;
pub mod chain_view;
pub mod error;
pub mod nodes;
pub mod orchestrator;
pub mod state;
pub mod types;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use backend::{BackendFuture, PhotoBackend};
pub use chain_view::ChainViewPresenter;
pub use error::{NodeError, PipelineError, ValidationError};
pub use nodes::{Node, NodeRegistry, NodeSpec};
pub use orchestrator::{
    GENERIC_ERROR_MESSAGE, SUCCESS_MESSAGE, UploadOrchestrator, VALIDATION_ERROR_MESSAGE,
};
pub use state::{PipelineState, StateObserver, StateSubscription, UploadStateStore};
pub use types::{PipelineEvent, RunOutcome, Stage};
pub use validator::{ALLOWED_MIME_TYPES, FileValidator, MAX_FILE_SIZE};
