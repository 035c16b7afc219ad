//! Backend seam used by the pipeline, the chain view and the node registry.
//!
//! `PhotoApiClient` implements it over HTTP. Tests substitute in-memory
//! backends so the pipeline logic runs without a server.

use std::future::Future;
use std::pin::Pin;

use photochain_api::{ApiError, CandidateFile, PhotoApiClient};
use photochain_protocol::{ChainAck, ChainSnapshot, FailureKind, MineAck, UploadReceipt};

/// Boxed future returned by every backend call.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Remote operations the client needs from the photo service.
pub trait PhotoBackend: Send + Sync {
    /// Stores the image with the user-management service.
    fn upload_image<'a>(&'a self, file: &'a CandidateFile) -> BackendFuture<'a, UploadReceipt>;

    /// Submits the same image as a pending chain transaction.
    fn register_on_chain<'a>(&'a self, file: &'a CandidateFile) -> BackendFuture<'a, ChainAck>;

    /// Mines pending transactions into a new block.
    fn mine_block(&self) -> BackendFuture<'_, MineAck>;

    /// Fetches the full chain.
    fn fetch_chain(&self) -> BackendFuture<'_, ChainSnapshot>;

    /// Injects a failure into the node served at `node_url`.
    fn simulate_failure<'a>(
        &'a self,
        node_url: &'a str,
        kind: FailureKind,
    ) -> BackendFuture<'a, ChainAck>;
}

impl PhotoBackend for PhotoApiClient {
    fn upload_image<'a>(&'a self, file: &'a CandidateFile) -> BackendFuture<'a, UploadReceipt> {
        Box::pin(PhotoApiClient::upload_image(self, file))
    }

    fn register_on_chain<'a>(&'a self, file: &'a CandidateFile) -> BackendFuture<'a, ChainAck> {
        Box::pin(PhotoApiClient::register_on_chain(self, file))
    }

    fn mine_block(&self) -> BackendFuture<'_, MineAck> {
        Box::pin(PhotoApiClient::mine_block(self))
    }

    fn fetch_chain(&self) -> BackendFuture<'_, ChainSnapshot> {
        Box::pin(PhotoApiClient::fetch_chain(self))
    }

    fn simulate_failure<'a>(
        &'a self,
        node_url: &'a str,
        kind: FailureKind,
    ) -> BackendFuture<'a, ChainAck> {
        Box::pin(self.simulate_failure_at(node_url, kind))
    }
}
