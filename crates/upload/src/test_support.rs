//! In-memory backends for pipeline tests.

use std::sync::Mutex;

use photochain_api::{ApiError, CandidateFile};
use photochain_protocol::{
    Block, ChainAck, ChainSnapshot, FailureKind, MineAck, MinedBlock, UploadReceipt,
};
use tokio::sync::Notify;

use crate::backend::{BackendFuture, PhotoBackend};
use crate::types::Stage;

/// A two-block chain.
pub(crate) fn sample_chain() -> ChainSnapshot {
    let genesis = Block {
        index: 0,
        previous_hash: "0".into(),
        timestamp: 1_700_000_000.0,
        transactions: vec![],
        hash: "g".into(),
        confirmations: 0,
    };
    let next = Block {
        index: 1,
        previous_hash: "g".into(),
        timestamp: 1_700_000_060.0,
        transactions: vec![],
        hash: "h1".into(),
        confirmations: 3,
    };
    ChainSnapshot {
        chain: vec![genesis, next],
        length: 2,
    }
}

pub(crate) fn png(size: usize) -> CandidateFile {
    CandidateFile::new("photo.png", "image/png", vec![7u8; size])
}

/// Records calls and fails at a chosen stage.
#[derive(Default)]
pub(crate) struct MockBackend {
    fail_at: Option<Stage>,
    /// `None` makes the failure carry no backend message.
    fail_message: Option<String>,
    fail_simulation: bool,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: Stage, message: &str) -> Self {
        Self {
            fail_at: Some(stage),
            fail_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failing_silently_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn rejecting_simulation() -> Self {
        Self {
            fail_simulation: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, name: &str, stage: Stage) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.fail_at != Some(stage) {
            return Ok(());
        }
        Err(match &self.fail_message {
            Some(message) => ApiError::Api {
                status: 500,
                message: message.clone(),
            },
            None => ApiError::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
        })
    }
}

impl PhotoBackend for MockBackend {
    fn upload_image<'a>(&'a self, _file: &'a CandidateFile) -> BackendFuture<'a, UploadReceipt> {
        Box::pin(async move {
            self.record("upload", Stage::Uploading)?;
            Ok(UploadReceipt {
                message: "Image uploaded".into(),
                image_id: Some(1),
            })
        })
    }

    fn register_on_chain<'a>(&'a self, _file: &'a CandidateFile) -> BackendFuture<'a, ChainAck> {
        Box::pin(async move {
            self.record("register", Stage::Registering)?;
            Ok(ChainAck {
                message: "Transaction added".into(),
                success: Some(true),
            })
        })
    }

    fn mine_block(&self) -> BackendFuture<'_, MineAck> {
        Box::pin(async move {
            self.record("mine", Stage::Mining)?;
            Ok(MineAck {
                success: true,
                message: "Block mined".into(),
                block: Some(MinedBlock {
                    index: 1,
                    hash: "h1".into(),
                    transaction_count: 1,
                }),
                chain_status: None,
            })
        })
    }

    fn fetch_chain(&self) -> BackendFuture<'_, ChainSnapshot> {
        Box::pin(async move {
            self.record("chain", Stage::Confirming)?;
            Ok(sample_chain())
        })
    }

    fn simulate_failure<'a>(
        &'a self,
        node_url: &'a str,
        kind: FailureKind,
    ) -> BackendFuture<'a, ChainAck> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(format!("simulate {node_url} {kind}"));
            if self.fail_simulation {
                return Err(ApiError::Api {
                    status: 503,
                    message: "node unreachable".into(),
                });
            }
            Ok(ChainAck {
                message: format!("Simulated {kind}"),
                success: Some(true),
            })
        })
    }
}

/// Backend whose upload blocks until released.
#[derive(Default)]
pub(crate) struct GatedBackend {
    pub entered: Notify,
    pub release: Notify,
    inner: MockBackend,
}

impl PhotoBackend for GatedBackend {
    fn upload_image<'a>(&'a self, file: &'a CandidateFile) -> BackendFuture<'a, UploadReceipt> {
        Box::pin(async move {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.upload_image(file).await
        })
    }

    fn register_on_chain<'a>(&'a self, file: &'a CandidateFile) -> BackendFuture<'a, ChainAck> {
        self.inner.register_on_chain(file)
    }

    fn mine_block(&self) -> BackendFuture<'_, MineAck> {
        self.inner.mine_block()
    }

    fn fetch_chain(&self) -> BackendFuture<'_, ChainSnapshot> {
        self.inner.fetch_chain()
    }

    fn simulate_failure<'a>(
        &'a self,
        node_url: &'a str,
        kind: FailureKind,
    ) -> BackendFuture<'a, ChainAck> {
        self.inner.simulate_failure(node_url, kind)
    }
}
