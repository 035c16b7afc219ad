//! Upload pipeline orchestrator.
//!
//! A run validates the file locally, then performs four remote steps in
//! order: upload, register on chain, mine, fetch the chain. Each completed
//! step moves progress to its checkpoint. The first failing step ends the
//! run. Only one run may be in flight per orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use photochain_api::{ApiError, CandidateFile};
use photochain_protocol::{ChainAck, ChainSnapshot, MineAck, UploadReceipt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::PhotoBackend;
use crate::chain_view::ChainViewPresenter;
use crate::error::PipelineError;
use crate::state::{StateObserver, UploadStateStore};
use crate::types::{PipelineEvent, RunOutcome, Stage};
use crate::validator::FileValidator;

/// Shown when the file fails validation.
pub const VALIDATION_ERROR_MESSAGE: &str =
    "Invalid file. Please select a JPEG, PNG or GIF image no larger than 5 MB.";

/// Shown when a run completes.
pub const SUCCESS_MESSAGE: &str = "Photo uploaded and confirmed on the blockchain.";

/// Shown when a step fails without a backend message.
pub const GENERIC_ERROR_MESSAGE: &str = "Upload failed. Please try again.";

/// Drives pipeline runs and publishes their state.
pub struct UploadOrchestrator {
    backend: Arc<dyn PhotoBackend>,
    validator: FileValidator,
    store: Arc<UploadStateStore>,
    presenter: Option<Arc<ChainViewPresenter>>,
    busy: AtomicBool,
    events_tx: mpsc::Sender<PipelineEvent>,
    events_rx: Option<mpsc::Receiver<PipelineEvent>>,
}

impl UploadOrchestrator {
    pub fn new(backend: Arc<dyn PhotoBackend>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            backend,
            validator: FileValidator::default(),
            store: Arc::new(UploadStateStore::new()),
            presenter: None,
            busy: AtomicBool::new(false),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    pub fn with_validator(mut self, validator: FileValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Publishes the confirmed chain of each successful run to `presenter`.
    pub fn with_presenter(mut self, presenter: Arc<ChainViewPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Read-only handle to the pipeline state.
    pub fn observer(&self) -> StateObserver {
        StateObserver::new(Arc::clone(&self.store))
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>> {
        self.events_rx.take()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs the pipeline for `file`.
    ///
    /// Fails with [`PipelineError::Busy`] without touching the state when
    /// another run is in flight.
    pub async fn run(&self, file: CandidateFile) -> Result<RunOutcome, PipelineError> {
        let Some(mut guard) = RunGuard::acquire(&self.busy, &self.store) else {
            warn!(file = %file.name, "upload rejected, another run is in progress");
            return Err(PipelineError::Busy);
        };

        let run_id = Uuid::new_v4();
        info!(%run_id, file = %file.name, size = file.size_bytes(), "upload started");
        self.emit(PipelineEvent::StageEntered {
            run_id,
            stage: Stage::Validating,
        });

        if let Err(e) = self.validator.check(&file) {
            warn!(%run_id, error = %e, "file rejected");
            self.store.reset();
            self.store.set_error(Some(VALIDATION_ERROR_MESSAGE.to_string()));
            self.finished(run_id, Stage::Failed, VALIDATION_ERROR_MESSAGE);
            return Err(e.into());
        }

        guard.start();

        let mut results = StepResults::default();
        let mut stage = Stage::Validating.transition(true);
        let failure = loop {
            self.emit(PipelineEvent::StageEntered { run_id, stage });
            debug!(%run_id, %stage, "entering stage");

            match self.execute(stage, &file, &mut results).await {
                Ok(()) => {
                    if let Some(progress) = stage.checkpoint() {
                        self.store.set_progress(progress);
                    }
                    stage = stage.transition(true);
                    if stage.is_terminal() {
                        break None;
                    }
                }
                Err(e) => break Some((stage, e)),
            }
        };

        match failure {
            None => {
                self.store.set_success(Some(SUCCESS_MESSAGE.to_string()));
                guard.finish();

                let snapshot = results.snapshot.unwrap_or_default();
                if let Some(presenter) = &self.presenter {
                    presenter.publish(snapshot.clone());
                }
                info!(%run_id, chain_length = snapshot.length, "upload confirmed");
                self.finished(run_id, Stage::Succeeded, SUCCESS_MESSAGE);

                Ok(RunOutcome {
                    run_id,
                    receipt: results.receipt.unwrap_or_default(),
                    registration: results.registration.unwrap_or_default(),
                    mined: results.mined.unwrap_or_default(),
                    snapshot,
                })
            }
            Some((stage, source)) => {
                let message = source
                    .backend_message()
                    .unwrap_or(GENERIC_ERROR_MESSAGE)
                    .to_string();
                self.store.set_error(Some(message.clone()));
                guard.finish();

                warn!(%run_id, %stage, error = %source, "upload failed");
                self.finished(run_id, Stage::Failed, &message);
                Err(PipelineError::Step { stage, source })
            }
        }
    }

    async fn execute(
        &self,
        stage: Stage,
        file: &CandidateFile,
        results: &mut StepResults,
    ) -> Result<(), ApiError> {
        match stage {
            Stage::Uploading => {
                results.receipt = Some(self.backend.upload_image(file).await?);
            }
            Stage::Registering => {
                results.registration = Some(self.backend.register_on_chain(file).await?);
            }
            Stage::Mining => {
                results.mined = Some(self.backend.mine_block().await?);
            }
            Stage::Confirming => {
                results.snapshot = Some(self.backend.fetch_chain().await?);
            }
            Stage::Idle | Stage::Validating | Stage::Succeeded | Stage::Failed => {}
        }
        Ok(())
    }

    fn finished(&self, run_id: Uuid, stage: Stage, message: &str) {
        self.emit(PipelineEvent::Finished {
            run_id,
            stage,
            message: message.to_string(),
        });
    }

    /// Events are best-effort; a full or unread channel drops them.
    fn emit(&self, event: PipelineEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!("pipeline event dropped");
        }
    }
}

#[derive(Default)]
struct StepResults {
    receipt: Option<UploadReceipt>,
    registration: Option<ChainAck>,
    mined: Option<MineAck>,
    snapshot: Option<ChainSnapshot>,
}

/// Holds the busy flag for one run.
///
/// Once [`start`](Self::start) has raised `is_uploading`, it is lowered
/// exactly once: by [`finish`](Self::finish), or on drop if the run was
/// abandoned mid-flight.
struct RunGuard<'a> {
    busy: &'a AtomicBool,
    store: &'a UploadStateStore,
    uploading: bool,
}

impl<'a> RunGuard<'a> {
    fn acquire(busy: &'a AtomicBool, store: &'a UploadStateStore) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            busy,
            store,
            uploading: false,
        })
    }

    /// Clears the previous run's outcome and raises `is_uploading`.
    fn start(&mut self) {
        self.store.reset();
        self.store.set_uploading(true);
        self.uploading = true;
    }

    fn finish(&mut self) {
        if self.uploading {
            self.store.set_uploading(false);
            self.uploading = false;
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.uploading {
            warn!("upload abandoned before completion");
        }
        self.finish();
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PipelineState;
    use crate::test_support::{GatedBackend, MockBackend, png, sample_chain};
    use crate::validator::MAX_FILE_SIZE;

    fn orchestrator(backend: Arc<dyn PhotoBackend>) -> UploadOrchestrator {
        UploadOrchestrator::new(backend)
    }

    #[tokio::test]
    async fn successful_run_reaches_100() {
        let backend = Arc::new(MockBackend::new());
        let orch = orchestrator(backend.clone());
        let mut sub = orch.observer().subscribe();

        let outcome = orch.run(png(2 * 1024 * 1024)).await.unwrap();
        assert_eq!(outcome.receipt.image_id, Some(1));
        assert_eq!(outcome.mined.block.map(|b| b.index), Some(1));
        assert_eq!(outcome.snapshot, sample_chain());

        assert_eq!(backend.calls(), vec!["upload", "register", "mine", "chain"]);
        assert_eq!(
            orch.observer().current(),
            PipelineState {
                is_uploading: false,
                progress: 100,
                error: None,
                success: Some(SUCCESS_MESSAGE.to_string()),
            }
        );

        let seen = sub.drain();
        let progress: Vec<u8> = seen.iter().map(|s| s.progress).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
        for checkpoint in [25, 50, 75, 100] {
            assert!(progress.contains(&checkpoint));
        }
        // Uploading is raised once and lowered once.
        let flips = seen
            .windows(2)
            .filter(|w| w[0].is_uploading != w[1].is_uploading)
            .count();
        assert_eq!(flips, 2);
        assert!(seen.iter().all(|s| s.error.is_none()));
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn progress_is_reported_while_uploading() {
        let orch = orchestrator(Arc::new(MockBackend::new()));
        let mut sub = orch.observer().subscribe();
        orch.run(png(10)).await.unwrap();

        let during: Vec<u8> = sub
            .drain()
            .into_iter()
            .filter(|s| s.is_uploading)
            .map(|s| s.progress)
            .collect();
        assert_eq!(during, vec![0, 25, 50, 75, 100, 100]);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_without_network() {
        let backend = Arc::new(MockBackend::new());
        let orch = orchestrator(backend.clone());
        let mut sub = orch.observer().subscribe();

        let pdf = CandidateFile::new("doc.pdf", "application/pdf", vec![0u8; 100 * 1024]);
        let err = orch.run(pdf).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(backend.calls().is_empty());

        assert_eq!(
            orch.observer().current(),
            PipelineState {
                is_uploading: false,
                progress: 0,
                error: Some(VALIDATION_ERROR_MESSAGE.to_string()),
                success: None,
            }
        );
        assert!(sub.drain().iter().all(|s| !s.is_uploading));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let backend = Arc::new(MockBackend::new());
        let orch = orchestrator(backend.clone());

        let err = orch.run(png(MAX_FILE_SIZE as usize + 1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(backend.calls().is_empty());
        assert_eq!(
            orch.observer().current().error.as_deref(),
            Some(VALIDATION_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn failing_step_stops_the_run() {
        let cases = [
            (Stage::Uploading, 0, vec!["upload"]),
            (Stage::Registering, 25, vec!["upload", "register"]),
            (Stage::Mining, 50, vec!["upload", "register", "mine"]),
            (Stage::Confirming, 75, vec!["upload", "register", "mine", "chain"]),
        ];

        for (stage, progress, calls) in cases {
            let backend = Arc::new(MockBackend::failing_at(stage, "Internal error"));
            let orch = orchestrator(backend.clone());

            let err = orch.run(png(1024)).await.unwrap_err();
            assert_eq!(err.stage(), Some(stage));
            assert_eq!(backend.calls(), calls, "stage {stage}");
            assert_eq!(
                orch.observer().current(),
                PipelineState {
                    is_uploading: false,
                    progress,
                    error: Some("Internal error".to_string()),
                    success: None,
                },
                "stage {stage}"
            );
        }
    }

    #[tokio::test]
    async fn failure_without_message_uses_generic_text() {
        let backend = Arc::new(MockBackend::failing_silently_at(Stage::Mining));
        let orch = orchestrator(backend);
        orch.run(png(1)).await.unwrap_err();
        assert_eq!(
            orch.observer().current().error.as_deref(),
            Some(GENERIC_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn new_run_clears_previous_outcome() {
        let failing = Arc::new(MockBackend::failing_at(Stage::Registering, "nope"));
        let orch = orchestrator(failing);
        orch.run(png(1)).await.unwrap_err();
        assert_eq!(orch.observer().current().progress, 25);

        // A rejected file also starts from a clean state.
        let mut sub = orch.observer().subscribe();
        orch.run(CandidateFile::new("a.txt", "text/plain", vec![1]))
            .await
            .unwrap_err();
        let seen = sub.drain();
        assert_eq!(seen[1], PipelineState::default());
        assert_eq!(orch.observer().current().progress, 0);
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let backend = Arc::new(GatedBackend::default());
        let orch = Arc::new(orchestrator(backend.clone()));

        let first = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run(png(10)).await })
        };
        backend.entered.notified().await;
        assert!(orch.is_busy());

        let before = orch.observer().current();
        assert!(before.is_uploading);
        let err = orch.run(png(10)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Busy));
        assert_eq!(orch.observer().current(), before);

        backend.release.notify_one();
        first.await.unwrap().unwrap();
        assert!(!orch.is_busy());
        assert_eq!(orch.observer().current().progress, 100);
    }

    #[tokio::test]
    async fn abandoned_run_lowers_uploading() {
        let backend = Arc::new(GatedBackend::default());
        let orch = orchestrator(backend.clone());

        tokio::select! {
            _ = orch.run(png(10)) => panic!("run should be blocked"),
            _ = backend.entered.notified() => {}
        }

        let state = orch.observer().current();
        assert!(!state.is_uploading);
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn success_publishes_confirmed_chain() {
        let presenter = Arc::new(ChainViewPresenter::new());
        let backend = Arc::new(MockBackend::new());
        let orch = orchestrator(backend.clone()).with_presenter(Arc::clone(&presenter));

        orch.run(png(10)).await.unwrap();
        assert_eq!(presenter.snapshot(), Some(sample_chain()));
        // The confirmation fetch is reused, not repeated.
        assert_eq!(backend.count("chain"), 1);
    }

    #[tokio::test]
    async fn failure_does_not_publish_chain() {
        let presenter = Arc::new(ChainViewPresenter::new());
        let backend = Arc::new(MockBackend::failing_at(Stage::Confirming, "gone"));
        let orch = orchestrator(backend).with_presenter(Arc::clone(&presenter));

        orch.run(png(10)).await.unwrap_err();
        assert!(presenter.snapshot().is_none());
    }

    #[tokio::test]
    async fn custom_validator_limit() {
        let backend = Arc::new(MockBackend::new());
        let orch = orchestrator(backend.clone()).with_validator(FileValidator::with_max_size(8));
        assert!(orch.run(png(9)).await.is_err());
        assert!(orch.run(png(8)).await.is_ok());
    }

    #[tokio::test]
    async fn events_follow_stage_order() {
        let mut orch = orchestrator(Arc::new(MockBackend::new()));
        let mut events = orch.take_events().unwrap();
        assert!(orch.take_events().is_none());

        let outcome = orch.run(png(10)).await.unwrap();

        let mut stages = Vec::new();
        let mut finished = None;
        while let Ok(event) = events.try_recv() {
            match event {
                PipelineEvent::StageEntered { run_id, stage } => {
                    assert_eq!(run_id, outcome.run_id);
                    stages.push(stage);
                }
                PipelineEvent::Finished { stage, message, .. } => {
                    finished = Some((stage, message));
                }
            }
        }
        assert_eq!(
            stages,
            vec![
                Stage::Validating,
                Stage::Uploading,
                Stage::Registering,
                Stage::Mining,
                Stage::Confirming,
            ]
        );
        assert_eq!(
            finished,
            Some((Stage::Succeeded, SUCCESS_MESSAGE.to_string()))
        );
    }

    #[tokio::test]
    async fn failed_run_event_carries_message() {
        let mut orch = orchestrator(Arc::new(MockBackend::failing_at(Stage::Uploading, "disk full")));
        let mut events = orch.take_events().unwrap();
        orch.run(png(10)).await.unwrap_err();

        let last = std::iter::from_fn(|| events.try_recv().ok()).last().unwrap();
        assert!(matches!(
            last,
            PipelineEvent::Finished { stage: Stage::Failed, ref message, .. } if message == "disk full"
        ));
    }
}
