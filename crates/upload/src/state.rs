//! Observable pipeline state.
//!
//! The store holds a single [`PipelineState`]. Every mutation produces a new
//! value that is delivered, in order, to each live subscriber. A new
//! subscriber first receives the current value.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::trace;

/// What the UI shows about the current (or last) upload.
///
/// `error` and `success` are never both set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub is_uploading: bool,
    /// 0..=100.
    pub progress: u8,
    pub error: Option<String>,
    pub success: Option<String>,
}

struct Inner {
    state: PipelineState,
    subscribers: Vec<mpsc::UnboundedSender<PipelineState>>,
}

/// Single source of truth for [`PipelineState`].
pub struct UploadStateStore {
    inner: Mutex<Inner>,
}

impl Default for UploadStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadStateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: PipelineState::default(),
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn current(&self) -> PipelineState {
        self.lock().state.clone()
    }

    /// Subscribes to state changes, starting with the current value.
    pub fn subscribe(&self) -> StateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // Cannot fail: `rx` is alive.
        let _ = tx.send(inner.state.clone());
        inner.subscribers.push(tx);
        StateSubscription { rx }
    }

    pub fn set_uploading(&self, is_uploading: bool) {
        self.update(|s| s.is_uploading = is_uploading);
    }

    /// Sets progress, clamped to 100.
    pub fn set_progress(&self, progress: u8) {
        self.update(|s| s.progress = progress.min(100));
    }

    /// Sets (or clears) the error. Always clears `success`.
    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| {
            s.error = error;
            s.success = None;
        });
    }

    /// Sets (or clears) the success message. Always clears `error`.
    pub fn set_success(&self, success: Option<String>) {
        self.update(|s| {
            s.success = success;
            s.error = None;
        });
    }

    /// Back to the initial state.
    pub fn reset(&self) {
        self.update(|s| *s = PipelineState::default());
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    fn update(&self, mutate: impl FnOnce(&mut PipelineState)) {
        let mut inner = self.lock();
        mutate(&mut inner.state);
        let next = inner.state.clone();
        trace!(?next, "pipeline state changed");
        inner.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ordered stream of state values from an [`UploadStateStore`].
pub struct StateSubscription {
    rx: mpsc::UnboundedReceiver<PipelineState>,
}

impl StateSubscription {
    /// Waits for the next value. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<PipelineState> {
        self.rx.recv().await
    }

    /// Next value if one is already queued.
    pub fn try_next(&mut self) -> Option<PipelineState> {
        self.rx.try_recv().ok()
    }

    /// Every value queued so far.
    pub fn drain(&mut self) -> Vec<PipelineState> {
        let mut out = Vec::new();
        while let Some(state) = self.try_next() {
            out.push(state);
        }
        out
    }
}

/// Read-only view of the store, handed to presentation code.
#[derive(Clone)]
pub struct StateObserver {
    store: Arc<UploadStateStore>,
}

impl StateObserver {
    pub fn new(store: Arc<UploadStateStore>) -> Self {
        Self { store }
    }

    pub fn current(&self) -> PipelineState {
        self.store.current()
    }

    pub fn subscribe(&self) -> StateSubscription {
        self.store.subscribe()
    }
}
