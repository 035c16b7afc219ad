//! Latest known chain, for display.

use std::sync::Arc;
use std::time::Duration;

use photochain_api::ApiError;
use photochain_protocol::ChainSnapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::PhotoBackend;

/// Holds the most recent chain snapshot.
///
/// A failed refresh keeps the previous snapshot. Watchers only see the
/// latest value, which is what a display needs.
pub struct ChainViewPresenter {
    tx: watch::Sender<Option<ChainSnapshot>>,
}

impl Default for ChainViewPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainViewPresenter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Fetches the chain and publishes it.
    pub async fn refresh(&self, backend: &dyn PhotoBackend) -> Result<ChainSnapshot, ApiError> {
        match backend.fetch_chain().await {
            Ok(snapshot) => {
                self.publish(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "chain refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Replaces the snapshot with one obtained elsewhere.
    pub fn publish(&self, snapshot: ChainSnapshot) {
        debug!(length = snapshot.length, "chain snapshot published");
        self.tx.send_replace(Some(snapshot));
    }

    pub fn snapshot(&self) -> Option<ChainSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<ChainSnapshot>> {
        self.tx.subscribe()
    }

    /// Refreshes every `every` until `cancel` fires. The first refresh is immediate.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        backend: Arc<dyn PhotoBackend>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let presenter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = presenter.refresh(backend.as_ref()).await;
                    }
                }
            }
            debug!("periodic chain refresh stopped");
        })
    }
}
