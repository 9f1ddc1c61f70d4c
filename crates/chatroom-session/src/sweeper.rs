//! Optional background sweep of expired sessions.
//!
//! Expiry is enforced lazily on access; the sweeper only bounds memory held
//! by users who stop sending requests. It calls [`SessionRegistry::sweep`]
//! on a fixed interval until cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::registry::SessionRegistry;

/// Smallest accepted sweep interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Token that stops the sweeper when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "Sweeper task ended abnormally");
        }
    }
}

/// Spawn a task sweeping `registry` every `interval`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sweeper(registry: SessionRegistry, interval: Duration) -> SweeperHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let interval = interval.max(MIN_INTERVAL);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        debug!(?interval, "Session sweeper started");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = registry.sweep();
                    trace!(evicted, "Sweeper tick");
                }
            }
        }
    });

    SweeperHandle { cancel, task }
}

impl SessionRegistry {
    /// Start the background sweeper if the configuration enables it.
    pub fn start_sweeper(&self) -> Option<SweeperHandle> {
        if !self.config().sweep_enabled {
            return None;
        }
        Some(spawn_sweeper(self.clone(), self.config().sweep_interval))
    }
}
