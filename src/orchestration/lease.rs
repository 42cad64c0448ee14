//! Background lease sweeper.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::orchestration::store::ExpressionStore;
use crate::{clog_debug, clog_trace};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically returns operations with expired leases to the ready queue.
pub struct LeaseSweeper {
    store: ExpressionStore,
    interval: Duration,
}

impl LeaseSweeper {
    pub fn new(store: ExpressionStore) -> Self {
        Self {
            store,
            interval: SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        clog_debug!("LeaseSweeper::spawn interval={:?}", self.interval);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => {
                        clog_debug!("LeaseSweeper cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let requeued = self.store.requeue_expired().await;
                        if requeued > 0 {
                            clog_debug!("LeaseSweeper: requeued {} operations", requeued);
                        } else {
                            clog_trace!("LeaseSweeper: nothing expired");
                        }
                    }
                }
            }
        });

        SweeperHandle::new(cancel)
    }
}

/// Handle to a running sweeper, used for graceful shutdown.
pub struct SweeperHandle {
    cancel: CancellationToken,
}

impl SweeperHandle {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Signal the sweeper to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
