//! Structured render cancellation.
//!
//! One token per request, satisfied by either the abort-delay timer or the
//! transport-close signal. The renderer observes it at every suspension
//! point; the engine records which source fired first.

use std::sync::Arc;
use tokio::sync::watch;

/// Why a render was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The abort-delay timer elapsed.
    Timeout,
    /// The transport closed early.
    Closed,
}

/// Cloneable cancellation token. The first reason wins.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel with `reason`. Later cancellations keep the first reason.
    pub fn cancel(&self, reason: CancelReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.tx.borrow()
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => (*reason).unwrap_or(CancelReason::Closed),
            Err(_) => CancelReason::Closed,
        }
    }
}
