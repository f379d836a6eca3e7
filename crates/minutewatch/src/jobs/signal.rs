use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

/// Per-job cancellation request, polled by the executor at checkpoints.
///
/// Clones share state. The first reason given wins.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns false if it was already requested.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let mut slot = match self.reason.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason.into());
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        match self.reason.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
