//! Poll gate.
//!
//! Each poll takes the current gate token before calling into the engine and
//! drops its result if the token was cancelled in the meantime. Pausing
//! cancels the token from the host thread so a frame call already in flight
//! cannot publish; resuming installs a fresh child of the abort token.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub(crate) struct PollGate {
    abort: CancellationToken,
    current: Arc<Mutex<CancellationToken>>,
}

impl PollGate {
    pub(crate) fn new(abort: CancellationToken) -> Self {
        let current = abort.child_token();
        Self {
            abort,
            current: Arc::new(Mutex::new(current)),
        }
    }

    /// Token for the poll about to start.
    pub(crate) fn token(&self) -> CancellationToken {
        self.current.lock().clone()
    }

    pub(crate) fn close(&self) {
        self.current.lock().cancel();
    }

    pub(crate) fn reopen(&self) {
        let mut current = self.current.lock();
        if current.is_cancelled() && !self.abort.is_cancelled() {
            *current = self.abort.child_token();
        }
    }
}
