use tokio::sync::watch;

/// A cooperative cancellation signal.
///
/// The ingest engine observes the token only at its suspension points,
/// between successive fragment reads; it is never preempted mid-fragment.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives inside this token, so the channel cannot close
        // while we are waiting on it.
        rx.wait_for(|cancelled| *cancelled).await.ok();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
