//! One-shot lifecycle signals.
//!
//! # Responsibilities
//! - Latch lifecycle events (serving, stopped, drain) exactly once
//! - Wake every waiter, including waiters that subscribe after the fact
//! - Stay cheap to clone so supervision code can hold its own handle

use std::sync::Arc;
use tokio::sync::watch;

/// A one-shot latching event.
///
/// Built on a watch channel rather than a broadcast channel: a latched
/// terminal state must stay observable after it happened, and watch keeps
/// the final value around for late subscribers where broadcast would drop
/// them. Firing is idempotent and safe under concurrent callers.
#[derive(Debug, Clone)]
pub struct Signal {
    /// Holds the latch. Keeping the sender alive inside every clone means
    /// waiters can never observe a closed channel.
    tx: Arc<watch::Sender<bool>>,
}

impl Signal {
    /// Create a new unfired signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Returns `true` if this call latched it,
    /// `false` if it had already fired.
    pub fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for inspects the current value before parking, which covers
        // waiters that arrive after the latch. The sender lives inside self,
        // so the channel cannot close underneath us.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
