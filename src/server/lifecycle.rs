//! Lifecycle coordination for a serving listener.
//!
//! # Responsibilities
//! - Record stop requests (first caller's drain budget wins)
//! - Expose the serving and stopped signals to supervision code
//! - Report whether the drain budget expired and work was aborted
//!
//! # Design Decisions
//! - `shutdown` and `close` are idempotent and safe under any number of
//!   concurrent callers; the terminal signals latch exactly once
//! - The drain budget is the only mechanism that ends the accept loop;
//!   cancelling the root token merely propagates into handlers
//! - Stop requests and serve entry are ordered through one gate, so
//!   `stopped` latches directly only when no serve call is in flight;
//!   otherwise the serve return path fires it, after `serving`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::server::core::Server;
use crate::server::tls::TlsError;
use crate::signal::Signal;

/// Error type for `Server::serve`.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// `serve` was called while a previous call is still running.
    #[error("server is already serving")]
    AlreadyServing,

    /// `serve` was called after a stop had been requested.
    #[error("server closed")]
    Closed,
}

/// Error type for `Server::shutdown`.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The drain budget expired; remaining connections were aborted.
    #[error("shutdown deadline exceeded before connections drained")]
    DeadlineExceeded,
}

/// State shared between the accept loop and supervising callers.
pub(crate) struct ServerState {
    /// Fired once the listener is bound and the accept loop runs.
    pub(crate) serving: Signal,
    /// Fired once the server has fully stopped.
    pub(crate) stopped: Signal,
    /// Fired when a stop is requested; the accept loop exits and live
    /// connections switch to graceful shutdown.
    pub(crate) drain: Signal,
    /// Drain budget recorded by the first stop requester.
    pub(crate) stop_budget: OnceLock<Duration>,
    /// Address actually bound, known once serving fires.
    pub(crate) local_addr: OnceLock<SocketAddr>,
    /// Set while a serve call holds the listener.
    serve_entered: AtomicBool,
    /// Whether the drain budget expired and connections were aborted.
    pub(crate) drain_timed_out: AtomicBool,
    /// Orders stop requests against serve entry and exit.
    gate: Mutex<()>,
}

impl ServerState {
    pub(crate) fn new() -> Self {
        Self {
            serving: Signal::new(),
            stopped: Signal::new(),
            drain: Signal::new(),
            stop_budget: OnceLock::new(),
            local_addr: OnceLock::new(),
            serve_entered: AtomicBool::new(false),
            drain_timed_out: AtomicBool::new(false),
            gate: Mutex::new(()),
        }
    }

    /// Record a stop request. The first caller's budget wins; every
    /// caller gets the winning budget back.
    pub(crate) fn request_stop(&self, budget: Duration) -> Duration {
        *self.stop_budget.get_or_init(|| budget)
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_budget.get().is_some()
    }

    /// Record a stop request and fire the drain signal, ordered against
    /// serve entry. Reports the winning budget and whether a serve call
    /// is in flight; when none is, no serve return path will run, so
    /// `stopped` latches here.
    pub(crate) async fn begin_stop(&self, budget: Duration) -> (Duration, bool) {
        let _gate = self.gate.lock().await;
        let budget = self.request_stop(budget);
        self.drain.fire();
        let in_flight = self.serve_entered.load(Ordering::SeqCst);
        if !in_flight {
            self.stopped.fire();
        }
        (budget, in_flight)
    }

    /// Claim serve entry. Refused once a stop has been requested or
    /// while another serve call holds the entry.
    pub(crate) async fn enter_serve(&self) -> Result<(), ServeError> {
        let _gate = self.gate.lock().await;
        if self.stop_requested() {
            return Err(ServeError::Closed);
        }
        if self.serve_entered.swap(true, Ordering::SeqCst) {
            return Err(ServeError::AlreadyServing);
        }
        Ok(())
    }

    /// Release serve entry after a failed listener start. A stop
    /// requested while the listener was being set up is waiting on
    /// `stopped`, which only this path can latch now.
    pub(crate) async fn abort_serve(&self) {
        let _gate = self.gate.lock().await;
        self.serve_entered.store(false, Ordering::SeqCst);
        if self.stop_requested() {
            self.stopped.fire();
        }
    }
}

impl Server {
    /// Stop accepting, drain in-flight connections within `budget` and
    /// abort whatever is still running at the deadline.
    ///
    /// Safe to call from any number of tasks concurrently. The first
    /// caller's budget wins; every caller observes the same outcome.
    /// Returns [`ShutdownError::DeadlineExceeded`] when the budget
    /// expired, even though the server still reaches its stopped state.
    pub async fn shutdown(&self, budget: Duration) -> Result<(), ShutdownError> {
        let (budget, in_flight) = self.state.begin_stop(budget).await;
        tracing::info!(
            name = %self.name,
            budget_ms = budget.as_millis() as u64,
            "Shutdown requested"
        );

        if !in_flight {
            return Ok(());
        }
        match tokio::time::timeout(budget, self.state.stopped.wait()).await {
            Ok(()) if !self.state.drain_timed_out.load(Ordering::SeqCst) => Ok(()),
            _ => Err(ShutdownError::DeadlineExceeded),
        }
    }

    /// Stop immediately: in-flight connections are aborted rather than
    /// drained. Completes once the server has stopped.
    pub async fn close(&self) {
        let (_, in_flight) = self.state.begin_stop(Duration::ZERO).await;
        tracing::info!(name = %self.name, "Close requested");

        if in_flight {
            self.state.stopped.wait().await;
        }
    }

    /// Signal fired once the listener is bound and accepting.
    pub fn serving(&self) -> Signal {
        self.state.serving.clone()
    }

    /// Signal fired once the server has fully stopped.
    pub fn stopped(&self) -> Signal {
        self.state.stopped.clone()
    }

    /// Address the listener actually bound, available once the serving
    /// signal has fired. Useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.local_addr.get().copied()
    }
}
