//! Request-scoped context.
//!
//! # Responsibilities
//! - Carry the application-wide cancellation token into handlers
//! - Identify requests for tracing (request id, peer, scheme)
//! - Hold the per-request body read budget the RPC layer enforces
//!
//! The dispatcher builds one context per request and inserts it into the
//! request extensions, so plain route handlers and registered service
//! methods see the same type.

use axum::http::Request;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier stamped on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request context handed to handlers and service methods.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    peer: SocketAddr,
    scheme: &'static str,
    request_id: RequestId,
    read_timeout: Duration,
}

impl RequestContext {
    pub(crate) fn new(
        cancel: CancellationToken,
        peer: SocketAddr,
        scheme: &'static str,
        read_timeout: Duration,
    ) -> Self {
        Self {
            cancel,
            peer,
            scheme,
            request_id: RequestId::new(),
            read_timeout,
        }
    }

    /// Fetch the context the dispatcher stored on a request.
    pub fn of<B>(req: &Request<B>) -> Option<&RequestContext> {
        req.extensions().get::<RequestContext>()
    }

    /// Token cancelled when the embedding application tears down.
    ///
    /// The server itself never cancels it; long-running handler work
    /// should select against it the same way it would against the
    /// root token handed to `serve`.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether application teardown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Peer address of the underlying connection.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Scheme the connection was accepted with ("http" or "https").
    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// Request ID stamped by the dispatcher.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Budget for collecting the request body.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Replace the body read budget. Codecs deriving per-request
    /// deadlines from headers use this.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}
