//! Handler abstraction for routed requests.
//!
//! # Design Decisions
//! - Handlers return a boxed future so the table can hold them as trait
//!   objects without generic plumbing
//! - Any async fn or closure from `Request` to an `IntoResponse` value
//!   is a handler via the blanket impl, no adapter call needed

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A request handler installed in the route table.
pub trait RouteHandler: Send + Sync {
    /// Handle one request, producing a complete response.
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response>;
}

/// Handlers as shared between the table and live connections.
pub type SharedHandler = Arc<dyn RouteHandler>;

impl<F, Fut, R> RouteHandler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response> {
        let fut = (self)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
