//! Request dispatch into the route table.
//!
//! # Responsibilities
//! - Stamp a request ID and inject the per-request context
//! - Resolve the handler (override handler first, then ordered table)
//! - Enforce the dispatch deadline and answer 404/408 uniformly
//! - Emit one structured access event per request
//!
//! # Design Decisions
//! - The dispatcher is an immutable snapshot; connections share it and
//!   never observe route changes
//! - An override handler replaces table dispatch entirely, it is the
//!   single composition point for embedding frameworks

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::context::RequestContext;
use crate::routing::handler::SharedHandler;
use crate::routing::table::RouteTable;

/// Header carrying the generated request ID on request and response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Immutable dispatch snapshot shared by every connection.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    routes: Arc<RouteTable>,
    override_handler: Option<SharedHandler>,
    scheme: &'static str,
    read_timeout: Duration,
    dispatch_timeout: Duration,
    root: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        routes: Arc<RouteTable>,
        override_handler: Option<SharedHandler>,
        scheme: &'static str,
        read_timeout: Duration,
        dispatch_timeout: Duration,
        root: CancellationToken,
    ) -> Self {
        Self {
            routes,
            override_handler,
            scheme,
            read_timeout,
            dispatch_timeout,
            root,
        }
    }

    /// Dispatch one request to its handler and produce the response.
    pub(crate) async fn dispatch(&self, mut req: Request<Body>, peer: SocketAddr) -> Response {
        let started = Instant::now();
        let ctx = RequestContext::new(self.root.clone(), peer, self.scheme, self.read_timeout);
        let request_id = ctx.request_id();

        let id_value = HeaderValue::from_str(&request_id.to_string()).ok();
        if let Some(value) = &id_value {
            req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        }
        req.extensions_mut().insert(ctx);

        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let handler = match &self.override_handler {
            Some(handler) => Some(handler.clone()),
            None => self.routes.match_request(&req, self.scheme),
        };

        let mut response = match handler {
            Some(handler) => {
                match tokio::time::timeout(self.dispatch_timeout, handler.call(req)).await {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::warn!(
                            method = %method,
                            path = %path,
                            request_id = %request_id,
                            "Handler exceeded dispatch deadline"
                        );
                        StatusCode::REQUEST_TIMEOUT.into_response()
                    }
                }
            }
            None => StatusCode::NOT_FOUND.into_response(),
        };

        if let Some(value) = id_value {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        tracing::debug!(
            method = %method,
            path = %path,
            status = %response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            peer = %peer,
            request_id = %request_id,
            "Request completed"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::RouteSpec;

    fn peer() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    fn dispatcher(table: RouteTable, override_handler: Option<SharedHandler>) -> Dispatcher {
        Dispatcher::new(
            Arc::new(table),
            override_handler,
            "http",
            Duration::from_secs(15),
            Duration::from_secs(15),
            CancellationToken::new(),
        )
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn unmatched_request_is_404() {
        let d = dispatcher(RouteTable::new(), None);
        let resp = d.dispatch(request("/nowhere"), peer()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn response_carries_request_id() {
        let d = dispatcher(RouteTable::new(), None);
        let resp = d.dispatch(request("/nowhere"), peer()).await;
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn handler_sees_injected_context() {
        let mut table = RouteTable::new();
        table.register(RouteSpec::new().pattern("/ctx").handler(
            |req: Request<Body>| async move {
                match RequestContext::of(&req) {
                    Some(ctx) if ctx.scheme() == "http" => StatusCode::OK,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                }
            },
        ));
        let d = dispatcher(table, None);
        let resp = d.dispatch(request("/ctx"), peer()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn override_handler_bypasses_table() {
        let mut table = RouteTable::new();
        table.register(
            RouteSpec::new()
                .pattern("/hello")
                .handler(|_req: Request<Body>| async { StatusCode::OK }),
        );
        let override_handler: SharedHandler =
            Arc::new(|_req: Request<Body>| async { StatusCode::ACCEPTED });
        let d = dispatcher(table, Some(override_handler));

        let resp = d.dispatch(request("/hello"), peer()).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let resp = d.dispatch(request("/anything"), peer()).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out_as_408() {
        let mut table = RouteTable::new();
        table.register(RouteSpec::new().pattern("/slow").handler(
            |_req: Request<Body>| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                StatusCode::OK
            },
        ));
        let d = Dispatcher::new(
            Arc::new(table),
            None,
            "http",
            Duration::from_secs(15),
            Duration::from_millis(50),
            CancellationToken::new(),
        );
        let resp = d.dispatch(request("/slow"), peer()).await;
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
