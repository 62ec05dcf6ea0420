//! Ordered route table.
//!
//! # Design Decisions
//! - Registration order is the match order; the first matching spec wins
//! - The scan stays a linear walk over a `Vec`. Ordering is part of the
//!   table's contract, so it must never be rebuilt as a map or trie
//! - Overlapping and duplicate routes are legal; earlier registration
//!   shadows later ones
//! - The table is populated before serving begins and read-only after

use axum::body::Body;
use axum::http::Request;

use crate::routing::handler::SharedHandler;
use crate::routing::route::RouteSpec;

/// Ordered collection of route specs.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteSpec>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a spec. Specs without a handler are skipped, matching
    /// registration-time behavior rather than failing at dispatch.
    pub fn register(&mut self, spec: RouteSpec) {
        if spec.handler.is_none() {
            tracing::debug!("Skipping route without handler");
            return;
        }
        if spec.headers.len() % 2 != 0 {
            tracing::warn!(
                count = spec.headers.len(),
                "Odd-length header pair list on route, ignoring all header predicates"
            );
        }
        if spec.queries.len() % 2 != 0 {
            tracing::warn!(
                count = spec.queries.len(),
                "Odd-length query pair list on route, ignoring all query predicates"
            );
        }
        tracing::debug!(
            index = self.routes.len(),
            pattern = ?spec.pattern,
            prefix = ?spec.prefix,
            methods = ?spec.methods,
            host = ?spec.host,
            "Route registered"
        );
        self.routes.push(spec);
    }

    /// Append several specs in order.
    pub(crate) fn install(&mut self, specs: Vec<RouteSpec>) {
        for spec in specs {
            self.register(spec);
        }
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Walk the table in registration order and return the first
    /// matching spec's handler.
    pub(crate) fn match_request(
        &self,
        req: &Request<Body>,
        conn_scheme: &str,
    ) -> Option<SharedHandler> {
        self.routes
            .iter()
            .find(|route| route.matches(req, conn_scheme))
            .and_then(|route| route.handler.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn status_of(table: &RouteTable, uri: &str) -> Option<StatusCode> {
        let handler = table.match_request(&request(uri), "http")?;
        Some(handler.call(request(uri)).await.status())
    }

    #[test]
    fn specs_without_handler_are_skipped() {
        let mut table = RouteTable::new();
        table.register(RouteSpec::new().pattern("/hello"));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn first_match_wins_in_registration_order() {
        let mut table = RouteTable::new();
        table.register(
            RouteSpec::new()
                .pattern("/hello")
                .queries(["name", "war"])
                .handler(|_req: Request<Body>| async { StatusCode::ACCEPTED }),
        );
        table.register(
            RouteSpec::new()
                .pattern("/hello")
                .handler(|_req: Request<Body>| async { StatusCode::OK }),
        );

        assert_eq!(
            status_of(&table, "/hello?name=war").await,
            Some(StatusCode::ACCEPTED)
        );
        assert_eq!(status_of(&table, "/hello").await, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn earlier_registration_shadows_duplicates() {
        let mut table = RouteTable::new();
        table.register(
            RouteSpec::new()
                .prefix("/api")
                .handler(|_req: Request<Body>| async { StatusCode::OK }),
        );
        table.register(
            RouteSpec::new()
                .pattern("/api/users")
                .handler(|_req: Request<Body>| async { StatusCode::ACCEPTED }),
        );

        // The broader prefix was registered first, so it shadows the
        // more specific pattern.
        assert_eq!(status_of(&table, "/api/users").await, Some(StatusCode::OK));
    }

    #[test]
    fn no_match_yields_none() {
        let mut table = RouteTable::new();
        table.register(
            RouteSpec::new()
                .pattern("/hello")
                .handler(|_req: Request<Body>| async { StatusCode::OK }),
        );
        assert!(table.match_request(&request("/other"), "http").is_none());
    }
}
