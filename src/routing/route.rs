//! Route specification and match evaluation.
//!
//! # Responsibilities
//! - Describe one route declaratively (path, methods, host, schemes,
//!   header and query predicates, handler)
//! - Evaluate every configured predicate with AND semantics
//!
//! # Design Decisions
//! - Method names are uppercased before parsing, so `"get"` and `"GET"`
//!   configure the same route
//! - Host matching is case-insensitive and ignores the port
//! - Header and query predicates are flat key/value pair lists; an
//!   odd-length list is ignored in full rather than half-applied
//! - An empty expected value turns a pair into a presence check

use axum::body::Body;
use axum::http::{header, Method, Request};
use std::fmt;
use std::sync::Arc;

use crate::routing::handler::{RouteHandler, SharedHandler};

/// Declarative description of one route.
///
/// Built with chained setters and handed to [`RouteTable::register`]
/// (or installed in bulk by service registration). A spec without a
/// handler is skipped at registration.
///
/// [`RouteTable::register`]: crate::routing::RouteTable::register
#[derive(Default, Clone)]
pub struct RouteSpec {
    pub(crate) pattern: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) methods: Vec<Method>,
    pub(crate) host: Option<String>,
    pub(crate) schemes: Vec<String>,
    pub(crate) headers: Vec<String>,
    pub(crate) queries: Vec<String>,
    pub(crate) handler: Option<SharedHandler>,
}

impl RouteSpec {
    /// Create an empty spec that matches every request (once a handler
    /// is attached).
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the exact request path.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Match any path starting with `prefix`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Restrict to the given HTTP methods. Names are uppercased before
    /// parsing; a name that still does not parse is dropped with a
    /// warning. An empty method list matches any method.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in methods {
            let upper = name.as_ref().to_uppercase();
            match Method::from_bytes(upper.as_bytes()) {
                Ok(method) => self.methods.push(method),
                Err(_) => tracing::warn!(method = %upper, "Ignoring unparseable route method"),
            }
        }
        self
    }

    /// Restrict to an exact host, compared case-insensitively and
    /// without the port.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into().to_lowercase());
        self
    }

    /// Restrict to the given URI schemes ("http", "https").
    pub fn schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.schemes
            .extend(schemes.into_iter().map(|s| s.as_ref().to_lowercase()));
        self
    }

    /// Require request headers, given as a flat key/value pair list.
    /// An empty expected value only requires the header to be present.
    pub fn headers<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers.extend(pairs.into_iter().map(Into::into));
        self
    }

    /// Require query parameters, given as a flat key/value pair list.
    /// An empty expected value only requires the key to be present.
    pub fn queries<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queries.extend(pairs.into_iter().map(Into::into));
        self
    }

    /// Attach the handler invoked when this spec matches.
    pub fn handler<H>(self, handler: H) -> Self
    where
        H: RouteHandler + 'static,
    {
        self.shared_handler(Arc::new(handler))
    }

    /// Attach an already shared handler.
    pub(crate) fn shared_handler(mut self, handler: SharedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Evaluate every configured predicate against the request.
    /// `conn_scheme` is the scheme the connection was accepted with and
    /// stands in when the request target carries none.
    pub(crate) fn matches(&self, req: &Request<Body>, conn_scheme: &str) -> bool {
        if let Some(pattern) = &self.pattern {
            if req.uri().path() != pattern {
                return false;
            }
        }
        if let Some(prefix) = &self.prefix {
            if !req.uri().path().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if !self.methods.is_empty() && !self.methods.contains(req.method()) {
            return false;
        }
        if let Some(expected) = &self.host {
            if !host_matches(expected, req) {
                return false;
            }
        }
        if !self.schemes.is_empty() {
            let scheme = req.uri().scheme_str().unwrap_or(conn_scheme);
            if !self.schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
                return false;
            }
        }
        if !headers_match(&self.headers, req) {
            return false;
        }
        if !queries_match(&self.queries, req.uri().query().unwrap_or("")) {
            return false;
        }
        true
    }
}

// Manual impl: the handler is a trait object, so `Debug` cannot be
// derived; it is reported by presence only.
impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("pattern", &self.pattern)
            .field("prefix", &self.prefix)
            .field("methods", &self.methods)
            .field("host", &self.host)
            .field("schemes", &self.schemes)
            .field("headers", &self.headers)
            .field("queries", &self.queries)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

fn host_matches(expected: &str, req: &Request<Body>) -> bool {
    let from_header = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    match from_header.or_else(|| req.uri().host()) {
        Some(host) => strip_port(host).eq_ignore_ascii_case(expected),
        None => false,
    }
}

/// Drop a trailing `:port`, leaving IPv6 literals intact.
fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(idx) if !host[idx..].contains(']') => &host[..idx],
        _ => host,
    }
}

fn headers_match(pairs: &[String], req: &Request<Body>) -> bool {
    // An odd-length pair list is ignored in full.
    if pairs.len() % 2 != 0 {
        return true;
    }
    pairs.chunks(2).all(|pair| {
        let (key, expected) = (&pair[0], &pair[1]);
        match req.headers().get(key.as_str()) {
            Some(value) => {
                expected.is_empty()
                    || value.to_str().map(|v| v == expected).unwrap_or(false)
            }
            None => false,
        }
    })
}

fn queries_match(pairs: &[String], query: &str) -> bool {
    if pairs.len() % 2 != 0 {
        return true;
    }
    pairs.chunks(2).all(|pair| {
        let (key, expected) = (&pair[0], &pair[1]);
        url::form_urlencoded::parse(query.as_bytes())
            .any(|(k, v)| k == key.as_str() && (expected.is_empty() || v == expected.as_str()))
    })
}
