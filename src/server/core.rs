//! Server assembly and the accept loop.
//!
//! # Responsibilities
//! - Hold the declarative pieces (routes, codec, handler override,
//!   timeouts, TLS settings) configured before serving
//! - Bind the listener, accept connections and serve HTTP/1.1 on each
//! - Drain connections within the stop budget and latch the lifecycle
//!   signals in order

use axum::body::Body;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::config::{ServerConfig, TimeoutConfig, TlsConfig};
use crate::routing::dispatch::Dispatcher;
use crate::routing::{RouteHandler, RouteSpec, RouteTable, SharedHandler};
use crate::rpc::codec::{JsonCodec, MessageCodec};
use crate::rpc::service::{
    build_routes, default_path_format, Capabilities, PathFormat, RegisterError,
    ServiceDescription,
};
use crate::server::lifecycle::{ServeError, ServerState};
use crate::server::tls::build_acceptor;
use crate::signal::Signal;

/// An embeddable HTTP server with an ordered route table, a managed
/// listener lifecycle and an RPC registration bridge.
///
/// Routes and services are registered through `&mut self` before
/// serving; `serve` borrows `&self`, so the borrow checker already
/// rules out table changes while the listener runs.
pub struct Server {
    pub(crate) name: String,
    addr: String,
    tls: Option<TlsConfig>,
    timeouts: TimeoutConfig,
    routes: RouteTable,
    override_handler: Option<SharedHandler>,
    codec: Arc<dyn MessageCodec>,
    path_format: PathFormat,
    pub(crate) state: Arc<ServerState>,
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    name: String,
    addr: String,
    tls: Option<TlsConfig>,
    timeouts: TimeoutConfig,
    override_handler: Option<SharedHandler>,
    codec: Arc<dyn MessageCodec>,
    path_format: PathFormat,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            name: defaults.name,
            addr: defaults.listen,
            tls: None,
            timeouts: defaults.timeouts,
            override_handler: None,
            codec: Arc::new(JsonCodec),
            path_format: default_path_format,
        }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server name used in lifecycle logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bind address, e.g. `"0.0.0.0:8080"`. Port 0 picks a free port.
    pub fn address(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Serve TLS using the given PEM certificate chain and private key.
    pub fn tls(mut self, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// Replace the default read/write/idle timeouts.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Install an override handler that replaces table dispatch for
    /// every request. This is the single composition point for
    /// embedding a foreign router or middleware stack.
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: RouteHandler + 'static,
    {
        self.override_handler = Some(Arc::new(handler));
        self
    }

    /// Replace the default JSON codec for registered services.
    pub fn codec<C>(mut self, codec: C) -> Self
    where
        C: MessageCodec + 'static,
    {
        self.codec = Arc::new(codec);
        self
    }

    /// Replace the generated-path strategy for registered services.
    pub fn path_format(mut self, format: PathFormat) -> Self {
        self.path_format = format;
        self
    }

    pub fn build(self) -> Server {
        Server {
            name: self.name,
            addr: self.addr,
            tls: self.tls,
            timeouts: self.timeouts,
            routes: RouteTable::new(),
            override_handler: self.override_handler,
            codec: self.codec,
            path_format: self.path_format,
            state: Arc::new(ServerState::new()),
        }
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Build a server from a loaded configuration file.
    pub fn from_config(config: ServerConfig) -> Self {
        let mut builder = Server::builder()
            .name(config.name)
            .address(config.listen)
            .timeouts(config.timeouts);
        if let Some(tls) = config.tls {
            builder = builder.tls(tls.cert_path, tls.key_path);
        }
        builder.build()
    }

    /// The configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register one route. Order of calls is the match order.
    pub fn route(&mut self, spec: RouteSpec) {
        self.routes.register(spec);
    }

    /// Number of routes currently registered.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Register a described service: check the implementation against
    /// the description's full contract, then install one route per
    /// method. On error nothing is installed.
    pub fn register_service<S>(
        &mut self,
        desc: ServiceDescription<S>,
        implementation: S,
    ) -> Result<(), RegisterError>
    where
        S: Capabilities + Send + Sync + 'static,
    {
        let service = desc.qualified_name();
        let methods = desc.methods.len();
        let specs = build_routes(desc, implementation, Arc::clone(&self.codec), self.path_format)?;
        self.routes.install(specs);
        tracing::info!(service = %service, methods, "Service registered");
        Ok(())
    }

    /// Bind the listener and serve until a stop is requested.
    ///
    /// `root` is the embedding application's teardown token; it reaches
    /// handlers through their request context but does not stop the
    /// server. The only way to end serving is [`Server::shutdown`] or
    /// [`Server::close`]. Returns `Ok(())` after a requested stop has
    /// drained; binding and TLS setup failures are fatal.
    pub async fn serve(&self, root: CancellationToken) -> Result<(), ServeError> {
        self.state.enter_serve().await?;

        let listener = match TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.abort_serve().await;
                return Err(ServeError::Bind {
                    addr: self.addr.clone(),
                    source,
                });
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(source) => {
                self.state.abort_serve().await;
                return Err(ServeError::Bind {
                    addr: self.addr.clone(),
                    source,
                });
            }
        };
        let acceptor = match &self.tls {
            Some(tls) => match build_acceptor(tls) {
                Ok(acceptor) => Some(acceptor),
                Err(err) => {
                    self.state.abort_serve().await;
                    return Err(ServeError::Tls(err));
                }
            },
            None => None,
        };
        let scheme: &'static str = if acceptor.is_some() { "https" } else { "http" };

        let _ = self.state.local_addr.set(local);
        let dispatcher = Dispatcher::new(
            Arc::new(self.routes.clone()),
            self.override_handler.clone(),
            scheme,
            self.timeouts.read(),
            self.timeouts.write(),
            root,
        );

        let mut connections = JoinSet::new();
        self.state.serving.fire();
        tracing::info!(
            name = %self.name,
            address = %local,
            scheme,
            routes = self.routes.len(),
            "Server serving"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            connections.spawn(serve_connection(
                                stream,
                                peer,
                                acceptor.clone(),
                                dispatcher.clone(),
                                self.timeouts.idle(),
                                self.state.drain.clone(),
                            ));
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = self.state.drain.wait() => break,
                // Reap finished connection tasks so the set stays small.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        let budget = self
            .state
            .stop_budget
            .get()
            .copied()
            .unwrap_or(Duration::ZERO);
        tracing::info!(
            name = %self.name,
            active_connections = connections.len(),
            budget_ms = budget.as_millis() as u64,
            "Draining connections"
        );

        let drained = tokio::time::timeout(budget, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            self.state.drain_timed_out.store(true, Ordering::SeqCst);
            tracing::warn!(
                name = %self.name,
                aborted_connections = connections.len(),
                "Drain budget exceeded, aborting remaining connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        self.state.stopped.fire();
        tracing::info!(name = %self.name, "Server stopped");
        Ok(())
    }
}

/// Serve one accepted connection, with an optional TLS handshake first.
/// Handshake failures drop this connection only.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    dispatcher: Dispatcher,
    idle_timeout: Duration,
    drain: Signal,
) {
    match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(stream) => drive_http(stream, peer, dispatcher, idle_timeout, drain).await,
            Err(err) => {
                tracing::warn!(peer = %peer, error = %err, "TLS handshake failed");
            }
        },
        None => drive_http(stream, peer, dispatcher, idle_timeout, drain).await,
    }
}

/// Drive one HTTP/1.1 connection until it finishes or the drain signal
/// asks it to wind down after its in-flight request.
async fn drive_http<S>(
    stream: S,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    idle_timeout: Duration,
    drain: Signal,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move {
            let response = dispatcher.dispatch(req.map(Body::new), peer).await;
            Ok::<_, Infallible>(response)
        }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(idle_timeout)
        .serve_connection(io, service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    // Abrupt client closes surface here; they are routine.
                    tracing::debug!(peer = %peer, error = %err, "Connection ended");
                }
                return;
            }
            _ = drain.wait(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::service::{unary, MethodDescription};
    use crate::rpc::ServiceError;
    use axum::http::StatusCode;
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize)]
    struct PingRequest {
        #[allow(dead_code)]
        text: String,
    }

    #[derive(Serialize)]
    struct PingReply {
        text: String,
    }

    struct Pinger;

    impl Pinger {
        async fn ping(&self, _input: PingRequest) -> Result<PingReply, ServiceError> {
            Ok(PingReply {
                text: "pong".to_string(),
            })
        }
    }

    impl Capabilities for Pinger {
        fn provides(&self, method: &str) -> bool {
            method == "Ping"
        }
    }

    fn ping_description() -> ServiceDescription<Pinger> {
        ServiceDescription::new("demo", "Pinger").method(MethodDescription::new(
            "Ping",
            unary(|svc: std::sync::Arc<Pinger>, _ctx, input: PingRequest| async move {
                svc.ping(input).await
            }),
        ))
    }

    #[test]
    fn builder_defaults_match_config_defaults() {
        let server = Server::builder().build();
        assert_eq!(server.name(), "httpserve");
        assert_eq!(server.route_count(), 0);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn from_config_carries_name_and_address() {
        let config = ServerConfig {
            name: "edge".to_string(),
            listen: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let server = Server::from_config(config);
        assert_eq!(server.name(), "edge");
    }

    #[test]
    fn routes_register_in_order() {
        let mut server = Server::builder().build();
        server.route(
            RouteSpec::new()
                .pattern("/a")
                .handler(|_req: axum::http::Request<Body>| async { StatusCode::OK }),
        );
        server.route(RouteSpec::new().pattern("/no-handler"));
        assert_eq!(server.route_count(), 1);
    }

    #[test]
    fn successful_registration_installs_one_route_per_method() {
        let mut server = Server::builder().build();
        server.register_service(ping_description(), Pinger).unwrap();
        assert_eq!(server.route_count(), 1);
    }

    #[test]
    fn failed_registration_leaves_route_count_unchanged() {
        let mut server = Server::builder().build();
        server.route(
            RouteSpec::new()
                .pattern("/existing")
                .handler(|_req: axum::http::Request<Body>| async { StatusCode::OK }),
        );

        let desc = ping_description().contract(["Ping", "Echo"]);
        let err = server.register_service(desc, Pinger).unwrap_err();
        assert!(matches!(err, RegisterError::Conformance { .. }));
        assert_eq!(server.route_count(), 1);
    }
}
