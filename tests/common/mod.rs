//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use httpserve::{
    unary, Capabilities, MethodDescription, ServeError, Server, ServiceDescription, ServiceError,
};

#[derive(Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Serialize, Deserialize)]
pub struct HelloReply {
    pub greeting: String,
    pub count: i64,
}

/// Greeter counts invocations so tests can assert the implementation
/// never ran when decoding fails. The first reply carries `count: 0`,
/// which also exercises zero-valued fields surviving encoding.
pub struct Greeter {
    calls: Arc<AtomicUsize>,
}

impl Greeter {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self { calls }
    }

    pub async fn hello(&self, input: HelloRequest) -> Result<HelloReply, ServiceError> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(HelloReply {
            greeting: format!("hello, {}", input.name),
            count,
        })
    }

    pub async fn wave(&self, input: HelloRequest) -> Result<HelloReply, ServiceError> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(HelloReply {
            greeting: format!("wave, {}", input.name),
            count,
        })
    }
}

impl Capabilities for Greeter {
    fn provides(&self, method: &str) -> bool {
        matches!(method, "Hello" | "Wave")
    }
}

/// Describe the Greeter: `Hello` on the generated path and verb, `Wave`
/// with both overridden.
pub fn greeter_description() -> ServiceDescription<Greeter> {
    ServiceDescription::new("test", "Greeter")
        .method(MethodDescription::new(
            "Hello",
            unary(|svc: Arc<Greeter>, _ctx, input: HelloRequest| async move {
                svc.hello(input).await
            }),
        ))
        .method(
            MethodDescription::new(
                "Wave",
                unary(|svc: Arc<Greeter>, _ctx, input: HelloRequest| async move {
                    svc.wave(input).await
                }),
            )
            .http_method(Method::GET)
            .http_path("/v1/wave"),
        )
}

/// A server running on an ephemeral port with its serve task.
pub struct TestServer {
    pub addr: SocketAddr,
    pub server: Arc<Server>,
    pub root: CancellationToken,
    pub task: tokio::task::JoinHandle<Result<(), ServeError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Shut the server down and return what `serve` returned.
    pub async fn stop(self) -> Result<(), ServeError> {
        let _ = self.server.shutdown(Duration::from_secs(5)).await;
        self.task.await.expect("serve task panicked")
    }
}

/// Spawn `serve` and wait for the serving signal before returning.
pub async fn start_server(server: Server) -> TestServer {
    let server = Arc::new(server);
    let root = CancellationToken::new();
    let task = {
        let server = Arc::clone(&server);
        let root = root.clone();
        tokio::spawn(async move { server.serve(root).await })
    };
    server.serving().wait().await;
    let addr = server.local_addr().expect("listener bound");
    TestServer {
        addr,
        server,
        root,
        task,
    }
}

/// Non-pooled client so every request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
