//! Minimal embedding: ordered routes, one registered service and a
//! graceful ctrl-c shutdown.
//!
//! Run with `cargo run --example hello`, then:
//!   curl 'http://127.0.0.1:8080/hello?name=war'
//!   curl 'http://127.0.0.1:8080/hello'
//!   curl -X POST http://127.0.0.1:8080/v1/demo.Greeter/Hello -d '{"name":"world"}'

use axum::body::Body;
use axum::http::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use httpserve::{
    unary, Capabilities, MethodDescription, RouteSpec, Server, ServiceDescription, ServiceError,
};

#[derive(Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Serialize)]
struct HelloReply {
    greeting: String,
    count: i64,
}

struct Greeter;

impl Greeter {
    async fn hello(&self, input: HelloRequest) -> Result<HelloReply, ServiceError> {
        Ok(HelloReply {
            greeting: format!("hello, {}", input.name),
            count: 0,
        })
    }
}

impl Capabilities for Greeter {
    fn provides(&self, method: &str) -> bool {
        method == "Hello"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "httpserve=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut server = Server::builder()
        .name("hello")
        .address("127.0.0.1:8080")
        .build();

    // Registration order is the match order: the query-predicated route
    // wins for /hello?name=war, the bare pattern catches the rest.
    server.route(
        RouteSpec::new()
            .pattern("/hello")
            .queries(["name", "war"])
            .handler(|_req: Request<Body>| async { "hello, general\n" }),
    );
    server.route(
        RouteSpec::new()
            .pattern("/hello")
            .handler(|_req: Request<Body>| async { "hello\n" }),
    );
    server.route(
        RouteSpec::new()
            .prefix("/static/")
            .methods(["GET"])
            .handler(|req: Request<Body>| async move {
                format!("would serve {}\n", req.uri().path())
            }),
    );

    // POST /v1/demo.Greeter/Hello with a JSON body like {"name":"world"}.
    server.register_service(
        ServiceDescription::new("demo", "Greeter").method(MethodDescription::new(
            "Hello",
            unary(|svc: Arc<Greeter>, _ctx, input: HelloRequest| async move {
                svc.hello(input).await
            }),
        )),
        Greeter,
    )?;

    let server = Arc::new(server);
    let root = CancellationToken::new();
    let serve = {
        let server = Arc::clone(&server);
        let root = root.clone();
        tokio::spawn(async move { server.serve(root).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-c received, shutting down");
    root.cancel();
    server.shutdown(Duration::from_secs(5)).await?;
    serve.await??;

    Ok(())
}
