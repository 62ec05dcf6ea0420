//! Embeddable HTTP server runtime with ordered routing, a managed
//! listener lifecycle and an RPC-over-HTTP registration bridge.

pub mod config;
pub mod context;
pub mod routing;
pub mod rpc;
pub mod server;
pub mod signal;

pub use config::{load_config, ServerConfig, TimeoutConfig};
pub use context::{RequestContext, RequestId};
pub use routing::{RouteSpec, RouteTable, REQUEST_ID_HEADER};
pub use rpc::{
    unary, Capabilities, JsonCodec, MessageCodec, MethodDescription, RegisterError,
    ServiceDescription, ServiceError,
};
pub use server::{ServeError, Server, ServerBuilder, ShutdownError};
pub use signal::Signal;
