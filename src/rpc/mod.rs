//! RPC-over-HTTP bridge.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     ServiceDescription + implementation
//!         → service.rs (full contract checked against Capabilities)
//!         → one RouteSpec per method (path format, verb defaulting)
//!         → route table (all-or-nothing install)
//!
//! Dispatch (per request):
//!     Request
//!         → codec.derive_context
//!         → collect body under the read budget
//!         → codec.decode_request      (error: encode and return)
//!         → typed input → method → typed output
//!         → codec.encode_response     (exactly once per request)
//! ```
//!
//! # Design Decisions
//! - The codec travels as one injected trait object instead of process
//!   globals, so two servers in one process can speak different formats
//! - Failed decodes respond without ever invoking the implementation
//! - Error responses share one fixed status and a `{code, message}`
//!   body; codes follow the gRPC numbering

pub mod codec;
pub mod error;
pub mod service;

pub use codec::{JsonCodec, MessageCodec, ERROR_STATUS};
pub use error::{code, ServiceError};
pub use service::{
    default_path_format, unary, Capabilities, MethodDescription, MethodHandler, PathFormat,
    RegisterError, ServiceDescription,
};
