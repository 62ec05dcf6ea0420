//! Pluggable message codec.
//!
//! # Responsibilities
//! - Turn request bodies into decoded messages
//! - Turn method outcomes (value or error) into complete responses
//! - Optionally derive the context a method runs under
//!
//! # Design Decisions
//! - The three hooks travel as one trait object injected at build time,
//!   so swapping wire formats swaps them together and two servers in one
//!   process can use different codecs
//! - Every error outcome maps to one fixed status (417) with a
//!   structured `{code, message}` JSON body, keeping client-side error
//!   handling format-independent

use axum::body::Body;
use axum::http::{request::Parts, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::context::RequestContext;
use crate::rpc::error::ServiceError;

/// Status answered for every error outcome of a service method.
pub const ERROR_STATUS: StatusCode = StatusCode::EXPECTATION_FAILED;

/// Strategy turning HTTP bodies into messages and outcomes into
/// responses. One instance is shared by every method of a server.
pub trait MessageCodec: Send + Sync {
    /// Derive the context a method runs under. The default passes the
    /// parent through untouched; codecs honoring deadline or tracing
    /// headers override this.
    fn derive_context(&self, req: &Request<Body>, ctx: RequestContext) -> RequestContext {
        let _ = req;
        ctx
    }

    /// Decode a collected request body into a message value.
    /// Malformed input is an error, never a panic.
    fn decode_request(&self, req: &Parts, body: &[u8]) -> Result<Value, ServiceError>;

    /// Encode one method outcome into the response. Called exactly once
    /// per dispatched request.
    fn encode_response(&self, outcome: Result<Value, ServiceError>) -> Response;
}

/// Default codec: JSON bodies both ways.
///
/// Responses serialize every field present in the message value, so
/// zero-valued fields (`0`, `""`, `false`) stay on the wire instead of
/// being pruned.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn decode_request(&self, _req: &Parts, body: &[u8]) -> Result<Value, ServiceError> {
        serde_json::from_slice(body).map_err(ServiceError::from)
    }

    fn encode_response(&self, outcome: Result<Value, ServiceError>) -> Response {
        match outcome {
            Ok(value) => (StatusCode::OK, Json(value)).into_response(),
            Err(err) => (
                ERROR_STATUS,
                Json(serde_json::json!({
                    "code": err.code,
                    "message": err.message,
                })),
            )
                .into_response(),
        }
    }
}
