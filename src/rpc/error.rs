//! Service errors with wire-stable numeric codes.

use thiserror::Error;

/// Numeric codes carried in error bodies. The numbering follows the
/// gRPC status space so handler errors map stably across transports.
pub mod code {
    /// Not an error.
    pub const OK: i32 = 0;
    /// Unclassified handler failure.
    pub const UNKNOWN: i32 = 2;
    /// The request body could not be decoded into the input message.
    pub const INVALID_MESSAGE: i32 = 3;
    /// A read or dispatch budget expired.
    pub const DEADLINE_EXCEEDED: i32 = 4;
    /// The method is described but not provided.
    pub const UNIMPLEMENTED: i32 = 12;
    /// The server failed while encoding or routing internally.
    pub const INTERNAL: i32 = 13;
}

/// Error produced by service methods and the RPC glue around them.
///
/// Carried verbatim into the codec's error encoding as
/// `{"code": <i32>, "message": <string>}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    /// Numeric code serialized into the error body.
    pub code: i32,
    /// Human-readable message serialized into the error body.
    pub message: String,
}

impl ServiceError {
    /// Create an error with an explicit code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Unclassified failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(code::UNKNOWN, message)
    }

    /// Undecodable or malformed request message.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::new(code::INVALID_MESSAGE, message)
    }

    /// Read or dispatch budget expired.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(code::DEADLINE_EXCEEDED, message)
    }

    /// Described but unprovided method.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(code::UNIMPLEMENTED, message)
    }

    /// Internal encoding or routing failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(code::INTERNAL, message)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_map_to_invalid_message() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ServiceError::from(err);
        assert_eq!(err.code, code::INVALID_MESSAGE);
    }

    #[test]
    fn display_is_the_message() {
        let err = ServiceError::unknown("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.code, code::UNKNOWN);
    }
}
