//! Server subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → core.rs (accept loop, one task per connection)
//!     → tls.rs (optional TLS handshake)
//!     → core.rs (HTTP/1.1 connection driving, dispatch)
//!
//! Lifecycle:
//!     built → serving (signal fires after bind)
//!           → draining (shutdown/close requested, listener closed)
//!           → stopped (signal fires after drain)
//! ```
//!
//! # Design Decisions
//! - One listener per server; `serve` runs at most once and the server
//!   cannot be restarted after a stop
//! - Shutdown is cooperative: the listener closes immediately, in-flight
//!   connections get the stop budget, stragglers are aborted
//! - The first stop request fixes the budget; later callers share the
//!   same drain and all return when it completes
//! - TLS handshake failures cost one connection, never the listener

pub mod core;
pub mod lifecycle;
pub mod tls;

pub use self::core::{Server, ServerBuilder};
pub use self::lifecycle::{ServeError, ShutdownError};
pub use self::tls::TlsError;
