//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before serving):
//!     RouteSpec (chained setters)
//!         → RouteTable::register (append, order preserved)
//!
//! Dispatch (per request):
//!     Request
//!         → dispatch.rs (request id, context injection, deadline)
//!         → table.rs (ordered first-match scan)
//!         → route.rs (predicate evaluation, AND semantics)
//!         → handler.rs (invoke matched handler)
//! ```
//!
//! # Design Decisions
//! - First match wins, in registration order; ordering is part of the
//!   public contract, so the table is never compiled into a map or trie
//! - Predicates on one spec combine with AND semantics
//! - Handlers are trait objects so closures, plain fns and generated
//!   service glue all fit the same table

pub mod dispatch;
pub mod handler;
pub mod route;
pub mod table;

pub use dispatch::REQUEST_ID_HEADER;
pub use handler::{RouteHandler, SharedHandler};
pub use route::RouteSpec;
pub use table::RouteTable;
