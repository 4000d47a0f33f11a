//! Dropship SDK: data-access client for the dropshipping operations platform.
//!
//! Mediates between dashboard consumers and the platform backend: a query
//! builder for equality-filtered reads, a CRUD executor over named
//! collections of dynamically-shaped records, and typed wrappers for the
//! platform's server-side procedures.

pub mod backend;
pub mod client;
pub mod error;
pub mod query;
pub mod rpc;

pub use backend::{Backend, MemoryBackend, PgBackend, ProcedureHandler};
pub use client::Client;
pub use error::ApiError;
pub use query::{Direction, OrderBy, Projection, Query};
pub use rpc::{Procedure, RpcDefaults};
