//! Backend boundary: collection protocol plus procedure protocol.

use crate::error::ApiError;
use crate::query::Query;
use crate::rpc::Procedure;
use async_trait::async_trait;
use serde_json::{Map, Value};

mod memory;
mod postgres;

pub use memory::{MemoryBackend, ProcedureHandler};
pub use postgres::PgBackend;

/// The remote service this layer talks to. One method per wire operation;
/// every call is a single stateless round trip. Implementations own the
/// connection and any transport-level timeouts.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a read described by `query`. Empty result is `Ok(vec![])`.
    async fn select(&self, query: &Query) -> Result<Vec<Value>, ApiError>;

    /// Insert one record and return its canonical stored form, including
    /// server-generated fields.
    async fn insert(&self, collection: &str, record: &Map<String, Value>)
        -> Result<Value, ApiError>;

    /// Merge `patch` into the record with the given id and return the
    /// updated record, or `None` when the id resolves nothing.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &Value,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, ApiError>;

    /// Remove the record with the given id; returns how many records were
    /// removed (zero when the id was already absent).
    async fn delete_by_id(&self, collection: &str, id: &Value) -> Result<u64, ApiError>;

    /// Invoke a server-side procedure and return its opaque result.
    async fn call(&self, procedure: &Procedure) -> Result<Value, ApiError>;
}
