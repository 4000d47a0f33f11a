//! In-memory backend: same contract as Postgres, no server.
//!
//! Used by the test suite and for offline development. Collections live in a
//! process-local map; procedures run registered handlers so tests can script
//! server-side behavior. Ids are assigned sequentially when a record arrives
//! without one.

use super::Backend;
use crate::error::ApiError;
use crate::query::{Direction, Projection, Query};
use crate::rpc::Procedure;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::RwLock;

/// Scripted implementation of one server-side procedure.
pub type ProcedureHandler =
    Box<dyn Fn(&[(&'static str, Value)]) -> Result<Value, ApiError> + Send + Sync>;

pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
    procedures: RwLock<HashMap<String, ProcedureHandler>>,
    next_id: AtomicI64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            collections: RwLock::new(HashMap::new()),
            procedures: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Preload a collection with records. Records without an `id` get one.
    pub fn seed(&self, collection: &str, records: Vec<Value>) {
        let mut store = self.collections.write().unwrap();
        let rows = store.entry(collection.to_string()).or_default();
        for record in records {
            if let Value::Object(mut map) = record {
                if !map.contains_key("id") {
                    map.insert("id".into(), Value::from(self.allocate_id()));
                }
                rows.push(map);
            }
        }
    }

    /// Script a procedure. Unregistered procedures fail when called, the
    /// same way an undeployed function does on the real backend.
    pub fn register_procedure(&self, name: &str, handler: ProcedureHandler) {
        self.procedures
            .write()
            .unwrap()
            .insert(name.to_string(), handler);
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

fn matches_filters(record: &Map<String, Value>, filters: &[(String, Value)]) -> bool {
    filters
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

/// Total order over JSON values, numbers before strings, nulls last, close
/// enough to backend collation for the sorts the dashboard issues.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn project(record: &Map<String, Value>, projection: &Projection) -> Value {
    match projection {
        Projection::All => Value::Object(record.clone()),
        Projection::Columns(cols) => {
            let mut out = Map::new();
            for col in cols {
                if let Some(v) = record.get(col) {
                    out.insert(col.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, ApiError> {
        let store = self.collections.read().unwrap();
        let rows = store.get(&query.collection).cloned().unwrap_or_default();
        let mut matched: Vec<&Map<String, Value>> = rows
            .iter()
            .filter(|r| matches_filters(r, &query.filters))
            .collect();
        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let av = a.get(&order.column).unwrap_or(&Value::Null);
                let bv = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = compare_values(av, bv);
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched
            .into_iter()
            .map(|r| project(r, &query.projection))
            .collect())
    }

    async fn insert(
        &self,
        collection: &str,
        record: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let mut stored = record.clone();
        if !stored.contains_key("id") {
            stored.insert("id".into(), Value::from(self.allocate_id()));
        }
        let mut store = self.collections.write().unwrap();
        let rows = store.entry(collection.to_string()).or_default();
        if rows.iter().any(|r| r.get("id") == stored.get("id")) {
            return Err(ApiError::Constraint(format!(
                "duplicate id in {}",
                collection
            )));
        }
        rows.push(stored.clone());
        Ok(Value::Object(stored))
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &Value,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, ApiError> {
        let mut store = self.collections.write().unwrap();
        let Some(rows) = store.get_mut(collection) else {
            return Ok(None);
        };
        for row in rows.iter_mut() {
            if row.get("id") == Some(id) {
                for (k, v) in patch {
                    if k == "id" {
                        continue;
                    }
                    row.insert(k.clone(), v.clone());
                }
                return Ok(Some(Value::Object(row.clone())));
            }
        }
        Ok(None)
    }

    async fn delete_by_id(&self, collection: &str, id: &Value) -> Result<u64, ApiError> {
        let mut store = self.collections.write().unwrap();
        let Some(rows) = store.get_mut(collection) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| r.get("id") != Some(id));
        Ok((before - rows.len()) as u64)
    }

    async fn call(&self, procedure: &Procedure) -> Result<Value, ApiError> {
        let name = procedure.name();
        let params = procedure.params();
        let procedures = self.procedures.read().unwrap();
        match procedures.get(name) {
            Some(handler) => handler(&params),
            None => Err(ApiError::procedure(name, "no such procedure")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn seeded_records_without_id_get_one() {
        let backend = MemoryBackend::new();
        backend.seed("agents", vec![json!({"name": "sourcing"})]);
        let rows = backend.select(&Query::new("agents")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("id").is_some());
    }

    #[tokio::test]
    async fn duplicate_id_insert_is_a_constraint_error() {
        let backend = MemoryBackend::new();
        backend.seed("agents", vec![json!({"id": 1, "name": "a"})]);
        let mut dup = Map::new();
        dup.insert("id".into(), json!(1));
        let err = backend.insert("agents", &dup).await.unwrap_err();
        assert!(matches!(err, ApiError::Constraint(_)));
    }

    #[tokio::test]
    async fn unregistered_procedure_fails() {
        let backend = MemoryBackend::new();
        let err = backend.call(&Procedure::GetSystemState).await.unwrap_err();
        assert!(matches!(err, ApiError::Procedure { .. }));
    }
}
