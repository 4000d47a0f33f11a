//! Query descriptors: projection, equality filters, ordering, limit.
//!
//! The descriptor is a closed structure. Equality is the only predicate kind
//! the platform supports at this layer; multiple filters are ANDed. Field
//! names are not validated here, the backend rejects unknown columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column projection for a read. `All` renders as `*`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::All
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sort specification: one column, ascending unless stated otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// Fully-resolved read specification for one collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub projection: Projection,
    /// Equality conditions, all of which must hold. Applied in insertion
    /// order when the backend binds parameters.
    pub filters: Vec<(String, Value)>,
    pub order: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Query {
            collection: collection.into(),
            projection: Projection::All,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict the projection to the given columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Projection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add one equality condition; repeat calls AND together.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Shorthand for the single-row lookup every id-targeted operation uses.
    pub fn by_id(collection: impl Into<String>, id: Value) -> Self {
        Query::new(collection).filter("id", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_open() {
        let q = Query::new("tasks");
        assert_eq!(q.projection, Projection::All);
        assert!(q.filters.is_empty());
        assert!(q.order.is_none());
        assert!(q.limit.is_none());
    }

    #[test]
    fn filters_accumulate_in_order() {
        let q = Query::new("tasks")
            .filter("status", "NEEDS_REVIEW")
            .filter("agent_id", 7);
        assert_eq!(
            q.filters,
            vec![
                ("status".to_string(), json!("NEEDS_REVIEW")),
                ("agent_id".to_string(), json!(7)),
            ]
        );
    }

    #[test]
    fn by_id_targets_the_id_field() {
        let q = Query::by_id("listings", json!(42));
        assert_eq!(q.filters, vec![("id".to_string(), json!(42))]);
    }
}
