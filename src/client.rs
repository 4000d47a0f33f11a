//! The dashboard-facing facade: CRUD over named collections plus the
//! platform's procedure wrappers.
//!
//! Every method is one stateless round trip. No caching, retries, or
//! transactions here; multi-step sequences are the caller's responsibility.

use crate::backend::Backend;
use crate::error::ApiError;
use crate::query::{Projection, Query};
use crate::rpc::{Procedure, RpcDefaults};
use chrono::NaiveDate;
use serde_json::{Map, Value};

pub struct Client<B: Backend> {
    backend: B,
    defaults: RpcDefaults,
}

impl<B: Backend> Client<B> {
    pub fn new(backend: B) -> Self {
        Client {
            backend,
            defaults: RpcDefaults::default(),
        }
    }

    pub fn with_defaults(backend: B, defaults: RpcDefaults) -> Self {
        Client { backend, defaults }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Execute a read. Empty result is `Ok(vec![])`, never an error.
    pub async fn get_all(&self, query: Query) -> Result<Vec<Value>, ApiError> {
        self.backend.select(&query).await
    }

    /// Fetch the one record whose id matches. Zero matches is `NotFound`,
    /// several matches is `Cardinality`; neither is a null success.
    pub async fn get_by_id(&self, collection: &str, id: Value) -> Result<Value, ApiError> {
        self.get_by_id_with(collection, id, Projection::All).await
    }

    pub async fn get_by_id_with(
        &self,
        collection: &str,
        id: Value,
        projection: Projection,
    ) -> Result<Value, ApiError> {
        let mut query = Query::by_id(collection, id.clone());
        query.projection = projection;
        let mut rows = self.backend.select(&query).await?;
        match rows.len() {
            0 => Err(ApiError::not_found(collection, &id)),
            1 => Ok(rows.remove(0)),
            n => Err(ApiError::cardinality(collection, &id, n)),
        }
    }

    /// Insert one record; returns the canonical stored form including
    /// server-generated fields such as the id.
    pub async fn create(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<Value, ApiError> {
        self.backend.insert(collection, &data).await
    }

    /// Merge `patch` into the record with the given id; fields absent from
    /// the patch are left unchanged. Returns the full updated record.
    pub async fn update(
        &self,
        collection: &str,
        id: Value,
        patch: Map<String, Value>,
    ) -> Result<Value, ApiError> {
        self.backend
            .update_by_id(collection, &id, &patch)
            .await?
            .ok_or_else(|| ApiError::not_found(collection, &id))
    }

    /// Remove the record with the given id. Deleting an id that is already
    /// absent is `NotFound`, not a silent success.
    pub async fn delete(&self, collection: &str, id: Value) -> Result<(), ApiError> {
        let removed = self.backend.delete_by_id(collection, &id).await?;
        if removed == 0 {
            return Err(ApiError::not_found(collection, &id));
        }
        Ok(())
    }

    /// Invoke a procedure and return its opaque result.
    pub async fn invoke(&self, procedure: Procedure) -> Result<Value, ApiError> {
        self.backend.call(&procedure).await
    }

    pub async fn get_system_state(&self) -> Result<Value, ApiError> {
        self.invoke(Procedure::GetSystemState).await
    }

    pub async fn get_top_products(
        &self,
        limit: Option<u32>,
        days: Option<u32>,
    ) -> Result<Value, ApiError> {
        self.invoke(Procedure::GetTopProducts {
            limit: limit.unwrap_or(self.defaults.top_products_limit),
            days: days.unwrap_or(self.defaults.top_products_days),
        })
        .await
    }

    pub async fn get_agent_stats(&self, days: Option<u32>) -> Result<Value, ApiError> {
        self.invoke(Procedure::GetAgentStats {
            days: days.unwrap_or(self.defaults.agent_stats_days),
        })
        .await
    }

    /// `None` asks the backend for its current day.
    pub async fn get_daily_analytics(&self, date: Option<NaiveDate>) -> Result<Value, ApiError> {
        self.invoke(Procedure::GetDailyAnalytics { date }).await
    }

    pub async fn validate_price_change(
        &self,
        listing_id: i64,
        new_price: f64,
        max_change_percent: Option<f64>,
    ) -> Result<Value, ApiError> {
        self.invoke(Procedure::ValidatePriceChange {
            listing_id,
            new_price,
            max_change_percent: max_change_percent
                .unwrap_or(self.defaults.max_price_change_percent),
        })
        .await
    }
}
