//! Postgres backend: renders descriptors to parameterized SQL.
//!
//! Identifiers are quoted, values always bind as parameters. Platform
//! procedures are plain Postgres functions returning `jsonb`; a `RAISE`
//! inside one surfaces as a procedure failure.

use super::Backend;
use crate::error::ApiError;
use crate::query::{Direction, Projection, Query};
use crate::rpc::Procedure;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgPoolOptions, PgTypeInfo, Postgres};
use sqlx::{Database, PgPool, Row};

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        PgBackend { pool }
    }

    /// Connect with a small pool; transport timeouts live in the pool options.
    pub async fn connect(database_url: &str) -> Result<Self, ApiError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(PgBackend { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Quote an identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn projection_sql(projection: &Projection) -> String {
    match projection {
        Projection::All => "*".to_string(),
        Projection::Columns(cols) => cols
            .iter()
            .map(|c| quoted(c))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Rendered statement plus its bind values, in placeholder order.
struct Statement {
    sql: String,
    params: Vec<Value>,
}

fn render_select(query: &Query) -> Statement {
    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {}",
        projection_sql(&query.projection),
        quoted(&query.collection)
    );
    if !query.filters.is_empty() {
        let conds: Vec<String> = query
            .filters
            .iter()
            .map(|(field, value)| {
                params.push(value.clone());
                format!("{} = ${}", quoted(field), params.len())
            })
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conds.join(" AND "));
    }
    if let Some(order) = &query.order {
        let dir = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {} {}", quoted(&order.column), dir));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Statement { sql, params }
}

fn render_insert(collection: &str, record: &Map<String, Value>) -> Statement {
    let table = quoted(collection);
    if record.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table),
            params: Vec::new(),
        };
    }
    let mut cols = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());
    for (name, value) in record {
        params.push(value.clone());
        cols.push(quoted(name));
        placeholders.push(format!("${}", params.len()));
    }
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            cols.join(", "),
            placeholders.join(", ")
        ),
        params,
    }
}

fn render_update(collection: &str, id: &Value, patch: &Map<String, Value>) -> Statement {
    let table = quoted(collection);
    let mut params = Vec::with_capacity(patch.len() + 1);
    let mut sets = Vec::with_capacity(patch.len());
    for (name, value) in patch {
        if name == "id" {
            continue;
        }
        params.push(value.clone());
        sets.push(format!("{} = ${}", quoted(name), params.len()));
    }
    if sets.is_empty() {
        // Nothing to change; read the row back so merge semantics hold.
        return Statement {
            sql: format!("SELECT * FROM {} WHERE {} = $1", table, quoted("id")),
            params: vec![id.clone()],
        };
    }
    params.push(id.clone());
    Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ${} RETURNING *",
            table,
            sets.join(", "),
            quoted("id"),
            params.len()
        ),
        params,
    }
}

fn render_call(procedure: &Procedure) -> Statement {
    let params_def = procedure.params();
    let mut params = Vec::with_capacity(params_def.len());
    let args: Vec<String> = params_def
        .into_iter()
        .map(|(name, value)| {
            params.push(value);
            format!("{} => ${}", name, params.len())
        })
        .collect();
    Statement {
        sql: format!("SELECT {}({}) AS result", procedure.name(), args.join(", ")),
        params,
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, ApiError> {
        let stmt = render_select(query);
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "select");
        let rows = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn insert(
        &self,
        collection: &str,
        record: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let stmt = render_insert(collection, record);
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "insert");
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_one(&self.pool)
            .await?;
        Ok(row_to_record(&row))
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &Value,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, ApiError> {
        let stmt = render_update(collection, id, patch);
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "update");
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn delete_by_id(&self, collection: &str, id: &Value) -> Result<u64, ApiError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quoted(collection),
            quoted("id")
        );
        tracing::debug!(sql = %sql, id = ?id, "delete");
        let done = sqlx::query(&sql)
            .bind(PgBindValue::from_json(id))
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn call(&self, procedure: &Procedure) -> Result<Value, ApiError> {
        let stmt = render_call(procedure);
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "call");
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) => ApiError::procedure(procedure.name(), db.message()),
                other => ApiError::from(other),
            })?;
        row.try_get::<Option<Value>, _>("result")
            .map(|v| v.unwrap_or(Value::Null))
            .map_err(|e| ApiError::procedure(procedure.name(), e.to_string()))
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn bind_all<'q>(mut query: PgQuery<'q>, params: &[Value]) -> PgQuery<'q> {
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

/// A value bindable to a PostgreSQL placeholder, converted from JSON.
#[derive(Clone, Debug)]
enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Json(Value),
}

impl PgBindValue {
    fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => match uuid::Uuid::parse_str(s) {
                Ok(u) => PgBindValue::Uuid(u),
                Err(_) => PgBindValue::String(s.clone()),
            },
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Uuid(u) => {
                let u_str = u.to_string();
                <&str as Encode<Postgres>>::encode_by_ref(&u_str.as_str(), buf)?
            }
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    let mut map = Map::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), cell_to_value(row, col.name()));
    }
    Value::Object(map)
}

/// Decode one cell to JSON by probing the types the platform schema uses.
fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
