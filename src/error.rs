//! Typed errors for collection and procedure calls.

use thiserror::Error;

/// Failure of a data-access operation. Closed set so callers can branch on
/// failure kind instead of inspecting message strings.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection, pool, or protocol failure between us and the backend.
    #[error("transport: {0}")]
    Transport(String),
    /// Backend-reported constraint or validation violation on a write.
    #[error("constraint: {0}")]
    Constraint(String),
    /// A single-row operation resolved zero rows.
    #[error("not found: {collection} id '{id}'")]
    NotFound { collection: String, id: String },
    /// A single-row fetch matched more than one row.
    #[error("expected one row in {collection} for id '{id}', got {count}")]
    Cardinality {
        collection: String,
        id: String,
        count: usize,
    },
    /// A server-side procedure failed, including server-side argument
    /// validation.
    #[error("procedure '{name}': {message}")]
    Procedure { name: String, message: String },
}

impl ApiError {
    pub fn not_found(collection: &str, id: &serde_json::Value) -> Self {
        ApiError::NotFound {
            collection: collection.to_string(),
            id: id_display(id),
        }
    }

    pub fn cardinality(collection: &str, id: &serde_json::Value, count: usize) -> Self {
        ApiError::Cardinality {
            collection: collection.to_string(),
            id: id_display(id),
            count,
        }
    }

    pub fn procedure(name: &str, message: impl Into<String>) -> Self {
        ApiError::Procedure {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Render an id for error messages without JSON string quoting.
fn id_display(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                // Postgres class 23 is integrity constraint violation,
                // class 22 is a data exception raised on bad values.
                let code = db.code().unwrap_or_default();
                if code.starts_with("23") || code.starts_with("22") {
                    ApiError::Constraint(db.message().to_string())
                } else {
                    ApiError::Transport(e.to_string())
                }
            }
            _ => ApiError::Transport(e.to_string()),
        }
    }
}
