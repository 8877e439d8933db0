//! Key-value table trait and error types

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when reading the directory table
#[derive(Debug, Error)]
pub enum TableError {
    /// The backend type is not supported
    #[error("Unsupported table backend: {0}")]
    UnsupportedBackend(String),

    /// Configuration error
    #[error("Table configuration error: {0}")]
    Configuration(String),

    /// Item could not be converted to JSON
    #[error("Malformed item {primary}/{secondary}: {message}")]
    Malformed {
        primary: String,
        secondary: String,
        message: String,
    },

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),
}

impl TableError {
    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type TableResult<T> = Result<T, TableError>;

/// Read access to a table keyed by `(primary_id, secondary_id)`
///
/// Items expose their `value` attribute as JSON.
#[async_trait]
pub trait KeyValueTable: Send + Sync {
    async fn get_item(&self, primary: &str, secondary: &str) -> TableResult<Option<Value>>;

    /// Items under `primary` whose secondary id starts with `prefix`, in table order
    async fn query(&self, primary: &str, prefix: &str) -> TableResult<Vec<Value>>;
}

/// Configuration for a table backend
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// `dynamodb` or `memory`
    pub backend_type: String,
    pub table_name: String,
    pub region: String,
}
