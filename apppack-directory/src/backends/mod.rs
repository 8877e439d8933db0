//! Table backend implementations

mod dynamodb;
mod memory;

pub use dynamodb::DynamoTable;
pub use memory::MemoryTable;

use crate::table::{KeyValueTable, TableConfig, TableError, TableResult};

/// Create a table backend from configuration
pub async fn create_table(config: &TableConfig) -> TableResult<Box<dyn KeyValueTable>> {
    match config.backend_type.as_str() {
        "dynamodb" => {
            let table = DynamoTable::from_config(config).await?;
            Ok(Box::new(table))
        }
        "memory" => Ok(Box::new(MemoryTable::new())),
        other => Err(TableError::unsupported_backend(other)),
    }
}
