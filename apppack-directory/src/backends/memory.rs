//! In-memory table backend

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::table::{KeyValueTable, TableResult};

/// Table kept in process memory, returned in insertion order
#[derive(Debug, Default)]
pub struct MemoryTable {
    items: Mutex<Vec<(String, String, Value)>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item
    pub fn insert(&self, primary: &str, secondary: &str, value: Value) {
        let mut items = match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = items
            .iter_mut()
            .find(|(p, s, _)| p == primary && s == secondary)
        {
            existing.2 = value;
        } else {
            items.push((primary.to_string(), secondary.to_string(), value));
        }
    }

    fn snapshot(&self) -> Vec<(String, String, Value)> {
        match self.items.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl KeyValueTable for MemoryTable {
    async fn get_item(&self, primary: &str, secondary: &str) -> TableResult<Option<Value>> {
        Ok(self
            .snapshot()
            .into_iter()
            .find(|(p, s, _)| p == primary && s == secondary)
            .map(|(_, _, v)| v))
    }

    async fn query(&self, primary: &str, prefix: &str) -> TableResult<Vec<Value>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|(p, s, _)| p == primary && s.starts_with(prefix))
            .map(|(_, _, v)| v)
            .collect())
    }
}
