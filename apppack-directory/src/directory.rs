//! Directory queries over the key-value table
//!
//! Entries are written by custom resources inside the stack templates; the
//! engine only reads them.

use std::fmt;
use std::sync::Arc;

use apppack_core::provider::StackService;
use apppack_core::{EngineError, ProviderError, Stack};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{KeyValueTable, TableError};

const CLUSTERS: &str = "CLUSTERS";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A required lookup returned no rows
    #[error("{0}")]
    Empty(String),

    #[error("{0} not found in the directory")]
    NotFound(String),

    #[error("directory entry {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

impl From<DirectoryError> for EngineError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Empty(message) => EngineError::DirectoryEmpty(message),
            DirectoryError::NotFound(message) => {
                EngineError::precondition(format!("{} not found in the directory", message))
            }
            DirectoryError::Provider(e) => EngineError::Provider(e),
            other => EngineError::Provider(ProviderError::new(other.to_string())),
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// A directory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub stack_id: String,
    pub stack_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

/// Resources registered under a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterMember {
    Database,
    Redis,
    App,
}

impl ClusterMember {
    pub fn as_key(&self) -> &'static str {
        match self {
            ClusterMember::Database => "DATABASE",
            ClusterMember::Redis => "REDIS",
            ClusterMember::App => "APP",
        }
    }
}

impl fmt::Display for ClusterMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterMember::Database => "databases",
            ClusterMember::Redis => "Redis instances",
            ClusterMember::App => "apps",
        };
        write!(f, "{}", name)
    }
}

/// Settings record an app stack publishes on completion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub cluster: Option<DirectoryEntry>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub log_group: Option<String>,
    #[serde(default)]
    pub task_families: Vec<String>,
}

#[derive(Clone)]
pub struct Directory {
    table: Arc<dyn KeyValueTable>,
}

impl Directory {
    pub fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self { table }
    }

    /// All registered clusters; an empty directory is an error
    pub async fn list_clusters(&self) -> DirectoryResult<Vec<DirectoryEntry>> {
        let entries = self.list(CLUSTERS, "CLUSTER#").await?;
        if entries.is_empty() {
            return Err(DirectoryError::Empty(
                "no AppPack clusters are installed, run `apppack create cluster` first".to_string(),
            ));
        }
        Ok(entries)
    }

    /// Resources of one kind registered on `cluster`
    pub async fn list_on_cluster(
        &self,
        cluster: &str,
        member: ClusterMember,
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.list(CLUSTERS, &format!("{}#{}#", cluster, member.as_key()))
            .await
    }

    /// Look up one entry
    pub async fn entry(&self, primary: &str, secondary: &str) -> DirectoryResult<DirectoryEntry> {
        let key = format!("{}/{}", primary, secondary);
        let value = self
            .table
            .get_item(primary, secondary)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(key.clone()))?;
        serde_json::from_value(value).map_err(|source| DirectoryError::Decode { key, source })
    }

    pub async fn cluster(&self, name: &str) -> DirectoryResult<DirectoryEntry> {
        self.entry(CLUSTERS, &format!("CLUSTER#{}", name)).await
    }

    pub async fn on_cluster(
        &self,
        cluster: &str,
        member: ClusterMember,
        name: &str,
    ) -> DirectoryResult<DirectoryEntry> {
        self.entry(CLUSTERS, &format!("{}#{}#{}", cluster, member.as_key(), name))
            .await
    }

    /// Resolve an entry's stack id against the IaC service
    pub async fn fetch_stack(
        &self,
        entry: &DirectoryEntry,
        stacks: &dyn StackService,
    ) -> DirectoryResult<Stack> {
        stacks
            .describe_stack(&entry.stack_id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(entry.stack_name.clone()))
    }

    pub async fn app_settings(&self, app: &str) -> DirectoryResult<AppSettings> {
        let key = format!("APP#{}/settings", app);
        let value = self
            .table
            .get_item(&format!("APP#{}", app), "settings")
            .await?
            .ok_or_else(|| DirectoryError::NotFound(key.clone()))?;
        serde_json::from_value(value).map_err(|source| DirectoryError::Decode { key, source })
    }

    async fn list(&self, primary: &str, prefix: &str) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.table
            .query(primary, prefix)
            .await?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|source| DirectoryError::Decode {
                    key: format!("{}/{}", primary, prefix),
                    source,
                })
            })
            .collect()
    }
}
