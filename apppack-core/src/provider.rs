//! Provider - Gateway traits over the cloud services the engine drives
//!
//! Each trait is a narrow capability surface. The AWS crate implements them
//! against the SDK; `testing::FakeCloud` implements them in memory.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::params::Parameter;
use crate::stack::{Capability, ChangeSetStatus, Stack, StackResource};

/// Coarse classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderErrorKind {
    #[default]
    Other,
    AlreadyExists,
    InProgress,
    NotFound,
    /// An update that would change nothing
    NoChange,
}

/// Error type for gateway operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub kind: ProviderErrorKind,
    pub stack_name: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref name) = self.stack_name {
            write!(f, "[{}] {}", name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ProviderErrorKind::Other,
            stack_name: None,
            cause: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ProviderErrorKind::NotFound)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ProviderErrorKind::AlreadyExists)
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ProviderErrorKind::InProgress)
    }

    pub fn no_change(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ProviderErrorKind::NoChange)
    }

    pub fn with_kind(mut self, kind: ProviderErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn for_stack(mut self, name: impl Into<String>) -> Self {
        self.stack_name = Some(name.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    pub fn is_no_change(&self) -> bool {
        self.kind == ProviderErrorKind::NoChange
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Where the template for a stack mutation comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Url(String),
    /// Reuse the template already attached to the stack
    Previous,
}

/// Inputs of a create or update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template: TemplateSource,
    pub parameters: Vec<Parameter>,
    pub capabilities: Vec<Capability>,
    pub tags: Vec<(String, String)>,
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetType {
    Create,
    Update,
}

impl ChangeSetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetType::Create => "create",
            ChangeSetType::Update => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetInput {
    pub name: String,
    pub change_set_type: ChangeSetType,
    pub request: StackRequest,
}

/// Identity of a created changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetRef {
    pub id: String,
    pub stack_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetDescription {
    pub status: ChangeSetStatus,
    pub reason: Option<String>,
}

/// Infrastructure-as-code service
#[async_trait]
pub trait StackService: Send + Sync {
    /// Returns the new stack id
    async fn create_stack(&self, request: &StackRequest) -> ProviderResult<String>;

    async fn update_stack(&self, request: &StackRequest) -> ProviderResult<String>;

    async fn delete_stack(&self, stack_id: &str, role_arn: Option<&str>) -> ProviderResult<()>;

    /// Look up a stack by name or id. Deleted stacks are only visible by id.
    async fn describe_stack(&self, name_or_id: &str) -> ProviderResult<Option<Stack>>;

    /// All live stacks in the region
    async fn describe_stacks(&self) -> ProviderResult<Vec<Stack>>;

    async fn describe_stack_resources(&self, stack_id: &str) -> ProviderResult<Vec<StackResource>>;

    async fn create_change_set(&self, input: &ChangeSetInput) -> ProviderResult<ChangeSetRef>;

    async fn describe_change_set(&self, change_set_id: &str)
    -> ProviderResult<ChangeSetDescription>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    SecureString,
}

/// Parameter store
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get(&self, name: &str) -> ProviderResult<Option<String>>;

    /// Names and values under a path, recursively, decrypted
    async fn by_path(&self, path: &str) -> ProviderResult<Vec<(String, String)>>;

    async fn put(
        &self,
        name: &str,
        value: &str,
        kind: ParameterType,
        overwrite: bool,
    ) -> ProviderResult<()>;

    /// Returns whether a parameter was removed
    async fn delete(&self, name: &str) -> ProviderResult<bool>;

    async fn list_tags(&self, name: &str) -> ProviderResult<Vec<(String, String)>>;
}

#[async_trait]
pub trait LoadBalancerAdmin: Send + Sync {
    async fn set_deletion_protection(&self, arn: &str, enabled: bool) -> ProviderResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub version: String,
    pub default: bool,
}

#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Distinct instance classes orderable for an engine version
    async fn orderable_instance_classes(
        &self,
        engine: &str,
        version: &str,
    ) -> ProviderResult<Vec<String>>;

    async fn engine_versions(&self, engine: &str) -> ProviderResult<Vec<EngineVersion>>;

    async fn set_instance_deletion_protection(&self, id: &str, enabled: bool)
    -> ProviderResult<()>;

    async fn set_cluster_deletion_protection(&self, id: &str, enabled: bool) -> ProviderResult<()>;
}

#[async_trait]
pub trait CacheAdmin: Send + Sync {
    async fn node_types(&self) -> ProviderResult<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
    pub private: bool,
    pub name_servers: Vec<String>,
}

#[async_trait]
pub trait DnsService: Send + Sync {
    /// Zones whose names sort at or after `dns_name`, as the listing API returns them
    async fn hosted_zones_by_name(&self, dns_name: &str) -> ProviderResult<Vec<HostedZone>>;

    async fn get_hosted_zone(&self, id: &str) -> ProviderResult<HostedZone>;
}

#[async_trait]
pub trait BuildService: Send + Sync {
    /// Server types (e.g. `GITHUB`) that have source credentials configured
    async fn source_credential_servers(&self) -> ProviderResult<Vec<String>>;
}

/// The full set of services an engine invocation talks to
#[derive(Clone)]
pub struct Gateway {
    pub region: String,
    pub stacks: Arc<dyn StackService>,
    pub parameters: Arc<dyn ParameterStore>,
    pub load_balancers: Arc<dyn LoadBalancerAdmin>,
    pub databases: Arc<dyn DatabaseAdmin>,
    pub caches: Arc<dyn CacheAdmin>,
    pub dns: Arc<dyn DnsService>,
    pub builds: Arc<dyn BuildService>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
