//! Resource kinds
//!
//! Each kind couples a typed parameter record with the policy the driver
//! needs: naming, tags, questions, internal fields and lifecycle hooks.

mod account;
mod app;
mod cluster;
mod custom_domain;
mod database;
mod redis;
mod region;
mod review_app;

pub use account::{Account, AccountParameters};
pub use app::{App, AppParameters};
pub use cluster::{Cluster, ClusterParameters};
pub use custom_domain::{CustomDomain, CustomDomainParameters};
pub use database::{Database, DatabaseEngine, DatabaseParameters};
pub use redis::{Redis, RedisParameters, auth_token_parameter};
pub use region::{Region, RegionParameters};
pub use review_app::{ReviewApp, ReviewAppParameters};

use apppack_core::params::{FieldKind, FieldSpec, ParameterRecord, stateful_violations};
use apppack_core::{EngineError, EngineResult, FlagValues, Stack, StackKind, StackType};
use async_trait::async_trait;

use crate::session::Session;

/// Default name for clusters, databases and Redis instances
pub const DEFAULT_NAME: &str = "apppack";

/// A flag accepted by a kind that does not map onto a record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFlag {
    pub flag: &'static str,
    pub kind: FieldKind,
    pub help: &'static str,
}

/// A resource kind as driven by the create/modify/upgrade/destroy operations
#[async_trait]
pub trait Resource: StackKind {
    /// Copy user-provided flags onto the record, returning the bound keys
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>>;

    /// Fill remaining fields interactively
    async fn ask_questions(
        &mut self,
        _session: &Session,
        _bound: &[&'static str],
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        Ok(())
    }

    /// Fill fields the user never sees
    async fn set_internal_fields(
        &mut self,
        _session: &Session,
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        Ok(())
    }

    /// Checks that must pass before any mutation
    async fn preflight(&self, _session: &Session, _current: Option<&Stack>) -> EngineResult<()> {
        Ok(())
    }

    /// Load anything the delete path needs (e.g. a service role)
    async fn prepare_destroy(&mut self, _session: &Session) -> EngineResult<()> {
        Ok(())
    }
}

/// Record fields of a kind, used to declare its CLI flags
pub fn field_specs(stack_type: StackType) -> Vec<FieldSpec> {
    match stack_type {
        StackType::Account => AccountParameters::fields(),
        StackType::Region => RegionParameters::fields(),
        StackType::Cluster => ClusterParameters::fields(),
        StackType::App | StackType::Pipeline => AppParameters::fields(),
        StackType::Database => DatabaseParameters::fields(),
        StackType::Redis => RedisParameters::fields(),
        StackType::CustomDomain => CustomDomainParameters::fields(),
        StackType::ReviewApp => ReviewAppParameters::fields(),
    }
}

/// Flags a kind reads outside its record
pub fn extra_flags(stack_type: StackType) -> Vec<ExtraFlag> {
    match stack_type {
        StackType::Database => vec![
            ExtraFlag {
                flag: "engine",
                kind: FieldKind::String,
                help: "database engine: mysql or postgres",
            },
            ExtraFlag {
                flag: "aurora",
                kind: FieldKind::Bool,
                help: "use Aurora",
            },
        ],
        StackType::App | StackType::Pipeline => vec![
            ExtraFlag {
                flag: "addon-database",
                kind: FieldKind::Bool,
                help: "attach a database (pick it interactively)",
            },
            ExtraFlag {
                flag: "addon-redis",
                kind: FieldKind::Bool,
                help: "attach a Redis instance (pick it interactively)",
            },
        ],
        _ => Vec::new(),
    }
}

/// Build the kind for `stack_type` named `name`
pub fn new_resource(
    stack_type: StackType,
    name: &str,
    session: &Session,
) -> EngineResult<Box<dyn Resource>> {
    let name = name.trim();
    let require_name = |what: &str| {
        if name.is_empty() {
            Err(EngineError::user_input(format!("{} name is required", what)))
        } else {
            Ok(name.to_string())
        }
    };
    let or_default = || {
        if name.is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            name.to_string()
        }
    };

    Ok(match stack_type {
        StackType::Account => Box::new(Account::new()),
        StackType::Region => Box::new(Region::new(session.region())),
        StackType::Cluster => Box::new(Cluster::new(&or_default())),
        StackType::App => Box::new(App::new(&require_name("app")?, false)),
        StackType::Pipeline => Box::new(App::new(&require_name("pipeline")?, true)),
        StackType::Database => Box::new(Database::new(&or_default())),
        StackType::Redis => Box::new(Redis::new(&or_default())),
        StackType::CustomDomain => Box::new(CustomDomain::new(&require_name("domain")?)),
        StackType::ReviewApp => Box::new(ReviewApp::new(&require_name("review app")?)?),
    })
}

/// Reject a modify that changes a stateful field the stack already holds
pub(crate) fn check_stateful<R: ParameterRecord>(
    record: &R,
    current: Option<&Stack>,
) -> EngineResult<()> {
    let Some(current) = current else {
        return Ok(());
    };
    let violations = stateful_violations(record, &current.parameters);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(EngineError::precondition(format!(
            "{} cannot be changed once set on {}",
            violations.join(", "),
            current.stack_name
        )))
    }
}

/// Whether the questionnaire will actually prompt for `key`
///
/// Directory-backed questions are only built when this holds.
pub(crate) fn will_prompt<R: ParameterRecord>(
    session: &Session,
    key: &str,
    bound: &[&'static str],
    current: Option<&Stack>,
) -> bool {
    if !session.questionnaire.is_interactive() || bound.contains(&key) {
        return false;
    }
    let locked = R::field(key).is_some_and(|spec| spec.stateful)
        && current
            .and_then(|stack| stack.parameter(key))
            .is_some_and(|v| !v.is_empty());
    !locked
}

/// Short cluster name from a cluster stack name
pub(crate) fn cluster_short_name(cluster_stack_name: &str) -> &str {
    cluster_stack_name
        .strip_prefix("apppack-cluster-")
        .unwrap_or(cluster_stack_name)
}

/// Require that a referenced cluster stack exists and is ours
pub(crate) async fn require_cluster(
    session: &Session,
    cluster_stack_name: &str,
) -> EngineResult<Stack> {
    if cluster_stack_name.is_empty() {
        return Err(EngineError::user_input("a cluster is required (--cluster)"));
    }
    session
        .driver()
        .load_owned(cluster_stack_name)
        .await
        .map_err(|e| match e {
            EngineError::Precondition(_) => EngineError::precondition(format!(
                "cluster {} does not exist",
                cluster_short_name(cluster_stack_name)
            )),
            other => other,
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use apppack_core::testing::{FakeCloud, ScriptedPrompter};
    use apppack_core::{LogReporter, Questionnaire};
    use apppack_directory::{Directory, MemoryTable};
    use serde_json::json;

    use crate::session::{Context, Session};
    use crate::settings::Settings;

    fn seeded_table() -> MemoryTable {
        let table = MemoryTable::new();
        table.insert(
            "CLUSTERS",
            "CLUSTER#apppack",
            json!({"stack_id": "id", "stack_name": "apppack-cluster-apppack", "name": "apppack"}),
        );
        table.insert(
            "CLUSTERS",
            "apppack#DATABASE#main",
            json!({"stack_id": "id", "stack_name": "apppack-database-main", "name": "main", "engine": "postgres"}),
        );
        table
    }

    pub fn session(cloud: &Arc<FakeCloud>, prompter: ScriptedPrompter, interactive: bool) -> Session {
        session_with_table(cloud, Arc::new(prompter), interactive, seeded_table())
    }

    /// Interactive session whose prompter the test keeps a handle on
    pub fn session_with_prompter(cloud: &Arc<FakeCloud>, prompter: Arc<ScriptedPrompter>) -> Session {
        session_with_table(cloud, prompter, true, seeded_table())
    }

    pub fn session_with_table(
        cloud: &Arc<FakeCloud>,
        prompter: Arc<ScriptedPrompter>,
        interactive: bool,
        table: MemoryTable,
    ) -> Session {
        Session {
            context: Context {
                non_interactive: !interactive,
                ..Default::default()
            },
            settings: Settings {
                poll_interval: std::time::Duration::ZERO,
                ..Default::default()
            },
            gateway: cloud.gateway(),
            directory: Directory::new(Arc::new(table)),
            questionnaire: Questionnaire::new(prompter, interactive),
            reporter: Arc::new(LogReporter),
        }
    }
}
