//! Pickers - Questions whose choices come from the directory or the cloud inventory

use std::collections::BTreeSet;

use apppack_core::provider::{DatabaseAdmin, EngineVersion};
use apppack_core::{Choice, EngineError, EngineResult, Question, StackType, Widget};
use apppack_directory::{ClusterMember, Directory};

/// Cluster selection; the answer is the cluster stack name
pub async fn cluster_question(directory: &Directory) -> EngineResult<Question> {
    let choices = directory
        .list_clusters()
        .await?
        .into_iter()
        .map(|entry| Choice::new(entry.name.clone(), StackType::Cluster.stack_name(&entry.name)))
        .collect();
    Ok(Question::new("ClusterStackName", "Cluster", Widget::Select(choices))
        .help("The cluster this resource will run in")
        .required())
}

/// Database or Redis selection on a cluster; the answer is the addon stack name
pub async fn addon_question(
    directory: &Directory,
    cluster: &str,
    member: ClusterMember,
) -> EngineResult<Question> {
    let (key, verbose, stack_type) = match member {
        ClusterMember::Database => ("DatabaseStackName", "Database", StackType::Database),
        ClusterMember::Redis => ("RedisStackName", "Redis", StackType::Redis),
        ClusterMember::App => {
            return Err(EngineError::user_input("apps cannot be attached as addons"));
        }
    };
    let entries = directory.list_on_cluster(cluster, member).await?;
    if entries.is_empty() {
        return Err(EngineError::DirectoryEmpty(format!(
            "no {} found on cluster {}",
            member, cluster
        )));
    }
    let choices = entries
        .into_iter()
        .map(|entry| {
            let label = match &entry.engine {
                Some(engine) => format!("{} ({})", entry.name, engine),
                None => entry.name.clone(),
            };
            Choice::new(label, stack_type.stack_name(&entry.name))
        })
        .collect();
    Ok(Question::new(key, verbose, Widget::Select(choices)).required())
}

/// Instance class families no longer offered for new databases
const PREVIOUS_GENERATION: [&str; 8] = [
    "db.m1.", "db.m2.", "db.m3.", "db.m4.", "db.r3.", "db.r4.", "db.t1.", "db.t2.",
];

pub fn is_previous_generation(class: &str) -> bool {
    PREVIOUS_GENERATION.iter().any(|p| class.starts_with(p))
}

/// Orderable database classes, current generation only, sorted
pub async fn database_instance_classes(
    databases: &dyn DatabaseAdmin,
    engine: &str,
    version: &str,
) -> EngineResult<Vec<String>> {
    let classes: BTreeSet<String> = databases
        .orderable_instance_classes(engine, version)
        .await?
        .into_iter()
        .filter(|c| !is_previous_generation(c))
        .collect();
    if classes.is_empty() {
        return Err(EngineError::precondition(format!(
            "no instance classes available for {} {}",
            engine, version
        )));
    }
    Ok(classes.into_iter().collect())
}

/// Newest engine version, skipping `limitless` variants
///
/// Versions are compared component by component, numerically where possible.
pub fn latest_engine_version(versions: &[EngineVersion]) -> Option<String> {
    versions
        .iter()
        .filter(|v| !v.version.contains("limitless"))
        .max_by(|a, b| version_key(&a.version).cmp(&version_key(&b.version)))
        .map(|v| v.version.clone())
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Text(String),
    Number(u64),
}

fn version_key(version: &str) -> Vec<Component> {
    version
        .split(['.', '-', '_'])
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Component::Number(n),
            Err(_) => Component::Text(part.to_string()),
        })
        .collect()
}

pub fn instance_class_question(key: &'static str, classes: Vec<String>) -> Question {
    let choices = classes
        .into_iter()
        .map(|c| Choice::new(c.clone(), c))
        .collect();
    Question::new(key, "Instance class", Widget::Select(choices)).required()
}
