use std::fmt;

use apppack_core::params::{decode_into, encode};
use apppack_core::{
    Choice, CodecError, EngineError, EngineResult, FlagValues, Parameter, ProtectedResource,
    Question, Stack, StackKind, StackType, Widget, flags, parameter_record,
};
use async_trait::async_trait;
use log::debug;

use super::{Resource, cluster_short_name, will_prompt};
use crate::pickers;
use crate::secrets;
use crate::session::Session;

parameter_record! {
    pub struct DatabaseParameters {
        cluster_stack_name: String => "ClusterStackName"
            .flag_format("cluster", "apppack-cluster-{}")
            .stateful(),
        name: String => "Name",
        instance_class: String => "InstanceClass".flag("instance-class"),
        engine: String => "Engine".stateful(),
        engine_version: String => "EngineVersion",
        one_time_password: String => "OneTimePassword",
        multi_az: bool => "MultiAZ".yes_no().flag("multi-az"),
        allocated_storage: i64 => "AllocatedStorage".flag("allocated-storage"),
        max_allocated_storage: i64 => "MaxAllocatedStorage".flag("max-allocated-storage"),
    }
}

/// Engine family as named by the database service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseEngine {
    Mysql,
    Postgres,
    AuroraMysql,
    AuroraPostgresql,
}

impl DatabaseEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::Mysql => "mysql",
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::AuroraMysql => "aurora-mysql",
            DatabaseEngine::AuroraPostgresql => "aurora-postgresql",
        }
    }

    /// Combine the `--engine` family with `--aurora`
    pub fn from_family(family: &str, aurora: bool) -> EngineResult<Self> {
        match (family.trim().to_lowercase().as_str(), aurora) {
            ("mysql", false) => Ok(DatabaseEngine::Mysql),
            ("mysql", true) => Ok(DatabaseEngine::AuroraMysql),
            ("postgres" | "postgresql", false) => Ok(DatabaseEngine::Postgres),
            ("postgres" | "postgresql", true) => Ok(DatabaseEngine::AuroraPostgresql),
            (other, _) => Err(EngineError::user_input(format!(
                "unknown database engine '{}', expected mysql or postgres",
                other
            ))),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            DatabaseEngine::Mysql,
            DatabaseEngine::Postgres,
            DatabaseEngine::AuroraMysql,
            DatabaseEngine::AuroraPostgresql,
        ]
        .into_iter()
        .find(|e| e.as_str() == value)
    }

    pub fn is_aurora(&self) -> bool {
        matches!(
            self,
            DatabaseEngine::AuroraMysql | DatabaseEngine::AuroraPostgresql
        )
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pub name: String,
    pub parameters: DatabaseParameters,
    aurora: Option<bool>,
}

impl Database {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: DatabaseParameters {
                name: name.to_string(),
                allocated_storage: 10,
                max_allocated_storage: 500,
                ..Default::default()
            },
            aurora: None,
        }
    }

    fn engine(&self) -> EngineResult<DatabaseEngine> {
        DatabaseEngine::parse(&self.parameters.engine).ok_or_else(|| {
            if self.parameters.engine.is_empty() {
                EngineError::user_input("a database engine is required (--engine)")
            } else {
                EngineError::user_input(format!(
                    "unknown database engine '{}'",
                    self.parameters.engine
                ))
            }
        })
    }

    async fn latest_version(&self, session: &Session, engine: DatabaseEngine) -> EngineResult<String> {
        let versions = session
            .gateway
            .databases
            .engine_versions(engine.as_str())
            .await?;
        let latest = pickers::latest_engine_version(&versions).ok_or_else(|| {
            EngineError::precondition(format!("no versions available for {}", engine))
        })?;
        debug!("latest {} version is {}", engine, latest);
        Ok(latest)
    }

    fn ask_engine(&mut self, session: &Session) -> EngineResult<()> {
        let prompter = session.questionnaire.prompter();
        let question = Question::new("Engine", "Database engine", Widget::Select(Vec::new()));
        let choices = [Choice::new("MySQL", "mysql"), Choice::new("Postgres", "postgres")];
        let family = prompter.select(&question, &choices, None)?;
        let aurora = match self.aurora {
            Some(aurora) => aurora,
            None => prompter.yes_no(
                &Question::new("Engine", "Aurora", Widget::YesNo)
                    .help("Aurora scales storage automatically but costs more at small sizes"),
                false,
            )?,
        };
        self.parameters.engine = DatabaseEngine::from_family(&family, aurora)?
            .as_str()
            .to_string();
        Ok(())
    }
}

#[async_trait]
impl StackKind for Database {
    fn stack_type(&self) -> StackType {
        StackType::Database
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> Vec<(String, String)> {
        vec![
            (
                "apppack:cluster".to_string(),
                cluster_short_name(&self.parameters.cluster_stack_name).to_string(),
            ),
            ("apppack:database".to_string(), self.name.clone()),
        ]
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }

    fn protected_resource(&self) -> Option<ProtectedResource> {
        Some(ProtectedResource::Database)
    }
}

#[async_trait]
impl Resource for Database {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        let mut bound = flags::bind(&mut self.parameters, flags)?;
        self.aurora = flags.get_bool("aurora");
        if let Some(family) = flags.get_str("engine") {
            let engine = DatabaseEngine::from_family(family, self.aurora.unwrap_or(false))?;
            self.parameters.engine = engine.as_str().to_string();
            bound.push("Engine");
        }
        Ok(bound)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let questionnaire = &session.questionnaire;

        let cluster = if will_prompt::<DatabaseParameters>(session, "ClusterStackName", bound, current)
        {
            pickers::cluster_question(&session.directory).await?
        } else {
            Question::new("ClusterStackName", "Cluster", Widget::Select(Vec::new())).required()
        };
        questionnaire.ask_one(&mut self.parameters, &cluster, bound, current)?;

        if will_prompt::<DatabaseParameters>(session, "Engine", bound, current) {
            self.ask_engine(session)?;
        }
        let engine = self.engine()?;

        if will_prompt::<DatabaseParameters>(session, "InstanceClass", bound, current) {
            let version = match &self.parameters.engine_version {
                v if !v.is_empty() => v.clone(),
                _ => self.latest_version(session, engine).await?,
            };
            let classes = pickers::database_instance_classes(
                session.gateway.databases.as_ref(),
                engine.as_str(),
                &version,
            )
            .await?;
            let question = pickers::instance_class_question("InstanceClass", classes);
            questionnaire.ask_one(&mut self.parameters, &question, bound, current)?;
        } else {
            let question =
                Question::new("InstanceClass", "Instance class", Widget::Select(Vec::new())).required();
            questionnaire.ask_one(&mut self.parameters, &question, bound, current)?;
        }

        let mut questions = vec![Question::new("MultiAZ", "Multi-AZ", Widget::YesNo)
            .help("Keep a standby in a second availability zone")];
        if !engine.is_aurora() {
            questions.push(Question::new("AllocatedStorage", "Initial storage (GB)", Widget::Text));
            questions.push(Question::new(
                "MaxAllocatedStorage",
                "Maximum storage (GB)",
                Widget::Text,
            ));
        }
        questionnaire.run(&mut self.parameters, &questions, bound, current)
    }

    async fn set_internal_fields(
        &mut self,
        session: &Session,
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        self.parameters.name = self.name.clone();
        if current.is_none() || self.parameters.engine_version.is_empty() {
            let engine = self.engine()?;
            self.parameters.engine_version = self.latest_version(session, engine).await?;
        }
        if self.parameters.one_time_password.is_empty() {
            self.parameters.one_time_password = secrets::one_time_password();
        }
        Ok(())
    }

    async fn preflight(&self, session: &Session, current: Option<&Stack>) -> EngineResult<()> {
        super::check_stateful(&self.parameters, current)?;
        self.engine()?;
        let p = &self.parameters;
        if pickers::is_previous_generation(&p.instance_class) {
            return Err(EngineError::user_input(format!(
                "{} is a previous-generation instance class",
                p.instance_class
            )));
        }
        if p.max_allocated_storage < p.allocated_storage {
            return Err(EngineError::user_input(format!(
                "maximum storage ({} GB) is below initial storage ({} GB)",
                p.max_allocated_storage, p.allocated_storage
            )));
        }
        super::require_cluster(session, &p.cluster_stack_name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::{session, session_with_prompter};
    use apppack_core::provider::EngineVersion;
    use apppack_core::testing::{FakeCloud, ScriptedPrompter};
    use std::sync::Arc;

    fn cloud() -> Arc<FakeCloud> {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        cloud.seed_owned_stack("apppack-cluster-apppack", vec![]);
        cloud.set_engine_versions(
            "aurora-postgresql",
            vec![
                EngineVersion {
                    version: "15.4".to_string(),
                    default: true,
                },
                EngineVersion {
                    version: "16.10".to_string(),
                    default: false,
                },
                EngineVersion {
                    version: "16.9-limitless".to_string(),
                    default: false,
                },
            ],
        );
        cloud.set_instance_classes(
            "aurora-postgresql",
            &["db.t2.medium", "db.t3.medium", "db.r6g.large", "db.t3.medium"],
        );
        cloud
    }

    #[test]
    fn test_engine_from_family() {
        assert_eq!(
            DatabaseEngine::from_family("postgres", true).unwrap(),
            DatabaseEngine::AuroraPostgresql
        );
        assert_eq!(
            DatabaseEngine::from_family("MySQL", false).unwrap(),
            DatabaseEngine::Mysql
        );
        assert!(DatabaseEngine::from_family("oracle", false).is_err());
    }

    #[tokio::test]
    async fn test_interactive_picks_current_generation_class() {
        let cloud = cloud();
        let prompter = Arc::new(
            ScriptedPrompter::new()
                .answer("apppack-cluster-apppack")
                .answer("postgres")
                .answer_bool(true)
                .answer("db.r6g.large")
                .answer_bool(false),
        );
        let s = session_with_prompter(&cloud, prompter.clone());
        let mut db = Database::new("main");
        db.ask_questions(&s, &[], None).await.unwrap();
        db.set_internal_fields(&s, None).await.unwrap();
        db.preflight(&s, None).await.unwrap();

        assert_eq!(db.parameters.engine, "aurora-postgresql");
        assert_eq!(db.parameters.instance_class, "db.r6g.large");
        assert_eq!(db.parameters.engine_version, "16.10");
        assert_eq!(db.parameters.one_time_password.len(), 30);
        assert_eq!(
            prompter.seen_choices()[2],
            vec!["db.r6g.large".to_string(), "db.t3.medium".to_string()]
        );
    }

    #[tokio::test]
    async fn test_flags_and_encoding() {
        let cloud = cloud();
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut db = Database::new("main");
        let bound = db
            .update_from_flags(
                &FlagValues::new()
                    .with_str("cluster", "apppack")
                    .with_str("engine", "postgres")
                    .with_bool("aurora", true)
                    .with_str("instance-class", "db.r6g.large")
                    .with_bool("multi-az", true),
            )
            .unwrap();
        db.ask_questions(&s, &bound, None).await.unwrap();
        db.set_internal_fields(&s, None).await.unwrap();

        let params = db.parameters();
        let get = |k: &str| apppack_core::params::find(&params, k).map(str::to_string);
        assert_eq!(get("MultiAZ").as_deref(), Some("yes"));
        assert_eq!(get("Engine").as_deref(), Some("aurora-postgresql"));
        assert_eq!(get("AllocatedStorage").as_deref(), Some("10"));
        assert!(db.tags().contains(&("apppack:database".to_string(), "main".to_string())));
    }

    #[tokio::test]
    async fn test_missing_instance_class_when_batch() {
        let cloud = cloud();
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut db = Database::new("main");
        let bound = db
            .update_from_flags(
                &FlagValues::new()
                    .with_str("cluster", "apppack")
                    .with_str("engine", "mysql"),
            )
            .unwrap();
        let err = db.ask_questions(&s, &bound, None).await.unwrap_err();
        assert!(matches!(err, EngineError::UserInput(ref m) if m.contains("--instance-class")));
    }

    #[tokio::test]
    async fn test_engine_is_stateful() {
        let cloud = cloud();
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let current = cloud.seed_owned_stack(
            "apppack-database-main",
            vec![
                Parameter::new("ClusterStackName", "apppack-cluster-apppack"),
                Parameter::new("Engine", "mysql"),
            ],
        );
        let mut db = Database::new("main");
        db.import_parameters(&current.parameters).unwrap();
        db.update_from_flags(&FlagValues::new().with_str("engine", "postgres"))
            .unwrap();
        let err = db.preflight(&s, Some(&current)).await.unwrap_err();
        assert!(matches!(err, EngineError::Precondition(ref m) if m.contains("Engine")));
    }
}
