use apppack_core::params::{decode_into, encode};
use apppack_core::{
    CodecError, EngineError, EngineResult, FlagValues, Parameter, Question, Stack, StackKind,
    StackType, Widget, flags, parameter_record,
};
use apppack_directory::ClusterMember;
use async_trait::async_trait;
use log::{info, warn};

use super::{Resource, cluster_short_name, will_prompt};
use crate::pickers;
use crate::secrets;
use crate::session::Session;
use crate::validate::{self, RepositoryType};

parameter_record! {
    pub struct AppParameters {
        cluster_stack_name: String => "ClusterStackName"
            .flag_format("cluster", "apppack-cluster-{}")
            .stateful(),
        repository_url: String => "RepositoryUrl".flag("repository"),
        repository_type: String => "RepositoryType",
        branch: String => "Branch".flag("branch"),
        domains: Vec<String> => "Domains".flag("domains"),
        health_check_path: String => "HealthCheckPath".flag("healthcheck-path"),
        load_balancer_rule_priority: i64 => "LoadBalancerRulePriority",
        private_s3_bucket_enabled: bool => "PrivateS3BucketEnabled".flag("addon-private-s3"),
        public_s3_bucket_enabled: bool => "PublicS3BucketEnabled".flag("addon-public-s3"),
        ses_domain: String => "SesDomain".flag("addon-ses-domain"),
        database_stack_name: String => "DatabaseStackName"
            .flag_format("addon-database-name", "apppack-database-{}")
            .detachable(),
        redis_stack_name: String => "RedisStackName"
            .flag_format("addon-redis-name", "apppack-redis-{}")
            .detachable(),
        sqs_queue_enabled: bool => "SQSQueueEnabled".flag("addon-sqs"),
        custom_task_policy_arn: String => "CustomTaskPolicyArn",
        build_webhook: bool => "BuildWebhook".flag_negate("disable-build-webhook"),
        allowed_users: Vec<String> => "AllowedUsers".flag("users"),
        name: String => "Name",
    }
}

/// Keys an app template takes that a pipeline template does not
const APP_ONLY: [&str; 3] = ["Branch", "Domains", "HealthCheckPath"];

/// An app, or a pipeline when `pipeline` is set
#[derive(Debug, Clone)]
pub struct App {
    pub name: String,
    pub pipeline: bool,
    pub parameters: AppParameters,
    addon_database: Option<bool>,
    addon_redis: Option<bool>,
}

impl App {
    pub fn new(name: &str, pipeline: bool) -> Self {
        Self {
            name: name.to_string(),
            pipeline,
            parameters: AppParameters {
                name: name.to_string(),
                health_check_path: "/".to_string(),
                build_webhook: true,
                ..Default::default()
            },
            addon_database: None,
            addon_redis: None,
        }
    }

    fn noun(&self) -> &'static str {
        if self.pipeline { "pipeline" } else { "app" }
    }

    /// What the pending record would destroy on the current stack
    pub fn data_loss(&self, current: &Stack) -> Vec<String> {
        let enabled = |key: &str| current.parameter(key) == Some("enabled");
        let attached = |key: &str| current.parameter(key).is_some_and(|v| !v.is_empty());
        let p = &self.parameters;
        let noun = self.noun();

        let mut losses = Vec::new();
        if enabled("PrivateS3BucketEnabled") && !p.private_s3_bucket_enabled {
            losses.push("current private S3 bucket will be permanently destroyed".to_string());
        }
        if enabled("PublicS3BucketEnabled") && !p.public_s3_bucket_enabled {
            losses.push("current public S3 bucket will be permanently destroyed".to_string());
        }
        if attached("DatabaseStackName") && p.database_stack_name.is_empty() {
            losses.push(format!("current {} database will be permanently destroyed", noun));
        }
        if attached("RedisStackName") && p.redis_stack_name.is_empty() {
            losses.push(format!(
                "current {} Redis database will be permanently destroyed",
                noun
            ));
        }
        losses
    }

    /// Block until the build service holds credentials for the repository host
    async fn ensure_source_credentials(
        &self,
        session: &Session,
        repository_type: RepositoryType,
    ) -> EngineResult<()> {
        loop {
            let servers = session.gateway.builds.source_credential_servers().await?;
            if servers.iter().any(|s| s == repository_type.as_str()) {
                return Ok(());
            }
            session.questionnaire.pause(&format!(
                "CodeBuild is not connected to {name}.\n\
                 Open https://console.aws.amazon.com/codesuite/codebuild/project/new?region={region}, \
                 choose {name} as the source provider and connect your account.\n\
                 Do not create the project; press ENTER once connected.",
                name = repository_type.display_name(),
                region = session.region(),
            ))?;
        }
    }

    /// Ask whether to attach an addon, then which one
    async fn ask_addon(
        &mut self,
        session: &Session,
        member: ClusterMember,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let (key, wanted, verbose) = match member {
            ClusterMember::Database => ("DatabaseStackName", self.addon_database, "Database"),
            ClusterMember::Redis => ("RedisStackName", self.addon_redis, "Redis"),
            ClusterMember::App => return Ok(()),
        };
        let attached = !self.parameters.get_string(key).is_empty();

        if !session.questionnaire.is_interactive() {
            if wanted == Some(true) && !attached {
                return Err(EngineError::user_input(format!(
                    "--{} requires --{}-name in non-interactive mode",
                    flag_of(member),
                    flag_of(member)
                )));
            }
            return Ok(());
        }
        if bound.contains(&key) {
            return Ok(());
        }

        let wanted = match wanted {
            Some(wanted) => wanted,
            None => session.questionnaire.prompter().yes_no(
                &Question::new(key, format!("{} addon", verbose), Widget::YesNo)
                    .help(format!("Attach a {} running on the same cluster", verbose)),
                attached,
            )?,
        };
        if !wanted {
            self.parameters.set_string(key, String::new());
            return Ok(());
        }
        if !will_prompt::<AppParameters>(session, key, bound, current) {
            return Ok(());
        }

        let cluster = cluster_short_name(&self.parameters.cluster_stack_name).to_string();
        let question = pickers::addon_question(&session.directory, &cluster, member).await?;
        session
            .questionnaire
            .ask_one(&mut self.parameters, &question, bound, current)
    }

    /// Addon stacks must be ours and live on the app's cluster
    async fn check_addon(&self, session: &Session, stack_name: &str, what: &str) -> EngineResult<()> {
        if stack_name.is_empty() {
            return Ok(());
        }
        let stack = session.driver().load_owned(stack_name).await.map_err(|e| match e {
            EngineError::Precondition(_) => {
                EngineError::precondition(format!("{} {} does not exist", what, stack_name))
            }
            other => other,
        })?;
        let cluster = stack.parameter("ClusterStackName").unwrap_or_default();
        if cluster != self.parameters.cluster_stack_name {
            return Err(EngineError::precondition(format!(
                "{} {} is on cluster {}, not {}",
                what,
                stack_name,
                cluster_short_name(cluster),
                cluster_short_name(&self.parameters.cluster_stack_name)
            )));
        }
        Ok(())
    }
}

fn flag_of(member: ClusterMember) -> &'static str {
    match member {
        ClusterMember::Redis => "addon-redis",
        _ => "addon-database",
    }
}

impl AppParameters {
    fn get_string(&self, key: &str) -> &str {
        match key {
            "DatabaseStackName" => &self.database_stack_name,
            "RedisStackName" => &self.redis_stack_name,
            _ => "",
        }
    }

    fn set_string(&mut self, key: &str, value: String) {
        match key {
            "DatabaseStackName" => self.database_stack_name = value,
            "RedisStackName" => self.redis_stack_name = value,
            _ => {}
        }
    }
}

#[async_trait]
impl StackKind for App {
    fn stack_type(&self) -> StackType {
        if self.pipeline {
            StackType::Pipeline
        } else {
            StackType::App
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> Vec<(String, String)> {
        let mut tags = vec![
            ("apppack:appName".to_string(), self.name.clone()),
            (
                "apppack:cluster".to_string(),
                cluster_short_name(&self.parameters.cluster_stack_name).to_string(),
            ),
        ];
        if self.pipeline {
            tags.push(("apppack:pipeline".to_string(), "true".to_string()));
        }
        tags
    }

    fn parameters(&self) -> Vec<Parameter> {
        let params = encode(&self.parameters);
        if self.pipeline {
            params
                .into_iter()
                .filter(|p| !APP_ONLY.contains(&p.key.as_str()))
                .collect()
        } else {
            params
        }
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }
}

#[async_trait]
impl Resource for App {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        self.addon_database = flags.get_bool("addon-database");
        self.addon_redis = flags.get_bool("addon-redis");
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let questionnaire = &session.questionnaire;

        let cluster = if will_prompt::<AppParameters>(session, "ClusterStackName", bound, current) {
            pickers::cluster_question(&session.directory).await?
        } else {
            Question::new("ClusterStackName", "Cluster", Widget::Select(Vec::new())).required()
        };
        questionnaire.ask_one(&mut self.parameters, &cluster, bound, current)?;

        let repository = Question::new("RepositoryUrl", "Repository URL", Widget::Text)
            .help("e.g. https://github.com/<org>/<repo>.git")
            .required();
        questionnaire.ask_one(&mut self.parameters, &repository, bound, current)?;
        let changed = current.and_then(|s| s.parameter("RepositoryUrl"))
            != Some(self.parameters.repository_url.as_str());
        if changed {
            let repository_type = validate::repository_type(&self.parameters.repository_url)?;
            self.ensure_source_credentials(session, repository_type).await?;
        }

        let mut questions = Vec::new();
        if !self.pipeline {
            questions.push(
                Question::new("Branch", "Branch", Widget::Text)
                    .help("Branch to build and deploy")
                    .required(),
            );
            questions.push(
                Question::new("Domains", "Custom domains", Widget::List)
                    .help("Leave empty to use the cluster domain only"),
            );
            questions.push(Question::new("HealthCheckPath", "Health check path", Widget::Text));
        }
        questions.extend([
            Question::new("PrivateS3BucketEnabled", "Private S3 bucket", Widget::YesNo),
            Question::new("PublicS3BucketEnabled", "Public S3 bucket", Widget::YesNo),
            Question::new("SQSQueueEnabled", "SQS queue", Widget::YesNo),
            Question::new("SesDomain", "SES domain", Widget::Text)
                .help("Domain allowed to send email; leave empty to disable"),
        ]);
        questionnaire.run(&mut self.parameters, &questions, bound, current)?;

        self.ask_addon(session, ClusterMember::Database, bound, current)
            .await?;
        self.ask_addon(session, ClusterMember::Redis, bound, current)
            .await?;

        let users = Question::new("AllowedUsers", "Users", Widget::List)
            .help("Email addresses of users who can manage the app (one per line)");
        questionnaire.ask_one(&mut self.parameters, &users, bound, current)
    }

    async fn set_internal_fields(
        &mut self,
        _session: &Session,
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        let params = &mut self.parameters;
        params.name = self.name.clone();
        if params.load_balancer_rule_priority == 0 {
            params.load_balancer_rule_priority = secrets::rule_priority();
        }
        if !params.repository_url.is_empty() {
            params.repository_type = validate::repository_type(&params.repository_url)?
                .as_str()
                .to_string();
        }
        Ok(())
    }

    async fn preflight(&self, session: &Session, current: Option<&Stack>) -> EngineResult<()> {
        super::check_stateful(&self.parameters, current)?;
        validate::emails(&self.parameters.allowed_users)?;
        super::require_cluster(session, &self.parameters.cluster_stack_name).await?;
        self.check_addon(session, &self.parameters.database_stack_name, "database")
            .await?;
        self.check_addon(session, &self.parameters.redis_stack_name, "Redis instance")
            .await?;

        let Some(current) = current else {
            return Ok(());
        };
        let losses = self.data_loss(current);
        if losses.is_empty() {
            return Ok(());
        }
        for loss in &losses {
            warn!("{}", loss);
        }
        session.questionnaire.confirm_yes(&format!(
            "{}\nType 'yes' to continue",
            losses.join("\n")
        ))?;
        info!("data loss on {} confirmed", current.stack_name);
        Ok(())
    }
}
