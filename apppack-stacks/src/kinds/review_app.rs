use apppack_core::params::{decode_into, encode};
use apppack_core::{
    CodecError, EngineError, EngineResult, FlagValues, Parameter, Stack, StackKind, StackType,
    flags, parameter_record,
};
use async_trait::async_trait;
use log::{debug, warn};

use super::Resource;
use crate::session::Session;

parameter_record! {
    /// Everything here is inherited from the parent pipeline
    pub struct ReviewAppParameters {
        name: String => "Name",
        pipeline_stack_name: String => "PipelineStackName",
        database_stack_name: String => "DatabaseStackName",
        redis_stack_name: String => "RedisStackName",
        private_s3_bucket_enabled: bool => "PrivateS3BucketEnabled",
        public_s3_bucket_enabled: bool => "PublicS3BucketEnabled",
        sqs_queue_enabled: bool => "SQSQueueEnabled",
        ses_domain: String => "SesDomain",
    }
}

/// Output of the pipeline stack naming the role review apps are deployed with
const ROLE_OUTPUT: &str = "ReviewAppRoleArn";

/// A short-lived app spawned from a pipeline for one pull request
#[derive(Debug, Clone)]
pub struct ReviewApp {
    /// `pipeline:pr`
    pub name: String,
    pub pipeline: String,
    pub pull_request: String,
    pub parameters: ReviewAppParameters,
    role_arn: Option<String>,
}

impl ReviewApp {
    pub fn new(name: &str) -> EngineResult<Self> {
        let (pipeline, pull_request) = name
            .split_once(':')
            .filter(|(p, pr)| !p.is_empty() && !pr.is_empty())
            .ok_or_else(|| {
                EngineError::user_input(format!(
                    "review app '{}' must be named <pipeline>:<pull request number>",
                    name
                ))
            })?;
        Ok(Self {
            name: name.to_string(),
            pipeline: pipeline.to_string(),
            pull_request: pull_request.to_string(),
            parameters: ReviewAppParameters {
                name: pull_request.to_string(),
                pipeline_stack_name: StackType::Pipeline.stack_name(pipeline),
                ..Default::default()
            },
            role_arn: None,
        })
    }

    async fn pipeline_stack(&self, session: &Session) -> EngineResult<Stack> {
        session
            .driver()
            .load_owned(&self.parameters.pipeline_stack_name)
            .await
            .map_err(|e| match e {
                EngineError::Precondition(_) => {
                    EngineError::precondition(format!("pipeline {} does not exist", self.pipeline))
                }
                other => other,
            })
    }

    /// Copy the addon settings from the pipeline outputs; `~` means absent
    pub fn inherit(&mut self, pipeline: &Stack) {
        let text = |key: &str| pipeline.output(key).unwrap_or_default().to_string();
        let enabled = |key: &str| pipeline.output(key) == Some("enabled");

        let p = &mut self.parameters;
        p.database_stack_name = text("DatabaseStackName");
        p.redis_stack_name = text("RedisStackName");
        p.private_s3_bucket_enabled = enabled("PrivateS3BucketEnabled");
        p.public_s3_bucket_enabled = enabled("PublicS3BucketEnabled");
        p.sqs_queue_enabled = enabled("SQSQueueEnabled");
        p.ses_domain = text("SesDomain");
        self.role_arn = pipeline.output(ROLE_OUTPUT).map(str::to_string);
    }
}

#[async_trait]
impl StackKind for ReviewApp {
    fn stack_type(&self) -> StackType {
        StackType::ReviewApp
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> Vec<(String, String)> {
        vec![
            ("apppack:appName".to_string(), self.pipeline.clone()),
            ("apppack:reviewApp".to_string(), format!("pr{}", self.pull_request)),
        ]
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }

    fn role_arn(&self) -> Option<String> {
        self.role_arn.clone()
    }
}

#[async_trait]
impl Resource for ReviewApp {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn set_internal_fields(
        &mut self,
        session: &Session,
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        let pipeline = self.pipeline_stack(session).await?;
        self.inherit(&pipeline);
        if self.role_arn.is_none() {
            return Err(EngineError::precondition(format!(
                "pipeline {} has no {} output; upgrade it first",
                self.pipeline, ROLE_OUTPUT
            )));
        }
        debug!("review app role {:?}", self.role_arn);
        Ok(())
    }

    async fn prepare_destroy(&mut self, session: &Session) -> EngineResult<()> {
        match self.pipeline_stack(session).await {
            Ok(pipeline) => {
                self.role_arn = pipeline.output(ROLE_OUTPUT).map(str::to_string);
                Ok(())
            }
            Err(EngineError::Precondition(message)) => {
                warn!("{}; deleting without the review app role", message);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::session;
    use apppack_core::testing::{FakeCloud, ScriptedPrompter};
    use std::sync::Arc;

    const ROLE: &str = "arn:aws:iam::000000000000:role/review";

    #[test]
    fn test_name_must_carry_pull_request() {
        let app = ReviewApp::new("web:42").unwrap();
        assert_eq!(app.stack_name(), "apppack-reviewapp-web42");
        assert_eq!(app.parameters.pipeline_stack_name, "apppack-pipeline-web");
        assert!(matches!(ReviewApp::new("web"), Err(EngineError::UserInput(_))));
        assert!(ReviewApp::new("web:").is_err());
    }

    #[tokio::test]
    async fn test_inherits_pipeline_outputs() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        cloud.set_outputs(
            "apppack-pipeline-web",
            vec![
                ("DatabaseStackName".to_string(), "apppack-database-main".to_string()),
                ("RedisStackName".to_string(), "~".to_string()),
                ("PrivateS3BucketEnabled".to_string(), "enabled".to_string()),
                ("SQSQueueEnabled".to_string(), "disabled".to_string()),
                (ROLE_OUTPUT.to_string(), ROLE.to_string()),
            ],
        );
        cloud.seed_owned_stack("apppack-pipeline-web", vec![]);
        let s = session(&cloud, ScriptedPrompter::new(), false);

        let mut app = ReviewApp::new("web:42").unwrap();
        app.set_internal_fields(&s, None).await.unwrap();
        let p = &app.parameters;
        assert_eq!(p.database_stack_name, "apppack-database-main");
        assert_eq!(p.redis_stack_name, "");
        assert!(p.private_s3_bucket_enabled);
        assert!(!p.sqs_queue_enabled);
        assert_eq!(app.role_arn().as_deref(), Some(ROLE));
    }

    #[tokio::test]
    async fn test_missing_pipeline() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut app = ReviewApp::new("web:42").unwrap();
        let err = app.set_internal_fields(&s, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Precondition(ref m) if m.contains("pipeline web")));

        // Destroy still proceeds without the role
        app.prepare_destroy(&s).await.unwrap();
        assert_eq!(app.role_arn(), None);
    }
}
