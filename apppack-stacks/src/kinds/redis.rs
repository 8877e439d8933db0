use std::collections::BTreeSet;

use apppack_core::params::{decode_into, encode};
use apppack_core::provider::ParameterType;
use apppack_core::{
    CodecError, EngineError, EngineResult, FlagValues, Gateway, Parameter, Question, Stack,
    StackKind, StackType, Widget, flags, parameter_record,
};
use async_trait::async_trait;
use log::{debug, info};

use super::{Resource, cluster_short_name, will_prompt};
use crate::pickers;
use crate::secrets;
use crate::session::Session;

parameter_record! {
    pub struct RedisParameters {
        cluster_stack_name: String => "ClusterStackName"
            .flag_format("cluster", "apppack-cluster-{}")
            .stateful(),
        name: String => "Name",
        instance_class: String => "InstanceClass".flag("instance-class"),
        multi_az: bool => "MultiAZ".yes_no().flag("multi-az"),
    }
}

/// Parameter-store path of the auth token for Redis instance `name`
pub fn auth_token_parameter(name: &str) -> String {
    format!("/apppack/redis/{}/auth-token", name)
}

#[derive(Debug, Clone)]
pub struct Redis {
    pub name: String,
    pub parameters: RedisParameters,
}

impl Redis {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: RedisParameters {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    /// Store the auth token unless a previous attempt already did
    async fn ensure_auth_token(&self, gateway: &Gateway) -> EngineResult<()> {
        let path = auth_token_parameter(&self.name);
        if gateway.parameters.get(&path).await?.is_some() {
            debug!("auth token {} already present", path);
            return Ok(());
        }
        info!("storing auth token {}", path);
        gateway
            .parameters
            .put(&path, &secrets::auth_token(), ParameterType::SecureString, false)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StackKind for Redis {
    fn stack_type(&self) -> StackType {
        StackType::Redis
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
            ("apppack:redis".to_string(), self.name.clone()),
        ]
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }

    async fn post_delete(&self, gateway: &Gateway, stack: Option<&Stack>) -> EngineResult<()> {
        let name = match stack.and_then(|s| s.parameter("Name")).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => match StackType::from_stack_name(&self.stack_name()) {
                Some((StackType::Redis, name)) => name,
                _ => self.name.clone(),
            },
        };

        let token = auth_token_parameter(&name);
        if gateway.parameters.delete(&token).await? {
            info!("deleted {}", token);
        }
        let prefix = format!("/apppack/redis/{}", name);
        for (leftover, _) in gateway.parameters.by_path(&prefix).await? {
            info!("deleted {}", leftover);
            gateway.parameters.delete(&leftover).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for Redis {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let questionnaire = &session.questionnaire;

        let cluster = if will_prompt::<RedisParameters>(session, "ClusterStackName", bound, current) {
            pickers::cluster_question(&session.directory).await?
        } else {
            Question::new("ClusterStackName", "Cluster", Widget::Select(Vec::new())).required()
        };
        questionnaire.ask_one(&mut self.parameters, &cluster, bound, current)?;

        let instance_class = if will_prompt::<RedisParameters>(session, "InstanceClass", bound, current) {
            let node_types: BTreeSet<String> = session
                .gateway
                .caches
                .node_types()
                .await?
                .into_iter()
                .collect();
            if node_types.is_empty() {
                return Err(EngineError::precondition(
                    "no cache node types are offered in this region",
                ));
            }
            pickers::instance_class_question("InstanceClass", node_types.into_iter().collect())
        } else {
            Question::new("InstanceClass", "Instance class", Widget::Select(Vec::new())).required()
        };
        questionnaire.ask_one(&mut self.parameters, &instance_class, bound, current)?;

        let multi_az = Question::new("MultiAZ", "Multi-AZ", Widget::YesNo)
            .help("Keep a replica in a second availability zone");
        questionnaire.ask_one(&mut self.parameters, &multi_az, bound, current)
    }

    async fn set_internal_fields(
        &mut self,
        session: &Session,
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        self.parameters.name = self.name.clone();
        if current.is_none() {
            self.ensure_auth_token(&session.gateway).await?;
        }
        Ok(())
    }

    async fn preflight(&self, session: &Session, current: Option<&Stack>) -> EngineResult<()> {
        super::check_stateful(&self.parameters, current)?;
        super::require_cluster(session, &self.parameters.cluster_stack_name).await?;
        Ok(())
    }
}
