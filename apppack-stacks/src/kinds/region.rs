use apppack_core::params::{decode_into, encode};
use apppack_core::{
    CodecError, EngineError, EngineResult, FlagValues, Gateway, Parameter, Question, Stack,
    StackKind, StackType, Widget, flags, parameter_record,
};
use async_trait::async_trait;
use log::{debug, info};

use super::Resource;
use crate::session::Session;

/// Written by releases before the token moved into the region stack
pub const LEGACY_DOCKERHUB_TOKEN: &str = "/apppack/account/dockerhub-access-token";

/// Tag the provider puts on parameters owned by a stack
const STACK_NAME_TAG: &str = "aws:cloudformation:stack-name";

parameter_record! {
    pub struct RegionParameters {
        dockerhub_username: String => "DockerhubUsername".flag("dockerhub-username"),
        dockerhub_access_token: String => "DockerhubAccessToken".flag("dockerhub-access-token"),
    }
}

/// The per-region singleton stack
#[derive(Debug, Clone)]
pub struct Region {
    pub region: String,
    pub parameters: RegionParameters,
}

impl Region {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            parameters: RegionParameters::default(),
        }
    }
}

#[async_trait]
impl StackKind for Region {
    fn stack_type(&self) -> StackType {
        StackType::Region
    }

    fn name(&self) -> &str {
        &self.region
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }

    async fn post_delete(&self, gateway: &Gateway, _stack: Option<&Stack>) -> EngineResult<()> {
        let Some(_) = gateway.parameters.get(LEGACY_DOCKERHUB_TOKEN).await? else {
            debug!("no legacy Docker Hub token to remove");
            return Ok(());
        };
        let tags = gateway.parameters.list_tags(LEGACY_DOCKERHUB_TOKEN).await?;
        if tags.iter().any(|(k, _)| k == STACK_NAME_TAG) {
            return Ok(());
        }
        info!("removing legacy parameter {}", LEGACY_DOCKERHUB_TOKEN);
        gateway.parameters.delete(LEGACY_DOCKERHUB_TOKEN).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for Region {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let questions = [
            Question::new("DockerhubUsername", "Docker Hub username", Widget::Text)
                .help("Used to avoid anonymous pull limits when building images")
                .required(),
            Question::new("DockerhubAccessToken", "Docker Hub access token", Widget::Text)
                .help("Create one at https://hub.docker.com/settings/security")
                .required(),
        ];
        session
            .questionnaire
            .run(&mut self.parameters, &questions, bound, current)
    }

    async fn preflight(&self, session: &Session, current: Option<&Stack>) -> EngineResult<()> {
        if current.is_none() {
            let account = StackType::Account.stack_name("");
            if session.driver().load(&account).await?.is_none() {
                return Err(EngineError::precondition(
                    "the account stack is missing, run `apppack create account` first",
                ));
            }
        }
        Ok(())
    }
}
