use apppack_core::params::{ParameterRecord, decode_into, encode};
use apppack_core::{
    Capability, CodecError, EngineResult, FlagValues, Parameter, Question, Stack, StackKind,
    StackType, Widget, flags, parameter_record,
};
use async_trait::async_trait;

use super::Resource;
use crate::secrets;
use crate::session::Session;
use crate::validate;

parameter_record! {
    /// Account-wide resources: administrator access and the AppPack role
    pub struct AccountParameters {
        administrators: Vec<String> => "Administrators".flag("administrators"),
        external_id: String => "AppPackRoleExternalId",
    }
}

/// The singleton account stack
#[derive(Debug, Clone)]
pub struct Account {
    pub parameters: AccountParameters,
}

impl Account {
    pub fn new() -> Self {
        Self {
            parameters: AccountParameters::default(),
        }
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackKind for Account {
    fn stack_type(&self) -> StackType {
        StackType::Account
    }

    fn name(&self) -> &str {
        "account"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Iam, Capability::NamedIam]
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }
}

#[async_trait]
impl Resource for Account {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let questions = [Question::new(
            "Administrators",
            "Administrators",
            Widget::List,
        )
        .help("Email addresses of users with full access to every app (one per line)")
        .required()];
        session
            .questionnaire
            .run(&mut self.parameters, &questions, bound, current)
    }

    async fn set_internal_fields(
        &mut self,
        _session: &Session,
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        if self.parameters.external_id.is_empty() {
            self.parameters.external_id = secrets::external_id();
        }
        Ok(())
    }

    async fn preflight(&self, _session: &Session, current: Option<&Stack>) -> EngineResult<()> {
        validate::emails(&self.parameters.administrators)?;
        super::check_stateful(&self.parameters, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::session;
    use apppack_core::EngineError;
    use apppack_core::testing::{FakeCloud, ScriptedPrompter};
    use std::sync::Arc;

    #[test]
    fn test_stack_name_is_fixed() {
        assert_eq!(Account::new().stack_name(), "apppack-account");
        assert!(AccountParameters::field("AppPackRoleExternalId").unwrap().flag.is_none());
    }

    #[tokio::test]
    async fn test_external_id_generated_once() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut account = Account::new();
        account.set_internal_fields(&s, None).await.unwrap();
        let first = account.parameters.external_id.clone();
        assert_eq!(first.len(), 32);
        account.set_internal_fields(&s, None).await.unwrap();
        assert_eq!(account.parameters.external_id, first);
    }

    #[tokio::test]
    async fn test_invalid_administrator_rejected() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut account = Account::new();
        account
            .update_from_flags(&FlagValues::new().with_str("administrators", "ops@example.com,nope"))
            .unwrap();
        let err = account.preflight(&s, None).await.unwrap_err();
        assert!(matches!(err, EngineError::UserInput(ref m) if m.contains("nope")));
    }
}
