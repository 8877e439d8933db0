use apppack_core::params::{decode_into, encode};
use apppack_core::{
    CodecError, EngineError, EngineResult, FlagValues, Parameter, Question, Stack, StackKind,
    StackType, Widget, flags, parameter_record,
};
use async_trait::async_trait;

use super::Resource;
use crate::session::Session;
use crate::zones;

parameter_record! {
    pub struct CustomDomainParameters {
        primary_domain: String => "PrimaryDomain",
        alt_domain_names: Vec<String> => "AltDomainNames".flag("alt-domains"),
        hosted_zone: String => "HostedZone",
    }
}

/// A certificate and DNS alias for domains outside the cluster domain
#[derive(Debug, Clone)]
pub struct CustomDomain {
    pub domain: String,
    pub parameters: CustomDomainParameters,
}

impl CustomDomain {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            parameters: CustomDomainParameters {
                primary_domain: domain.to_string(),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl StackKind for CustomDomain {
    fn stack_type(&self) -> StackType {
        StackType::CustomDomain
    }

    fn name(&self) -> &str {
        &self.domain
    }

    fn tags(&self) -> Vec<(String, String)> {
        vec![("apppack:customDomain".to_string(), self.domain.clone())]
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }
}

#[async_trait]
impl Resource for CustomDomain {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let question = Question::new("AltDomainNames", "Alternate domains", Widget::List)
            .help("Extra names on the same certificate, e.g. www.example.com (one per line)");
        session
            .questionnaire
            .ask_one(&mut self.parameters, &question, bound, current)
    }

    /// Resolve the primary zone; every alternate must share it
    async fn set_internal_fields(
        &mut self,
        session: &Session,
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        let dns = session.gateway.dns.as_ref();
        let primary = zones::find_zone(dns, &self.parameters.primary_domain).await?;

        for alt in &self.parameters.alt_domain_names {
            let zone = zones::find_zone(dns, alt).await?;
            if zone.id != primary.id {
                return Err(EngineError::user_input(format!(
                    "{} is not in the hosted zone of {} ({})",
                    alt,
                    self.parameters.primary_domain,
                    primary.name.trim_end_matches('.')
                )));
            }
        }
        self.parameters.primary_domain = self.domain.clone();
        self.parameters.hosted_zone = zones::short_id(&primary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::session;
    use apppack_core::provider::HostedZone;
    use apppack_core::testing::{FakeCloud, ScriptedPrompter};
    use std::sync::Arc;

    fn cloud() -> Arc<FakeCloud> {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        for (id, name) in [("Z1", "example.com."), ("Z2", "example.org.")] {
            cloud.add_hosted_zone(HostedZone {
                id: format!("/hostedzone/{}", id),
                name: name.to_string(),
                private: false,
                name_servers: vec!["ns-1.awsdns.com".to_string()],
            });
        }
        cloud
    }

    #[tokio::test]
    async fn test_alternates_in_same_zone() {
        let cloud = cloud();
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut domain = CustomDomain::new("*.Example.com");
        domain
            .update_from_flags(&FlagValues::new().with_str("alt-domains", "example.com,www.example.com"))
            .unwrap();
        domain.set_internal_fields(&s, None).await.unwrap();
        assert_eq!(domain.parameters.hosted_zone, "Z1");
        assert_eq!(domain.stack_name(), "apppack-customdomain-wildcard-example-com");
    }

    #[tokio::test]
    async fn test_alternate_in_other_zone_rejected() {
        let cloud = cloud();
        let s = session(&cloud, ScriptedPrompter::new(), false);
        let mut domain = CustomDomain::new("www.example.com");
        domain
            .update_from_flags(&FlagValues::new().with_str("alt-domains", "www.example.org"))
            .unwrap();
        let err = domain.set_internal_fields(&s, None).await.unwrap_err();
        assert!(matches!(err, EngineError::UserInput(ref m) if m.contains("www.example.org")));
    }
}
