use apppack_core::params::{decode_into, encode};
use apppack_core::{
    CodecError, EngineResult, FlagValues, Parameter, ProtectedResource, Question, Stack,
    StackKind, StackType, Widget, flags, parameter_record,
};
use async_trait::async_trait;
use log::debug;

use super::Resource;
use crate::net::{self, DEFAULT_CIDR};
use crate::session::Session;
use crate::zones;

parameter_record! {
    /// Shared network, load balancer and container cluster
    pub struct ClusterParameters {
        domain: String => "Domain".flag("domain"),
        hosted_zone: String => "HostedZone",
        cidr: String => "Cidr".flag("cidr").stateful(),
        availability_zones: Vec<String> => "AvailabilityZones",
        public_subnets: Vec<String> => "PublicSubnetCidrs",
        private_subnets: Vec<String> => "PrivateSubnetCidrs",
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub parameters: ClusterParameters,
}

impl Cluster {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: ClusterParameters {
                cidr: DEFAULT_CIDR.to_string(),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl StackKind for Cluster {
    fn stack_type(&self) -> StackType {
        StackType::Cluster
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> Vec<(String, String)> {
        vec![("apppack:cluster".to_string(), self.name.clone())]
    }

    fn parameters(&self) -> Vec<Parameter> {
        encode(&self.parameters)
    }

    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError> {
        decode_into(&mut self.parameters, params)
    }

    fn protected_resource(&self) -> Option<ProtectedResource> {
        Some(ProtectedResource::LoadBalancer)
    }

    // Network interfaces left behind by tasks can block the first delete.
    fn retry_failed_delete(&self) -> bool {
        true
    }
}

#[async_trait]
impl Resource for Cluster {
    fn update_from_flags(&mut self, flags: &FlagValues) -> EngineResult<Vec<&'static str>> {
        Ok(flags::bind(&mut self.parameters, flags)?)
    }

    async fn ask_questions(
        &mut self,
        session: &Session,
        bound: &[&'static str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        let questions = [Question::new("Domain", "Cluster domain", Widget::Text)
            .help("Apps on this cluster get a subdomain of this domain, e.g. myapp.<domain>")
            .required()];
        session
            .questionnaire
            .run(&mut self.parameters, &questions, bound, current)
    }

    async fn set_internal_fields(
        &mut self,
        session: &Session,
        _current: Option<&Stack>,
    ) -> EngineResult<()> {
        let params = &mut self.parameters;
        let zone = zones::find_zone(session.gateway.dns.as_ref(), &params.domain).await?;
        params.hosted_zone = zones::short_id(&zone);
        debug!("cluster domain {} is in zone {}", params.domain, params.hosted_zone);
        if params.cidr.is_empty() {
            params.cidr = DEFAULT_CIDR.to_string();
        }
        if params.public_subnets.is_empty() || params.private_subnets.is_empty() {
            let layout = net::split_cidr(&params.cidr)?;
            params.public_subnets = layout.public;
            params.private_subnets = layout.private;
        }
        if params.availability_zones.is_empty() {
            params.availability_zones = net::availability_zones(session.region());
        }
        Ok(())
    }

    async fn preflight(&self, _session: &Session, current: Option<&Stack>) -> EngineResult<()> {
        net::split_cidr(&self.parameters.cidr)?;
        super::check_stateful(&self.parameters, current)
    }
}
