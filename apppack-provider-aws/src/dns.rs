//! Route 53 hosted zone lookups

use apppack_core::provider::{DnsService, HostedZone};
use apppack_core::{ProviderError, ProviderResult};
use async_trait::async_trait;
use aws_sdk_route53::Client;
use aws_sdk_route53::types;

use crate::error::{flag, member, sdk_error, text};

pub struct Route53 {
    client: Client,
}

impl Route53 {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn is_private(zone: &types::HostedZone) -> bool {
    zone.config().is_some_and(|c| flag(c.private_zone()))
}

fn to_zone(zone: &types::HostedZone, name_servers: Vec<String>) -> HostedZone {
    HostedZone {
        id: text(zone.id()),
        name: text(zone.name()),
        private: is_private(zone),
        name_servers,
    }
}

#[async_trait]
impl DnsService for Route53 {
    async fn hosted_zones_by_name(&self, dns_name: &str) -> ProviderResult<Vec<HostedZone>> {
        let output = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(dns_name)
            .send()
            .await
            .map_err(|e| sdk_error("ListHostedZonesByName", e))?;
        Ok(output
            .hosted_zones()
            .iter()
            .map(|z| to_zone(z, Vec::new()))
            .collect())
    }

    async fn get_hosted_zone(&self, id: &str) -> ProviderResult<HostedZone> {
        let output = self
            .client
            .get_hosted_zone()
            .id(id)
            .send()
            .await
            .map_err(|e| sdk_error("GetHostedZone", e))?;
        let zone = member(output.hosted_zone())
            .ok_or_else(|| ProviderError::not_found(format!("hosted zone {} not found", id)))?;
        let name_servers = output
            .delegation_set()
            .map(|d| d.name_servers().to_vec())
            .unwrap_or_default();
        Ok(to_zone(zone, name_servers))
    }
}
