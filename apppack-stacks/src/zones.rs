//! Hosted zone lookup for cluster and custom domains

use apppack_core::provider::{DnsService, HostedZone};
use apppack_core::{EngineError, EngineResult};
use log::debug;

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_lowercase()
}

/// Most specific public hosted zone containing `domain`
///
/// A leading `*.` is ignored. The zone must carry a delegation set.
pub async fn find_zone(dns: &dyn DnsService, domain: &str) -> EngineResult<HostedZone> {
    let domain = normalize(domain.trim_start_matches("*."));
    let labels: Vec<&str> = domain.split('.').collect();

    for start in 0..labels.len().saturating_sub(1) {
        let candidate = labels[start..].join(".");
        debug!("looking for hosted zone {}", candidate);
        let zones = dns.hosted_zones_by_name(&candidate).await?;
        let Some(zone) = zones
            .into_iter()
            .find(|z| normalize(&z.name) == candidate && !z.private)
        else {
            continue;
        };

        let zone = dns.get_hosted_zone(&zone.id).await?;
        if zone.name_servers.is_empty() {
            return Err(EngineError::precondition(format!(
                "hosted zone {} has no name servers; check its delegation",
                candidate
            )));
        }
        return Ok(zone);
    }

    Err(EngineError::precondition(format!(
        "no public hosted zone found for {}",
        domain
    )))
}

/// Zone id without the `/hostedzone/` prefix
pub fn short_id(zone: &HostedZone) -> String {
    zone.id.trim_start_matches("/hostedzone/").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apppack_core::testing::FakeCloud;
    use std::sync::Arc;

    fn zone(id: &str, name: &str, private: bool, ns: &[&str]) -> HostedZone {
        HostedZone {
            id: format!("/hostedzone/{}", id),
            name: name.to_string(),
            private,
            name_servers: ns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_finds_parent_zone() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        cloud.add_hosted_zone(zone("Z1", "example.com.", false, &["ns-1.awsdns.com"]));
        let gateway = cloud.gateway();

        let found = find_zone(gateway.dns.as_ref(), "apps.example.com").await.unwrap();
        assert_eq!(short_id(&found), "Z1");
        let found = find_zone(gateway.dns.as_ref(), "*.Example.com").await.unwrap();
        assert_eq!(short_id(&found), "Z1");
    }

    #[tokio::test]
    async fn test_prefers_most_specific_zone() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        cloud.add_hosted_zone(zone("Z1", "example.com.", false, &["ns-1"]));
        cloud.add_hosted_zone(zone("Z2", "apps.example.com.", false, &["ns-2"]));
        let gateway = cloud.gateway();

        let found = find_zone(gateway.dns.as_ref(), "x.apps.example.com").await.unwrap();
        assert_eq!(short_id(&found), "Z2");
    }

    #[tokio::test]
    async fn test_private_and_undelegated_zones_rejected() {
        let cloud = Arc::new(FakeCloud::new("us-east-1"));
        cloud.add_hosted_zone(zone("Z1", "internal.com.", true, &["ns-1"]));
        cloud.add_hosted_zone(zone("Z2", "example.org.", false, &[]));
        let gateway = cloud.gateway();

        assert!(matches!(
            find_zone(gateway.dns.as_ref(), "internal.com").await,
            Err(EngineError::Precondition(_))
        ));
        assert!(matches!(
            find_zone(gateway.dns.as_ref(), "example.org").await,
            Err(EngineError::Precondition(ref m)) if m.contains("name servers")
        ));
    }
}
