//! Load balancer, database and cache administration

use apppack_core::ProviderResult;
use apppack_core::provider::{CacheAdmin, DatabaseAdmin, EngineVersion, LoadBalancerAdmin};
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::LoadBalancerAttribute;
use log::debug;

use crate::error::sdk_error;

const DELETION_PROTECTION: &str = "deletion_protection.enabled";

pub struct ElasticLoadBalancing {
    client: aws_sdk_elasticloadbalancingv2::Client,
}

impl ElasticLoadBalancing {
    pub fn new(client: aws_sdk_elasticloadbalancingv2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LoadBalancerAdmin for ElasticLoadBalancing {
    async fn set_deletion_protection(&self, arn: &str, enabled: bool) -> ProviderResult<()> {
        debug!("{} {}={}", arn, DELETION_PROTECTION, enabled);
        let attribute = LoadBalancerAttribute::builder()
            .key(DELETION_PROTECTION)
            .value(enabled.to_string())
            .build();
        self.client
            .modify_load_balancer_attributes()
            .load_balancer_arn(arn)
            .attributes(attribute)
            .send()
            .await
            .map_err(|e| sdk_error("ModifyLoadBalancerAttributes", e))?;
        Ok(())
    }
}

pub struct Rds {
    client: aws_sdk_rds::Client,
}

impl Rds {
    pub fn new(client: aws_sdk_rds::Client) -> Self {
        Self { client }
    }
}

/// Append items not yet present, keeping first-seen order
fn push_distinct(into: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

#[async_trait]
impl DatabaseAdmin for Rds {
    async fn orderable_instance_classes(
        &self,
        engine: &str,
        version: &str,
    ) -> ProviderResult<Vec<String>> {
        let mut classes = Vec::new();
        let mut pages = self
            .client
            .describe_orderable_db_instance_options()
            .engine(engine)
            .engine_version(version)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("DescribeOrderableDBInstanceOptions", e))?;
            push_distinct(
                &mut classes,
                page.orderable_db_instance_options()
                    .iter()
                    .filter_map(|o| o.db_instance_class().map(str::to_string)),
            );
        }
        debug!("{} {}: {} orderable classes", engine, version, classes.len());
        Ok(classes)
    }

    async fn engine_versions(&self, engine: &str) -> ProviderResult<Vec<EngineVersion>> {
        let default = self
            .client
            .describe_db_engine_versions()
            .engine(engine)
            .default_only(true)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeDBEngineVersions", e))?
            .db_engine_versions()
            .first()
            .and_then(|v| v.engine_version())
            .map(str::to_string);

        let mut versions = Vec::new();
        let mut pages = self
            .client
            .describe_db_engine_versions()
            .engine(engine)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("DescribeDBEngineVersions", e))?;
            for version in page.db_engine_versions() {
                if let Some(v) = version.engine_version() {
                    versions.push(EngineVersion {
                        version: v.to_string(),
                        default: default.as_deref() == Some(v),
                    });
                }
            }
        }
        Ok(versions)
    }

    async fn set_instance_deletion_protection(
        &self,
        id: &str,
        enabled: bool,
    ) -> ProviderResult<()> {
        debug!("ModifyDBInstance {} deletion protection {}", id, enabled);
        self.client
            .modify_db_instance()
            .db_instance_identifier(id)
            .deletion_protection(enabled)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| sdk_error("ModifyDBInstance", e))?;
        Ok(())
    }

    async fn set_cluster_deletion_protection(&self, id: &str, enabled: bool) -> ProviderResult<()> {
        debug!("ModifyDBCluster {} deletion protection {}", id, enabled);
        self.client
            .modify_db_cluster()
            .db_cluster_identifier(id)
            .deletion_protection(enabled)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| sdk_error("ModifyDBCluster", e))?;
        Ok(())
    }
}

pub struct ElastiCache {
    client: aws_sdk_elasticache::Client,
}

impl ElastiCache {
    pub fn new(client: aws_sdk_elasticache::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CacheAdmin for ElastiCache {
    /// Node types with a reserved offering, which covers every current type
    async fn node_types(&self) -> ProviderResult<Vec<String>> {
        let mut node_types = Vec::new();
        let mut pages = self
            .client
            .describe_reserved_cache_nodes_offerings()
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("DescribeReservedCacheNodesOfferings", e))?;
            push_distinct(
                &mut node_types,
                page.reserved_cache_nodes_offerings()
                    .iter()
                    .filter_map(|o| o.cache_node_type().map(str::to_string)),
            );
        }
        Ok(node_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_distinct_keeps_first_order() {
        let mut classes = vec!["db.t3.micro".to_string()];
        push_distinct(
            &mut classes,
            ["db.m5.large", "db.t3.micro", "db.m5.large", "db.r6g.large"]
                .into_iter()
                .map(str::to_string),
        );
        assert_eq!(classes, vec!["db.t3.micro", "db.m5.large", "db.r6g.large"]);
    }
}
