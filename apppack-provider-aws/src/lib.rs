//! AppPack AWS Provider
//!
//! Gateway implementations backed by the AWS SDK: CloudFormation, SSM,
//! Elastic Load Balancing, RDS, ElastiCache, Route 53, CodeBuild and STS.

mod admin;
mod builds;
mod dns;
mod error;
mod identity;
mod parameters;
mod stacks;

use std::sync::Arc;

use apppack_core::{Gateway, ProviderError, ProviderResult};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use log::debug;

pub use admin::{ElastiCache, ElasticLoadBalancing, Rds};
pub use builds::CodeBuild;
pub use dns::Route53;
pub use identity::{CallerIdentity, check_account};
pub use parameters::Ssm;
pub use stacks::CloudFormation;

/// Loaded AWS configuration for one region
pub struct Aws {
    config: SdkConfig,
    region: String,
}

impl Aws {
    /// Load credentials and configuration, with `region` overriding the environment
    pub async fn load(region: Option<&str>) -> ProviderResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| {
                ProviderError::new("no AWS region configured; pass --region or set AWS_REGION")
            })?;
        debug!("using AWS region {}", region);
        Ok(Self { config, region })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn gateway(&self) -> Gateway {
        let config = &self.config;
        Gateway {
            region: self.region.clone(),
            stacks: Arc::new(CloudFormation::new(aws_sdk_cloudformation::Client::new(config))),
            parameters: Arc::new(Ssm::new(aws_sdk_ssm::Client::new(config))),
            load_balancers: Arc::new(ElasticLoadBalancing::new(
                aws_sdk_elasticloadbalancingv2::Client::new(config),
            )),
            databases: Arc::new(Rds::new(aws_sdk_rds::Client::new(config))),
            caches: Arc::new(ElastiCache::new(aws_sdk_elasticache::Client::new(config))),
            dns: Arc::new(Route53::new(aws_sdk_route53::Client::new(config))),
            builds: Arc::new(CodeBuild::new(aws_sdk_codebuild::Client::new(config))),
        }
    }

    pub async fn caller_identity(&self) -> ProviderResult<CallerIdentity> {
        identity::caller_identity(&aws_sdk_sts::Client::new(&self.config)).await
    }

    /// Resolve the caller and refuse credentials for any account but `expected`
    pub async fn verify_account(&self, expected: &str) -> ProviderResult<CallerIdentity> {
        let identity = self.caller_identity().await?;
        check_account(&identity, expected)?;
        Ok(identity)
    }
}
