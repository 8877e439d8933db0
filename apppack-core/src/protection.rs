//! Deletion-protection bracket shared by databases and cluster load balancers

use log::{info, warn};

use crate::error::EngineResult;
use crate::provider::Gateway;
use crate::stack::Stack;

/// A provider-side resource whose deletion protection follows its stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedResource {
    /// The cluster load balancer, from output `LoadBalancerArn`
    LoadBalancer,
    /// A database instance (`DBInstance`) or Aurora cluster (`DBCluster`)
    Database,
}

impl ProtectedResource {
    /// Toggle protection for the resource found in the stack outputs
    ///
    /// A stack without the expected output is skipped with a warning.
    pub async fn set(&self, gateway: &Gateway, stack: &Stack, enabled: bool) -> EngineResult<()> {
        match self {
            ProtectedResource::LoadBalancer => {
                let Some(arn) = stack.output("LoadBalancerArn") else {
                    warn!(
                        "{}: no LoadBalancerArn output, leaving deletion protection alone",
                        stack.stack_name
                    );
                    return Ok(());
                };
                info!("load balancer {}: deletion protection {}", arn, enabled);
                gateway
                    .load_balancers
                    .set_deletion_protection(arn, enabled)
                    .await?;
            }
            ProtectedResource::Database => {
                if let Some(cluster) = stack.output("DBCluster") {
                    info!("db cluster {}: deletion protection {}", cluster, enabled);
                    gateway
                        .databases
                        .set_cluster_deletion_protection(cluster, enabled)
                        .await?;
                } else if let Some(instance) = stack.output("DBInstance") {
                    info!("db instance {}: deletion protection {}", instance, enabled);
                    gateway
                        .databases
                        .set_instance_deletion_protection(instance, enabled)
                        .await?;
                } else {
                    warn!(
                        "{}: no DBInstance or DBCluster output, leaving deletion protection alone",
                        stack.stack_name
                    );
                }
            }
        }
        Ok(())
    }
}
