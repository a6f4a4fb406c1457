//! Stage outputs handed to later stages

use super::request::PolicyKind;
use serde::{Deserialize, Serialize};
use shipyard_cloud::*;
use std::collections::BTreeMap;

/// Output of the network stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub vpc_id: VpcId,
    pub public_subnets: Vec<SubnetId>,
    pub private_subnets: Vec<SubnetId>,
    /// `None` when an existing VPC is used
    pub nat_gateway: Option<NatGatewayId>,
    pub internet_gateway: Option<InternetGatewayId>,
    /// Whether this run created the VPC
    pub created: bool,
}

/// Policy kind to security group id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicySet {
    groups: BTreeMap<PolicyKind, SecurityGroupId>,
}

impl SecurityPolicySet {
    pub fn get(&self, kind: PolicyKind) -> Option<&SecurityGroupId> {
        self.groups.get(&kind)
    }

    pub fn insert(&mut self, kind: PolicyKind, group: SecurityGroupId) {
        self.groups.insert(kind, group);
    }

    pub fn kinds(&self) -> impl Iterator<Item = PolicyKind> + '_ {
        self.groups.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PolicyKind, &SecurityGroupId)> {
        self.groups.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// The three IAM roles and the instance profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    pub account_id: String,
    pub task_role: RoleArn,
    pub execution_role: RoleArn,
    pub instance_role: RoleArn,
    pub instance_profile: InstanceProfileArn,
    /// Whether anything was created, which decides the propagation pause
    pub newly_created: bool,
}

/// Registry repository and the pushed image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryImage {
    pub repository: RepositoryUri,
    pub tag: String,
    pub detail: Option<ImageDetail>,
}

impl RegistryImage {
    /// `<repository>:<tag>`
    pub fn image(&self) -> String {
        self.repository.image(&self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSet {
    pub load_balancer: LoadBalancerArn,
    pub dns_name: String,
    pub target_group: TargetGroupArn,
    pub listener: ListenerArn,
}

impl LoadBalancerSet {
    pub fn url(&self) -> String {
        format!("http://{}", self.dns_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    pub cluster_name: String,
    pub cluster_arn: ClusterArn,
    pub machine_image: ImageId,
    pub launch_template: LaunchTemplateId,
    pub auto_scaling_group: AutoScalingGroupArn,
    pub capacity_provider: CapacityProviderName,
    pub strategy: CapacityProviderStrategy,
    /// Whether a node registered before the timeout
    pub nodes_registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub cluster_name: String,
    pub service_name: String,
    pub service_arn: ServiceArn,
    pub task_definition: TaskDefinitionArn,
}
