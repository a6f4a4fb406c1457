//! Resource specifications and descriptions exchanged with capabilities

use crate::id::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tags stamped on every created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTags {
    /// Value of the `Name` tag
    pub name: String,

    /// Value of the `Infra` tag (the infra name the run was started with)
    pub infra: String,

    /// Additional key/value pairs
    pub extra: Vec<(String, String)>,
}

impl ResourceTags {
    pub fn new(name: impl Into<String>, infra: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            infra: infra.into(),
            extra: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// All tags as key/value pairs, `Name` and `Infra` first
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("Name".to_string(), self.name.clone()),
            ("Infra".to_string(), self.infra.clone()),
        ];
        pairs.extend(self.extra.iter().cloned());
        pairs
    }
}

/// Readiness of a resource that is polled by a waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    Pending,
    Available,
    Failed(String),
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub vpc_id: VpcId,
    pub cidr_block: String,
    pub availability_zone: String,
    pub tags: ResourceTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    pub id: SubnetId,
    pub availability_zone: String,
    pub map_public_ip_on_launch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    InternetGateway(InternetGatewayId),
    NatGateway(NatGatewayId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInfo {
    pub destination: Option<String>,
    pub gateway_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTableInfo {
    pub id: RouteTableId,
    pub routes: Vec<RouteInfo>,
}

impl RouteTableInfo {
    /// Whether any route in this table points at an internet gateway
    pub fn routes_to_internet_gateway(&self) -> bool {
        self.routes.iter().any(|r| {
            r.gateway_id
                .as_deref()
                .is_some_and(|g| g.starts_with("igw-"))
        })
    }
}

// ---------------------------------------------------------------------------
// Security groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub description: String,
    pub vpc_id: VpcId,
    pub tags: ResourceTags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Where inbound traffic may originate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IngressSource {
    Cidr(String),
    Group(SecurityGroupId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: u16,
    pub source: IngressSource,
}

pub const ANYWHERE: &str = "0.0.0.0/0";

impl IngressRule {
    pub fn from_anywhere(protocol: Protocol, port: u16) -> Self {
        Self {
            protocol,
            port,
            source: IngressSource::Cidr(ANYWHERE.to_string()),
        }
    }

    pub fn from_group(protocol: Protocol, port: u16, group: &SecurityGroupId) -> Self {
        Self {
            protocol,
            port,
            source: IngressSource::Group(group.clone()),
        }
    }

    pub fn is_open_to_internet(&self) -> bool {
        matches!(&self.source, IngressSource::Cidr(c) if c == ANYWHERE)
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            IngressSource::Cidr(cidr) => {
                write!(f, "{}/{} from {}", self.protocol.as_str(), self.port, cidr)
            }
            IngressSource::Group(group) => {
                write!(f, "{}/{} from {}", self.protocol.as_str(), self.port, group)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load balancing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupSpec {
    pub name: String,
    pub vpc_id: VpcId,
    pub port: u16,
    pub health_check_path: String,
    pub health_check_interval_secs: u32,
    pub health_check_timeout_secs: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub success_codes: String,
    pub tags: ResourceTags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub subnets: Vec<SubnetId>,
    pub security_groups: Vec<SecurityGroupId>,
    pub internet_facing: bool,
    pub tags: ResourceTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerInfo {
    pub arn: LoadBalancerArn,
    pub dns_name: String,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    /// Trust relationship document
    pub trust_policy: serde_json::Value,
    pub tags: ResourceTags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceProfile {
    pub arn: InstanceProfileArn,
    /// Names of the roles attached to the profile
    pub roles: Vec<String>,
}

impl InstanceProfile {
    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r == role_name)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Short-lived registry push credential
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredential {
    pub username: String,
    pub password: String,
    /// Registry endpoint, e.g. `https://<account>.dkr.ecr.<region>.amazonaws.com`
    pub endpoint: String,
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub digest: Option<String>,
    pub size_bytes: Option<i64>,
    pub pushed_at: Option<String>,
}

/// Target CPU architecture for images and compute nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuArchitecture {
    #[default]
    Arm64,
    X86_64,
}

impl CpuArchitecture {
    /// Docker platform string
    pub fn platform(&self) -> &'static str {
        match self {
            CpuArchitecture::Arm64 => "linux/arm64",
            CpuArchitecture::X86_64 => "linux/amd64",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CpuArchitecture::Arm64 => "arm64",
            CpuArchitecture::X86_64 => "x86_64",
        }
    }
}

/// Everything the image-build capability needs for one build + push
#[derive(Debug, Clone)]
pub struct ImageBuildRequest {
    /// Git URL of the source template
    pub source_repo: String,
    pub destination: RepositoryUri,
    pub tag: String,
    pub architecture: CpuArchitecture,
    pub credential: RegistryCredential,
}

// ---------------------------------------------------------------------------
// Compute
// ---------------------------------------------------------------------------

/// Freshly minted key pair; the private key is only available once
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPairMaterial {
    pub name: String,
    pub key_pair_id: String,
    pub private_key: String,
}

impl fmt::Debug for KeyPairMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairMaterial")
            .field("name", &self.name)
            .field("key_pair_id", &self.key_pair_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTemplateSpec {
    pub name: String,
    pub image_id: ImageId,
    pub instance_type: String,
    pub security_groups: Vec<SecurityGroupId>,
    pub instance_profile: InstanceProfileArn,
    /// Plain-text bootstrap script; implementations encode as required
    pub user_data: String,
    pub root_volume_gib: u32,
    pub key_name: Option<String>,
    pub require_imdsv2: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoScalingGroupSpec {
    pub name: String,
    pub launch_template: LaunchTemplateId,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub subnets: Vec<SubnetId>,
    pub health_check_grace_secs: u32,
    /// Propagated `Name` tag for launched instances
    pub instance_name: String,
}

// ---------------------------------------------------------------------------
// Container orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityProviderSpec {
    pub name: CapacityProviderName,
    pub auto_scaling_group: AutoScalingGroupArn,
    pub managed_scaling: bool,
    pub target_capacity: u32,
    pub termination_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityProviderStrategy {
    pub provider: CapacityProviderName,
    pub weight: u32,
    pub base: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub port: u16,
    pub log_group: String,
    pub log_region: String,
    pub log_stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub execution_role: RoleArn,
    pub task_role: RoleArn,
    pub architecture: CpuArchitecture,
    pub container: ContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLoadBalancer {
    pub target_group: TargetGroupArn,
    pub container_name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub cluster: String,
    pub name: String,
    pub task_definition: TaskDefinitionArn,
    pub desired_count: u32,
    pub strategy: CapacityProviderStrategy,
    pub subnets: Vec<SubnetId>,
    pub security_groups: Vec<SecurityGroupId>,
    pub assign_public_ip: bool,
    pub health_check_grace_secs: u32,
    pub load_balancer: Option<ServiceLoadBalancer>,
}

/// A compute node registered with a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub arn: String,
    pub ec2_instance_id: Option<String>,
    pub status: Option<String>,
    pub agent_connected: bool,
    pub running_tasks: u32,
}
