//! Capability interfaces
//!
//! One trait per provider API domain. Each method maps to a single provider
//! call; business rules (naming, CIDR layout, ordering) live in the caller.
//! Every method returns [`CloudError::AlreadyExists`](crate::CloudError) or
//! [`CloudError::NotFound`](crate::CloudError) where the provider reports
//! those conditions so callers can implement fetch-or-create.

use crate::error::Result;
use crate::id::*;
use crate::model::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Virtual network: VPCs, subnets, gateways, route tables, endpoints
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Create a VPC with the given address block
    async fn create_vpc(&self, cidr_block: &str, tags: &ResourceTags) -> Result<VpcId>;

    /// Current state of a VPC (used by the `vpc available` waiter)
    async fn vpc_state(&self, vpc: &VpcId) -> Result<ResourceState>;

    /// Enable DNS resolution and DNS hostnames
    async fn enable_dns(&self, vpc: &VpcId) -> Result<()>;

    async fn create_internet_gateway(&self, tags: &ResourceTags) -> Result<InternetGatewayId>;

    async fn attach_internet_gateway(&self, gateway: &InternetGatewayId, vpc: &VpcId)
    -> Result<()>;

    /// Names of the availability zones currently available in the region
    async fn availability_zones(&self) -> Result<Vec<String>>;

    async fn create_subnet(&self, spec: &SubnetSpec) -> Result<SubnetId>;

    /// Turn on "auto-assign public IP" for a subnet
    async fn enable_public_ip_on_launch(&self, subnet: &SubnetId) -> Result<()>;

    async fn allocate_elastic_ip(&self, tags: &ResourceTags) -> Result<AllocationId>;

    async fn create_nat_gateway(
        &self,
        subnet: &SubnetId,
        allocation: &AllocationId,
        tags: &ResourceTags,
    ) -> Result<NatGatewayId>;

    /// Current state of a NAT gateway (used by the `nat available` waiter)
    async fn nat_gateway_state(&self, gateway: &NatGatewayId) -> Result<ResourceState>;

    async fn create_route_table(&self, vpc: &VpcId, tags: &ResourceTags) -> Result<RouteTableId>;

    /// Add a `0.0.0.0/0` route to the table
    async fn create_default_route(&self, table: &RouteTableId, target: &RouteTarget) -> Result<()>;

    async fn associate_route_table(&self, table: &RouteTableId, subnet: &SubnetId) -> Result<()>;

    /// Create a gateway-type endpoint for `service_name` on the given route tables
    async fn create_gateway_endpoint(
        &self,
        vpc: &VpcId,
        service_name: &str,
        route_tables: &[RouteTableId],
        tags: &ResourceTags,
    ) -> Result<VpcEndpointId>;

    /// All subnets in a VPC
    async fn subnets_in_vpc(&self, vpc: &VpcId) -> Result<Vec<SubnetInfo>>;

    /// Describe specific subnets
    async fn describe_subnets(&self, subnets: &[SubnetId]) -> Result<Vec<SubnetInfo>>;

    /// Route tables explicitly associated with a subnet
    async fn route_tables_for_subnet(&self, subnet: &SubnetId) -> Result<Vec<RouteTableInfo>>;

    /// The VPC's main route table(s)
    async fn main_route_tables(&self, vpc: &VpcId) -> Result<Vec<RouteTableInfo>>;
}

/// Security groups and their inbound rules
#[async_trait]
pub trait SecurityGroupApi: Send + Sync {
    async fn create_security_group(&self, spec: &SecurityGroupSpec) -> Result<SecurityGroupId>;

    async fn authorize_ingress(&self, group: &SecurityGroupId, rules: &[IngressRule])
    -> Result<()>;
}

/// Application load balancers, target groups and listeners
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<TargetGroupArn>;

    async fn create_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<LoadBalancerInfo>;

    /// Current state (used by the `load balancer active` waiter)
    async fn load_balancer_state(&self, arn: &LoadBalancerArn) -> Result<ResourceState>;

    /// Create an HTTP listener forwarding everything to `target_group`
    async fn create_listener(
        &self,
        load_balancer: &LoadBalancerArn,
        port: u16,
        target_group: &TargetGroupArn,
    ) -> Result<ListenerArn>;
}

/// Roles, managed-policy attachments and instance profiles
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Account id of the calling credentials
    async fn account_id(&self) -> Result<String>;

    /// ARN of the role named `name`, if it exists
    async fn get_role(&self, name: &str) -> Result<Option<RoleArn>>;

    async fn create_role(&self, spec: &RoleSpec) -> Result<RoleArn>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    /// The profile named `name` with its attached roles, if it exists
    async fn get_instance_profile(&self, name: &str) -> Result<Option<InstanceProfile>>;

    async fn create_instance_profile(&self, name: &str) -> Result<InstanceProfileArn>;

    async fn add_role_to_instance_profile(&self, profile: &str, role_name: &str) -> Result<()>;
}

/// Container image registry
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// URI of the repository named `name`, if it exists
    async fn describe_repository(&self, name: &str) -> Result<Option<RepositoryUri>>;

    async fn create_repository(&self, name: &str, tags: &ResourceTags) -> Result<RepositoryUri>;

    /// Short-lived push credential
    async fn authorization(&self) -> Result<RegistryCredential>;

    /// Detail for `repository:tag`, if the image is listable
    async fn describe_image(&self, repository: &str, tag: &str) -> Result<Option<ImageDetail>>;
}

/// Compute nodes: key pairs, machine images, launch templates, auto scaling
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn create_key_pair(&self, name: &str) -> Result<KeyPairMaterial>;

    /// Provider-recommended container-optimized machine image
    async fn recommended_machine_image(&self, arch: CpuArchitecture) -> Result<ImageId>;

    async fn create_launch_template(&self, spec: &LaunchTemplateSpec) -> Result<LaunchTemplateId>;

    async fn create_auto_scaling_group(
        &self,
        spec: &AutoScalingGroupSpec,
    ) -> Result<AutoScalingGroupArn>;
}

/// Container orchestration: clusters, task definitions, capacity, services
#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn create_cluster(&self, name: &str) -> Result<ClusterArn>;

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec)
    -> Result<TaskDefinitionArn>;

    async fn create_capacity_provider(
        &self,
        spec: &CapacityProviderSpec,
    ) -> Result<CapacityProviderName>;

    /// Associate `providers` with the cluster and set the default strategy
    async fn put_cluster_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProviderName],
        default_strategy: &CapacityProviderStrategy,
    ) -> Result<()>;

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceArn>;

    /// Compute nodes that have registered with the cluster
    async fn list_container_instances(&self, cluster: &str) -> Result<Vec<ContainerInstance>>;
}

/// External image build tooling: clone, build, push, clean up
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build_and_push(&self, request: &ImageBuildRequest) -> Result<()>;
}

/// The full set of capabilities a provisioning run needs
#[derive(Clone)]
pub struct Capabilities {
    pub network: Arc<dyn NetworkApi>,
    pub security: Arc<dyn SecurityGroupApi>,
    pub load_balancing: Arc<dyn LoadBalancerApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub registry: Arc<dyn RegistryApi>,
    pub compute: Arc<dyn ComputeApi>,
    pub containers: Arc<dyn ContainerApi>,
    pub image_builder: Arc<dyn ImageBuilder>,
}

impl Capabilities {
    /// Use one object that implements every provider capability, plus a
    /// separate image builder
    pub fn from_provider<P>(provider: Arc<P>, image_builder: Arc<dyn ImageBuilder>) -> Self
    where
        P: NetworkApi
            + SecurityGroupApi
            + LoadBalancerApi
            + IdentityApi
            + RegistryApi
            + ComputeApi
            + ContainerApi
            + 'static,
    {
        Self {
            network: provider.clone(),
            security: provider.clone(),
            load_balancing: provider.clone(),
            identity: provider.clone(),
            registry: provider.clone(),
            compute: provider.clone(),
            containers: provider,
            image_builder,
        }
    }
}
