use crate::error::sdk_error;
use crate::{AwsCloud, invalid_request, missing};
use async_trait::async_trait;
use aws_sdk_ecs::types::{
    AssignPublicIp, AutoScalingGroupProvider, AwsVpcConfiguration, CapacityProviderStrategyItem,
    ClusterSetting, ClusterSettingName, Compatibility, ContainerDefinition, LoadBalancer,
    LogConfiguration, LogDriver, ManagedScaling, ManagedScalingStatus,
    ManagedTerminationProtection, NetworkConfiguration, NetworkMode, OsFamily, PortMapping,
    PropagateTags, RuntimePlatform, SchedulingStrategy, TransportProtocol,
};
use shipyard_cloud::{
    CapacityProviderName, CapacityProviderSpec, CapacityProviderStrategy, ClusterArn,
    ContainerApi, ContainerInstance, CpuArchitecture, Result, ServiceArn, ServiceSpec,
    TaskDefinitionArn, TaskDefinitionSpec,
};

fn strategy_item(
    operation: &str,
    strategy: &CapacityProviderStrategy,
) -> Result<CapacityProviderStrategyItem> {
    CapacityProviderStrategyItem::builder()
        .capacity_provider(strategy.provider.as_str())
        .weight(strategy.weight as i32)
        .base(strategy.base as i32)
        .build()
        .map_err(|e| invalid_request(operation, e))
}

fn container_definition(spec: &TaskDefinitionSpec) -> Result<ContainerDefinition> {
    let container = &spec.container;
    let logging = LogConfiguration::builder()
        .log_driver(LogDriver::Awslogs)
        .options("awslogs-group", &container.log_group)
        .options("awslogs-region", &container.log_region)
        .options("awslogs-stream-prefix", &container.log_stream_prefix)
        .build()
        .map_err(|e| invalid_request("RegisterTaskDefinition", e))?;
    Ok(ContainerDefinition::builder()
        .name(&container.name)
        .image(&container.image)
        .cpu(container.cpu as i32)
        .memory(container.memory_mib as i32)
        .essential(true)
        .port_mappings(
            PortMapping::builder()
                .container_port(i32::from(container.port))
                .host_port(i32::from(container.port))
                .protocol(TransportProtocol::Tcp)
                .build(),
        )
        .log_configuration(logging)
        .build())
}

#[async_trait]
impl ContainerApi for AwsCloud {
    async fn create_cluster(&self, name: &str) -> Result<ClusterArn> {
        let out = self
            .ecs
            .create_cluster()
            .cluster_name(name)
            .settings(
                ClusterSetting::builder()
                    .name(ClusterSettingName::ContainerInsights)
                    .value("disabled")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| sdk_error("CreateCluster", e))?;
        out.cluster()
            .and_then(|c| c.cluster_arn())
            .map(ClusterArn::new)
            .ok_or_else(|| missing("CreateCluster", "ClusterArn"))
    }

    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<TaskDefinitionArn> {
        let arch = match spec.architecture {
            CpuArchitecture::Arm64 => aws_sdk_ecs::types::CpuArchitecture::Arm64,
            CpuArchitecture::X86_64 => aws_sdk_ecs::types::CpuArchitecture::X8664,
        };
        let out = self
            .ecs
            .register_task_definition()
            .family(&spec.family)
            .network_mode(NetworkMode::Awsvpc)
            .requires_compatibilities(Compatibility::Ec2)
            .cpu(spec.cpu.to_string())
            .memory(spec.memory_mib.to_string())
            .execution_role_arn(spec.execution_role.as_str())
            .task_role_arn(spec.task_role.as_str())
            .runtime_platform(
                RuntimePlatform::builder()
                    .cpu_architecture(arch)
                    .operating_system_family(OsFamily::Linux)
                    .build(),
            )
            .container_definitions(container_definition(spec)?)
            .send()
            .await
            .map_err(|e| sdk_error("RegisterTaskDefinition", e))?;
        out.task_definition()
            .and_then(|t| t.task_definition_arn())
            .map(TaskDefinitionArn::new)
            .ok_or_else(|| missing("RegisterTaskDefinition", "TaskDefinitionArn"))
    }

    async fn create_capacity_provider(
        &self,
        spec: &CapacityProviderSpec,
    ) -> Result<CapacityProviderName> {
        let scaling = if spec.managed_scaling {
            ManagedScalingStatus::Enabled
        } else {
            ManagedScalingStatus::Disabled
        };
        let protection = if spec.termination_protection {
            ManagedTerminationProtection::Enabled
        } else {
            ManagedTerminationProtection::Disabled
        };
        let provider = AutoScalingGroupProvider::builder()
            .auto_scaling_group_arn(spec.auto_scaling_group.as_str())
            .managed_scaling(
                ManagedScaling::builder()
                    .status(scaling)
                    .target_capacity(spec.target_capacity as i32)
                    .build(),
            )
            .managed_termination_protection(protection)
            .build()
            .map_err(|e| invalid_request("CreateCapacityProvider", e))?;
        let out = self
            .ecs
            .create_capacity_provider()
            .name(spec.name.as_str())
            .auto_scaling_group_provider(provider)
            .send()
            .await
            .map_err(|e| sdk_error("CreateCapacityProvider", e))?;
        out.capacity_provider()
            .and_then(|c| c.name())
            .map(CapacityProviderName::new)
            .ok_or_else(|| missing("CreateCapacityProvider", "Name"))
    }

    async fn put_cluster_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProviderName],
        default_strategy: &CapacityProviderStrategy,
    ) -> Result<()> {
        self.ecs
            .put_cluster_capacity_providers()
            .cluster(cluster)
            .set_capacity_providers(Some(providers.iter().map(|p| p.to_string()).collect()))
            .default_capacity_provider_strategy(strategy_item(
                "PutClusterCapacityProviders",
                default_strategy,
            )?)
            .send()
            .await
            .map_err(|e| sdk_error("PutClusterCapacityProviders", e))?;
        Ok(())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceArn> {
        let public_ip = if spec.assign_public_ip {
            AssignPublicIp::Enabled
        } else {
            AssignPublicIp::Disabled
        };
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(spec.subnets.iter().map(|s| s.to_string()).collect()))
            .set_security_groups(Some(
                spec.security_groups.iter().map(|g| g.to_string()).collect(),
            ))
            .assign_public_ip(public_ip)
            .build()
            .map_err(|e| invalid_request("CreateService", e))?;
        let load_balancers = spec.load_balancer.as_ref().map(|lb| {
            vec![
                LoadBalancer::builder()
                    .target_group_arn(lb.target_group.as_str())
                    .container_name(&lb.container_name)
                    .container_port(i32::from(lb.container_port))
                    .build(),
            ]
        });
        let out = self
            .ecs
            .create_service()
            .cluster(&spec.cluster)
            .service_name(&spec.name)
            .task_definition(spec.task_definition.as_str())
            .desired_count(spec.desired_count as i32)
            .capacity_provider_strategy(strategy_item("CreateService", &spec.strategy)?)
            .network_configuration(
                NetworkConfiguration::builder()
                    .awsvpc_configuration(vpc)
                    .build(),
            )
            .set_load_balancers(load_balancers)
            .health_check_grace_period_seconds(spec.health_check_grace_secs as i32)
            .scheduling_strategy(SchedulingStrategy::Replica)
            .enable_ecs_managed_tags(true)
            .propagate_tags(PropagateTags::Service)
            .send()
            .await
            .map_err(|e| sdk_error("CreateService", e))?;
        out.service()
            .and_then(|s| s.service_arn())
            .map(ServiceArn::new)
            .ok_or_else(|| missing("CreateService", "ServiceArn"))
    }

    async fn list_container_instances(&self, cluster: &str) -> Result<Vec<ContainerInstance>> {
        let listed = self
            .ecs
            .list_container_instances()
            .cluster(cluster)
            .send()
            .await
            .map_err(|e| sdk_error("ListContainerInstances", e))?;
        let arns = listed.container_instance_arns();
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        let out = self
            .ecs
            .describe_container_instances()
            .cluster(cluster)
            .set_container_instances(Some(arns.to_vec()))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeContainerInstances", e))?;
        Ok(out
            .container_instances()
            .iter()
            .map(|ci| ContainerInstance {
                arn: ci.container_instance_arn().unwrap_or_default().to_string(),
                ec2_instance_id: ci.ec2_instance_id().map(str::to_string),
                status: ci.status().map(str::to_string),
                agent_connected: ci.agent_connected(),
                running_tasks: ci.running_tasks_count().max(0) as u32,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_cloud::{ContainerSpec, RoleArn};

    #[test]
    fn test_container_definition_logging_and_port() {
        let spec = TaskDefinitionSpec {
            family: "demo".into(),
            cpu: 256,
            memory_mib: 512,
            execution_role: RoleArn::new("arn:exec"),
            task_role: RoleArn::new("arn:task"),
            architecture: CpuArchitecture::Arm64,
            container: ContainerSpec {
                name: "demo".into(),
                image: "repo/demo:latest".into(),
                cpu: 128,
                memory_mib: 256,
                port: 80,
                log_group: "/ecs/demo".into(),
                log_region: "ap-south-1".into(),
                log_stream_prefix: "ecs".into(),
            },
        };
        let def = container_definition(&spec).unwrap();
        assert_eq!(def.name(), Some("demo"));
        assert_eq!(def.essential(), Some(true));
        assert_eq!(def.port_mappings()[0].container_port(), Some(80));
        let options = def.log_configuration().unwrap().options().unwrap();
        assert_eq!(options.get("awslogs-group").map(String::as_str), Some("/ecs/demo"));
    }

    #[test]
    fn test_strategy_item() {
        let item = strategy_item(
            "CreateService",
            &CapacityProviderStrategy {
                provider: CapacityProviderName::new("demo-cp"),
                weight: 1,
                base: 0,
            },
        )
        .unwrap();
        assert_eq!(item.capacity_provider(), "demo-cp");
        assert_eq!(item.weight(), 1);
    }
}
