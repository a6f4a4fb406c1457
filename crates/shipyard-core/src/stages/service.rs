//! ECS service

use super::RunContext;
use super::task::CONTAINER_PORT;
use crate::error::{ResourceContext, StepError, StepResult};
use crate::model::{
    ClusterTopology, LoadBalancerSet, NetworkTopology, PolicyKind, SecurityPolicySet,
    ServiceDescriptor,
};
use shipyard_cloud::{ContainerApi, ServiceLoadBalancer, ServiceSpec, TaskDefinitionArn};
use tracing::info;

pub const DESIRED_COUNT: u32 = 1;
/// Grace period while the application warms up behind the load balancer
pub const GRACE_WITH_LOAD_BALANCER_SECS: u32 = 300;
pub const GRACE_WITHOUT_LOAD_BALANCER_SECS: u32 = 60;

pub fn service_name(infra: &str) -> String {
    format!("{}-service", infra)
}

pub fn service_spec(
    ctx: &RunContext,
    cluster: &ClusterTopology,
    task_definition: &TaskDefinitionArn,
    load_balancer: Option<&LoadBalancerSet>,
    topology: &NetworkTopology,
    policies: &SecurityPolicySet,
) -> StepResult<ServiceSpec> {
    let compute = policies.get(PolicyKind::Compute).cloned().ok_or_else(|| {
        StepError::Configuration("the compute security group is required".to_string())
    })?;

    Ok(ServiceSpec {
        cluster: cluster.cluster_name.clone(),
        name: service_name(&ctx.infra),
        task_definition: task_definition.clone(),
        desired_count: DESIRED_COUNT,
        strategy: cluster.strategy.clone(),
        subnets: topology.private_subnets.clone(),
        security_groups: vec![compute],
        assign_public_ip: false,
        health_check_grace_secs: if load_balancer.is_some() {
            GRACE_WITH_LOAD_BALANCER_SECS
        } else {
            GRACE_WITHOUT_LOAD_BALANCER_SECS
        },
        load_balancer: load_balancer.map(|lb| ServiceLoadBalancer {
            target_group: lb.target_group.clone(),
            container_name: ctx.infra.clone(),
            container_port: CONTAINER_PORT,
        }),
    })
}

pub async fn create(
    containers: &dyn ContainerApi,
    ctx: &RunContext,
    cluster: &ClusterTopology,
    task_definition: &TaskDefinitionArn,
    load_balancer: Option<&LoadBalancerSet>,
    topology: &NetworkTopology,
    policies: &SecurityPolicySet,
) -> StepResult<ServiceDescriptor> {
    ctx.ensure_active()?;
    let spec = service_spec(ctx, cluster, task_definition, load_balancer, topology, policies)?;
    let service_arn = containers
        .create_service(&spec)
        .await
        .resource(&spec.name)?;
    info!(service = %spec.name, cluster = %spec.cluster, "created service");

    Ok(ServiceDescriptor {
        cluster_name: spec.cluster,
        service_name: spec.name,
        service_arn,
        task_definition: spec.task_definition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::context;
    use shipyard_cloud::*;

    fn cluster() -> ClusterTopology {
        let provider = CapacityProviderName::new("demo-cp");
        ClusterTopology {
            cluster_name: "demo".into(),
            cluster_arn: ClusterArn::new("arn:cluster/demo"),
            machine_image: ImageId::new("ami-1"),
            launch_template: LaunchTemplateId::new("lt-1"),
            auto_scaling_group: AutoScalingGroupArn::new("arn:asg"),
            capacity_provider: provider.clone(),
            strategy: CapacityProviderStrategy {
                provider,
                weight: 1,
                base: 0,
            },
            nodes_registered: true,
        }
    }

    fn topology() -> NetworkTopology {
        NetworkTopology {
            vpc_id: VpcId::new("vpc-1"),
            public_subnets: vec![SubnetId::new("subnet-pub")],
            private_subnets: vec![SubnetId::new("subnet-p1"), SubnetId::new("subnet-p2")],
            nat_gateway: None,
            internet_gateway: None,
            created: false,
        }
    }

    fn policies() -> SecurityPolicySet {
        let mut set = SecurityPolicySet::default();
        set.insert(PolicyKind::Compute, SecurityGroupId::new("sg-compute"));
        set
    }

    fn load_balancer() -> LoadBalancerSet {
        LoadBalancerSet {
            load_balancer: LoadBalancerArn::new("arn:lb"),
            dns_name: "demo-alb.example.com".into(),
            target_group: TargetGroupArn::new("arn:tg"),
            listener: ListenerArn::new("arn:listener"),
        }
    }

    #[tokio::test]
    async fn test_service_placement() {
        let cloud = FakeCloud::default();
        let lb = load_balancer();
        let service = create(
            &cloud,
            &context("demo"),
            &cluster(),
            &TaskDefinitionArn::new("arn:task/demo:1"),
            Some(&lb),
            &topology(),
            &policies(),
        )
        .await
        .unwrap();
        assert_eq!(service.service_name, "demo-service");

        let spec = cloud.last_service().unwrap();
        assert_eq!(spec.cluster, "demo");
        assert_eq!(spec.desired_count, 1);
        assert!(!spec.assign_public_ip);
        assert_eq!(spec.subnets, topology().private_subnets);
        assert_eq!(spec.security_groups, vec![SecurityGroupId::new("sg-compute")]);
        assert_eq!(spec.strategy.provider.as_str(), "demo-cp");
        assert_eq!(spec.health_check_grace_secs, 300);
        let attached = spec.load_balancer.unwrap();
        assert_eq!(attached.target_group, TargetGroupArn::new("arn:tg"));
        assert_eq!(attached.container_name, "demo");
        assert_eq!(attached.container_port, 80);
    }

    #[test]
    fn test_shorter_grace_without_load_balancer() {
        let spec = service_spec(
            &context("demo"),
            &cluster(),
            &TaskDefinitionArn::new("arn:task/demo:1"),
            None,
            &topology(),
            &policies(),
        )
        .unwrap();
        assert_eq!(spec.health_check_grace_secs, 60);
        assert!(spec.load_balancer.is_none());
    }
}
