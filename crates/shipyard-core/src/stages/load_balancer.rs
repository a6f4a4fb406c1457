//! Application load balancer, target group and HTTP listener

use super::RunContext;
use super::network::one_per_zone;
use crate::error::{ResourceContext, StepError, StepResult};
use crate::model::{LoadBalancerSet, NetworkTopology, PolicyKind, SecurityPolicySet};
use shipyard_cloud::{
    LoadBalancerApi, LoadBalancerSpec, NetworkApi, SubnetId, TargetGroupSpec, wait_until,
};
use tracing::{info, warn};

pub const LISTENER_PORT: u16 = 80;
pub const TARGET_PORT: u16 = 80;

pub fn target_group_spec(ctx: &RunContext, topology: &NetworkTopology) -> TargetGroupSpec {
    let name = ctx.name("tg");
    TargetGroupSpec {
        tags: ctx.tags(&name),
        name,
        vpc_id: topology.vpc_id.clone(),
        port: TARGET_PORT,
        health_check_path: "/".to_string(),
        health_check_interval_secs: 30,
        health_check_timeout_secs: 5,
        healthy_threshold: 2,
        unhealthy_threshold: 2,
        success_codes: "200".to_string(),
    }
}

pub async fn setup(
    load_balancing: &dyn LoadBalancerApi,
    network: &dyn NetworkApi,
    ctx: &RunContext,
    topology: &NetworkTopology,
    policies: &SecurityPolicySet,
) -> StepResult<LoadBalancerSet> {
    ctx.ensure_active()?;
    let subnets = placement_subnets(network, topology).await?;

    let tg_spec = target_group_spec(ctx, topology);
    let target_group = load_balancing
        .create_target_group(&tg_spec)
        .await
        .resource(&tg_spec.name)?;
    info!(target_group = %target_group, "created target group");

    let name = ctx.name("alb");
    let spec = LoadBalancerSpec {
        name: name.clone(),
        subnets,
        security_groups: policies.get(PolicyKind::Edge).cloned().into_iter().collect(),
        internet_facing: true,
        tags: ctx.tags(&name),
    };
    if spec.security_groups.is_empty() {
        warn!(load_balancer = %name, "no edge security group, using the VPC default");
    }
    let lb = load_balancing
        .create_load_balancer(&spec)
        .await
        .resource(&name)?;

    info!(load_balancer = %name, "waiting for load balancer to become active");
    wait_until(
        &format!("load balancer {}", name),
        ctx.settings.load_balancer_wait,
        || load_balancing.load_balancer_state(&lb.arn),
    )
    .await
    .resource(&name)?;

    let listener = load_balancing
        .create_listener(&lb.arn, LISTENER_PORT, &target_group)
        .await
        .resource(&name)?;
    info!(dns = %lb.dns_name, "load balancer ready");

    Ok(LoadBalancerSet {
        load_balancer: lb.arn,
        dns_name: lb.dns_name,
        target_group,
        listener,
    })
}

/// Public subnets for the load balancer, at most one per availability zone
///
/// Falls back to scanning the VPC for public subnets when none were passed.
async fn placement_subnets(
    network: &dyn NetworkApi,
    topology: &NetworkTopology,
) -> StepResult<Vec<SubnetId>> {
    let candidates = if topology.public_subnets.is_empty() {
        network
            .subnets_in_vpc(&topology.vpc_id)
            .await
            .resource(topology.vpc_id.as_str())?
            .into_iter()
            .filter(|s| s.map_public_ip_on_launch)
            .collect()
    } else {
        network
            .describe_subnets(&topology.public_subnets)
            .await
            .resource("public subnets")?
    };

    let subnets = one_per_zone(&candidates);
    if subnets.is_empty() {
        return Err(StepError::Configuration(format!(
            "no public subnets available for the load balancer in {}",
            topology.vpc_id
        )));
    }
    Ok(subnets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::context;
    use shipyard_cloud::{FakeCloud, SecurityGroupId, VpcId};

    fn topology(public: &[&str]) -> NetworkTopology {
        NetworkTopology {
            vpc_id: VpcId::new("vpc-1"),
            public_subnets: public.iter().map(|s| SubnetId::new(*s)).collect(),
            private_subnets: vec![SubnetId::new("subnet-p")],
            nat_gateway: None,
            internet_gateway: None,
            created: false,
        }
    }

    fn edge_only() -> SecurityPolicySet {
        let mut set = SecurityPolicySet::default();
        set.insert(PolicyKind::Edge, SecurityGroupId::new("sg-edge"));
        set
    }

    #[tokio::test]
    async fn test_deduplicates_subnets_per_zone() {
        let cloud = FakeCloud::default();
        cloud.add_subnet("vpc-1", "subnet-a", "ap-south-1a", true);
        cloud.add_subnet("vpc-1", "subnet-b", "ap-south-1a", true);
        cloud.add_subnet("vpc-1", "subnet-c", "ap-south-1b", true);

        let lbs = setup(
            &cloud,
            &cloud,
            &context("demo"),
            &topology(&["subnet-a", "subnet-b", "subnet-c"]),
            &edge_only(),
        )
        .await
        .unwrap();

        let created = cloud.load_balancers();
        assert_eq!(created.len(), 1);
        assert_eq!(
            created[0].subnets,
            vec![SubnetId::new("subnet-a"), SubnetId::new("subnet-c")]
        );
        assert_eq!(created[0].security_groups, vec![SecurityGroupId::new("sg-edge")]);
        assert!(created[0].internet_facing);
        assert!(lbs.url().starts_with("http://demo-alb-"));
    }

    #[tokio::test]
    async fn test_scans_vpc_when_no_public_subnets_given() {
        let cloud = FakeCloud::default();
        cloud.add_subnet("vpc-1", "subnet-a", "ap-south-1a", true);
        cloud.add_subnet("vpc-1", "subnet-b", "ap-south-1b", true);
        cloud.add_subnet("vpc-1", "subnet-c", "ap-south-1c", false);

        setup(&cloud, &cloud, &context("demo"), &topology(&[]), &edge_only())
            .await
            .unwrap();
        assert_eq!(
            cloud.load_balancers()[0].subnets,
            vec![SubnetId::new("subnet-a"), SubnetId::new("subnet-b")]
        );
    }

    #[tokio::test]
    async fn test_listener_created_after_active() {
        let cloud = FakeCloud::default();
        cloud.set_pending_polls(2);
        cloud.add_subnet("vpc-1", "subnet-a", "ap-south-1a", true);
        cloud.add_subnet("vpc-1", "subnet-b", "ap-south-1b", true);

        setup(
            &cloud,
            &cloud,
            &context("demo"),
            &topology(&["subnet-a", "subnet-b"]),
            &edge_only(),
        )
        .await
        .unwrap();

        let ops: Vec<_> = cloud.calls().iter().map(|c| c.operation).collect();
        let listener = ops.iter().position(|o| *o == "create_listener").unwrap();
        let last_poll = ops.iter().rposition(|o| *o == "load_balancer_state").unwrap();
        assert!(last_poll < listener);
        assert_eq!(cloud.call_count("load_balancer_state"), 3);
        assert_eq!(cloud.targets("create_target_group"), vec!["demo-tg"]);
    }

    #[test]
    fn test_target_group_health_check() {
        let spec = target_group_spec(&context("demo"), &topology(&[]));
        assert_eq!(spec.name, "demo-tg");
        assert_eq!(spec.health_check_path, "/");
        assert_eq!(spec.healthy_threshold, 2);
        assert_eq!(spec.unhealthy_threshold, 2);
    }
}
