//! ECS cluster, EC2 capacity and node registration

use super::RunContext;
use crate::error::{ResourceContext, StepError, StepResult};
use crate::model::{
    ClusterTopology, KeySelection, NetworkTopology, PolicyKind, ProvisioningRequest, RoleSet,
    SecurityPolicySet,
};
use shipyard_cloud::{
    AutoScalingGroupSpec, CapacityProviderName, CapacityProviderSpec, CapacityProviderStrategy,
    CloudError, ComputeApi, ContainerApi, CpuArchitecture, ImageId, KeyPairMaterial,
    LaunchTemplateSpec, ResourceState, wait_until,
};
use tracing::{debug, info, warn};

pub const ROOT_VOLUME_GIB: u32 = 50;
pub const ASG_MIN: u32 = 1;
pub const ASG_MAX: u32 = 5;
pub const ASG_DESIRED: u32 = 1;
pub const HEALTH_CHECK_GRACE_SECS: u32 = 300;
pub const TARGET_CAPACITY: u32 = 100;

/// Serverless providers associated with every cluster alongside our own
pub const DEFAULT_PROVIDERS: [&str; 2] = ["FARGATE", "FARGATE_SPOT"];

/// ECS-optimized ARM64 images used when the parameter lookup fails
const FALLBACK_IMAGES: &[(&str, &str)] = &[
    ("ap-south-1", "ami-05494a57c45f84170"),
    ("us-east-1", "ami-0c02fb55956c7d316"),
    ("us-west-2", "ami-0c6c53a1c9c1c9c1c"),
];

pub fn fallback_image(region: &str) -> Option<ImageId> {
    FALLBACK_IMAGES
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, id)| ImageId::new(*id))
}

/// Bootstrap script pointing the ECS agent at the cluster
pub fn user_data(cluster: &str, region: &str) -> String {
    format!(
        "#!/bin/bash\n\
         echo ECS_CLUSTER={cluster} >> /etc/ecs/ecs.config;\n\
         echo ECS_BACKEND_HOST=https://ecs.{region}.amazonaws.com >> /etc/ecs/ecs.config;\n"
    )
}

pub fn capacity_provider_name(infra: &str) -> CapacityProviderName {
    CapacityProviderName::new(format!("{}-cp", infra))
}

pub async fn setup(
    compute: &dyn ComputeApi,
    containers: &dyn ContainerApi,
    ctx: &RunContext,
    request: &ProvisioningRequest,
    topology: &NetworkTopology,
    policies: &SecurityPolicySet,
    roles: &RoleSet,
    key_name: Option<String>,
) -> StepResult<ClusterTopology> {
    ctx.ensure_active()?;
    let compute_group = policies.get(PolicyKind::Compute).cloned().ok_or_else(|| {
        StepError::Configuration("the compute security group is required".to_string())
    })?;
    if topology.private_subnets.is_empty() {
        return Err(StepError::Configuration(
            "no private subnets for compute nodes".to_string(),
        ));
    }

    let cluster_name = ctx.infra.clone();
    let cluster_arn = containers
        .create_cluster(&cluster_name)
        .await
        .resource(&cluster_name)?;
    info!(cluster = %cluster_name, "created cluster");

    let machine_image = resolve_machine_image(compute, ctx, request).await?;

    ctx.ensure_active()?;
    let lt_name = ctx.name("lt");
    let launch_template = compute
        .create_launch_template(&LaunchTemplateSpec {
            name: lt_name.clone(),
            image_id: machine_image.clone(),
            instance_type: request.instance_type(),
            security_groups: vec![compute_group],
            instance_profile: roles.instance_profile.clone(),
            user_data: user_data(&cluster_name, &ctx.region),
            root_volume_gib: ROOT_VOLUME_GIB,
            key_name,
            require_imdsv2: true,
        })
        .await
        .resource(&lt_name)?;

    let asg_name = ctx.name("asg");
    let auto_scaling_group = compute
        .create_auto_scaling_group(&AutoScalingGroupSpec {
            name: asg_name.clone(),
            launch_template: launch_template.clone(),
            min_size: ASG_MIN,
            max_size: ASG_MAX,
            desired_capacity: ASG_DESIRED,
            subnets: topology.private_subnets.clone(),
            health_check_grace_secs: HEALTH_CHECK_GRACE_SECS,
            instance_name: format!("ECS Instance - {}", ctx.infra),
        })
        .await
        .resource(&asg_name)?;
    info!(auto_scaling_group = %asg_name, "created auto scaling group");

    let cp_name = capacity_provider_name(&ctx.infra);
    let capacity_provider = containers
        .create_capacity_provider(&CapacityProviderSpec {
            name: cp_name.clone(),
            auto_scaling_group: auto_scaling_group.clone(),
            managed_scaling: true,
            target_capacity: TARGET_CAPACITY,
            termination_protection: false,
        })
        .await
        .resource(cp_name.as_str())?;

    let strategy = CapacityProviderStrategy {
        provider: capacity_provider.clone(),
        weight: 1,
        base: 0,
    };
    let mut providers: Vec<CapacityProviderName> = DEFAULT_PROVIDERS
        .iter()
        .map(|p| CapacityProviderName::new(*p))
        .collect();
    providers.push(capacity_provider.clone());
    containers
        .put_cluster_capacity_providers(&cluster_name, &providers, &strategy)
        .await
        .resource(&cluster_name)?;
    info!(capacity_provider = %capacity_provider, "capacity provider is the cluster default");

    let nodes_registered = wait_for_nodes(containers, ctx, &cluster_name).await?;

    Ok(ClusterTopology {
        cluster_name,
        cluster_arn,
        machine_image,
        launch_template,
        auto_scaling_group,
        capacity_provider,
        strategy,
        nodes_registered,
    })
}

/// Key pair name for the launch template, minting a new pair if requested
///
/// A minted pair's private key is only ever returned here.
pub async fn ensure_key_pair(
    compute: &dyn ComputeApi,
    selection: Option<&KeySelection>,
) -> StepResult<(Option<String>, Option<KeyPairMaterial>)> {
    match selection {
        None => Ok((None, None)),
        Some(KeySelection::Existing(name)) => Ok((Some(name.clone()), None)),
        Some(KeySelection::New(name)) => {
            let material = compute.create_key_pair(name).await.resource(name)?;
            info!(key_pair = %name, "created key pair");
            Ok((Some(material.name.clone()), Some(material)))
        }
    }
}

async fn resolve_machine_image(
    compute: &dyn ComputeApi,
    ctx: &RunContext,
    request: &ProvisioningRequest,
) -> StepResult<ImageId> {
    if let Some(image) = &request.machine_image {
        return Ok(image.clone());
    }

    let arch = ctx.settings.architecture;
    match compute.recommended_machine_image(arch).await {
        Ok(image) => Ok(image),
        Err(e) => {
            let fallback = match arch {
                CpuArchitecture::Arm64 => fallback_image(&ctx.region),
                CpuArchitecture::X86_64 => None,
            };
            match fallback {
                Some(image) => {
                    warn!(error = %e, image = %image, "machine image lookup failed, using fallback");
                    Ok(image)
                }
                None => Err(e).resource("machine image"),
            }
        }
    }
}

/// Poll until at least one node has registered with the cluster
///
/// Returns `false` when the timeout elapses; the run carries on either way.
async fn wait_for_nodes(
    containers: &dyn ContainerApi,
    ctx: &RunContext,
    cluster: &str,
) -> StepResult<bool> {
    let config = ctx.settings.node_registration;
    info!(
        cluster = %cluster,
        timeout_secs = config.timeout.as_secs(),
        "waiting for container instances to register"
    );

    let probe = || async move {
        ctx.ensure_active()
            .map_err(|e| CloudError::CommandFailed(e.to_string()))?;
        match containers.list_container_instances(cluster).await {
            Ok(nodes) if !nodes.is_empty() => {
                info!(cluster = %cluster, nodes = nodes.len(), "container instances registered");
                Ok(ResourceState::Available)
            }
            Ok(_) => Ok(ResourceState::Pending),
            Err(e) => {
                debug!(error = %e, "listing container instances failed, retrying");
                Ok(ResourceState::Pending)
            }
        }
    };

    match wait_until(&format!("container instances in {}", cluster), config, probe).await {
        Ok(()) => Ok(true),
        Err(CloudError::Timeout(message)) => {
            warn!("{}; the cluster may still converge", message);
            Ok(false)
        }
        Err(_) if ctx.ensure_active().is_err() => Err(StepError::Cancelled),
        Err(e) => Err(e).resource(cluster),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::context;
    use shipyard_cloud::{FakeCloud, InstanceProfileArn, RoleArn, SecurityGroupId, SubnetId, VpcId};

    fn topology() -> NetworkTopology {
        NetworkTopology {
            vpc_id: VpcId::new("vpc-1"),
            public_subnets: vec![SubnetId::new("subnet-a")],
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

    fn roles() -> RoleSet {
        RoleSet {
            account_id: "123456789012".into(),
            task_role: RoleArn::new("arn:task"),
            execution_role: RoleArn::new("arn:exec"),
            instance_role: RoleArn::new("arn:instance"),
            instance_profile: InstanceProfileArn::new("arn:profile"),
            newly_created: false,
        }
    }

    fn request() -> ProvisioningRequest {
        ProvisioningRequest::new("demo", "ap-south-1")
            .with_policies([PolicyKind::Compute])
            .with_instance_size("small")
    }

    #[tokio::test]
    async fn test_cluster_capacity_wiring() {
        let cloud = FakeCloud::default();
        let cluster = setup(
            &cloud,
            &cloud,
            &context("demo"),
            &request(),
            &topology(),
            &policies(),
            &roles(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(cluster.cluster_name, "demo");
        assert_eq!(cluster.capacity_provider.as_str(), "demo-cp");
        assert_eq!(cluster.strategy.weight, 1);
        assert_eq!(cluster.strategy.base, 0);
        assert!(cluster.nodes_registered);
        assert_eq!(
            cloud.targets("put_cluster_capacity_providers"),
            vec!["demo: FARGATE,FARGATE_SPOT,demo-cp"]
        );

        let lt = cloud.last_launch_template().unwrap();
        assert_eq!(lt.name, "demo-lt");
        assert_eq!(lt.instance_type, "t4g.small");
        assert_eq!(lt.image_id, ImageId::new("ami-fakerecommended"));
        assert_eq!(lt.security_groups, vec![SecurityGroupId::new("sg-compute")]);
        assert_eq!(lt.root_volume_gib, 50);
        assert!(lt.require_imdsv2);
        assert!(lt.user_data.contains("ECS_CLUSTER=demo"));
        assert!(lt.key_name.is_none());

        let order: Vec<_> = [
            "create_cluster",
            "create_launch_template",
            "create_auto_scaling_group",
            "create_capacity_provider",
            "put_cluster_capacity_providers",
            "list_container_instances",
        ]
        .iter()
        .map(|op| cloud.calls().iter().position(|c| c.operation == *op).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{:?}", order);
    }

    #[tokio::test]
    async fn test_registration_timeout_is_not_fatal() {
        let cloud = FakeCloud::default();
        cloud.set_registered_nodes(0);
        let cluster = setup(
            &cloud,
            &cloud,
            &context("demo"),
            &request(),
            &topology(),
            &policies(),
            &roles(),
            None,
        )
        .await
        .unwrap();
        assert!(!cluster.nodes_registered);
        assert!(cloud.call_count("list_container_instances") >= 1);
    }

    #[tokio::test]
    async fn test_new_key_pair_is_minted() {
        let cloud = FakeCloud::default();
        let selection = KeySelection::New("demo-key".into());
        let (name, material) = ensure_key_pair(&cloud, Some(&selection)).await.unwrap();

        let key = material.unwrap();
        assert_eq!(key.name, "demo-key");
        assert!(key.private_key.contains("PRIVATE KEY"));

        setup(
            &cloud,
            &cloud,
            &context("demo"),
            &request(),
            &topology(),
            &policies(),
            &roles(),
            name,
        )
        .await
        .unwrap();
        assert_eq!(
            cloud.last_launch_template().unwrap().key_name.as_deref(),
            Some("demo-key")
        );
    }

    #[tokio::test]
    async fn test_existing_key_pair_is_not_minted() {
        let cloud = FakeCloud::default();
        let selection = KeySelection::Existing("ops-key".into());
        let (name, material) = ensure_key_pair(&cloud, Some(&selection)).await.unwrap();

        assert_eq!(name.as_deref(), Some("ops-key"));
        assert!(material.is_none());
        assert_eq!(cloud.call_count("create_key_pair"), 0);
    }

    #[tokio::test]
    async fn test_image_lookup_falls_back_to_table() {
        let cloud = FakeCloud::default();
        cloud.fail_on("recommended_machine_image", "ParameterNotFound");
        let cluster = setup(
            &cloud,
            &cloud,
            &context("demo"),
            &request(),
            &topology(),
            &policies(),
            &roles(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(cluster.machine_image, ImageId::new("ami-05494a57c45f84170"));
    }

    #[tokio::test]
    async fn test_pinned_image_skips_lookup() {
        let cloud = FakeCloud::default();
        let mut req = request();
        req.machine_image = Some(ImageId::new("ami-pinned"));
        setup(
            &cloud,
            &cloud,
            &context("demo"),
            &req,
            &topology(),
            &policies(),
            &roles(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(cloud.call_count("recommended_machine_image"), 0);
        assert_eq!(
            cloud.last_launch_template().unwrap().image_id,
            ImageId::new("ami-pinned")
        );
    }

    #[test]
    fn test_user_data() {
        assert_eq!(
            user_data("demo", "us-east-1"),
            "#!/bin/bash\n\
             echo ECS_CLUSTER=demo >> /etc/ecs/ecs.config;\n\
             echo ECS_BACKEND_HOST=https://ecs.us-east-1.amazonaws.com >> /etc/ecs/ecs.config;\n"
        );
        assert!(fallback_image("eu-west-1").is_none());
    }
}
