//! VPC, subnets, gateways and routing
//!
//! New networks use a fixed layout inside `10.0.0.0/16`: public subnet `i`
//! is `10.0.{16i}.0/20`, private subnet `i` is `10.0.{128 + 16i}.0/20`, and
//! subnets are spread round-robin across the region's availability zones.

use super::RunContext;
use crate::error::{ResourceContext, StepError, StepResult};
use crate::model::{NetworkChoice, NetworkTopology};
use shipyard_cloud::{
    NetworkApi, RouteTableId, RouteTableInfo, RouteTarget, SubnetId, SubnetInfo, SubnetSpec, VpcId,
    wait_until,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const VPC_CIDR: &str = "10.0.0.0/16";
const PRIVATE_OFFSET: u32 = 128;
const SUBNET_STRIDE: u32 = 16;

pub fn public_subnet_cidr(index: u32) -> String {
    format!("10.0.{}.0/20", index * SUBNET_STRIDE)
}

pub fn private_subnet_cidr(index: u32) -> String {
    format!("10.0.{}.0/20", PRIVATE_OFFSET + index * SUBNET_STRIDE)
}

/// `ap-south-1a` -> `1a`
fn zone_suffix(zone: &str) -> &str {
    zone.rsplit('-').next().unwrap_or(zone)
}

#[derive(Clone, Copy)]
enum Tier {
    Public,
    Private,
}

impl Tier {
    fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Private => "private",
        }
    }

    fn cidr(&self, index: u32) -> String {
        match self {
            Tier::Public => public_subnet_cidr(index),
            Tier::Private => private_subnet_cidr(index),
        }
    }
}

pub async fn setup(
    network: &dyn NetworkApi,
    ctx: &RunContext,
    choice: &NetworkChoice,
) -> StepResult<NetworkTopology> {
    ctx.ensure_active()?;
    match choice {
        NetworkChoice::CreateNew { .. } => {
            let (public, private) = choice
                .clamped_subnet_counts()
                .ok_or_else(|| StepError::Configuration("no subnet counts".into()))?;
            create(network, ctx, public, private).await
        }
        NetworkChoice::UseExisting { vpc_id: Some(vpc) } => resolve_existing(network, vpc).await,
        NetworkChoice::UseExisting { vpc_id: None } => Err(StepError::Configuration(
            "use_existing network requires a VPC id".into(),
        )),
    }
}

async fn create(
    network: &dyn NetworkApi,
    ctx: &RunContext,
    public_count: u32,
    private_count: u32,
) -> StepResult<NetworkTopology> {
    let vpc_name = ctx.name("vpc");
    let vpc = network
        .create_vpc(VPC_CIDR, &ctx.tags(&vpc_name))
        .await
        .resource(&vpc_name)?;
    info!(vpc = %vpc, "created VPC");

    wait_until(&format!("VPC {}", vpc), ctx.settings.vpc_wait, || {
        network.vpc_state(&vpc)
    })
    .await
    .resource(vpc.as_str())?;
    network.enable_dns(&vpc).await.resource(vpc.as_str())?;

    let igw_name = ctx.name("igw");
    let igw = network
        .create_internet_gateway(&ctx.tags(&igw_name))
        .await
        .resource(&igw_name)?;
    network
        .attach_internet_gateway(&igw, &vpc)
        .await
        .resource(igw.as_str())?;
    info!(internet_gateway = %igw, "attached internet gateway");

    let zones = network
        .availability_zones()
        .await
        .resource("availability zones")?;
    if zones.is_empty() {
        return Err(StepError::Configuration(format!(
            "no availability zones available in {}",
            ctx.region
        )));
    }

    ctx.ensure_active()?;
    let public = create_subnets(network, ctx, &vpc, Tier::Public, public_count, &zones).await?;
    let private = create_subnets(network, ctx, &vpc, Tier::Private, private_count, &zones).await?;

    // One NAT gateway in the first public subnet serves every private subnet
    let eip_name = ctx.name("nat-eip");
    let allocation = network
        .allocate_elastic_ip(&ctx.tags(&eip_name))
        .await
        .resource(&eip_name)?;
    let nat_name = ctx.name("nat");
    let nat = network
        .create_nat_gateway(&public[0].0, &allocation, &ctx.tags(&nat_name))
        .await
        .resource(&nat_name)?;
    info!(nat_gateway = %nat, "waiting for NAT gateway");
    wait_until(&format!("NAT gateway {}", nat), ctx.settings.nat_wait, || {
        network.nat_gateway_state(&nat)
    })
    .await
    .resource(nat.as_str())?;

    ctx.ensure_active()?;
    let public_rt_name = ctx.name("rtb-public");
    let public_rt = network
        .create_route_table(&vpc, &ctx.tags(&public_rt_name))
        .await
        .resource(&public_rt_name)?;
    network
        .create_default_route(&public_rt, &RouteTarget::InternetGateway(igw.clone()))
        .await
        .resource(public_rt.as_str())?;
    for (subnet, _) in &public {
        network
            .associate_route_table(&public_rt, subnet)
            .await
            .resource(subnet.as_str())?;
    }

    let mut private_tables = Vec::with_capacity(private.len());
    for (i, (subnet, zone)) in private.iter().enumerate() {
        let name = format!("{}-rtb-private{}-{}", ctx.infra, i + 1, zone_suffix(zone));
        let table = network
            .create_route_table(&vpc, &ctx.tags(&name))
            .await
            .resource(&name)?;
        network
            .create_default_route(&table, &RouteTarget::NatGateway(nat.clone()))
            .await
            .resource(table.as_str())?;
        network
            .associate_route_table(&table, subnet)
            .await
            .resource(subnet.as_str())?;
        private_tables.push(table);
    }

    create_storage_endpoint(network, ctx, &vpc, &private_tables).await;

    Ok(NetworkTopology {
        vpc_id: vpc,
        public_subnets: public.into_iter().map(|(id, _)| id).collect(),
        private_subnets: private.into_iter().map(|(id, _)| id).collect(),
        nat_gateway: Some(nat),
        internet_gateway: Some(igw),
        created: true,
    })
}

/// Returns each subnet with the zone it was placed in
async fn create_subnets(
    network: &dyn NetworkApi,
    ctx: &RunContext,
    vpc: &VpcId,
    tier: Tier,
    count: u32,
    zones: &[String],
) -> StepResult<Vec<(SubnetId, String)>> {
    let mut subnets = Vec::with_capacity(count as usize);
    for i in 0..count {
        let zone = &zones[i as usize % zones.len()];
        let name = format!(
            "{}-subnet-{}{}-{}",
            ctx.infra,
            tier.as_str(),
            i + 1,
            zone_suffix(zone)
        );
        let spec = SubnetSpec {
            vpc_id: vpc.clone(),
            cidr_block: tier.cidr(i),
            availability_zone: zone.clone(),
            tags: ctx.tags(&name).with("Type", tier.as_str()),
        };
        let subnet = network.create_subnet(&spec).await.resource(&name)?;
        if let Tier::Public = tier {
            network
                .enable_public_ip_on_launch(&subnet)
                .await
                .resource(subnet.as_str())?;
        }
        debug!(subnet = %subnet, cidr = %spec.cidr_block, zone = %zone, "created subnet");
        subnets.push((subnet, zone.clone()));
    }
    Ok(subnets)
}

/// Gateway endpoint for object storage; failure does not stop the run
async fn create_storage_endpoint(
    network: &dyn NetworkApi,
    ctx: &RunContext,
    vpc: &VpcId,
    route_tables: &[RouteTableId],
) {
    let service = format!("com.amazonaws.{}.s3", ctx.region);
    let name = ctx.name("vpce-s3");
    match network
        .create_gateway_endpoint(vpc, &service, route_tables, &ctx.tags(&name))
        .await
    {
        Ok(endpoint) => info!(endpoint = %endpoint, "created S3 gateway endpoint"),
        Err(e) => warn!(error = %e, "failed to create S3 gateway endpoint, continuing"),
    }
}

/// Classify the subnets of an existing VPC
///
/// Public subnets auto-assign public IPs; when none do, a subnet is public if
/// its route table (or the VPC's main table) routes to an internet gateway.
/// Every other subnet is private.
pub async fn resolve_existing(network: &dyn NetworkApi, vpc: &VpcId) -> StepResult<NetworkTopology> {
    let subnets = network.subnets_in_vpc(vpc).await.resource(vpc.as_str())?;

    let mut public: Vec<SubnetId> = subnets
        .iter()
        .filter(|s| s.map_public_ip_on_launch)
        .map(|s| s.id.clone())
        .collect();

    if public.is_empty() {
        public = public_by_routes(network, vpc, &subnets).await?;
    }

    let private: Vec<SubnetId> = subnets
        .iter()
        .filter(|s| !public.contains(&s.id))
        .map(|s| s.id.clone())
        .collect();

    if public.is_empty() {
        return Err(StepError::Configuration(format!(
            "no public subnets found in {}",
            vpc
        )));
    }
    if private.is_empty() {
        return Err(StepError::Configuration(format!(
            "no private subnets found in {}",
            vpc
        )));
    }
    info!(
        vpc = %vpc,
        public = public.len(),
        private = private.len(),
        "using existing VPC"
    );

    Ok(NetworkTopology {
        vpc_id: vpc.clone(),
        public_subnets: public,
        private_subnets: private,
        nat_gateway: None,
        internet_gateway: None,
        created: false,
    })
}

async fn public_by_routes(
    network: &dyn NetworkApi,
    vpc: &VpcId,
    subnets: &[SubnetInfo],
) -> StepResult<Vec<SubnetId>> {
    let mut main_tables: Option<Vec<RouteTableInfo>> = None;
    let mut public = Vec::new();

    for subnet in subnets {
        let mut tables = network
            .route_tables_for_subnet(&subnet.id)
            .await
            .resource(subnet.id.as_str())?;
        if tables.is_empty() {
            // Subnets without an explicit association use the main table
            if main_tables.is_none() {
                main_tables = Some(network.main_route_tables(vpc).await.resource(vpc.as_str())?);
            }
            tables = main_tables.clone().unwrap_or_default();
        }
        if tables.iter().any(RouteTableInfo::routes_to_internet_gateway) {
            public.push(subnet.id.clone());
        }
    }
    debug!(vpc = %vpc, public = public.len(), "classified subnets by route table");
    Ok(public)
}

/// Keep at most one subnet per availability zone, preserving order
pub fn one_per_zone(subnets: &[SubnetInfo]) -> Vec<SubnetId> {
    let mut seen = HashSet::new();
    subnets
        .iter()
        .filter(|s| seen.insert(s.availability_zone.clone()))
        .map(|s| s.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::context;
    use shipyard_cloud::FakeCloud;

    fn create_new(public: u32, private: u32) -> NetworkChoice {
        NetworkChoice::CreateNew {
            public_subnets: public,
            private_subnets: private,
        }
    }

    #[test]
    fn test_cidr_layout() {
        assert_eq!(public_subnet_cidr(0), "10.0.0.0/20");
        assert_eq!(public_subnet_cidr(1), "10.0.16.0/20");
        assert_eq!(private_subnet_cidr(0), "10.0.128.0/20");
        assert_eq!(private_subnet_cidr(7), "10.0.240.0/20");
        assert_eq!(zone_suffix("ap-south-1b"), "1b");
    }

    #[tokio::test]
    async fn test_subnet_counts_are_clamped_to_two() {
        let cloud = FakeCloud::default();
        let topology = setup(&cloud, &context("demo"), &create_new(1, 1))
            .await
            .unwrap();

        assert_eq!(topology.public_subnets.len(), 2);
        assert_eq!(topology.private_subnets.len(), 2);
        assert!(topology.nat_gateway.is_some());
        assert!(topology.created);
        assert_eq!(
            cloud.targets("create_subnet"),
            vec!["10.0.0.0/20", "10.0.16.0/20", "10.0.128.0/20", "10.0.144.0/20"]
        );
    }

    #[tokio::test]
    async fn test_routing_layout() {
        let cloud = FakeCloud::default();
        let topology = setup(&cloud, &context("demo"), &create_new(3, 2))
            .await
            .unwrap();

        // NAT lives in the first public subnet
        assert_eq!(
            cloud.targets("create_nat_gateway"),
            vec![topology.public_subnets[0].to_string()]
        );
        // one public table + one per private subnet
        assert_eq!(
            cloud.targets("create_route_table"),
            vec![
                "demo-rtb-public",
                "demo-rtb-private1-1a",
                "demo-rtb-private2-1b"
            ]
        );
        assert_eq!(cloud.call_count("associate_route_table"), 5);
        assert_eq!(cloud.call_count("enable_public_ip_on_launch"), 3);
        assert_eq!(
            cloud.targets("create_gateway_endpoint"),
            vec!["com.amazonaws.ap-south-1.s3"]
        );
    }

    #[tokio::test]
    async fn test_subnets_spread_round_robin() {
        let cloud = FakeCloud::default();
        cloud.set_availability_zones(&["ap-south-1a", "ap-south-1b"]);
        let ctx = context("demo");
        let topology = setup(&cloud, &ctx, &create_new(3, 2)).await.unwrap();

        let info = shipyard_cloud::NetworkApi::describe_subnets(&cloud, &topology.public_subnets)
            .await
            .unwrap();
        let zones: Vec<_> = info.iter().map(|s| s.availability_zone.as_str()).collect();
        assert_eq!(zones, vec!["ap-south-1a", "ap-south-1b", "ap-south-1a"]);
    }

    #[tokio::test]
    async fn test_endpoint_failure_is_tolerated() {
        let cloud = FakeCloud::default();
        cloud.fail_on("create_gateway_endpoint", "RouteAlreadyExists");
        assert!(setup(&cloud, &context("demo"), &create_new(2, 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_zones_is_a_configuration_error() {
        let cloud = FakeCloud::default();
        cloud.set_availability_zones(&[]);
        let err = setup(&cloud, &context("demo"), &create_new(2, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_existing_vpc_classified_by_public_ip() {
        let cloud = FakeCloud::default();
        cloud.add_subnet("vpc-1", "subnet-a", "ap-south-1a", true);
        cloud.add_subnet("vpc-1", "subnet-b", "ap-south-1b", true);
        cloud.add_subnet("vpc-1", "subnet-c", "ap-south-1a", false);
        cloud.add_subnet("vpc-other", "subnet-z", "ap-south-1a", false);

        let topology = resolve_existing(&cloud, &VpcId::new("vpc-1")).await.unwrap();
        assert_eq!(
            topology.public_subnets,
            vec![SubnetId::new("subnet-a"), SubnetId::new("subnet-b")]
        );
        assert_eq!(topology.private_subnets, vec![SubnetId::new("subnet-c")]);
        assert!(!topology.created);
        assert_eq!(cloud.call_count("create_vpc"), 0);
    }

    #[tokio::test]
    async fn test_existing_vpc_falls_back_to_route_tables() {
        let cloud = FakeCloud::default();
        cloud.add_subnet("vpc-1", "subnet-a", "ap-south-1a", false);
        cloud.add_subnet("vpc-1", "subnet-b", "ap-south-1b", false);
        cloud.add_subnet("vpc-1", "subnet-c", "ap-south-1a", false);
        cloud.add_subnet_route("subnet-a", "igw-1");
        cloud.add_subnet_route("subnet-c", "nat-1");
        // subnet-b has no explicit table and the main table routes to the IGW
        cloud.set_main_route("vpc-1", "igw-1");

        let topology = resolve_existing(&cloud, &VpcId::new("vpc-1")).await.unwrap();
        assert_eq!(
            topology.public_subnets,
            vec![SubnetId::new("subnet-a"), SubnetId::new("subnet-b")]
        );
        assert_eq!(topology.private_subnets, vec![SubnetId::new("subnet-c")]);
    }

    #[tokio::test]
    async fn test_existing_vpc_without_private_subnets_fails() {
        let cloud = FakeCloud::default();
        cloud.add_subnet("vpc-1", "subnet-a", "ap-south-1a", true);
        let err = resolve_existing(&cloud, &VpcId::new("vpc-1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no private subnets"));
    }

    #[test]
    fn test_one_per_zone() {
        let subnets = vec![
            SubnetInfo {
                id: SubnetId::new("a"),
                availability_zone: "z1".into(),
                map_public_ip_on_launch: true,
            },
            SubnetInfo {
                id: SubnetId::new("b"),
                availability_zone: "z1".into(),
                map_public_ip_on_launch: true,
            },
            SubnetInfo {
                id: SubnetId::new("c"),
                availability_zone: "z2".into(),
                map_public_ip_on_launch: true,
            },
        ];
        assert_eq!(one_per_zone(&subnets), vec![SubnetId::new("a"), SubnetId::new("c")]);
    }
}
