use crate::error::sdk_error;
use crate::{AwsCloud, missing};
use async_trait::async_trait;
use aws_sdk_ec2::types::{
    AttributeBooleanValue, DomainType, Filter, NatGatewayState, ResourceType, RouteTable, Subnet,
    Tag, TagSpecification, VpcEndpointType, VpcState,
};
use shipyard_cloud::{
    ANYWHERE, AllocationId, InternetGatewayId, NatGatewayId, NetworkApi, ResourceState,
    ResourceTags, Result, RouteInfo, RouteTableId, RouteTableInfo, RouteTarget, SubnetId,
    SubnetInfo, SubnetSpec, VpcEndpointId, VpcId,
};

/// EC2 tag specification carrying `tags` for a resource of `kind`
pub(crate) fn tag_spec(kind: ResourceType, tags: &ResourceTags) -> TagSpecification {
    let tags = tags
        .pairs()
        .into_iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build())
        .collect();
    TagSpecification::builder()
        .resource_type(kind)
        .set_tags(Some(tags))
        .build()
}

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

fn enabled() -> AttributeBooleanValue {
    AttributeBooleanValue::builder().value(true).build()
}

fn subnet_info(subnet: &Subnet) -> Option<SubnetInfo> {
    Some(SubnetInfo {
        id: SubnetId::new(subnet.subnet_id()?),
        availability_zone: subnet.availability_zone().unwrap_or_default().to_string(),
        map_public_ip_on_launch: subnet.map_public_ip_on_launch().unwrap_or(false),
    })
}

fn route_table_info(table: &RouteTable) -> Option<RouteTableInfo> {
    Some(RouteTableInfo {
        id: RouteTableId::new(table.route_table_id()?),
        routes: table
            .routes()
            .iter()
            .map(|r| RouteInfo {
                destination: r.destination_cidr_block().map(str::to_string),
                gateway_id: r.gateway_id().map(str::to_string),
            })
            .collect(),
    })
}

#[async_trait]
impl NetworkApi for AwsCloud {
    async fn create_vpc(&self, cidr_block: &str, tags: &ResourceTags) -> Result<VpcId> {
        let out = self
            .ec2
            .create_vpc()
            .cidr_block(cidr_block)
            .tag_specifications(tag_spec(ResourceType::Vpc, tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateVpc", e))?;
        let id = out
            .vpc()
            .and_then(|v| v.vpc_id())
            .ok_or_else(|| missing("CreateVpc", "VpcId"))?;
        tracing::debug!(vpc_id = id, "created VPC");
        Ok(VpcId::new(id))
    }

    async fn vpc_state(&self, vpc: &VpcId) -> Result<ResourceState> {
        let out = self
            .ec2
            .describe_vpcs()
            .vpc_ids(vpc.as_str())
            .send()
            .await
            .map_err(|e| sdk_error("DescribeVpcs", e))?;
        Ok(match out.vpcs().first().and_then(|v| v.state()) {
            Some(VpcState::Available) => ResourceState::Available,
            _ => ResourceState::Pending,
        })
    }

    async fn enable_dns(&self, vpc: &VpcId) -> Result<()> {
        // The API accepts only one attribute per call
        self.ec2
            .modify_vpc_attribute()
            .vpc_id(vpc.as_str())
            .enable_dns_support(enabled())
            .send()
            .await
            .map_err(|e| sdk_error("ModifyVpcAttribute", e))?;
        self.ec2
            .modify_vpc_attribute()
            .vpc_id(vpc.as_str())
            .enable_dns_hostnames(enabled())
            .send()
            .await
            .map_err(|e| sdk_error("ModifyVpcAttribute", e))?;
        Ok(())
    }

    async fn create_internet_gateway(&self, tags: &ResourceTags) -> Result<InternetGatewayId> {
        let out = self
            .ec2
            .create_internet_gateway()
            .tag_specifications(tag_spec(ResourceType::InternetGateway, tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateInternetGateway", e))?;
        out.internet_gateway()
            .and_then(|g| g.internet_gateway_id())
            .map(InternetGatewayId::new)
            .ok_or_else(|| missing("CreateInternetGateway", "InternetGatewayId"))
    }

    async fn attach_internet_gateway(
        &self,
        gateway: &InternetGatewayId,
        vpc: &VpcId,
    ) -> Result<()> {
        self.ec2
            .attach_internet_gateway()
            .internet_gateway_id(gateway.as_str())
            .vpc_id(vpc.as_str())
            .send()
            .await
            .map_err(|e| sdk_error("AttachInternetGateway", e))?;
        Ok(())
    }

    async fn availability_zones(&self) -> Result<Vec<String>> {
        let out = self
            .ec2
            .describe_availability_zones()
            .filters(filter("state", "available"))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeAvailabilityZones", e))?;
        Ok(out
            .availability_zones()
            .iter()
            .filter_map(|z| z.zone_name().map(str::to_string))
            .collect())
    }

    async fn create_subnet(&self, spec: &SubnetSpec) -> Result<SubnetId> {
        let out = self
            .ec2
            .create_subnet()
            .vpc_id(spec.vpc_id.as_str())
            .cidr_block(&spec.cidr_block)
            .availability_zone(&spec.availability_zone)
            .tag_specifications(tag_spec(ResourceType::Subnet, &spec.tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateSubnet", e))?;
        out.subnet()
            .and_then(|s| s.subnet_id())
            .map(SubnetId::new)
            .ok_or_else(|| missing("CreateSubnet", "SubnetId"))
    }

    async fn enable_public_ip_on_launch(&self, subnet: &SubnetId) -> Result<()> {
        self.ec2
            .modify_subnet_attribute()
            .subnet_id(subnet.as_str())
            .map_public_ip_on_launch(enabled())
            .send()
            .await
            .map_err(|e| sdk_error("ModifySubnetAttribute", e))?;
        Ok(())
    }

    async fn allocate_elastic_ip(&self, tags: &ResourceTags) -> Result<AllocationId> {
        let out = self
            .ec2
            .allocate_address()
            .domain(DomainType::Vpc)
            .tag_specifications(tag_spec(ResourceType::ElasticIp, tags))
            .send()
            .await
            .map_err(|e| sdk_error("AllocateAddress", e))?;
        out.allocation_id()
            .map(AllocationId::new)
            .ok_or_else(|| missing("AllocateAddress", "AllocationId"))
    }

    async fn create_nat_gateway(
        &self,
        subnet: &SubnetId,
        allocation: &AllocationId,
        tags: &ResourceTags,
    ) -> Result<NatGatewayId> {
        let out = self
            .ec2
            .create_nat_gateway()
            .subnet_id(subnet.as_str())
            .allocation_id(allocation.as_str())
            .tag_specifications(tag_spec(ResourceType::Natgateway, tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateNatGateway", e))?;
        out.nat_gateway()
            .and_then(|n| n.nat_gateway_id())
            .map(NatGatewayId::new)
            .ok_or_else(|| missing("CreateNatGateway", "NatGatewayId"))
    }

    async fn nat_gateway_state(&self, gateway: &NatGatewayId) -> Result<ResourceState> {
        let out = self
            .ec2
            .describe_nat_gateways()
            .nat_gateway_ids(gateway.as_str())
            .send()
            .await
            .map_err(|e| sdk_error("DescribeNatGateways", e))?;
        let Some(nat) = out.nat_gateways().first() else {
            return Ok(ResourceState::Pending);
        };
        Ok(match nat.state() {
            Some(NatGatewayState::Available) => ResourceState::Available,
            Some(NatGatewayState::Failed)
            | Some(NatGatewayState::Deleting)
            | Some(NatGatewayState::Deleted) => ResourceState::Failed(
                nat.failure_message()
                    .unwrap_or("NAT gateway entered a terminal state")
                    .to_string(),
            ),
            _ => ResourceState::Pending,
        })
    }

    async fn create_route_table(&self, vpc: &VpcId, tags: &ResourceTags) -> Result<RouteTableId> {
        let out = self
            .ec2
            .create_route_table()
            .vpc_id(vpc.as_str())
            .tag_specifications(tag_spec(ResourceType::RouteTable, tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateRouteTable", e))?;
        out.route_table()
            .and_then(|t| t.route_table_id())
            .map(RouteTableId::new)
            .ok_or_else(|| missing("CreateRouteTable", "RouteTableId"))
    }

    async fn create_default_route(&self, table: &RouteTableId, target: &RouteTarget) -> Result<()> {
        let request = self
            .ec2
            .create_route()
            .route_table_id(table.as_str())
            .destination_cidr_block(ANYWHERE);
        let request = match target {
            RouteTarget::InternetGateway(id) => request.gateway_id(id.as_str()),
            RouteTarget::NatGateway(id) => request.nat_gateway_id(id.as_str()),
        };
        request
            .send()
            .await
            .map_err(|e| sdk_error("CreateRoute", e))?;
        Ok(())
    }

    async fn associate_route_table(&self, table: &RouteTableId, subnet: &SubnetId) -> Result<()> {
        self.ec2
            .associate_route_table()
            .route_table_id(table.as_str())
            .subnet_id(subnet.as_str())
            .send()
            .await
            .map_err(|e| sdk_error("AssociateRouteTable", e))?;
        Ok(())
    }

    async fn create_gateway_endpoint(
        &self,
        vpc: &VpcId,
        service_name: &str,
        route_tables: &[RouteTableId],
        tags: &ResourceTags,
    ) -> Result<VpcEndpointId> {
        let out = self
            .ec2
            .create_vpc_endpoint()
            .vpc_id(vpc.as_str())
            .service_name(service_name)
            .vpc_endpoint_type(VpcEndpointType::Gateway)
            .set_route_table_ids(Some(
                route_tables.iter().map(|t| t.to_string()).collect(),
            ))
            .tag_specifications(tag_spec(ResourceType::VpcEndpoint, tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateVpcEndpoint", e))?;
        out.vpc_endpoint()
            .and_then(|e| e.vpc_endpoint_id())
            .map(VpcEndpointId::new)
            .ok_or_else(|| missing("CreateVpcEndpoint", "VpcEndpointId"))
    }

    async fn subnets_in_vpc(&self, vpc: &VpcId) -> Result<Vec<SubnetInfo>> {
        let out = self
            .ec2
            .describe_subnets()
            .filters(filter("vpc-id", vpc.as_str()))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeSubnets", e))?;
        Ok(out.subnets().iter().filter_map(subnet_info).collect())
    }

    async fn describe_subnets(&self, subnets: &[SubnetId]) -> Result<Vec<SubnetInfo>> {
        let out = self
            .ec2
            .describe_subnets()
            .set_subnet_ids(Some(subnets.iter().map(|s| s.to_string()).collect()))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeSubnets", e))?;
        Ok(out.subnets().iter().filter_map(subnet_info).collect())
    }

    async fn route_tables_for_subnet(&self, subnet: &SubnetId) -> Result<Vec<RouteTableInfo>> {
        let out = self
            .ec2
            .describe_route_tables()
            .filters(filter("association.subnet-id", subnet.as_str()))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeRouteTables", e))?;
        Ok(out.route_tables().iter().filter_map(route_table_info).collect())
    }

    async fn main_route_tables(&self, vpc: &VpcId) -> Result<Vec<RouteTableInfo>> {
        let out = self
            .ec2
            .describe_route_tables()
            .filters(filter("vpc-id", vpc.as_str()))
            .filters(filter("association.main", "true"))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeRouteTables", e))?;
        Ok(out.route_tables().iter().filter_map(route_table_info).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_spec_carries_name_and_infra() {
        let spec = tag_spec(
            ResourceType::Subnet,
            &ResourceTags::new("demo-subnet-public1-a", "demo"),
        );
        assert_eq!(spec.resource_type(), Some(&ResourceType::Subnet));
        let keys: Vec<_> = spec.tags().iter().filter_map(|t| t.key()).collect();
        assert_eq!(keys, vec!["Name", "Infra"]);
    }

    #[test]
    fn test_route_table_info_reads_gateway() {
        let table = RouteTable::builder()
            .route_table_id("rtb-1")
            .routes(
                aws_sdk_ec2::types::Route::builder()
                    .destination_cidr_block(ANYWHERE)
                    .gateway_id("igw-1")
                    .build(),
            )
            .build();
        let info = route_table_info(&table).unwrap();
        assert!(info.routes_to_internet_gateway());
    }
}
