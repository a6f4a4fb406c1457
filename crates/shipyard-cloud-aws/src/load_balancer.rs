use crate::error::sdk_error;
use crate::{AwsCloud, invalid_request, missing};
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{
    Action, ActionTypeEnum, IpAddressType, LoadBalancerSchemeEnum, LoadBalancerStateEnum,
    LoadBalancerTypeEnum, Matcher, ProtocolEnum, Tag, TargetTypeEnum,
};
use shipyard_cloud::{
    ListenerArn, LoadBalancerApi, LoadBalancerArn, LoadBalancerInfo, LoadBalancerSpec,
    ResourceState, ResourceTags, Result, TargetGroupArn, TargetGroupSpec,
};

fn elb_tags(operation: &str, tags: &ResourceTags) -> Result<Vec<Tag>> {
    tags.pairs()
        .into_iter()
        .map(|(k, v)| {
            Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| invalid_request(operation, e))
        })
        .collect()
}

#[async_trait]
impl LoadBalancerApi for AwsCloud {
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<TargetGroupArn> {
        let out = self
            .elb
            .create_target_group()
            .name(&spec.name)
            .protocol(ProtocolEnum::Http)
            .port(i32::from(spec.port))
            .vpc_id(spec.vpc_id.as_str())
            .target_type(TargetTypeEnum::Ip)
            .health_check_protocol(ProtocolEnum::Http)
            .health_check_path(&spec.health_check_path)
            .health_check_port(spec.port.to_string())
            .health_check_interval_seconds(spec.health_check_interval_secs as i32)
            .health_check_timeout_seconds(spec.health_check_timeout_secs as i32)
            .healthy_threshold_count(spec.healthy_threshold as i32)
            .unhealthy_threshold_count(spec.unhealthy_threshold as i32)
            .matcher(Matcher::builder().http_code(&spec.success_codes).build())
            .set_tags(Some(elb_tags("CreateTargetGroup", &spec.tags)?))
            .send()
            .await
            .map_err(|e| sdk_error("CreateTargetGroup", e))?;
        out.target_groups()
            .first()
            .and_then(|tg| tg.target_group_arn())
            .map(TargetGroupArn::new)
            .ok_or_else(|| missing("CreateTargetGroup", "TargetGroupArn"))
    }

    async fn create_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<LoadBalancerInfo> {
        let scheme = if spec.internet_facing {
            LoadBalancerSchemeEnum::InternetFacing
        } else {
            LoadBalancerSchemeEnum::Internal
        };
        let security_groups = (!spec.security_groups.is_empty())
            .then(|| spec.security_groups.iter().map(|g| g.to_string()).collect());
        let out = self
            .elb
            .create_load_balancer()
            .name(&spec.name)
            .set_subnets(Some(spec.subnets.iter().map(|s| s.to_string()).collect()))
            .set_security_groups(security_groups)
            .scheme(scheme)
            .r#type(LoadBalancerTypeEnum::Application)
            .ip_address_type(IpAddressType::Ipv4)
            .set_tags(Some(elb_tags("CreateLoadBalancer", &spec.tags)?))
            .send()
            .await
            .map_err(|e| sdk_error("CreateLoadBalancer", e))?;
        let lb = out
            .load_balancers()
            .first()
            .ok_or_else(|| missing("CreateLoadBalancer", "LoadBalancers"))?;
        Ok(LoadBalancerInfo {
            arn: lb
                .load_balancer_arn()
                .map(LoadBalancerArn::new)
                .ok_or_else(|| missing("CreateLoadBalancer", "LoadBalancerArn"))?,
            dns_name: lb.dns_name().unwrap_or_default().to_string(),
        })
    }

    async fn load_balancer_state(&self, arn: &LoadBalancerArn) -> Result<ResourceState> {
        let out = self
            .elb
            .describe_load_balancers()
            .load_balancer_arns(arn.as_str())
            .send()
            .await
            .map_err(|e| sdk_error("DescribeLoadBalancers", e))?;
        let state = out.load_balancers().first().and_then(|lb| lb.state());
        Ok(match state.and_then(|s| s.code()) {
            Some(LoadBalancerStateEnum::Active) => ResourceState::Available,
            Some(LoadBalancerStateEnum::Failed) => ResourceState::Failed(
                state
                    .and_then(|s| s.reason())
                    .unwrap_or("load balancer failed")
                    .to_string(),
            ),
            _ => ResourceState::Pending,
        })
    }

    async fn create_listener(
        &self,
        load_balancer: &LoadBalancerArn,
        port: u16,
        target_group: &TargetGroupArn,
    ) -> Result<ListenerArn> {
        let forward = Action::builder()
            .r#type(ActionTypeEnum::Forward)
            .target_group_arn(target_group.as_str())
            .build()
            .map_err(|e| invalid_request("CreateListener", e))?;
        let out = self
            .elb
            .create_listener()
            .load_balancer_arn(load_balancer.as_str())
            .protocol(ProtocolEnum::Http)
            .port(i32::from(port))
            .default_actions(forward)
            .send()
            .await
            .map_err(|e| sdk_error("CreateListener", e))?;
        out.listeners()
            .first()
            .and_then(|l| l.listener_arn())
            .map(ListenerArn::new)
            .ok_or_else(|| missing("CreateListener", "ListenerArn"))
    }
}
