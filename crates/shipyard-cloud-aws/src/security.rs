use crate::error::sdk_error;
use crate::network::tag_spec;
use crate::{AwsCloud, missing};
use async_trait::async_trait;
use aws_sdk_ec2::types::{IpPermission, IpRange, ResourceType, UserIdGroupPair};
use shipyard_cloud::{
    IngressRule, IngressSource, Result, SecurityGroupApi, SecurityGroupId, SecurityGroupSpec,
};

fn ip_permission(rule: &IngressRule) -> IpPermission {
    let port = i32::from(rule.port);
    let builder = IpPermission::builder()
        .ip_protocol(rule.protocol.as_str())
        .from_port(port)
        .to_port(port);
    match &rule.source {
        IngressSource::Cidr(cidr) => builder.ip_ranges(IpRange::builder().cidr_ip(cidr).build()),
        IngressSource::Group(group) => builder
            .user_id_group_pairs(UserIdGroupPair::builder().group_id(group.as_str()).build()),
    }
    .build()
}

#[async_trait]
impl SecurityGroupApi for AwsCloud {
    async fn create_security_group(&self, spec: &SecurityGroupSpec) -> Result<SecurityGroupId> {
        let out = self
            .ec2
            .create_security_group()
            .group_name(&spec.name)
            .description(&spec.description)
            .vpc_id(spec.vpc_id.as_str())
            .tag_specifications(tag_spec(ResourceType::SecurityGroup, &spec.tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateSecurityGroup", e))?;
        out.group_id()
            .map(SecurityGroupId::new)
            .ok_or_else(|| missing("CreateSecurityGroup", "GroupId"))
    }

    async fn authorize_ingress(&self, group: &SecurityGroupId, rules: &[IngressRule]) -> Result<()> {
        if rules.is_empty() {
            return Ok(());
        }
        self.ec2
            .authorize_security_group_ingress()
            .group_id(group.as_str())
            .set_ip_permissions(Some(rules.iter().map(ip_permission).collect()))
            .send()
            .await
            .map_err(|e| sdk_error("AuthorizeSecurityGroupIngress", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_cloud::Protocol;

    #[test]
    fn test_group_sourced_permission() {
        let edge = SecurityGroupId::new("sg-edge");
        let perm = ip_permission(&IngressRule::from_group(Protocol::Tcp, 443, &edge));
        assert_eq!(perm.ip_protocol(), Some("tcp"));
        assert_eq!(perm.from_port(), Some(443));
        assert_eq!(perm.to_port(), Some(443));
        assert!(perm.ip_ranges().is_empty());
        assert_eq!(perm.user_id_group_pairs()[0].group_id(), Some("sg-edge"));
    }

    #[test]
    fn test_cidr_sourced_permission() {
        let perm = ip_permission(&IngressRule::from_anywhere(Protocol::Udp, 51820));
        assert_eq!(perm.ip_protocol(), Some("udp"));
        assert_eq!(perm.ip_ranges()[0].cidr_ip(), Some("0.0.0.0/0"));
    }
}
