//! Security groups
//!
//! Created in a fixed order because each group's rules name the ids of the
//! groups before it: edge and remote-access, then compute, then data.

use super::RunContext;
use crate::error::{ResourceContext, StepResult};
use crate::model::{PolicyKind, ProvisioningRequest, SecurityPolicySet};
use shipyard_cloud::{IngressRule, Protocol, SecurityGroupApi, SecurityGroupSpec, VpcId};
use tracing::info;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;
pub const SSH_PORT: u16 = 22;
pub const MYSQL_PORT: u16 = 3306;
/// VPN admin console
pub const VPN_ADMIN_PORT: u16 = 10086;
/// WireGuard tunnel
pub const VPN_TUNNEL_PORT: u16 = 51820;

pub fn group_name(infra: &str, kind: PolicyKind) -> String {
    format!("{}-{}-sg", infra, kind.group_suffix())
}

fn description(kind: PolicyKind) -> &'static str {
    match kind {
        PolicyKind::Edge => "Security group for the application load balancer",
        PolicyKind::RemoteAccess => "Security group for the VPN server",
        PolicyKind::Compute => "Security group for ECS container instances",
        PolicyKind::Data => "Security group for the database",
    }
}

/// Inbound rules for `kind`, given the groups created so far
///
/// Sources that are not present in `created` are left out.
pub fn ingress_rules(kind: PolicyKind, created: &SecurityPolicySet) -> Vec<IngressRule> {
    match kind {
        PolicyKind::Edge => vec![
            IngressRule::from_anywhere(Protocol::Tcp, HTTP_PORT),
            IngressRule::from_anywhere(Protocol::Tcp, HTTPS_PORT),
        ],
        PolicyKind::RemoteAccess => vec![
            IngressRule::from_anywhere(Protocol::Tcp, VPN_ADMIN_PORT),
            IngressRule::from_anywhere(Protocol::Udp, VPN_TUNNEL_PORT),
        ],
        PolicyKind::Compute => {
            let mut rules = Vec::new();
            if let Some(edge) = created.get(PolicyKind::Edge) {
                rules.push(IngressRule::from_group(Protocol::Tcp, HTTP_PORT, edge));
                rules.push(IngressRule::from_group(Protocol::Tcp, HTTPS_PORT, edge));
            }
            if let Some(vpn) = created.get(PolicyKind::RemoteAccess) {
                rules.push(IngressRule::from_group(Protocol::Tcp, SSH_PORT, vpn));
            }
            rules
        }
        PolicyKind::Data => [PolicyKind::Compute, PolicyKind::RemoteAccess]
            .into_iter()
            .filter_map(|source| created.get(source))
            .map(|group| IngressRule::from_group(Protocol::Tcp, MYSQL_PORT, group))
            .collect(),
    }
}

pub async fn setup(
    security: &dyn SecurityGroupApi,
    ctx: &RunContext,
    vpc: &VpcId,
    request: &ProvisioningRequest,
) -> StepResult<SecurityPolicySet> {
    let mut set = SecurityPolicySet::default();

    for kind in PolicyKind::CREATION_ORDER {
        ctx.ensure_active()?;

        if let Some(existing) = request.existing_policies.get(&kind) {
            info!(policy = %kind, group = %existing, "using existing security group");
            set.insert(kind, existing.clone());
            continue;
        }
        if !request.policies.contains(&kind) {
            continue;
        }

        let name = group_name(&ctx.infra, kind);
        let spec = SecurityGroupSpec {
            name: name.clone(),
            description: description(kind).to_string(),
            vpc_id: vpc.clone(),
            tags: ctx.tags(&name),
        };
        let group = security
            .create_security_group(&spec)
            .await
            .resource(&name)?;

        let rules = ingress_rules(kind, &set);
        if !rules.is_empty() {
            security
                .authorize_ingress(&group, &rules)
                .await
                .resource(&name)?;
        }
        info!(policy = %kind, group = %group, rules = rules.len(), "created security group");
        set.insert(kind, group);
    }

    Ok(set)
}
