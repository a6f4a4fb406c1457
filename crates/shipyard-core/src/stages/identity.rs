//! Identity roles: task, task execution and compute-node instance role

use super::RunContext;
use crate::error::{ResourceContext, StepError, StepResult};
use crate::model::RoleSet;
use serde_json::json;
use shipyard_cloud::{IdentityApi, InstanceProfile, InstanceProfileArn, RoleArn, RoleSpec, retry};
use tracing::{info, warn};

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
const EC2_PRINCIPAL: &str = "ec2.amazonaws.com";

pub const TASK_ROLE_POLICIES: &[&str] = &[
    "AmazonEC2ContainerRegistryPowerUser",
    "AmazonRDSFullAccess",
    "AmazonS3FullAccess",
    "AmazonSQSFullAccess",
    "AmazonSSMFullAccess",
    "CloudWatchLogsFullAccess",
];

pub const EXECUTION_ROLE_POLICIES: &[&str] = &[
    "service-role/AmazonECSTaskExecutionRolePolicy",
    "AmazonS3FullAccess",
    "CloudWatchLogsFullAccess",
];

pub const INSTANCE_ROLE_POLICIES: &[&str] = &[
    "service-role/AmazonEC2ContainerServiceforEC2Role",
    "service-role/AmazonEC2RoleforSSM",
    "AmazonEC2ContainerRegistryReadOnly",
];

/// A role this stage manages
struct RoleTemplate {
    prefix: &'static str,
    description: &'static str,
    principal: &'static str,
    policies: &'static [&'static str],
}

const TASK_ROLE: RoleTemplate = RoleTemplate {
    prefix: "ecsTaskRole",
    description: "Application permissions for ECS tasks",
    principal: ECS_TASKS_PRINCIPAL,
    policies: TASK_ROLE_POLICIES,
};

const EXECUTION_ROLE: RoleTemplate = RoleTemplate {
    prefix: "ecsTaskExecutionRole",
    description: "Image pull and log delivery for ECS tasks",
    principal: ECS_TASKS_PRINCIPAL,
    policies: EXECUTION_ROLE_POLICIES,
};

const INSTANCE_ROLE: RoleTemplate = RoleTemplate {
    prefix: "ecsInstanceRole",
    description: "Bootstrap permissions for ECS container instances",
    principal: EC2_PRINCIPAL,
    policies: INSTANCE_ROLE_POLICIES,
};

pub fn role_name(prefix: &str, infra: &str) -> String {
    format!("{}-{}", prefix, infra)
}

pub fn policy_arn(policy: &str) -> String {
    format!("arn:aws:iam::aws:policy/{}", policy)
}

fn trust_policy(principal: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": principal },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Fetch-or-create all three roles and the instance profile
pub async fn ensure_roles(identity: &dyn IdentityApi, ctx: &RunContext) -> StepResult<RoleSet> {
    ctx.ensure_active()?;

    let account_id = identity.account_id().await.resource("caller identity")?;

    let (task_role, task_new) = ensure_role(identity, ctx, &TASK_ROLE).await?;
    let (execution_role, execution_new) = ensure_role(identity, ctx, &EXECUTION_ROLE).await?;
    let (instance_role, instance_new) = ensure_role(identity, ctx, &INSTANCE_ROLE).await?;

    let instance_role_name = role_name(INSTANCE_ROLE.prefix, &ctx.infra);
    let (instance_profile, profile_new) =
        ensure_instance_profile(identity, ctx, &instance_role_name).await?;

    let newly_created = task_new || execution_new || instance_new || profile_new;
    if newly_created && !ctx.settings.role_settle_delay.is_zero() {
        info!(
            delay_secs = ctx.settings.role_settle_delay.as_secs(),
            "waiting for new roles to propagate"
        );
        tokio::time::sleep(ctx.settings.role_settle_delay).await;
    }

    Ok(RoleSet {
        account_id,
        task_role,
        execution_role,
        instance_role,
        instance_profile,
        newly_created,
    })
}

/// Returns the role ARN and whether it was created by this call
async fn ensure_role(
    identity: &dyn IdentityApi,
    ctx: &RunContext,
    template: &RoleTemplate,
) -> StepResult<(RoleArn, bool)> {
    let name = role_name(template.prefix, &ctx.infra);

    if let Some(arn) = identity.get_role(&name).await.resource(&name)? {
        info!(role = %name, "role already exists");
        return Ok((arn, false));
    }

    let spec = RoleSpec {
        name: name.clone(),
        description: template.description.to_string(),
        trust_policy: trust_policy(template.principal),
        tags: ctx.tags(&name),
    };

    let arn = match identity.create_role(&spec).await {
        Ok(arn) => arn,
        // Lost a race with another run creating the same role
        Err(e) if e.is_already_exists() => {
            return identity
                .get_role(&name)
                .await
                .resource(&name)?
                .map(|arn| (arn, false))
                .ok_or_else(|| {
                    StepError::Configuration(format!("role {} reported as existing but not found", name))
                });
        }
        Err(e) => return Err(e).resource(&name),
    };
    info!(role = %name, "created role");

    for policy in template.policies {
        if let Err(e) = identity.attach_role_policy(&name, &policy_arn(policy)).await {
            warn!(role = %name, policy = %policy, error = %e, "failed to attach policy");
        }
    }

    Ok((arn, true))
}

async fn ensure_instance_profile(
    identity: &dyn IdentityApi,
    ctx: &RunContext,
    role_name: &str,
) -> StepResult<(InstanceProfileArn, bool)> {
    // The profile shares the instance role's name
    let name = role_name;

    if let Some(profile) = identity.get_instance_profile(name).await.resource(name)? {
        info!(profile = %name, "instance profile already exists");
        return reuse_instance_profile(identity, ctx, profile, name, role_name).await;
    }

    let arn = match identity.create_instance_profile(name).await {
        Ok(arn) => arn,
        Err(e) if e.is_already_exists() => {
            let profile = identity
                .get_instance_profile(name)
                .await
                .resource(name)?
                .ok_or_else(|| {
                    StepError::Configuration(format!(
                        "instance profile {} reported as existing but not found",
                        name
                    ))
                })?;
            return reuse_instance_profile(identity, ctx, profile, name, role_name).await;
        }
        Err(e) => return Err(e).resource(name),
    };

    add_role(identity, ctx, name, role_name).await?;
    info!(profile = %name, "created instance profile");

    Ok((arn, true))
}

/// An existing profile must carry the instance role, or nodes never register
async fn reuse_instance_profile(
    identity: &dyn IdentityApi,
    ctx: &RunContext,
    profile: InstanceProfile,
    name: &str,
    role_name: &str,
) -> StepResult<(InstanceProfileArn, bool)> {
    if profile.has_role(role_name) {
        return Ok((profile.arn, false));
    }
    if let Some(other) = profile.roles.first() {
        return Err(StepError::Configuration(format!(
            "instance profile {} carries role {} instead of {}",
            name, other, role_name
        )));
    }

    warn!(profile = %name, role = %role_name, "instance profile has no role, attaching it");
    add_role(identity, ctx, name, role_name).await?;
    // Treated as new so the run waits for the change to propagate
    Ok((profile.arn, true))
}

async fn add_role(
    identity: &dyn IdentityApi,
    ctx: &RunContext,
    profile: &str,
    role_name: &str,
) -> StepResult<()> {
    let added = retry("add role to instance profile", &ctx.settings.profile_retry, || {
        identity.add_role_to_instance_profile(profile, role_name)
    })
    .await;
    match added {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e).resource(profile),
    }
}
