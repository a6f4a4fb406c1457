//! Task definition for the application container

use super::RunContext;
use crate::error::{ResourceContext, StepResult};
use crate::model::{RegistryImage, RoleSet};
use shipyard_cloud::{ContainerApi, ContainerSpec, TaskDefinitionArn, TaskDefinitionSpec};
use tracing::info;

pub const CONTAINER_PORT: u16 = 80;

pub fn task_definition_spec(
    ctx: &RunContext,
    image: &RegistryImage,
    roles: &RoleSet,
) -> TaskDefinitionSpec {
    TaskDefinitionSpec {
        family: ctx.infra.clone(),
        cpu: 256,
        memory_mib: 512,
        execution_role: roles.execution_role.clone(),
        task_role: roles.task_role.clone(),
        architecture: ctx.settings.architecture,
        container: ContainerSpec {
            name: ctx.infra.clone(),
            image: image.image(),
            cpu: 128,
            memory_mib: 256,
            port: CONTAINER_PORT,
            log_group: format!("/ecs/{}", ctx.infra),
            log_region: ctx.region.clone(),
            log_stream_prefix: "ecs".to_string(),
        },
    }
}

pub async fn register(
    containers: &dyn ContainerApi,
    ctx: &RunContext,
    image: &RegistryImage,
    roles: &RoleSet,
) -> StepResult<TaskDefinitionArn> {
    ctx.ensure_active()?;
    let spec = task_definition_spec(ctx, image, roles);
    let arn = containers
        .register_task_definition(&spec)
        .await
        .resource(&spec.family)?;
    info!(task_definition = %arn, "registered task definition");
    Ok(arn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::context;
    use shipyard_cloud::{CpuArchitecture, FakeCloud, InstanceProfileArn, RepositoryUri, RoleArn};

    #[tokio::test]
    async fn test_task_definition_contents() {
        let cloud = FakeCloud::default();
        let image = RegistryImage {
            repository: RepositoryUri::new("123456789012.dkr.ecr.ap-south-1.amazonaws.com/demo-repo"),
            tag: "latest".into(),
            detail: None,
        };
        let roles = RoleSet {
            account_id: "123456789012".into(),
            task_role: RoleArn::new("arn:task"),
            execution_role: RoleArn::new("arn:exec"),
            instance_role: RoleArn::new("arn:instance"),
            instance_profile: InstanceProfileArn::new("arn:profile"),
            newly_created: false,
        };

        let arn = register(&cloud, &context("demo"), &image, &roles).await.unwrap();
        assert!(arn.as_str().contains("task-definition/demo"));

        let spec = cloud.last_task_definition().unwrap();
        assert_eq!(spec.family, "demo");
        assert_eq!((spec.cpu, spec.memory_mib), (256, 512));
        assert_eq!(spec.architecture, CpuArchitecture::Arm64);
        assert_eq!(spec.execution_role, RoleArn::new("arn:exec"));
        assert_eq!(spec.container.name, "demo");
        assert_eq!(
            spec.container.image,
            "123456789012.dkr.ecr.ap-south-1.amazonaws.com/demo-repo:latest"
        );
        assert_eq!(spec.container.port, 80);
        assert_eq!(spec.container.log_group, "/ecs/demo");
    }
}
