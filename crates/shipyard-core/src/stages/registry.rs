//! Registry repository and the application image

use super::RunContext;
use crate::error::{ResourceContext, StepError, StepResult};
use crate::model::RegistryImage;
use shipyard_cloud::{CloudError, ImageBuildRequest, ImageBuilder, RegistryApi, RepositoryUri};
use tracing::info;

pub fn repository_name(infra: &str) -> String {
    format!("{}-repo", infra)
}

/// Fetch-or-create the repository, then build and push the image
///
/// The image is rebuilt on every run, even when the tag already exists.
pub async fn ensure_image(
    registry: &dyn RegistryApi,
    builder: &dyn ImageBuilder,
    ctx: &RunContext,
) -> StepResult<RegistryImage> {
    ctx.ensure_active()?;
    let name = repository_name(&ctx.infra);
    let repository = ensure_repository(registry, ctx, &name).await?;

    let tag = ctx.settings.image_tag.clone();
    let image = repository.image(&tag);
    let credential = registry.authorization().await.resource("registry credential")?;

    ctx.ensure_active()?;
    info!(image = %image, source = %ctx.settings.source_template, "building image");
    builder
        .build_and_push(&ImageBuildRequest {
            source_repo: ctx.settings.source_template.clone(),
            destination: repository.clone(),
            tag: tag.clone(),
            architecture: ctx.settings.architecture,
            credential,
        })
        .await
        .resource(&image)?;

    let detail = registry
        .describe_image(&name, &tag)
        .await
        .resource(&image)?
        .ok_or_else(|| StepError::Cloud {
            resource: image.clone(),
            source: CloudError::NotFound(format!("{} is not listable after push", image)),
        })?;
    info!(image = %image, digest = ?detail.digest, "image pushed");

    Ok(RegistryImage {
        repository,
        tag,
        detail: Some(detail),
    })
}

async fn ensure_repository(
    registry: &dyn RegistryApi,
    ctx: &RunContext,
    name: &str,
) -> StepResult<RepositoryUri> {
    if let Some(uri) = registry.describe_repository(name).await.resource(name)? {
        info!(repository = %name, "repository already exists");
        return Ok(uri);
    }

    match registry.create_repository(name, &ctx.tags(name)).await {
        Ok(uri) => {
            info!(repository = %name, uri = %uri, "created repository");
            Ok(uri)
        }
        Err(e) if e.is_already_exists() => registry
            .describe_repository(name)
            .await
            .resource(name)?
            .ok_or_else(|| {
                StepError::Configuration(format!(
                    "repository {} reported as existing but not found",
                    name
                ))
            }),
        Err(e) => Err(e).resource(name),
    }
}
