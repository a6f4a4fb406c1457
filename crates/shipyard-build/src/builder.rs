use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// Docker Engine API でのビルドとローカルイメージの掃除
pub struct DockerBuilder {
    docker: Docker,
}

impl DockerBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// イメージをビルド
    ///
    /// `platform` は `linux/arm64` などのターゲットプラットフォーム
    pub async fn build_image(&self, context_data: Vec<u8>, tag: &str, platform: &str) -> BuildResult<()> {
        tracing::info!(tag = tag, platform = platform, "building image");

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            platform,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: true,    // ベースイメージを常にpull
            ..Default::default()
        };

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));
        #[allow(deprecated)]
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            handle_build_output(msg?)?;
        }

        tracing::info!(tag = tag, "image built");
        Ok(())
    }

    /// ローカルのイメージを削除し、dangling イメージとビルドキャッシュを prune
    ///
    /// 失敗しても警告のみ
    pub async fn cleanup(&self, tag: &str) {
        let remove = bollard::query_parameters::RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_image(tag, Some(remove), None).await {
            Ok(_) => tracing::debug!(tag = tag, "removed local image"),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => tracing::warn!(tag = tag, error = %e, "failed to remove local image"),
        }

        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);
        let prune = bollard::query_parameters::PruneImagesOptions {
            filters: Some(filters),
        };
        if let Err(e) = self.docker.prune_images(Some(prune)).await {
            tracing::warn!(error = %e, "image prune failed");
        }

        let build_prune = bollard::query_parameters::PruneBuildOptions {
            ..Default::default()
        };
        match self.docker.prune_build(Some(build_prune)).await {
            Ok(result) => tracing::debug!(
                reclaimed_bytes = result.space_reclaimed.unwrap_or(0),
                "build cache pruned"
            ),
            Err(e) => tracing::warn!(error = %e, "build cache prune failed"),
        }
    }
}

/// ビルド出力の処理
fn handle_build_output(output: bollard::models::BuildInfo) -> BuildResult<()> {
    if let Some(stream) = output.stream {
        let line = stream.trim_end();
        if !line.is_empty() {
            tracing::debug!(target: "shipyard_build::docker", "{}", line);
        }
    }

    if let Some(error_detail) = output.error_detail {
        let error_msg = error_detail
            .message
            .or(output.error)
            .unwrap_or_else(|| "Unknown build error".to_string());
        return Err(BuildError::BuildFailed(error_msg));
    }

    if let Some(error) = output.error {
        return Err(BuildError::BuildFailed(error));
    }

    if let Some(status) = output.status {
        tracing::debug!(target: "shipyard_build::docker", "{}", status);
    }

    Ok(())
}
