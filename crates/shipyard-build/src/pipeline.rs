//! clone → ビルド → push → 後片付け

use crate::auth::push_credentials;
use crate::builder::DockerBuilder;
use crate::context::ContextBuilder;
use crate::error::BuildResult;
use crate::pusher::ImagePusher;
use crate::source::SourceCheckout;
use async_trait::async_trait;
use bollard::Docker;
use shipyard_cloud::{ImageBuildRequest, ImageBuilder};

/// ローカルの Docker デーモンと `git` による [`ImageBuilder`]
pub struct DockerImageBuilder {
    docker: Docker,
}

impl DockerImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// 環境変数の既定値でデーモンに接続
    pub fn connect() -> BuildResult<Self> {
        Ok(Self::new(Docker::connect_with_local_defaults()?))
    }

    async fn run(&self, request: &ImageBuildRequest, builder: &DockerBuilder) -> BuildResult<()> {
        let image = request.destination.as_str();
        let full_tag = request.destination.image(&request.tag);
        let credentials = push_credentials(&request.credential, image)?;

        // チェックアウトの drop で作業ディレクトリはどの経路でも削除される
        let checkout = SourceCheckout::clone(&request.source_repo).await?;
        checkout.dockerfile()?;
        let context = ContextBuilder::create_context(checkout.path())?;

        builder
            .build_image(context, &full_tag, request.architecture.platform())
            .await?;

        ImagePusher::new(self.docker.clone())
            .push(image, &request.tag, credentials)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn build_and_push(&self, request: &ImageBuildRequest) -> shipyard_cloud::Result<()> {
        let builder = DockerBuilder::new(self.docker.clone());
        let result = self.run(request, &builder).await;

        builder
            .cleanup(&request.destination.image(&request.tag))
            .await;

        if let Err(e) = &result {
            tracing::error!("{}", e.user_message());
        }
        result.map_err(Into::into)
    }
}
