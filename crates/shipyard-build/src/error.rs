use shipyard_cloud::CloudError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("git clone of {repo} failed: {message}")]
    CloneFailed { repo: String, message: String },

    #[error("Dockerfile not found in {0}")]
    DockerfileNotFound(String),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Invalid tag: {tag}")]
    InvalidTag { tag: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::CloneFailed { repo, message } => format!(
                "ソーステンプレートを取得できません: {}\n\
                 {}\n\
                 \n\
                 git がインストールされ、ネットワークに接続できることを確認してください。",
                repo, message
            ),
            BuildError::DockerConnection(e) => format!(
                "Docker に接続できません: {}\n\
                 \n\
                 Docker デーモンが起動していることを確認してください。",
                e
            ),
            BuildError::AuthFailed { registry, .. } => format!(
                "{} への認証に失敗しました\n\
                 \n\
                 レジストリのプッシュ権限を確認してください。",
                registry
            ),
            _ => format!("{}", self),
        }
    }
}

impl From<BuildError> for CloudError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::AuthFailed { .. } => CloudError::AuthenticationFailed(err.to_string()),
            other => CloudError::CommandFailed(other.to_string()),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
