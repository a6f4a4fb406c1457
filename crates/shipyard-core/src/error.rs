use crate::stages::Stage;
use shipyard_cloud::CloudError;
use thiserror::Error;

/// Failure inside one step executor
#[derive(Error, Debug)]
pub enum StepError {
    #[error("{resource}: {source}")]
    Cloud {
        resource: String,
        #[source]
        source: CloudError,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("run was cancelled")]
    Cancelled,
}

/// Attach the name of the resource being worked on to a capability error
pub trait ResourceContext<T> {
    fn resource(self, name: impl Into<String>) -> std::result::Result<T, StepError>;
}

impl<T> ResourceContext<T> for std::result::Result<T, CloudError> {
    fn resource(self, name: impl Into<String>) -> std::result::Result<T, StepError> {
        self.map_err(|source| StepError::Cloud {
            resource: name.into(),
            source,
        })
    }
}

pub type StepResult<T> = std::result::Result<T, StepError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("無効なリクエスト: {0}")]
    InvalidRequest(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StepError,
    },

    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("テンプレート展開エラー: {0}")]
    Template(#[from] tera::Error),

    #[error("job store error: {0}")]
    Store(String),
}

impl CoreError {
    pub fn stage(stage: Stage, source: StepError) -> Self {
        CoreError::Stage { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_names_stage_and_resource() {
        let cloud: std::result::Result<(), _> = Err(CloudError::api(
            "create_load_balancer",
            "at most one subnet per availability zone",
        ));
        let step = cloud.resource("demo-alb").unwrap_err();
        let err = CoreError::stage(Stage::LoadBalancer, step);
        assert_eq!(
            err.to_string(),
            "load balancer stage failed: demo-alb: create_load_balancer failed: \
             at most one subnet per availability zone"
        );
    }

    #[test]
    fn test_configuration_error_message() {
        let err = CoreError::stage(
            Stage::Network,
            StepError::Configuration("no public subnets in vpc-1".into()),
        );
        assert_eq!(
            err.to_string(),
            "network stage failed: configuration error: no public subnets in vpc-1"
        );
    }
}
