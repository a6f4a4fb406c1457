//! SDK error mapping

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use shipyard_cloud::CloudError;

const ALREADY_EXISTS: &[&str] = &[
    "EntityAlreadyExists",
    "RepositoryAlreadyExistsException",
    "InvalidGroup.Duplicate",
    "InvalidKeyPair.Duplicate",
    "InvalidLaunchTemplateName.AlreadyExistsException",
    "AlreadyExists",
    "DuplicateTargetGroupName",
    "DuplicateLoadBalancerName",
];

const NOT_FOUND: &[&str] = &[
    "NoSuchEntity",
    "RepositoryNotFoundException",
    "ImageNotFoundException",
    "ParameterNotFound",
    "ClusterNotFoundException",
    "InvalidVpcID.NotFound",
    "InvalidSubnetID.NotFound",
];

const AUTH_FAILED: &[&str] = &[
    "AuthFailure",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "UnrecognizedClientException",
];

/// Convert an SDK error into a [`CloudError`], classifying well-known
/// provider error codes
pub fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);
    let message = err
        .as_service_error()
        .and_then(|e| e.message())
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    classify(operation, code.as_deref(), message)
}

fn classify(operation: &str, code: Option<&str>, message: String) -> CloudError {
    match code {
        Some(c) if ALREADY_EXISTS.contains(&c) => {
            CloudError::AlreadyExists(format!("{}: {}", operation, message))
        }
        Some(c) if NOT_FOUND.contains(&c) => {
            CloudError::NotFound(format!("{}: {}", operation, message))
        }
        Some(c) if AUTH_FAILED.contains(&c) => {
            CloudError::AuthenticationFailed(format!("{}: {}", operation, message))
        }
        Some(c) => CloudError::api(operation, format!("{} ({})", message, c)),
        None => CloudError::api(operation, message),
    }
}
