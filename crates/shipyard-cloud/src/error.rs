//! Cloud capability error types

use thiserror::Error;

/// Errors raised by capability implementations
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the provider rejected a create because the name is taken
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message_names_operation() {
        let err = CloudError::api("CreateVpc", "VpcLimitExceeded");
        assert_eq!(err.to_string(), "CreateVpc failed: VpcLimitExceeded");
    }

    #[test]
    fn test_predicates() {
        assert!(CloudError::AlreadyExists("x".into()).is_already_exists());
        assert!(!CloudError::NotFound("x".into()).is_already_exists());
        assert!(CloudError::NotFound("x".into()).is_not_found());
    }
}
