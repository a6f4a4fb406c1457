//! AWS implementation of the Shipyard cloud capabilities
//!
//! [`AwsCloud`] holds one SDK client per service and implements every
//! capability trait from `shipyard-cloud`:
//!
//! | Trait | Service |
//! |---|---|
//! | `NetworkApi` | EC2 |
//! | `SecurityGroupApi` | EC2 |
//! | `LoadBalancerApi` | Elastic Load Balancing v2 |
//! | `IdentityApi` | IAM, STS |
//! | `RegistryApi` | ECR |
//! | `ComputeApi` | EC2, Auto Scaling, SSM |
//! | `ContainerApi` | ECS |

mod compute;
mod container;
mod error;
mod identity;
mod load_balancer;
mod network;
mod registry;
mod security;

use aws_config::{BehaviorVersion, Region};
use shipyard_cloud::Result;

pub use error::sdk_error;

/// Long-lived access key pair
#[derive(Clone)]
pub struct StaticKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StaticKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// SDK clients for one region and one set of credentials
#[derive(Clone)]
pub struct AwsCloud {
    region: String,
    ec2: aws_sdk_ec2::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
    ecr: aws_sdk_ecr::Client,
    ecs: aws_sdk_ecs::Client,
    autoscaling: aws_sdk_autoscaling::Client,
    ssm: aws_sdk_ssm::Client,
}

impl AwsCloud {
    /// Build clients for `region`
    ///
    /// With `keys` the given access key pair is used; otherwise the default
    /// credential chain (environment, profile, instance metadata) applies.
    pub async fn connect(region: &str, keys: Option<StaticKeys>) -> Result<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(keys) = keys {
            let credentials = aws_sdk_sts::config::Credentials::new(
                keys.access_key_id,
                keys.secret_access_key,
                None,
                None,
                "shipyard",
            );
            loader = loader.credentials_provider(credentials);
        }
        let config = loader.load().await;
        tracing::debug!(region = region, "AWS clients configured");

        Ok(Self {
            region: region.to_string(),
            ec2: aws_sdk_ec2::Client::new(&config),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
            ecr: aws_sdk_ecr::Client::new(&config),
            ecs: aws_sdk_ecs::Client::new(&config),
            autoscaling: aws_sdk_autoscaling::Client::new(&config),
            ssm: aws_sdk_ssm::Client::new(&config),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Required field missing from an SDK response
pub(crate) fn missing(operation: &str, field: &str) -> shipyard_cloud::CloudError {
    shipyard_cloud::CloudError::api(operation, format!("response did not include {}", field))
}

/// Request shape rejected by the SDK builder
pub(crate) fn invalid_request(
    operation: &str,
    err: impl std::fmt::Display,
) -> shipyard_cloud::CloudError {
    shipyard_cloud::CloudError::InvalidConfig(format!("{}: {}", operation, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_keys_debug_is_redacted() {
        let keys = StaticKeys {
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI".into(),
        };
        let rendered = format!("{:?}", keys);
        assert!(rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn test_missing_field_message() {
        let err = missing("CreateVpc", "VpcId");
        assert_eq!(
            err.to_string(),
            "CreateVpc failed: response did not include VpcId"
        );
    }
}
