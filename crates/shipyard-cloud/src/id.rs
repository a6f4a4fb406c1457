//! Typed resource identifiers
//!
//! Every identifier handed out by a capability is wrapped in its own newtype so
//! that, for example, a security group id cannot be passed where a subnet id
//! is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

resource_id!(
    /// `vpc-...`
    VpcId
);
resource_id!(
    /// `subnet-...`
    SubnetId
);
resource_id!(
    /// `igw-...`
    InternetGatewayId
);
resource_id!(
    /// `nat-...`
    NatGatewayId
);
resource_id!(
    /// `eipalloc-...`
    AllocationId
);
resource_id!(
    /// `rtb-...`
    RouteTableId
);
resource_id!(
    /// `vpce-...`
    VpcEndpointId
);
resource_id!(
    /// `sg-...`
    SecurityGroupId
);
resource_id!(LoadBalancerArn);
resource_id!(TargetGroupArn);
resource_id!(ListenerArn);
resource_id!(RoleArn);
resource_id!(InstanceProfileArn);
resource_id!(
    /// `<account>.dkr.ecr.<region>.amazonaws.com/<repo>`
    RepositoryUri
);
resource_id!(TaskDefinitionArn);
resource_id!(ClusterArn);
resource_id!(CapacityProviderName);
resource_id!(ServiceArn);
resource_id!(
    /// `lt-...`
    LaunchTemplateId
);
resource_id!(AutoScalingGroupArn);
resource_id!(
    /// Machine image (`ami-...`)
    ImageId
);

impl RepositoryUri {
    /// Repository name without the registry host
    pub fn repository_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Registry host portion of the URI
    pub fn registry(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// Fully qualified image reference for `tag`
    pub fn image(&self, tag: &str) -> String {
        format!("{}:{}", self.0, tag)
    }
}
