//! Provisioning request
//!
//! Immutable input of one run. Every child resource name derives from `name`.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use shipyard_cloud::{ImageId, SecurityGroupId, VpcId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Longest infra name whose derived names (`<name>-alb`, ...) fit provider limits
pub const MAX_NAME_LEN: usize = 26;

/// Subnet count bounds for the /20-in-/16 layout
pub const MIN_SUBNETS: u32 = 2;
pub const MAX_SUBNETS: u32 = 8;

pub const DEFAULT_INSTANCE_TYPE: &str = "t4g.micro";

/// Where the run's network comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum NetworkChoice {
    /// Create a new VPC
    CreateNew {
        public_subnets: u32,
        private_subnets: u32,
    },
    /// Use an existing VPC
    UseExisting { vpc_id: Option<VpcId> },
}

impl Default for NetworkChoice {
    fn default() -> Self {
        NetworkChoice::CreateNew {
            public_subnets: MIN_SUBNETS,
            private_subnets: MIN_SUBNETS,
        }
    }
}

impl NetworkChoice {
    /// Requested subnet counts clamped to [2, 8], as (public, private)
    pub fn clamped_subnet_counts(&self) -> Option<(u32, u32)> {
        match self {
            NetworkChoice::CreateNew {
                public_subnets,
                private_subnets,
            } => Some((
                (*public_subnets).clamp(MIN_SUBNETS, MAX_SUBNETS),
                (*private_subnets).clamp(MIN_SUBNETS, MAX_SUBNETS),
            )),
            NetworkChoice::UseExisting { .. } => None,
        }
    }
}

/// Security policy kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Web ports open to the internet, for the load balancer
    Edge,
    /// Admin ports open to the internet, for the VPN host
    RemoteAccess,
    /// Compute nodes; traffic only from edge and remote access
    Compute,
    /// Database ports, from compute and remote access
    Data,
}

impl PolicyKind {
    /// Creation order; later policies reference earlier ids in their rules
    pub const CREATION_ORDER: [PolicyKind; 4] = [
        PolicyKind::Edge,
        PolicyKind::RemoteAccess,
        PolicyKind::Compute,
        PolicyKind::Data,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Edge => "edge",
            PolicyKind::RemoteAccess => "remote-access",
            PolicyKind::Compute => "compute",
            PolicyKind::Data => "data",
        }
    }

    /// Security group name suffix
    pub fn group_suffix(&self) -> &'static str {
        match self {
            PolicyKind::Edge => "alb",
            PolicyKind::RemoteAccess => "vpn",
            PolicyKind::Compute => "server",
            PolicyKind::Data => "rds",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "edge" | "alb" => Some(PolicyKind::Edge),
            "remote-access" | "vpn" => Some(PolicyKind::RemoteAccess),
            "compute" | "server" => Some(PolicyKind::Compute),
            "data" | "rds" => Some(PolicyKind::Data),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key pair for the compute nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "name", rename_all = "snake_case")]
pub enum KeySelection {
    /// Pass an existing key pair name to the launch template
    Existing(String),
    /// Mint a new pair; the private key is returned once
    New(String),
}

impl KeySelection {
    pub fn name(&self) -> &str {
        match self {
            KeySelection::Existing(name) | KeySelection::New(name) => name,
        }
    }
}

/// Provisioning request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// Infra name, the prefix of every resource name
    pub name: String,

    pub region: String,

    #[serde(default)]
    pub network: NetworkChoice,

    /// Policies to create
    #[serde(default)]
    pub policies: BTreeSet<PolicyKind>,

    /// Existing groups used instead of creating that kind
    #[serde(default)]
    pub existing_policies: BTreeMap<PolicyKind, SecurityGroupId>,

    /// An alias such as `micro`, or an explicit type such as `t4g.small`
    #[serde(default)]
    pub instance_size: Option<String>,

    #[serde(default)]
    pub key_pair: Option<KeySelection>,

    /// Pinned machine image
    #[serde(default)]
    pub machine_image: Option<ImageId>,
}

impl ProvisioningRequest {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            network: NetworkChoice::default(),
            policies: BTreeSet::new(),
            existing_policies: BTreeMap::new(),
            instance_size: None,
            key_pair: None,
            machine_image: None,
        }
    }

    pub fn with_network(mut self, network: NetworkChoice) -> Self {
        self.network = network;
        self
    }

    pub fn with_policies(mut self, policies: impl IntoIterator<Item = PolicyKind>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn with_existing_policy(mut self, kind: PolicyKind, group: SecurityGroupId) -> Self {
        self.existing_policies.insert(kind, group);
        self
    }

    pub fn with_instance_size(mut self, size: impl Into<String>) -> Self {
        self.instance_size = Some(size.into());
        self
    }

    pub fn with_key_pair(mut self, key: KeySelection) -> Self {
        self.key_pair = Some(key);
        self
    }

    /// Whether the policy is requested or supplied as an existing id
    pub fn has_policy(&self, kind: PolicyKind) -> bool {
        self.policies.contains(&kind) || self.existing_policies.contains_key(&kind)
    }

    /// Resolved instance type
    pub fn instance_type(&self) -> String {
        match self.instance_size.as_deref() {
            Some(size) => resolve_instance_size(size),
            None => DEFAULT_INSTANCE_TYPE.to_string(),
        }
    }

    /// Checks run before any external call
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        if self.region.trim().is_empty() {
            return Err(CoreError::InvalidRequest("region is required".to_string()));
        }

        if let NetworkChoice::UseExisting { vpc_id } = &self.network
            && vpc_id.as_ref().is_none_or(|id| id.as_str().trim().is_empty())
        {
            return Err(CoreError::InvalidRequest(
                "use_existing network requires a VPC id".to_string(),
            ));
        }

        if !self.has_policy(PolicyKind::Compute) {
            return Err(CoreError::InvalidRequest(
                "the compute security policy must be requested or supplied as an existing id"
                    .to_string(),
            ));
        }

        if let Some(key) = &self.key_pair
            && key.name().trim().is_empty()
        {
            return Err(CoreError::InvalidRequest(
                "key pair name must not be empty".to_string(),
            ));
        }

        if let Some(size) = &self.instance_size
            && size.trim().is_empty()
        {
            return Err(CoreError::InvalidRequest(
                "instance size must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidRequest("name is required".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::InvalidRequest(format!(
            "name '{}' is longer than {} characters",
            name, MAX_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
        return Err(CoreError::InvalidRequest(format!(
            "name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(CoreError::InvalidRequest(format!(
            "name '{}' must not start or end with '-'",
            name
        )));
    }
    Ok(())
}

/// Resolve an instance size alias
///
/// Values containing `.` pass through; unknown aliases fall back to the default.
pub fn resolve_instance_size(size: &str) -> String {
    let size = size.trim();
    if size.contains('.') {
        return size.to_string();
    }
    match size.to_ascii_lowercase().as_str() {
        "micro" => "t4g.micro",
        "small" => "t4g.small",
        "medium" => "t4g.medium",
        "large" => "t4g.large",
        "xlarge" => "t4g.xlarge",
        other => {
            tracing::warn!(size = other, "unknown instance size, using {}", DEFAULT_INSTANCE_TYPE);
            DEFAULT_INSTANCE_TYPE
        }
    }
    .to_string()
}

/// Long-lived credentials, redacted in `Debug`
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProvisioningRequest {
        ProvisioningRequest::new("demo", "ap-south-1").with_policies([PolicyKind::Compute])
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_use_existing_requires_vpc() {
        let request = valid().with_network(NetworkChoice::UseExisting { vpc_id: None });
        let err = request.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
        assert!(err.to_string().contains("VPC id"));

        let blank = valid().with_network(NetworkChoice::UseExisting {
            vpc_id: Some(VpcId::new("  ")),
        });
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_name_rules() {
        for bad in ["", "has space", "-lead", "trail-", "under_score", &"a".repeat(27)] {
            let mut request = valid();
            request.name = bad.to_string();
            assert!(request.validate().is_err(), "{:?} should be rejected", bad);
        }
        let mut request = valid();
        request.name = "team-42".to_string();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_compute_policy_required() {
        let request = ProvisioningRequest::new("demo", "ap-south-1").with_policies([PolicyKind::Edge]);
        assert!(request.validate().is_err());

        let existing = ProvisioningRequest::new("demo", "ap-south-1")
            .with_existing_policy(PolicyKind::Compute, SecurityGroupId::new("sg-1"));
        assert!(existing.validate().is_ok());
    }

    #[test]
    fn test_subnet_counts_are_clamped() {
        let choice = NetworkChoice::CreateNew {
            public_subnets: 1,
            private_subnets: 12,
        };
        assert_eq!(choice.clamped_subnet_counts(), Some((2, 8)));
    }

    #[test]
    fn test_instance_size_aliases() {
        assert_eq!(resolve_instance_size("small"), "t4g.small");
        assert_eq!(resolve_instance_size("XLarge"), "t4g.xlarge");
        assert_eq!(resolve_instance_size("c7g.large"), "c7g.large");
        assert_eq!(resolve_instance_size("huge"), DEFAULT_INSTANCE_TYPE);
        assert_eq!(valid().instance_type(), DEFAULT_INSTANCE_TYPE);
    }

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!(PolicyKind::parse("remote_access"), Some(PolicyKind::RemoteAccess));
        assert_eq!(PolicyKind::parse("alb"), Some(PolicyKind::Edge));
        assert_eq!(PolicyKind::parse("Compute"), Some(PolicyKind::Compute));
        assert_eq!(PolicyKind::parse("firewall"), None);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new("AKIAEXAMPLE", "very-secret");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("very-secret"));
    }
}
