//! Engine settings
//!
//! Design constants of the provisioning pipeline. Defaults reproduce the
//! production behavior; `from_env` lets operators and tests shorten waits.

use shipyard_cloud::{CpuArchitecture, RetryConfig, WaitConfig};
use std::time::Duration;

pub const DEFAULT_SOURCE_TEMPLATE: &str = "https://github.com/Insphere-Suhail/ECS-ARM-Image.git";
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Environment variables read by [`EngineSettings::from_env`]
pub mod env {
    pub const ROLE_SETTLE_SECS: &str = "SHIPYARD_ROLE_SETTLE_SECS";
    pub const WAIT_INTERVAL_SECS: &str = "SHIPYARD_WAIT_INTERVAL_SECS";
    pub const WAIT_TIMEOUT_SECS: &str = "SHIPYARD_WAIT_TIMEOUT_SECS";
    pub const NODE_POLL_SECS: &str = "SHIPYARD_NODE_POLL_SECS";
    pub const NODE_TIMEOUT_SECS: &str = "SHIPYARD_NODE_TIMEOUT_SECS";
    pub const SOURCE_TEMPLATE: &str = "SHIPYARD_SOURCE_TEMPLATE";
    pub const IMAGE_TAG: &str = "SHIPYARD_IMAGE_TAG";
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Pause after creating roles so the identity provider can propagate them
    pub role_settle_delay: Duration,
    pub vpc_wait: WaitConfig,
    pub nat_wait: WaitConfig,
    pub load_balancer_wait: WaitConfig,
    /// Poll for compute nodes registering with the cluster
    pub node_registration: WaitConfig,
    /// Retry for adding the instance role to a fresh instance profile
    pub profile_retry: RetryConfig,
    pub source_template: String,
    pub image_tag: String,
    pub architecture: CpuArchitecture,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            role_settle_delay: Duration::from_secs(15),
            vpc_wait: WaitConfig::new(Duration::from_secs(5), Duration::from_secs(300)),
            nat_wait: WaitConfig::new(Duration::from_secs(15), Duration::from_secs(600)),
            load_balancer_wait: WaitConfig::new(Duration::from_secs(15), Duration::from_secs(600)),
            node_registration: WaitConfig::new(Duration::from_secs(30), Duration::from_secs(600)),
            profile_retry: RetryConfig {
                max_attempts: 5,
                initial_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(20),
                backoff_multiplier: 2.0,
            },
            source_template: DEFAULT_SOURCE_TEMPLATE.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            architecture: CpuArchitecture::Arm64,
        }
    }
}

impl EngineSettings {
    /// Defaults overridden by `SHIPYARD_*` environment variables
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(secs) = secs_var(env::ROLE_SETTLE_SECS) {
            settings.role_settle_delay = secs;
        }
        if let Some(interval) = secs_var(env::WAIT_INTERVAL_SECS) {
            settings.vpc_wait.interval = interval;
            settings.nat_wait.interval = interval;
            settings.load_balancer_wait.interval = interval;
        }
        if let Some(timeout) = secs_var(env::WAIT_TIMEOUT_SECS) {
            settings.vpc_wait.timeout = timeout;
            settings.nat_wait.timeout = timeout;
            settings.load_balancer_wait.timeout = timeout;
        }
        if let Some(interval) = secs_var(env::NODE_POLL_SECS) {
            settings.node_registration.interval = interval;
        }
        if let Some(timeout) = secs_var(env::NODE_TIMEOUT_SECS) {
            settings.node_registration.timeout = timeout;
        }
        if let Some(template) = non_empty_var(env::SOURCE_TEMPLATE) {
            settings.source_template = template;
        }
        if let Some(tag) = non_empty_var(env::IMAGE_TAG) {
            settings.image_tag = tag;
        }

        settings
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs_var(key: &str) -> Option<Duration> {
    let raw = non_empty_var(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "ignoring non-numeric setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = temp_env::with_vars_unset(
            [
                env::ROLE_SETTLE_SECS,
                env::NODE_POLL_SECS,
                env::NODE_TIMEOUT_SECS,
                env::IMAGE_TAG,
            ],
            EngineSettings::from_env,
        );
        assert_eq!(settings.role_settle_delay, Duration::from_secs(15));
        assert_eq!(settings.node_registration.interval, Duration::from_secs(30));
        assert_eq!(settings.node_registration.timeout, Duration::from_secs(600));
        assert_eq!(settings.image_tag, "latest");
        assert_eq!(settings.architecture, CpuArchitecture::Arm64);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let settings = temp_env::with_vars(
            [
                (env::ROLE_SETTLE_SECS, Some("0")),
                (env::WAIT_TIMEOUT_SECS, Some("60")),
                (env::NODE_TIMEOUT_SECS, Some("90")),
                (env::SOURCE_TEMPLATE, Some("https://example.com/app.git")),
            ],
            EngineSettings::from_env,
        );
        assert_eq!(settings.role_settle_delay, Duration::ZERO);
        assert_eq!(settings.nat_wait.timeout, Duration::from_secs(60));
        assert_eq!(settings.load_balancer_wait.timeout, Duration::from_secs(60));
        assert_eq!(settings.node_registration.timeout, Duration::from_secs(90));
        assert_eq!(settings.source_template, "https://example.com/app.git");
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_ignored() {
        let settings = temp_env::with_var(
            env::ROLE_SETTLE_SECS,
            Some("soon"),
            EngineSettings::from_env,
        );
        assert_eq!(settings.role_settle_delay, Duration::from_secs(15));
    }
}
