//! Step executors
//!
//! One module per pipeline stage. Each executor calls the capabilities it
//! needs, applies the stage's naming and layout rules, and returns the typed
//! identifiers later stages consume.

pub mod cluster;
pub mod identity;
pub mod load_balancer;
pub mod network;
pub mod registry;
pub mod security;
pub mod service;
pub mod task;

use crate::error::{StepError, StepResult};
use crate::model::OperationId;
use crate::settings::EngineSettings;
use serde::{Deserialize, Serialize};
use shipyard_cloud::ResourceTags;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Identity,
    Registry,
    Network,
    Security,
    LoadBalancer,
    TaskDefinition,
    Cluster,
    Service,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Identity,
        Stage::Registry,
        Stage::Network,
        Stage::Security,
        Stage::LoadBalancer,
        Stage::TaskDefinition,
        Stage::Cluster,
        Stage::Service,
    ];

    /// Progress message written before the stage runs
    pub fn progress_message(&self) -> &'static str {
        match self {
            Stage::Identity => "Creating IAM roles...",
            Stage::Registry => "Creating container registry and pushing image...",
            Stage::Network => "Setting up VPC and networking...",
            Stage::Security => "Creating security groups...",
            Stage::LoadBalancer => "Creating application load balancer...",
            Stage::TaskDefinition => "Registering task definition...",
            Stage::Cluster => "Creating ECS cluster and capacity provider...",
            Stage::Service => "Creating ECS service...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Identity => "identity roles",
            Stage::Registry => "registry and image",
            Stage::Network => "network",
            Stage::Security => "security policies",
            Stage::LoadBalancer => "load balancer",
            Stage::TaskDefinition => "task definition",
            Stage::Cluster => "cluster and capacity",
            Stage::Service => "service",
        })
    }
}

/// Per-run context threaded through every step executor
#[derive(Clone)]
pub struct RunContext {
    pub operation_id: OperationId,
    /// Infra name every child resource name is derived from
    pub infra: String,
    pub region: String,
    pub settings: Arc<EngineSettings>,
    cancel: watch::Receiver<bool>,
}

impl RunContext {
    pub fn new(
        operation_id: OperationId,
        infra: impl Into<String>,
        region: impl Into<String>,
        settings: Arc<EngineSettings>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            operation_id,
            infra: infra.into(),
            region: region.into(),
            settings,
            cancel,
        }
    }

    /// Error out if the run has been asked to stop
    pub fn ensure_active(&self) -> StepResult<()> {
        if *self.cancel.borrow() {
            Err(StepError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// `Name` + `Infra` tags for a resource of this run
    pub fn tags(&self, name: impl Into<String>) -> ResourceTags {
        ResourceTags::new(name, self.infra.clone())
    }

    /// `<infra>-<suffix>`
    pub fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.infra, suffix)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::LoadBalancer.to_string(), "load balancer");
        assert_eq!(Stage::ALL.len(), 8);
        assert_eq!(Stage::ALL[0], Stage::Identity);
        assert_eq!(Stage::ALL[7], Stage::Service);
    }

    #[test]
    fn test_cancelled_context() {
        let (tx, rx) = watch::channel(false);
        let ctx = RunContext::new(
            OperationId::from("op-1"),
            "demo",
            "ap-south-1",
            Arc::new(EngineSettings::default()),
            rx,
        );
        assert!(ctx.ensure_active().is_ok());
        tx.send(true).unwrap();
        assert!(matches!(ctx.ensure_active(), Err(StepError::Cancelled)));
    }

    #[test]
    fn test_derived_names() {
        let ctx = testing::context("demo");
        assert_eq!(ctx.name("alb"), "demo-alb");
        assert_eq!(ctx.tags("demo-igw").infra, "demo");
    }
}
