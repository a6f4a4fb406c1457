//! Shared helpers for engine integration tests

#![allow(dead_code)]

use shipyard_cloud::FakeCloud;
use shipyard_core::{Engine, EngineSettings};
use std::sync::Arc;
use std::time::Duration;

pub const POLL: Duration = Duration::from_millis(5);

/// Settings with every wait shortened so a full run finishes in milliseconds
pub fn quick_settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.role_settle_delay = Duration::ZERO;
    for wait in [
        &mut settings.vpc_wait,
        &mut settings.nat_wait,
        &mut settings.load_balancer_wait,
        &mut settings.node_registration,
    ] {
        wait.interval = Duration::from_millis(1);
        wait.timeout = Duration::from_millis(30);
    }
    settings.profile_retry.initial_delay = Duration::from_millis(1);
    settings
}

pub fn engine_for(cloud: &Arc<FakeCloud>) -> Engine {
    Engine::in_memory(cloud.capabilities(), quick_settings())
}
