//! Shipyard Core
//!
//! Provisions a complete container-hosting environment for one application
//! from a single [`ProvisioningRequest`]: identity roles, an image registry
//! with a built image, networking, security groups, a load balancer, a
//! cluster with node capacity and the long-running service.
//!
//! ```text
//! request.kdl ─► parser ─► Engine::start_provisioning ─► JobStore
//!                               │                           ▲
//!                               ▼                           │ progress
//!          identity ─► registry ─► network ─► security ─────┤
//!          load balancer ─► task definition ─► cluster ─► service
//! ```
//!
//! Every stage talks to the provider only through the capability traits in
//! `shipyard-cloud`, so the whole pipeline runs against `FakeCloud` in tests.

pub mod checklist;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod settings;
pub mod stages;
pub mod store;

pub use engine::{Engine, RunOutputs};
pub use error::*;
pub use model::*;
pub use parser::*;
pub use settings::EngineSettings;
pub use stages::{RunContext, Stage};
pub use store::{InMemoryJobStore, JobStore, update_job};
