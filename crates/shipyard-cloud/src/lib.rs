//! Shipyard Cloud Capabilities
//!
//! This crate defines the narrow interfaces the provisioning engine uses to
//! talk to a cloud provider, the typed identifiers handed between stages, and
//! the waiter / retry primitives used for eventually-consistent resources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  shipyard CLI                    │
//! │              (shipyard provision)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                shipyard-core                     │
//! │        engine ─► stages ─► Capabilities          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               shipyard-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  NetworkApi  SecurityGroupApi  ...       │   │
//! │  │  ImageBuilder                             │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  typed ids   │  │ wait / retry │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ shipyard-     │ │ shipyard-     │
//! │ cloud-aws     │ │ build         │
//! └───────────────┘ └───────────────┘
//! ```

pub mod capability;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod id;
pub mod model;
pub mod waiter;

// Re-exports
pub use capability::{
    Capabilities, ComputeApi, ContainerApi, IdentityApi, ImageBuilder, LoadBalancerApi,
    NetworkApi, RegistryApi, SecurityGroupApi,
};
pub use error::{CloudError, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use fake::{Call, FAKE_ACCOUNT_ID, FakeCloud};
pub use id::*;
pub use model::*;
pub use waiter::{RetryConfig, WaitConfig, retry, wait_until};
