//! CLAMP - control loop management API
//!
//! This module provides:
//! - `ClampClient` url building over a shared transport
//! - Template Resolver and Policy Availability Check (`Catalog`)
//! - Loop Instance Manager (`LoopInstance`)
//! - Operational policy descriptors
//! - The optional DCAE deployment capability

pub mod catalog;
pub mod client;
pub mod deploy;
pub mod details;
pub mod loop_instance;
pub mod policy;

pub use catalog::{Catalog, LoopTemplate, PolicyModel, policy_available};
pub use client::ClampClient;
pub use deploy::{DcaeDeployer, Deployer};
pub use details::{Component, EntityIds, LoopDetails};
pub use loop_instance::{DeleteOutcome, LOOP_PREFIX, LoopInstance, PolicyAction};
pub use policy::{OperationalPolicy, PolicyConfig, PolicyKey};
