//! Clampr - closed loop provisioning against SDC and CLAMP
//!
//! Clampr looks a distributed service up in SDC, instantiates a control loop
//! from its CLAMP template, attaches and configures operational policies and
//! submits them to the policy engine, optionally deploying and deleting the
//! loop afterwards.

pub mod clamp;
pub mod config;
pub mod error;
pub mod http;
pub mod sdc;
pub mod session;
pub mod templates;
pub mod workflow;

pub use error::{ClampError, Result};
