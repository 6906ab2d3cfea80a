//! Operational policy descriptors and their configuration payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy model reference used to attach an operational policy to a loop
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub policy_type: String,
    pub version: String,
}

impl PolicyKey {
    pub fn new(policy_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            version: version.into(),
        }
    }

    /// Short name of the policy model ("MinMax" for "...guard.common.MinMax")
    pub fn acronym(&self) -> &str {
        self.policy_type.rsplit('.').next().unwrap_or(&self.policy_type)
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.policy_type, self.version)
    }
}

/// An operational policy to attach and configure on a loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalPolicy {
    pub policy_type: String,
    pub version: String,
    #[serde(default)]
    pub config: PolicyConfig,
}

impl OperationalPolicy {
    pub fn key(&self) -> PolicyKey {
        PolicyKey::new(&self.policy_type, &self.version)
    }
}

/// Configuration applied to an attached operational policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Guard bounding the number of VF module instances
    MinMax {
        #[serde(default = "default_actor")]
        actor: String,
        #[serde(default = "default_operation")]
        operation: String,
        #[serde(default = "default_target")]
        target: String,
        min: u32,
        max: u32,
    },

    /// Guard bounding how often an operation may run
    FrequencyLimiter {
        #[serde(default = "default_actor")]
        actor: String,
        #[serde(default = "default_operation")]
        operation: String,
        #[serde(default = "default_target")]
        target: String,
        limit: u32,
        #[serde(default = "default_time_window")]
        time_window: u32,
        #[serde(default = "default_time_units")]
        time_units: String,
    },

    /// Drools operational policy targeting the loop's VF module
    Drools {
        #[serde(default = "default_actor")]
        actor: String,
        #[serde(default = "default_operation")]
        operation: String,
        #[serde(default = "default_drools_timeout")]
        timeout: u32,
        #[serde(default = "default_retries")]
        retries: u32,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::MinMax {
            actor: default_actor(),
            operation: default_operation(),
            target: default_target(),
            min: 1,
            max: 5,
        }
    }
}

impl PolicyConfig {
    /// Name of the embedded payload template for this configuration
    pub fn template_name(&self) -> &'static str {
        match self {
            PolicyConfig::MinMax { .. } => "minmax_config",
            PolicyConfig::FrequencyLimiter { .. } => "frequency_limiter_config",
            PolicyConfig::Drools { .. } => "drools_config",
        }
    }

    pub fn needs_entity_ids(&self) -> bool {
        matches!(self, PolicyConfig::Drools { .. })
    }
}

fn default_actor() -> String {
    "SO".to_string()
}

fn default_operation() -> String {
    "VF Module Create".to_string()
}

fn default_target() -> String {
    ".*".to_string()
}

fn default_time_window() -> u32 {
    10
}

fn default_time_units() -> String {
    "minute".to_string()
}

fn default_drools_timeout() -> u32 {
    1200
}

fn default_retries() -> u32 {
    0
}
