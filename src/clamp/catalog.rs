//! Template Resolver and Policy Availability Check
//!
//! Both read CLAMP catalogs: loop templates (one per distributed service) and
//! the policy models CLAMP has loaded from the policy engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clamp::client::ClampClient;
use crate::config::PolicyCheckConfig;
use crate::error::Result;
use crate::http::{ApiRequest, json_list};
use crate::sdc::Service;

/// Loop template as listed by CLAMP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopTemplate {
    pub name: String,
    #[serde(default)]
    pub model_service: Option<ModelService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelService {
    pub service_details: ServiceDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub name: String,
}

impl LoopTemplate {
    pub fn service_name(&self) -> Option<&str> {
        self.model_service.as_ref().map(|m| m.service_details.name.as_str())
    }
}

/// Policy model (TOSCA policy type) known to CLAMP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyModel {
    pub policy_model_type: String,
    pub version: String,
    #[serde(default)]
    pub policy_acronym: Option<String>,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_date: Option<DateTime<Utc>>,
}

pub struct Catalog {
    client: ClampClient,
}

impl Catalog {
    pub fn new(client: ClampClient) -> Self {
        Self { client }
    }

    pub async fn templates(&self) -> Result<Vec<LoopTemplate>> {
        let body = self
            .client
            .send_json(ApiRequest::get("Get Loop Templates", self.client.url("templates/")))
            .await?;
        json_list(body)
    }

    /// Loop template built for `service`, if CLAMP has one
    pub async fn template_for(&self, service: &Service) -> Result<Option<LoopTemplate>> {
        let template = self
            .templates()
            .await?
            .into_iter()
            .find(|t| t.service_name() == Some(service.name.as_str()));
        match &template {
            Some(t) => log::info!("Loop template {} found for service {}", t.name, service.name),
            None => log::warn!("No loop template for service {}", service.name),
        }
        Ok(template)
    }

    pub async fn policy_models(&self) -> Result<Vec<PolicyModel>> {
        let body = self
            .client
            .send_json(ApiRequest::get("Get stocked policies", self.client.url("policyToscaModels/")))
            .await?;
        json_list(body)
    }

    /// One look at the catalog: enough models loaded and `policy_name` among them
    pub async fn has_policy(&self, policy_name: &str, required: usize) -> Result<bool> {
        let models = self.policy_models().await?;
        Ok(policy_available(&models, policy_name, required))
    }

    /// Poll the catalog until the policy is available or attempts run out.
    ///
    /// Never fails: transport errors count as an unsuccessful attempt.
    pub async fn wait_for_policy(&self, policy_name: &str, check: &PolicyCheckConfig) -> bool {
        for attempt in 1..=check.max_attempts {
            match self.has_policy(policy_name, check.required_policies).await {
                Ok(true) => {
                    tracing::info!(policy = policy_name, attempt, "Policy available in CLAMP");
                    return true;
                }
                Ok(false) => {
                    tracing::info!(
                        policy = policy_name,
                        attempt,
                        max_attempts = check.max_attempts,
                        required = check.required_policies,
                        "Policy not available yet"
                    );
                }
                Err(e) => {
                    tracing::warn!(policy = policy_name, attempt, error = %e, "Policy catalog query failed");
                }
            }
            if attempt < check.max_attempts {
                tokio::time::sleep(check.interval()).await;
            }
        }
        tracing::error!(policy = policy_name, attempts = check.max_attempts, "Couldn't load policies from policy engine");
        false
    }
}

/// At least `required` models loaded and one of them has the acronym `policy_name`
pub fn policy_available(models: &[PolicyModel], policy_name: &str, required: usize) -> bool {
    models.len() >= required && models.iter().any(|m| m.policy_acronym.as_deref() == Some(policy_name))
}
