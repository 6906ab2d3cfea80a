//! Loop Instance Manager - lifecycle of one control loop in CLAMP
//!
//! A `LoopInstance` mirrors a remote loop: it is created from a template,
//! configured (microservice policy, operational policies), submitted to the
//! policy engine and finally deleted. Every transition is one or two remote
//! calls; nothing is retried here beyond what the transport does.

use std::fmt;

use serde_json::Value;

use crate::clamp::client::ClampClient;
use crate::clamp::details::{Component, LoopDetails};
use crate::clamp::policy::{OperationalPolicy, PolicyKey};
use crate::error::{ClampError, Result};
use crate::http::ApiRequest;
use crate::templates::PayloadRenderer;

/// Prefix CLAMP puts in front of loop names on creation
pub const LOOP_PREFIX: &str = "LOOP_";

/// Actions on the loop's policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Submit,
    Stop,
    Restart,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Submit => "submit",
            PolicyAction::Stop => "stop",
            PolicyAction::Restart => "restart",
        }
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a delete ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Backend acknowledged the delete
    Deleted,
    /// Backend reported an error but the loop is gone
    DeletedDespiteBackendError { status: u16, message: String },
}

/// Whether a policy action took effect, judged from the POLICY state before and after
pub fn policy_action_done(action: PolicyAction, old_state: Option<&str>, new_state: Option<&str>) -> bool {
    match new_state {
        Some(new) => Some(new) != old_state && !(action != PolicyAction::Stop && new == "SENT"),
        None => false,
    }
}

pub struct LoopInstance {
    client: ClampClient,
    template: String,
    name: String,
    details: LoopDetails,
}

impl LoopInstance {
    pub fn new(client: ClampClient, template: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            template: template.into(),
            name: name.into(),
            details: LoopDetails::default(),
        }
    }

    /// Handle on a loop that already exists in CLAMP (name includes the `LOOP_` prefix)
    pub fn existing(client: ClampClient, name: impl Into<String>) -> Self {
        Self::new(client, String::new(), name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn client(&self) -> &ClampClient {
        &self.client
    }

    /// Details as last fetched, without any remote call
    pub fn cached_details(&self) -> &LoopDetails {
        &self.details
    }

    /// Details, loaded from CLAMP on first use
    pub async fn details(&mut self) -> Result<&LoopDetails> {
        if self.details.is_empty() {
            self.details = self.fetch_details().await?;
        }
        Ok(&self.details)
    }

    async fn fetch_details(&self) -> Result<LoopDetails> {
        let url = self.client.endpoint(&["loop", self.name.as_str()], &[])?;
        let details = LoopDetails::new(self.client.send_json(ApiRequest::get("Get loop details", url)).await?);
        if details.is_empty() {
            return Err(ClampError::InvalidResponse(format!(
                "Couldn't get the appropriate details for {}",
                self.name
            )));
        }
        Ok(details)
    }

    /// Re-read the full loop document; `create` only returns part of it
    pub async fn refresh_details(&mut self) -> Result<&LoopDetails> {
        self.details = self.fetch_details().await?;
        Ok(&self.details)
    }

    /// Log structural problems in the details document
    pub fn validate_details(&self) -> bool {
        let problems = self.details.validate();
        for problem in &problems {
            log::error!("Loop {} details: {}", self.name, problem);
        }
        problems.is_empty()
    }

    /// Create the loop from its template
    pub async fn create(&mut self) -> Result<&LoopDetails> {
        let url = self.client.endpoint(
            &["loop", "create", self.name.as_str()],
            &[("templateName", self.template.as_str())],
        )?;
        let response = self
            .client
            .send_json(ApiRequest::post("Create Loop Instance", url))
            .await?;
        let details = LoopDetails::new(response);
        if details.is_empty() || details.micro_service_policies().is_empty() {
            return Err(ClampError::LoopCreation(format!(
                "{} from template {}: no microservice policy in response",
                self.name, self.template
            )));
        }

        self.name = format!("{}{}", LOOP_PREFIX, self.name);
        self.details = details;
        log::info!("Loop instance {} created from template {}", self.name, self.template);
        Ok(&self.details)
    }

    /// Push the TCA configuration to the loop's microservice policy
    pub async fn update_microservice_policy(&mut self, renderer: &PayloadRenderer) -> Result<()> {
        let microservice = self
            .details()
            .await?
            .micro_service_policies()
            .first()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let microservice = microservice.unwrap_or_else(|| format!("MICROSERVICE_{}", self.name));

        let body = renderer.microservice_policy(&self.name, &microservice)?;
        let url = self.client.endpoint(&["loop", "updateMicroservicePolicy", self.name.as_str()], &[])?;
        self.client
            .send(ApiRequest::post("ADD TCA config", url).with_body(body.to_string()))
            .await?;
        log::info!("Files for TCA config {} have been uploaded to loop's microservice", self.name);
        Ok(())
    }

    /// Attach an operational policy; returns the name CLAMP gave it.
    ///
    /// Attaching the same key again adds another record.
    pub async fn add_operational_policy(&mut self, key: &PolicyKey) -> Result<String> {
        let before = self.details().await?.operational_policies().len();
        let url = self.client.endpoint(
            &[
                "loop",
                "addOperationaPolicy",
                self.name.as_str(),
                "policyModel",
                key.policy_type.as_str(),
                key.version.as_str(),
            ],
            &[],
        )?;
        let response = LoopDetails::new(
            self.client
                .send_json(ApiRequest::put("Create Operational Policy", url))
                .await?,
        );

        let not_attached = || ClampError::PolicyNotAttached {
            loop_name: self.name.clone(),
            policy_type: key.policy_type.clone(),
            version: key.version.clone(),
        };
        if response.operational_policies().len() <= before {
            return Err(not_attached());
        }
        let name = response
            .operational_policy_names()
            .last()
            .map(|n| n.to_string())
            .ok_or_else(not_attached)?;

        self.details = response;
        log::info!("Operational policy {} ({}) attached to {}", name, key, self.name);
        Ok(name)
    }

    /// Detach an operational policy and reload the details
    pub async fn remove_operational_policy(&mut self, key: &PolicyKey) -> Result<Value> {
        let url = self.client.endpoint(
            &[
                "loop",
                "removeOperationaPolicy",
                self.name.as_str(),
                "policyModel",
                key.policy_type.as_str(),
                key.version.as_str(),
            ],
            &[],
        )?;
        let response = self
            .client
            .send_json(ApiRequest::put("Remove Operational Policy", url))
            .await?;
        self.refresh_details().await?;
        log::info!("Operational policy {} removed from {}", key, self.name);
        Ok(response)
    }

    /// Upload the configuration payload of an attached operational policy
    pub async fn configure_operational_policy(
        &mut self,
        renderer: &PayloadRenderer,
        policy_name: &str,
        policy: &OperationalPolicy,
    ) -> Result<()> {
        let entity_ids = if policy.config.needs_entity_ids() {
            self.details().await?.entity_ids()
        } else {
            None
        };
        let body = renderer.operational_policy(
            self.name.as_str(),
            policy_name,
            &policy.key(),
            &policy.config,
            entity_ids.as_ref(),
        )?;
        let url = self.client.endpoint(&["loop", "updateOperationalPolicies", self.name.as_str()], &[])?;
        self.client
            .send(ApiRequest::post("ADD operational policy config", url).with_body(body.to_string()))
            .await?;
        log::info!(
            "Files for op policy config {} have been uploaded to loop's Op policy {}",
            self.name,
            policy_name
        );
        Ok(())
    }

    /// Submit, stop or restart the loop's policies.
    ///
    /// `Ok(false)` when the backend refused the action or the POLICY state did
    /// not move the way the action requires.
    pub async fn act_on_loop_policy(&mut self, action: PolicyAction) -> Result<bool> {
        let old_state = self
            .details()
            .await?
            .component_state(Component::Policy)
            .map(str::to_string);

        let url = self.client.endpoint(&["loop", action.as_str(), self.name.as_str()], &[])?;
        match self
            .client
            .send(ApiRequest::put(format!("{} policy", action), url))
            .await
        {
            Ok(_) => {}
            Err(ClampError::Api { status, .. }) => {
                log::error!("{} of loop {} refused by CLAMP ({})", action, self.name, status);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        self.refresh_details().await?;
        self.validate_details();
        let new_state = self.details.component_state(Component::Policy);
        let done = policy_action_done(action, old_state.as_deref(), new_state);
        log::info!(
            "{} of loop {}: POLICY state {:?} -> {:?} ({})",
            action,
            self.name,
            old_state,
            new_state,
            if done { "done" } else { "failed" }
        );
        Ok(done)
    }

    pub async fn submit(&mut self) -> Result<bool> {
        self.act_on_loop_policy(PolicyAction::Submit).await
    }

    /// Delete the loop; the local handle is consumed.
    ///
    /// A backend error is checked against the loop's presence: gone means
    /// `DeletedDespiteBackendError`, still there means `DeleteFailed`.
    pub async fn delete(self) -> Result<DeleteOutcome> {
        log::debug!("Delete {} loop instance", self.name);
        let url = self.client.endpoint(&["loop", "delete", self.name.as_str()], &[])?;
        let (status, body) = match self.client.send(ApiRequest::put("Delete loop instance", url)).await {
            Ok(_) => {
                log::info!("Loop {} deleted", self.name);
                return Ok(DeleteOutcome::Deleted);
            }
            Err(ClampError::Api { status, body, .. }) => (status, body),
            Err(e) => return Err(e),
        };

        match self.fetch_details().await {
            Ok(_) => Err(ClampError::DeleteFailed {
                loop_name: self.name.clone(),
                reason: format!("backend answered {} and the loop is still present", status),
            }),
            Err(ClampError::Api { status: 404, .. }) | Err(ClampError::InvalidResponse(_)) => {
                log::warn!(
                    "Loop {} is gone although delete answered {}: {}",
                    self.name,
                    status,
                    body
                );
                Ok(DeleteOutcome::DeletedDespiteBackendError { status, message: body })
            }
            Err(e) => Err(ClampError::DeleteFailed {
                loop_name: self.name.clone(),
                reason: format!("backend answered {} and presence check failed: {}", status, e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamp::policy::PolicyConfig;
    use crate::http::{ApiResponse, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn details(policy_state: &str, op_policies: usize) -> Value {
        let ops: Vec<Value> = (0..op_policies)
            .map(|i| json!({ "name": format!("OPERATIONAL_{}", i) }))
            .collect();
        json!({
            "name": "LOOP_test",
            "components": {
                "POLICY": { "componentState": { "stateName": policy_state } },
                "DCAE": { "componentState": { "stateName": "BLUEPRINT_DEPLOYED" } }
            },
            "modelService": { "resourceDetails": { "VFModule": {} } },
            "operationalPolicies": ops,
            "microServicePolicies": [ { "name": "MICROSERVICE_test" } ]
        })
    }

    fn ok(value: Value) -> Result<ApiResponse> {
        Ok(ApiResponse::ok_json(&value))
    }

    fn api_err(status: u16) -> Result<ApiResponse> {
        Err(ClampError::Api {
            action: "test".to_string(),
            status,
            body: "error".to_string(),
        })
    }

    fn instance(mock: &Arc<MockTransport>, name: &str) -> LoopInstance {
        LoopInstance::new(ClampClient::new(mock.clone(), "https://clamp:30258"), "template", name)
    }

    const BASE: &str = "https://clamp:30258/restservices/clds/v2";

    #[test]
    fn test_policy_action_done() {
        use PolicyAction::*;
        assert!(policy_action_done(Submit, Some("UNKNOWN"), Some("SENT_AND_DEPLOYED")));
        assert!(!policy_action_done(Submit, Some("UNKNOWN"), Some("SENT")));
        assert!(!policy_action_done(Submit, Some("SENT_AND_DEPLOYED"), Some("SENT_AND_DEPLOYED")));
        assert!(policy_action_done(Stop, Some("SENT_AND_DEPLOYED"), Some("SENT")));
        assert!(!policy_action_done(Restart, Some("UNKNOWN"), None));
        assert_eq!(PolicyAction::Restart.to_string(), "restart");
    }

    #[tokio::test]
    async fn test_create_prefixes_name() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![ok(details("UNKNOWN", 0))]));
        let mut loop_instance = instance(&mock, "test");
        loop_instance.create().await.unwrap();

        assert_eq!(loop_instance.name(), "LOOP_test");
        assert_eq!(loop_instance.cached_details().micro_service_policies().len(), 1);
        let call = &mock.calls()[0];
        assert_eq!(call.action, "Create Loop Instance");
        assert_eq!(call.url, format!("{}/loop/create/test?templateName=template", BASE));
    }

    #[tokio::test]
    async fn test_create_encodes_names() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![ok(details("UNKNOWN", 0))]));
        let mut loop_instance = LoopInstance::new(
            ClampClient::new(mock.clone(), "https://clamp:30258"),
            "tmpl&x=1",
            "a/b?c d",
        );
        loop_instance.create().await.unwrap();

        assert_eq!(loop_instance.name(), "LOOP_a/b?c d");
        assert_eq!(
            mock.calls()[0].url,
            format!("{}/loop/create/a%2Fb%3Fc%20d?templateName=tmpl%26x%3D1", BASE)
        );
    }

    #[tokio::test]
    async fn test_create_without_microservice_fails() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![ok(json!({ "microServicePolicies": [] }))]));
        let mut loop_instance = instance(&mock, "test");
        let err = loop_instance.create().await.unwrap_err();
        assert!(matches!(err, ClampError::LoopCreation(_)));
        assert_eq!(loop_instance.name(), "test");
    }

    #[tokio::test]
    async fn test_details_lazy_loaded_once() {
        let mock = Arc::new(MockTransport::always_json("CLAMP", details("UNKNOWN", 0)));
        let mut loop_instance = instance(&mock, "LOOP_test");
        loop_instance.details().await.unwrap();
        loop_instance.details().await.unwrap();
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0].url, format!("{}/loop/LOOP_test", BASE));
    }

    #[tokio::test]
    async fn test_empty_details_is_error() {
        let mock = Arc::new(MockTransport::always_json("CLAMP", json!({})));
        let mut loop_instance = instance(&mock, "LOOP_test");
        assert!(matches!(
            loop_instance.refresh_details().await,
            Err(ClampError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_add_operational_policy() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![ok(details("UNKNOWN", 0)), ok(details("UNKNOWN", 1))],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        let key = PolicyKey::new("FrequencyLimiter", "1.0.0");
        let name = loop_instance.add_operational_policy(&key).await.unwrap();

        assert_eq!(name, "OPERATIONAL_0");
        let call = &mock.calls()[1];
        assert_eq!(call.action, "Create Operational Policy");
        assert_eq!(
            call.url,
            format!("{}/loop/addOperationaPolicy/LOOP_test/policyModel/FrequencyLimiter/1.0.0", BASE)
        );
    }

    #[tokio::test]
    async fn test_add_same_policy_twice_appends() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![ok(details("UNKNOWN", 0)), ok(details("UNKNOWN", 1)), ok(details("UNKNOWN", 2))],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        let key = PolicyKey::new("onap.policies.controlloop.guard.common.MinMax", "1.0.0");
        loop_instance.add_operational_policy(&key).await.unwrap();
        let second = loop_instance.add_operational_policy(&key).await.unwrap();

        assert_eq!(second, "OPERATIONAL_1");
        assert_eq!(loop_instance.cached_details().operational_policies().len(), 2);
    }

    #[tokio::test]
    async fn test_add_policy_without_new_record_fails() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![ok(details("UNKNOWN", 1)), ok(details("UNKNOWN", 1))],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        let err = loop_instance
            .add_operational_policy(&PolicyKey::new("MinMax", "1.0.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClampError::PolicyNotAttached { .. }));
    }

    #[tokio::test]
    async fn test_remove_operational_policy_refreshes() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![ok(json!({})), ok(details("UNKNOWN", 0))],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        loop_instance
            .remove_operational_policy(&PolicyKey::new("MinMax", "1.0.0"))
            .await
            .unwrap();
        let calls = mock.calls();
        assert_eq!(
            calls[0].url,
            format!("{}/loop/removeOperationaPolicy/LOOP_test/policyModel/MinMax/1.0.0", BASE)
        );
        assert_eq!(calls[1].action, "Get loop details");
    }

    #[tokio::test]
    async fn test_update_microservice_policy() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![ok(details("UNKNOWN", 0)), Ok(ApiResponse::new(200, ""))],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        let renderer = PayloadRenderer::new().unwrap();
        loop_instance.update_microservice_policy(&renderer).await.unwrap();

        let call = &mock.calls()[1];
        assert_eq!(call.action, "ADD TCA config");
        assert_eq!(call.url, format!("{}/loop/updateMicroservicePolicy/LOOP_test", BASE));
        let body: Value = serde_json::from_str(call.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["name"], "MICROSERVICE_test");
    }

    #[tokio::test]
    async fn test_configure_operational_policy() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![Ok(ApiResponse::new(200, ""))]));
        let mut loop_instance = instance(&mock, "LOOP_test");
        let renderer = PayloadRenderer::new().unwrap();
        let policy = OperationalPolicy {
            policy_type: "onap.policies.controlloop.guard.common.MinMax".to_string(),
            version: "1.0.0".to_string(),
            config: PolicyConfig::default(),
        };
        loop_instance
            .configure_operational_policy(&renderer, "OPERATIONAL_test", &policy)
            .await
            .unwrap();

        let call = &mock.calls()[0];
        assert_eq!(call.action, "ADD operational policy config");
        assert_eq!(call.url, format!("{}/loop/updateOperationalPolicies/LOOP_test", BASE));
        let body: Value = serde_json::from_str(call.body.as_deref().unwrap()).unwrap();
        assert_eq!(body[0]["name"], "OPERATIONAL_test");
    }

    #[tokio::test]
    async fn test_submit_policy() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![
                ok(details("UNKNOWN", 1)),
                Ok(ApiResponse::new(200, "")),
                ok(details("SENT_AND_DEPLOYED", 1)),
            ],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        assert!(loop_instance.submit().await.unwrap());
        let call = &mock.calls()[1];
        assert_eq!(call.action, "submit policy");
        assert_eq!(call.url, format!("{}/loop/submit/LOOP_test", BASE));
        assert_eq!(
            loop_instance.cached_details().component_state(Component::Policy),
            Some("SENT_AND_DEPLOYED")
        );
    }

    #[tokio::test]
    async fn test_not_submitted_policy() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![ok(details("UNKNOWN", 1)), Ok(ApiResponse::new(200, "")), ok(details("SENT", 1))],
        ));
        let mut loop_instance = instance(&mock, "LOOP_test");
        assert!(!loop_instance.submit().await.unwrap());
    }

    #[tokio::test]
    async fn test_refused_action_is_false() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![ok(details("UNKNOWN", 1)), api_err(409)]));
        let mut loop_instance = instance(&mock, "LOOP_test");
        assert!(!loop_instance.act_on_loop_policy(PolicyAction::Stop).await.unwrap());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_clean() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![Ok(ApiResponse::new(200, ""))]));
        let outcome = instance(&mock, "LOOP_test").delete().await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(mock.calls()[0].url, format!("{}/loop/delete/LOOP_test", BASE));
    }

    #[tokio::test]
    async fn test_delete_backend_error_but_gone() {
        let mock = Arc::new(MockTransport::scripted("CLAMP", vec![api_err(500), api_err(404)]));
        let outcome = instance(&mock, "LOOP_test").delete().await.unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::DeletedDespiteBackendError {
                status: 500,
                message: "error".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_delete_backend_error_still_present() {
        let mock = Arc::new(MockTransport::scripted(
            "CLAMP",
            vec![api_err(500), ok(details("UNKNOWN", 0))],
        ));
        let err = instance(&mock, "LOOP_test").delete().await.unwrap_err();
        assert!(matches!(err, ClampError::DeleteFailed { .. }));
    }
}
