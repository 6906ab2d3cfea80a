//! Service Locator - resolves service records from the SDC catalog

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SdcConfig;
use crate::error::{ClampError, Result};
use crate::http::{ApiRequest, Transport, json_list};

/// A distributed service known to SDC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, rename = "invariantUUID")]
    pub invariant_uuid: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub lifecycle_state: Option<String>,
    #[serde(default)]
    pub distribution_status: Option<String>,
}

impl Service {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            invariant_uuid: None,
            version: None,
            lifecycle_state: None,
            distribution_status: None,
        }
    }
}

/// Looks services up by name
pub struct ServiceLocator {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl ServiceLocator {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Headers SDC expects on every call
    pub fn headers(config: &SdcConfig) -> Vec<(String, String)> {
        vec![
            ("USER_ID".to_string(), config.user_id.clone()),
            ("Authorization".to_string(), config.authorization.clone()),
            ("X-ECOMP-InstanceID".to_string(), config.instance_id.clone()),
        ]
    }

    fn services_url(&self) -> String {
        format!("{}/sdc/v1/catalog/services", self.base_url)
    }

    pub async fn list(&self) -> Result<Vec<Service>> {
        let body = self
            .transport
            .send_json(ApiRequest::get("get Services", self.services_url()))
            .await?;
        let services: Vec<Service> = json_list(body)?;
        log::debug!("number of Services returned: {}", services.len());
        Ok(services)
    }

    /// Resolve a service by name, failing with `ServiceNotFound`
    pub async fn locate(&self, name: &str) -> Result<Service> {
        self.list()
            .await?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ClampError::ServiceNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use serde_json::json;

    fn catalog() -> serde_json::Value {
        json!([
            {
                "name": "Test_SDK",
                "uuid": "a1b2",
                "invariantUUID": "c3d4",
                "version": "1.0",
                "lifecycleState": "CERTIFIED",
                "distributionStatus": "DISTRIBUTED"
            },
            { "name": "other" }
        ])
    }

    #[tokio::test]
    async fn test_locate_found() {
        let mock = Arc::new(MockTransport::always_json("SDC", catalog()));
        let locator = ServiceLocator::new(mock.clone(), "http://sdc:30205/");
        let svc = locator.locate("Test_SDK").await.unwrap();
        assert_eq!(svc.uuid.as_deref(), Some("a1b2"));
        assert_eq!(svc.invariant_uuid.as_deref(), Some("c3d4"));
        assert_eq!(svc.distribution_status.as_deref(), Some("DISTRIBUTED"));
        assert_eq!(mock.calls()[0].url, "http://sdc:30205/sdc/v1/catalog/services");
    }

    #[tokio::test]
    async fn test_locate_not_found() {
        let mock = Arc::new(MockTransport::always_json("SDC", catalog()));
        let locator = ServiceLocator::new(mock, "http://sdc:30205");
        let err = locator.locate("missing").await.unwrap_err();
        assert!(matches!(err, ClampError::ServiceNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_headers() {
        let headers = ServiceLocator::headers(&SdcConfig::default());
        assert!(headers.iter().any(|(k, v)| k == "USER_ID" && v == "cs0008"));
        assert!(headers.iter().any(|(k, _)| k == "Authorization"));
    }
}
