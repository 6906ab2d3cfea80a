//! Deployment capability - pushing a loop's microservice to the DCAE runtime
//!
//! Kept out of the main provisioning sequence: the workflow only deploys when
//! a `Deployer` is configured.

use std::time::Duration;

use async_trait::async_trait;

use crate::clamp::details::Component;
use crate::clamp::loop_instance::LoopInstance;
use crate::config::DeployConfig;
use crate::error::{ClampError, Result};
use crate::http::ApiRequest;

pub const INSTALLED: &str = "MICROSERVICE_INSTALLED_SUCCESSFULLY";
pub const INSTALL_FAILED: &str = "MICROSERVICE_INSTALLATION_FAILED";
pub const UNINSTALLED: &str = "MICROSERVICE_UNINSTALLED_SUCCESSFULLY";
pub const UNINSTALL_FAILED: &str = "MICROSERVICE_UNINSTALLATION_FAILED";

/// Deploys and undeploys a loop to a runtime target
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, instance: &mut LoopInstance) -> Result<bool>;

    async fn undeploy(&self, instance: &mut LoopInstance) -> Result<bool>;
}

/// Deployer driving CLAMP's DCAE deploy endpoints
pub struct DcaeDeployer {
    poll_interval: Duration,
    max_polls: u32,
}

impl DcaeDeployer {
    pub fn new(poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            poll_interval,
            max_polls,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.poll_interval(), config.max_polls)
    }

    async fn request(&self, instance: &LoopInstance, action: &str, path: &str) -> Result<bool> {
        let url = instance.client().endpoint(&["loop", path, instance.name()], &[])?;
        match instance.client().send(ApiRequest::put(action, url)).await {
            Ok(_) => Ok(true),
            Err(ClampError::Api { status, .. }) => {
                log::error!("[{}] refused for loop {} ({})", action, instance.name(), status);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh until the DCAE state is `success` or `failure`, bounded by `max_polls`
    async fn wait_for_state(&self, instance: &mut LoopInstance, success: &str, failure: &str) -> Result<bool> {
        for poll in 1..=self.max_polls {
            instance.refresh_details().await?;
            instance.validate_details();
            let state = instance.cached_details().component_state(Component::Dcae).unwrap_or_default();
            tracing::debug!(loop_name = instance.name(), poll, state, "DCAE state");
            if state == success {
                return Ok(true);
            }
            if state == failure {
                return Ok(false);
            }
            if poll < self.max_polls {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        tracing::warn!(
            loop_name = instance.name(),
            polls = self.max_polls,
            "DCAE state did not settle"
        );
        Ok(false)
    }
}

#[async_trait]
impl Deployer for DcaeDeployer {
    async fn deploy(&self, instance: &mut LoopInstance) -> Result<bool> {
        if !self.request(instance, "Deploy microservice to DCAE", "deploy").await? {
            return Ok(false);
        }
        let deployed = self.wait_for_state(instance, INSTALLED, INSTALL_FAILED).await?;
        log::info!("Deploy of loop {} to DCAE: {}", instance.name(), deployed);
        Ok(deployed)
    }

    async fn undeploy(&self, instance: &mut LoopInstance) -> Result<bool> {
        if !self.request(instance, "Undeploy microservice from DCAE", "undeploy").await? {
            return Ok(false);
        }
        let undeployed = self.wait_for_state(instance, UNINSTALLED, UNINSTALL_FAILED).await?;
        log::info!("Undeploy of loop {} from DCAE: {}", instance.name(), undeployed);
        Ok(undeployed)
    }
}
