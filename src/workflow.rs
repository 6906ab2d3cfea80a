//! Provisioning workflow - service lookup through policy submission
//!
//! Stages run strictly in order and each one feeds the next. The first stage
//! that fails ends the run; nothing already created remotely is rolled back.

use std::fmt;

use crate::clamp::{Catalog, ClampClient, DeleteOutcome, Deployer, LoopInstance};
use crate::config::{PolicyCheckConfig, ScenarioConfig};
use crate::error::ClampError;
use crate::sdc::ServiceLocator;
use crate::templates::PayloadRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LocateService,
    ResolveTemplate,
    CheckPolicy,
    CreateLoop,
    RefreshDetails,
    AttachPolicy,
    ConfigurePolicy,
    Submit,
    Deploy,
    Delete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LocateService => "locate service",
            Stage::ResolveTemplate => "resolve loop template",
            Stage::CheckPolicy => "check policy availability",
            Stage::CreateLoop => "create loop instance",
            Stage::RefreshDetails => "refresh loop details",
            Stage::AttachPolicy => "attach operational policy",
            Stage::ConfigurePolicy => "configure operational policy",
            Stage::Submit => "submit policies",
            Stage::Deploy => "deploy loop",
            Stage::Delete => "delete loop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Provisioned {
        loop_name: String,
        operational_policies: Vec<String>,
        deployed: bool,
        deleted: Option<DeleteOutcome>,
    },
    Failed {
        stage: Stage,
        reason: String,
    },
}

impl WorkflowOutcome {
    /// Process exit code: 0 success, 2 deployment failure, 1 anything else
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkflowOutcome::Provisioned { .. } => 0,
            WorkflowOutcome::Failed { stage: Stage::Deploy, .. } => 2,
            WorkflowOutcome::Failed { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Provisioned { .. })
    }
}

#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    reason: String,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T, ClampError> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            reason: e.to_string(),
        })
    }
}

fn failure(stage: Stage, reason: impl Into<String>) -> StageFailure {
    StageFailure {
        stage,
        reason: reason.into(),
    }
}

pub struct Workflow {
    scenario: ScenarioConfig,
    policy_check: PolicyCheckConfig,
    locator: ServiceLocator,
    clamp: ClampClient,
    renderer: PayloadRenderer,
    deployer: Option<Box<dyn Deployer>>,
}

impl Workflow {
    pub fn new(
        scenario: ScenarioConfig,
        policy_check: PolicyCheckConfig,
        locator: ServiceLocator,
        clamp: ClampClient,
        renderer: PayloadRenderer,
    ) -> Self {
        Self {
            scenario,
            policy_check,
            locator,
            clamp,
            renderer,
            deployer: None,
        }
    }

    /// Deploy the loop after submission
    pub fn with_deployer(mut self, deployer: Box<dyn Deployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub async fn run(&self) -> WorkflowOutcome {
        match self.provision().await {
            Ok(outcome) => outcome,
            Err(StageFailure { stage, reason }) => {
                log::error!("Workflow stopped at '{}': {}", stage, reason);
                WorkflowOutcome::Failed { stage, reason }
            }
        }
    }

    async fn provision(&self) -> Result<WorkflowOutcome, StageFailure> {
        let scenario = &self.scenario;

        let service = self
            .locator
            .locate(&scenario.service_name)
            .await
            .at(Stage::LocateService)?;
        log::info!("Service {} found", service.name);

        let catalog = Catalog::new(self.clamp.clone());
        let template = catalog
            .template_for(&service)
            .await
            .at(Stage::ResolveTemplate)?
            .ok_or_else(|| failure(Stage::ResolveTemplate, format!("no loop template for {}", service.name)))?;
        log::info!("Loop template {} resolved", template.name);

        if !catalog
            .wait_for_policy(&scenario.policy_name, &self.policy_check)
            .await
        {
            return Err(failure(
                Stage::CheckPolicy,
                format!(
                    "policy {} not available with {} policy models",
                    scenario.policy_name, self.policy_check.required_policies
                ),
            ));
        }
        log::info!("Policy {} available", scenario.policy_name);

        let mut instance = LoopInstance::new(self.clamp.clone(), &template.name, &scenario.loop_name);
        instance.create().await.at(Stage::CreateLoop)?;
        instance.refresh_details().await.at(Stage::RefreshDetails)?;
        log::info!("Loop {} details refreshed", instance.name());

        if scenario.update_microservice_policy {
            if let Err(e) = instance.update_microservice_policy(&self.renderer).await {
                log::error!(
                    "an error occured during file upload for TCA config to loop's microservice {}: {}",
                    instance.name(),
                    e
                );
            }
        }

        let mut attached = Vec::with_capacity(scenario.operational_policies.len());
        for policy in &scenario.operational_policies {
            let name = instance
                .add_operational_policy(&policy.key())
                .await
                .at(Stage::AttachPolicy)?;
            instance
                .configure_operational_policy(&self.renderer, &name, policy)
                .await
                .at(Stage::ConfigurePolicy)?;
            attached.push(name);
        }

        if !instance.submit().await.at(Stage::Submit)? {
            return Err(failure(
                Stage::Submit,
                format!("policies of {} were not accepted by the policy engine", instance.name()),
            ));
        }
        log::info!("Policies of loop {} submitted", instance.name());

        let deployed = match &self.deployer {
            Some(deployer) => {
                if !deployer.deploy(&mut instance).await.at(Stage::Deploy)? {
                    return Err(failure(Stage::Deploy, format!("{} was not deployed", instance.name())));
                }
                true
            }
            None => false,
        };

        let loop_name = instance.name().to_string();
        let deleted = if scenario.delete_on_completion {
            let outcome = instance.delete().await.at(Stage::Delete)?;
            if let DeleteOutcome::DeletedDespiteBackendError { status, message } = &outcome {
                log::warn!("Loop {} deleted but backend reported {}: {}", loop_name, status, message);
            }
            Some(outcome)
        } else {
            None
        };

        log::info!("Loop {} provisioned", loop_name);
        Ok(WorkflowOutcome::Provisioned {
            loop_name,
            operational_policies: attached,
            deployed,
            deleted,
        })
    }
}
