use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clampr::clamp::{Catalog, ClampClient, DcaeDeployer, DeleteOutcome, Deployer, LoopInstance, PolicyAction};
use clampr::config::Config;
use clampr::http::RestClient;
use clampr::sdc::ServiceLocator;
use clampr::session::Session;
use clampr::templates::PayloadRenderer;
use clampr::workflow::{Workflow, WorkflowOutcome};

mod cli;

use cli::{Cli, Commands, LoopCommands};

fn setup_logging(verbose: bool, level: Option<&str>) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    let mut builder = env_logger::Builder::from_env(env);

    if verbose {
        builder.target(env_logger::Target::Stderr).init();
        return Ok(());
    }

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clampr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("clampr.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// SDC and CLAMP endpoints wired from the configuration
struct Backends {
    locator: ServiceLocator,
    clamp: ClampClient,
}

fn connect(config: &Config) -> Result<Backends> {
    let session = config
        .certificate
        .as_ref()
        .map(Session::establish)
        .transpose()
        .context("Failed to establish client certificate session")?;

    let mut sdc = RestClient::builder("SDC", &config.http).proxy(config.proxy.as_ref());
    for (name, value) in ServiceLocator::headers(&config.sdc) {
        sdc = sdc.header(name, value);
    }
    let sdc = sdc.build().context("Failed to build SDC client")?;

    let clamp = RestClient::builder("CLAMP", &config.http)
        .proxy(config.proxy.as_ref())
        .session(session.as_ref())
        .build()
        .context("Failed to build CLAMP client")?;

    Ok(Backends {
        locator: ServiceLocator::new(Arc::new(sdc), &config.sdc.base_url),
        clamp: ClampClient::new(Arc::new(clamp), &config.clamp.base_url),
    })
}

async fn run_application(cli: &Cli, mut config: Config) -> Result<i32> {
    info!("Starting application");

    match &cli.command {
        None => handle_run_command(config).await,
        Some(Commands::Run {
            service,
            loop_name,
            deploy,
            delete,
        }) => {
            if let Some(service) = service {
                config.scenario.service_name = service.clone();
            }
            if let Some(loop_name) = loop_name {
                config.scenario.loop_name = loop_name.clone();
            }
            config.scenario.deploy |= *deploy;
            config.scenario.delete_on_completion |= *delete;
            handle_run_command(config).await
        }
        Some(Commands::Templates) => handle_templates_command(&config).await,
        Some(Commands::Policies { name, required }) => {
            handle_policies_command(name.as_deref(), *required, &config).await
        }
        Some(Commands::Loop { command }) => handle_loop_command(command, &config).await,
    }
}

async fn handle_run_command(config: Config) -> Result<i32> {
    info!(
        "Provisioning loop {} for service {}",
        config.scenario.loop_name, config.scenario.service_name
    );
    let backends = connect(&config)?;
    let renderer = PayloadRenderer::new().context("Failed to load payload templates")?;

    let mut workflow = Workflow::new(
        config.scenario.clone(),
        config.policy_check.clone(),
        backends.locator,
        backends.clamp,
        renderer,
    );
    if config.scenario.deploy {
        workflow = workflow.with_deployer(Box::new(DcaeDeployer::from_config(&config.deploy)));
    }

    let outcome = workflow.run().await;
    match &outcome {
        WorkflowOutcome::Provisioned {
            loop_name,
            operational_policies,
            deployed,
            deleted,
        } => {
            println!("{} {}", "Provisioned:".green(), loop_name);
            for policy in operational_policies {
                println!("  operational policy {}", policy.cyan());
            }
            if *deployed {
                println!("  {}", "deployed to DCAE".green());
            }
            match deleted {
                Some(DeleteOutcome::Deleted) => println!("  {}", "deleted".yellow()),
                Some(DeleteOutcome::DeletedDespiteBackendError { status, message }) => {
                    println!("  {} (backend answered {}: {})", "deleted".yellow(), status, message)
                }
                None => {}
            }
        }
        WorkflowOutcome::Failed { stage, reason } => {
            eprintln!("{} {}: {}", "Failed to".red(), stage, reason);
        }
    }
    Ok(outcome.exit_code())
}

async fn handle_templates_command(config: &Config) -> Result<i32> {
    let catalog = Catalog::new(connect(config)?.clamp);
    let templates = catalog.templates().await.context("Failed to list loop templates")?;
    for template in &templates {
        println!(
            "{} {}",
            template.name.cyan(),
            template.service_name().unwrap_or("-")
        );
    }
    info!("Listed {} loop templates", templates.len());
    Ok(0)
}

async fn handle_policies_command(name: Option<&str>, required: Option<usize>, config: &Config) -> Result<i32> {
    let catalog = Catalog::new(connect(config)?.clamp);
    let required = required.unwrap_or(config.policy_check.required_policies);

    if let Some(name) = name {
        let available = catalog
            .has_policy(name, required)
            .await
            .context("Failed to query policy models")?;
        if available {
            println!("{} {}", "Available:".green(), name);
            return Ok(0);
        }
        println!("{} {} (need {} policy models)", "Not available:".red(), name, required);
        return Ok(1);
    }

    let models = catalog.policy_models().await.context("Failed to query policy models")?;
    for model in &models {
        println!(
            "{} {} {}",
            model.policy_acronym.as_deref().unwrap_or("-").cyan(),
            model.policy_model_type,
            model.version
        );
    }
    println!("{} policy models loaded", models.len());
    Ok(0)
}

async fn handle_loop_command(command: &LoopCommands, config: &Config) -> Result<i32> {
    info!("Handling loop command: {:?}", command);
    let clamp = connect(config)?.clamp;
    let mut instance = LoopInstance::existing(clamp, command.name());

    let done = match command {
        LoopCommands::Show { .. } => {
            let details = instance.details().await.context("Failed to fetch loop details")?;
            println!("{}", serde_json::to_string_pretty(details.raw())?);
            instance.validate_details()
        }
        LoopCommands::Submit { .. } => instance.act_on_loop_policy(PolicyAction::Submit).await?,
        LoopCommands::Stop { .. } => instance.act_on_loop_policy(PolicyAction::Stop).await?,
        LoopCommands::Restart { .. } => instance.act_on_loop_policy(PolicyAction::Restart).await?,
        LoopCommands::Deploy { .. } => {
            let deployed = DcaeDeployer::from_config(&config.deploy).deploy(&mut instance).await?;
            if !deployed {
                println!("{} {}", "Deploy failed:".red(), command.name());
                return Ok(2);
            }
            true
        }
        LoopCommands::Undeploy { .. } => {
            DcaeDeployer::from_config(&config.deploy)
                .undeploy(&mut instance)
                .await?
        }
        LoopCommands::Delete { .. } => match instance.delete().await? {
            DeleteOutcome::Deleted => true,
            DeleteOutcome::DeletedDespiteBackendError { status, message } => {
                println!("{} backend answered {}: {}", "Warning:".yellow(), status, message);
                true
            }
        },
    };

    if done {
        println!("{} {}", "Done:".green(), command.name());
        Ok(0)
    } else {
        println!("{} {}", "Failed:".red(), command.name());
        Ok(1)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.is_verbose(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    let code = run_application(&cli, config).await.context("Application failed")?;

    std::process::exit(code)
}
