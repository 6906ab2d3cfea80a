//! CLI command definitions using clap.
//!
//! - run: the full provisioning workflow
//! - templates / policies: read CLAMP catalogs
//! - loop: act on an existing loop instance

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Clampr - closed loop provisioning against SDC and CLAMP
#[derive(Parser, Debug)]
#[command(name = "clampr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a loop end to end (default)
    Run {
        /// SDC service the loop is built for
        #[arg(short, long)]
        service: Option<String>,

        /// Loop instance name, without the LOOP_ prefix
        #[arg(short, long)]
        loop_name: Option<String>,

        /// Deploy the loop to DCAE after submission
        #[arg(long)]
        deploy: bool,

        /// Delete the loop once provisioned
        #[arg(long)]
        delete: bool,
    },

    /// List loop templates known to CLAMP
    Templates,

    /// List policy models, or check one policy's availability
    Policies {
        /// Policy acronym to look for
        #[arg(short, long)]
        name: Option<String>,

        /// Minimum number of loaded policy models
        #[arg(short, long)]
        required: Option<usize>,
    },

    /// Act on an existing loop instance
    Loop {
        #[command(subcommand)]
        command: LoopCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LoopCommands {
    /// Print the loop details
    Show { name: String },

    /// Submit the loop's policies
    Submit { name: String },

    /// Stop the loop's policies
    Stop { name: String },

    /// Restart the loop's policies
    Restart { name: String },

    /// Deploy the loop's microservice to DCAE
    Deploy { name: String },

    /// Undeploy the loop's microservice from DCAE
    Undeploy { name: String },

    /// Delete the loop
    Delete { name: String },
}

impl LoopCommands {
    pub fn name(&self) -> &str {
        match self {
            LoopCommands::Show { name }
            | LoopCommands::Submit { name }
            | LoopCommands::Stop { name }
            | LoopCommands::Restart { name }
            | LoopCommands::Deploy { name }
            | LoopCommands::Undeploy { name }
            | LoopCommands::Delete { name } => name,
        }
    }
}
