//! CLI command definitions.
//!
//! Every subcommand synthesizes the same two-tier environment and then
//! presents it differently.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use forge_core::AttributeTable;
use forge_iac::{load_attributes, Environment, EnvironmentConfig, Secrets};
use tracing::debug;

pub mod graph;
pub mod outputs;
pub mod synth;

/// stackforge - declarative stack synthesis for a two-tier AWS environment
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "stackforge - declarative stack synthesis for a two-tier AWS environment")]
#[command(long_about = r#"
stackforge declares a database stack and a Prisma service stack, resolves
cross-stack references, and writes deployable CloudFormation templates.

COMMANDS:
  synth    → Write one template per stack plus assembly.json
  graph    → Show each stack's emission order and dependency edges
  outputs  → List stack outputs and their export names

ENVIRONMENT:
  DATABASE_USERNAME, DATABASE_PASSWORD, PRISMA_MANAGEMENT_SECRET, AWS_REGION
  (read from a .env file in the working directory when present)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Graph fault (cycle, unknown reference, stalled synthesis)
  4 - Stack sequencing fault (sealed stack, unresolved export)
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize templates for every stack
    Synth(synth::SynthArgs),

    /// Show the dependency graph of every stack
    Graph(graph::GraphArgs),

    /// List stack outputs and export names
    Outputs(outputs::OutputsArgs),
}

/// Inputs shared by every command.
#[derive(Args, Default)]
pub struct EnvironmentArgs {
    /// Environment config file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Materialized attribute values reported by an applier (YAML or JSON)
    #[arg(short, long)]
    pub attributes: Option<PathBuf>,

    /// Region for container log shipping
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Database master username
    #[arg(long, env = "DATABASE_USERNAME", hide_env_values = true)]
    pub database_username: Option<String>,

    /// Database master password
    #[arg(long, env = "DATABASE_PASSWORD", hide_env_values = true)]
    pub database_password: Option<String>,

    /// Prisma management API secret
    #[arg(long, env = "PRISMA_MANAGEMENT_SECRET", hide_env_values = true)]
    pub management_secret: Option<String>,
}

impl fmt::Debug for EnvironmentArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("EnvironmentArgs")
            .field("config", &self.config)
            .field("attributes", &self.attributes)
            .field("region", &self.region)
            .field("database_username", &self.database_username)
            .field("database_password", &redact(&self.database_password))
            .field("management_secret", &redact(&self.management_secret))
            .finish()
    }
}

impl EnvironmentArgs {
    /// Resolve the config: file (or defaults), then region and secrets.
    pub fn config(&self) -> Result<EnvironmentConfig> {
        let mut config = match &self.config {
            Some(path) => EnvironmentConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EnvironmentConfig::default(),
        };

        if let Some(region) = &self.region {
            config = config.with_region(region.as_str());
        }

        Ok(config.with_secrets(Secrets {
            database_username: self.database_username.clone(),
            database_password: self.database_password.clone(),
            management_secret: self.management_secret.clone(),
        }))
    }

    pub fn attributes(&self) -> Result<AttributeTable> {
        match &self.attributes {
            Some(path) => load_attributes(path)
                .with_context(|| format!("Failed to load attributes {}", path.display())),
            None => Ok(AttributeTable::new()),
        }
    }

    /// Synthesize the environment these arguments describe.
    pub fn synthesize(&self) -> Result<Environment> {
        let config = self.config()?;
        let attributes = self.attributes()?;
        debug!("Synthesizing with {:?}", config);
        Environment::synthesize(&config, attributes).context("Synthesis failed")
    }
}
