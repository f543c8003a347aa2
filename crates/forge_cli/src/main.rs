//! stackforge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Graph fault (cycle, unknown reference, stalled synthesis)
//! - 4: Stack sequencing fault (sealed stack, unresolved export)

use std::process::ExitCode;

use clap::Parser;
use forge_core::SynthError;
use forge_iac::IacError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const GRAPH_FAULT: u8 = 3;
    pub const SEQUENCING_FAULT: u8 = 4;
}

fn main() -> ExitCode {
    // Secrets may come from a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args),
        Commands::Graph(args) => commands::graph::execute(args),
        Commands::Outputs(args) => commands::outputs::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "forge=debug"
    } else if quiet {
        "forge=warn"
    } else {
        "forge=info"
    };

    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // A subscriber may already be installed
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<SynthError>() {
            return if err.is_graph_fault() {
                ExitCodes::GRAPH_FAULT
            } else {
                ExitCodes::SEQUENCING_FAULT
            };
        }
        if let Some(err) = cause.downcast_ref::<IacError>() {
            match err {
                IacError::Synth(_) => continue,
                IacError::Config(_) | IacError::InvalidFormat(_) | IacError::Yaml(_) => {
                    return ExitCodes::INVALID_ARGS
                }
                IacError::Io(_) | IacError::Json(_) => return ExitCodes::GENERAL_ERROR,
            }
        }
    }
    ExitCodes::GENERAL_ERROR
}
