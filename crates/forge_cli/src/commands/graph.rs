//! Graph command - Show emission order and dependency edges.

use anyhow::{bail, Result};
use clap::Args;
use forge_core::{DependencyGraph, LogicalId};

use super::EnvironmentArgs;

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub env: EnvironmentArgs,

    /// Only show this stack
    #[arg(short, long)]
    pub stack: Option<String>,
}

pub fn execute(args: GraphArgs) -> Result<()> {
    let env = args.env.synthesize()?;

    if let Some(name) = &args.stack {
        if env.manifest(name).is_none() {
            bail!("Stack not found: {}", name);
        }
    }

    for manifest in env.manifests() {
        if args.stack.as_deref().is_some_and(|name| name != manifest.stack) {
            continue;
        }
        let Some(stack) = env.app().get(&manifest.stack) else {
            continue;
        };

        let graph = DependencyGraph::build(stack.name(), stack.nodes())?;
        println!(
            "{} ({} resources, {} edges)",
            manifest.stack,
            graph.node_count(),
            graph.edge_count()
        );

        for (position, entry) in manifest.resources.iter().enumerate() {
            let deps: Vec<&str> = graph.dependencies(&entry.id).into_iter().map(LogicalId::as_str).collect();
            if deps.is_empty() {
                println!("  {:>2}. {} [{}]", position + 1, entry.id, entry.kind);
            } else {
                println!(
                    "  {:>2}. {} [{}] <- {}",
                    position + 1,
                    entry.id,
                    entry.kind,
                    deps.join(", ")
                );
            }
        }

        if !stack.imports().is_empty() {
            println!("  imports from: {}", stack.imports().join(", "));
        }
        println!();
    }

    Ok(())
}
