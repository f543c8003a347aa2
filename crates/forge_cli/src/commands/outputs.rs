//! Outputs command - List stack outputs and export names.

use anyhow::Result;
use clap::Args;

use super::EnvironmentArgs;

#[derive(Args)]
pub struct OutputsArgs {
    #[command(flatten)]
    pub env: EnvironmentArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: OutputsArgs) -> Result<()> {
    let env = args.env.synthesize()?;

    if args.json {
        let mut stacks = serde_json::Map::new();
        for manifest in env.manifests() {
            let outputs: serde_json::Map<String, serde_json::Value> = manifest
                .outputs
                .iter()
                .map(|output| {
                    (
                        output.name.clone(),
                        serde_json::json!({
                            "export": output.export_name,
                            "value": output.value.to_template(),
                        }),
                    )
                })
                .collect();
            stacks.insert(manifest.stack.clone(), serde_json::Value::Object(outputs));
        }
        println!("{}", serde_json::to_string_pretty(&stacks)?);
        return Ok(());
    }

    for manifest in env.manifests() {
        println!("{}", manifest.stack);
        for output in &manifest.outputs {
            let value = match output.value.as_str() {
                Some(text) => text.to_string(),
                None => output.value.to_template().to_string(),
            };
            println!("  {} = {}", output.name, value);
            println!("    export: {}", output.export_name);
            if let Some(description) = &output.description {
                println!("    {}", description);
            }
        }
    }

    Ok(())
}
