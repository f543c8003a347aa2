//! Synth command - Write templates for every stack.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use forge_iac::{TemplateFormat, TemplateWriter};
use tracing::info;

use super::EnvironmentArgs;

#[derive(Args)]
pub struct SynthArgs {
    #[command(flatten)]
    pub env: EnvironmentArgs,

    /// Output directory
    #[arg(short, long, default_value = "forge.out")]
    pub out: PathBuf,

    /// Template format (json or yaml)
    #[arg(short, long, default_value = "json")]
    pub format: TemplateFormat,

    /// Print templates instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

pub fn execute(args: SynthArgs) -> Result<()> {
    let env = args.env.synthesize()?;
    let writer = TemplateWriter::new(&args.out).with_format(args.format);

    if args.dry_run {
        for manifest in env.manifests() {
            println!("# {}", writer.template_file_name(&manifest.stack));
            println!("{}", writer.render(manifest)?);
        }
        return Ok(());
    }

    let written = writer
        .write(&env)
        .with_context(|| format!("Failed to write templates to {}", args.out.display()))?;

    for path in &written {
        println!("  {}", path.display());
    }
    info!("Synthesized {} stack(s) into {}", env.app().len(), args.out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_synth_writes_templates() {
        let dir = tempdir().unwrap();
        let args = SynthArgs {
            env: EnvironmentArgs::default(),
            out: dir.path().join("forge.out"),
            format: TemplateFormat::Json,
            dry_run: false,
        };

        execute(args).unwrap();
        assert!(dir.path().join("forge.out/DatabaseStack.template.json").exists());
        assert!(dir.path().join("forge.out/assembly.json").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let args = SynthArgs {
            env: EnvironmentArgs::default(),
            out: dir.path().join("forge.out"),
            format: TemplateFormat::Yaml,
            dry_run: true,
        };

        execute(args).unwrap();
        assert!(!dir.path().join("forge.out").exists());
    }
}
