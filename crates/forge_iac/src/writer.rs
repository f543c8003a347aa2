//! Template and assembly file output.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use forge_core::{AssemblyStack, Manifest};
use serde::Serialize;
use tracing::{debug, info};

use crate::environment::Environment;
use crate::error::{IacError, IacResult};

/// Name of the assembly index written beside the templates.
pub const ASSEMBLY_FILE: &str = "assembly.json";

/// Template serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for TemplateFormat {
    type Err = IacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(TemplateFormat::Json),
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            other => Err(IacError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Serialize)]
struct AssemblyFile<'a> {
    version: &'static str,
    stacks: Vec<AssemblyFileEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct AssemblyFileEntry<'a> {
    #[serde(flatten)]
    stack: &'a AssemblyStack,
    template: String,
}

/// Writes one template per stack plus the assembly index.
pub struct TemplateWriter {
    out_dir: PathBuf,
    format: TemplateFormat,
}

impl TemplateWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            format: TemplateFormat::default(),
        }
    }

    pub fn with_format(mut self, format: TemplateFormat) -> Self {
        self.format = format;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn template_file_name(&self, stack: &str) -> String {
        format!("{}.template.{}", stack, self.format.extension())
    }

    /// Render one manifest in the configured format.
    pub fn render(&self, manifest: &Manifest) -> IacResult<String> {
        match self.format {
            TemplateFormat::Json => Ok(serde_json::to_string_pretty(&manifest.to_template())?),
            TemplateFormat::Yaml => Ok(serde_yaml::to_string(&manifest.to_template())?),
        }
    }

    /// Write every template and the assembly index. Returns the written paths.
    pub fn write(&self, environment: &Environment) -> IacResult<Vec<PathBuf>> {
        info!("Writing templates to {:?}", self.out_dir);
        fs::create_dir_all(&self.out_dir)?;

        let mut written = Vec::new();
        for manifest in environment.manifests() {
            let path = self.out_dir.join(self.template_file_name(&manifest.stack));
            debug!("Writing {} to {:?}", manifest.stack, path);
            fs::write(&path, self.render(manifest)?)?;
            written.push(path);
        }

        let assembly = environment.assembly();
        let index = AssemblyFile {
            version: "1",
            stacks: assembly
                .stacks
                .iter()
                .map(|stack| AssemblyFileEntry {
                    stack,
                    template: self.template_file_name(&stack.name),
                })
                .collect(),
        };
        let path = self.out_dir.join(ASSEMBLY_FILE);
        fs::write(&path, serde_json::to_string_pretty(&index)?)?;
        written.push(path);

        info!("Wrote {} file(s)", written.len());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use forge_core::AttributeTable;
    use tempfile::tempdir;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<TemplateFormat>().unwrap(), TemplateFormat::Json);
        assert_eq!("yml".parse::<TemplateFormat>().unwrap(), TemplateFormat::Yaml);
        assert!(matches!(
            "toml".parse::<TemplateFormat>(),
            Err(IacError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_write_yaml_templates() {
        let dir = tempdir().unwrap();
        let env = Environment::synthesize(&EnvironmentConfig::default(), AttributeTable::new()).unwrap();
        let writer = TemplateWriter::new(dir.path().join("out")).with_format(TemplateFormat::Yaml);

        let written = writer.write(&env).unwrap();
        assert_eq!(written.len(), 3);

        let template = fs::read_to_string(dir.path().join("out/DatabaseStack.template.yaml")).unwrap();
        let parsed: serde_json::Value = serde_yaml::from_str(&template).unwrap();
        assert_eq!(parsed["Resources"]["VPC"]["Type"], "AWS::EC2::VPC");
    }
}
