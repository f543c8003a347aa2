//! Composition root.
//!
//! The [`App`] builds stacks one at a time. Each stack is declared,
//! synthesized and published before the next one starts, so a consumer can
//! only ever import from producers that are already complete.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::bridge::Bridge;
use crate::error::SynthError;
use crate::resolver::AttributeTable;
use crate::stack::Stack;
use crate::synth::Manifest;

/// One stack in the cloud assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyStack {
    pub name: String,
    /// Stacks that must be deployed first.
    pub dependencies: Vec<String>,
    pub resources: usize,
    pub exports: Vec<String>,
}

/// Synthesized stacks in deployment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudAssembly {
    pub stacks: Vec<AssemblyStack>,
}

impl CloudAssembly {
    pub fn stack(&self, name: &str) -> Option<&AssemblyStack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    pub fn deployment_order(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Owns the bridge, the materialized attributes and every synthesized stack.
#[derive(Debug, Default)]
pub struct App {
    bridge: Bridge,
    attributes: AttributeTable,
    stacks: IndexMap<String, Stack>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve references against values an applier already materialized.
    pub fn with_attributes(mut self, attributes: AttributeTable) -> Self {
        self.attributes = attributes;
        self
    }

    /// Declare a stack through `build`, then synthesize and publish it.
    ///
    /// `build` receives the bridge holding every stack built so far.
    pub fn stack<T, E, F>(&mut self, name: &str, build: F) -> Result<T, E>
    where
        F: FnOnce(&mut Stack, &Bridge) -> Result<T, E>,
        E: From<SynthError>,
    {
        if self.stacks.contains_key(name) {
            return Err(SynthError::DuplicateStack(name.to_string()).into());
        }

        let mut stack = Stack::new(name)?;
        let built = build(&mut stack, &self.bridge)?;
        stack.synthesize(&self.attributes)?;
        let published = self.bridge.publish(&mut stack)?;
        info!("Stack {} published {} export(s)", name, published);

        self.stacks.insert(name.to_string(), stack);
        Ok(built)
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&Stack> {
        self.stacks.get(name)
    }

    pub fn manifest(&self, name: &str) -> Option<&Manifest> {
        self.stacks.get(name).and_then(Stack::manifest)
    }

    /// Manifests in build order.
    pub fn manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.stacks.values().filter_map(Stack::manifest)
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn assembly(&self) -> CloudAssembly {
        let stacks = self
            .stacks
            .values()
            .filter_map(|stack| {
                let summary = stack.manifest()?.summary();
                Some(AssemblyStack {
                    name: summary.stack,
                    dependencies: stack.imports().to_vec(),
                    resources: summary.resources,
                    exports: summary.outputs,
                })
            })
            .collect();
        CloudAssembly { stacks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthResult;
    use crate::value::Properties;

    #[test]
    fn test_consumer_after_producer() {
        let mut app = App::new();
        app.stack("Data", |stack, _| -> SynthResult<()> {
            let cluster = stack.declare("Cluster", "AWS::RDS::DBCluster", Properties::new())?;
            stack.output("Endpoint", cluster.attr("Endpoint.Address"))
        })
        .unwrap();

        app.stack("Service", |stack, bridge| -> SynthResult<()> {
            let endpoint = stack.import(bridge, "Data", "Endpoint")?;
            stack.declare("Task", "AWS::ECS::TaskDefinition", Properties::new().with("Host", endpoint))?;
            Ok(())
        })
        .unwrap();

        let assembly = app.assembly();
        assert_eq!(assembly.deployment_order(), vec!["Data", "Service"]);
        assert_eq!(assembly.stack("Service").unwrap().dependencies, vec!["Data".to_string()]);
        assert_eq!(assembly.stack("Data").unwrap().exports, vec!["Data:Endpoint".to_string()]);
    }

    #[test]
    fn test_import_from_unbuilt_stack() {
        let mut app = App::new();
        let err = app
            .stack("Service", |stack, bridge| -> SynthResult<()> {
                stack.import(bridge, "Data", "Endpoint")?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, SynthError::UnresolvedExport { .. }));
        assert!(app.is_empty());
    }

    #[test]
    fn test_duplicate_stack_name() {
        let mut app = App::new();
        app.stack("Data", |_, _| -> SynthResult<()> { Ok(()) }).unwrap();
        let err = app.stack("Data", |_, _| -> SynthResult<()> { Ok(()) }).unwrap_err();
        assert_eq!(err, SynthError::DuplicateStack("Data".to_string()));
    }
}
