//! Stacks: the unit of declaration, synthesis and cross-stack export.
//!
//! # Lifecycle
//!
//! 1. **Building**: resources, dependencies, outputs and imports are declared.
//! 2. **Synthesizing**: the stack is sealed and its graph is emitted.
//! 3. **Synthesized**: the manifest is available.
//! 4. **Exported**: the outputs have been published to a [`Bridge`].
//!
//! Transitions only move forward. A failed synthesis ends in `Failed`.
//!
//! [`Bridge`]: crate::bridge::Bridge

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, ExportHandle};
use crate::error::{SynthError, SynthResult};
use crate::graph::DependencyGraph;
use crate::node::{Resource, ResourceNode};
use crate::resolver::AttributeTable;
use crate::synth::{Manifest, OutputDeclaration, Synthesizer};
use crate::value::{LogicalId, Properties, Value};

/// Stack lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Building,
    Synthesizing,
    Synthesized,
    Exported,
    Failed,
}

impl StackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackState::Building => "building",
            StackState::Synthesizing => "synthesizing",
            StackState::Synthesized => "synthesized",
            StackState::Exported => "exported",
            StackState::Failed => "failed",
        }
    }

    /// Whether the stack still accepts declarations.
    pub fn is_open(&self) -> bool {
        matches!(self, StackState::Building)
    }
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, isolated collection of resources and outputs.
#[derive(Debug)]
pub struct Stack {
    name: String,
    state: StackState,
    nodes: Vec<ResourceNode>,
    ids: HashSet<LogicalId>,
    outputs: IndexMap<String, OutputDeclaration>,
    /// Stacks this one imported values from, in first-import order.
    imports: Vec<String>,
    manifest: Option<Manifest>,
}

impl Stack {
    /// Create a stack. Names are ASCII alphanumerics and `-`.
    pub fn new(name: impl Into<String>) -> SynthResult<Self> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SynthError::InvalidStackName(name));
        }

        Ok(Self {
            name,
            state: StackState::Building,
            nodes: Vec::new(),
            ids: HashSet::new(),
            outputs: IndexMap::new(),
            imports: Vec::new(),
            manifest: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    /// Declared nodes, in insertion order.
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of the stacks this one consumes exports from.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// The manifest, once synthesized.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    fn ensure_open(&self, action: &str) -> SynthResult<()> {
        if self.state.is_open() {
            Ok(())
        } else {
            Err(SynthError::StackSealed {
                stack: self.name.clone(),
                state: self.state.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Declare a resource. The logical id is `name`, which must be unique
    /// within this stack.
    pub fn declare(
        &mut self,
        name: &str,
        kind: impl Into<String>,
        properties: Properties,
    ) -> SynthResult<Resource> {
        self.ensure_open("declare a resource")?;

        let id = LogicalId::new(name)?;
        if self.ids.contains(&id) {
            return Err(SynthError::DuplicateLogicalId {
                stack: self.name.clone(),
                id,
            });
        }

        let node = ResourceNode::new(id.clone(), kind, properties);
        debug!(
            "Declared {} ({}) in {} with {} reference(s)",
            node.id,
            node.kind,
            self.name,
            node.referenced_ids().len()
        );

        let handle = node.handle();
        self.ids.insert(id);
        self.nodes.push(node);
        Ok(handle)
    }

    /// Require `dependency` to be created before `dependent`.
    pub fn depends_on(&mut self, dependent: &Resource, dependency: &Resource) -> SynthResult<()> {
        self.ensure_open("add a dependency")?;

        for id in [dependent.id(), dependency.id()] {
            if !self.ids.contains(id) {
                return Err(SynthError::UnknownReference {
                    stack: self.name.clone(),
                    from: dependent.id().to_string(),
                    target: id.clone(),
                });
            }
        }

        if let Some(node) = self.nodes.iter_mut().find(|n| &n.id == dependent.id()) {
            node.explicit_depends_on.insert(dependency.id().clone());
        }
        debug!("{} depends on {} in {}", dependent.id(), dependency.id(), self.name);
        Ok(())
    }

    /// Register a named output.
    pub fn output(&mut self, name: &str, value: impl Into<Value>) -> SynthResult<()> {
        self.add_output(name, value.into(), None)
    }

    /// Register a named output with a description.
    pub fn output_with_description(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        description: impl Into<String>,
    ) -> SynthResult<()> {
        self.add_output(name, value.into(), Some(description.into()))
    }

    fn add_output(&mut self, name: &str, value: Value, description: Option<String>) -> SynthResult<()> {
        self.ensure_open("add an output")?;

        if self.outputs.contains_key(name) {
            return Err(SynthError::DuplicateOutput {
                stack: self.name.clone(),
                output: name.to_string(),
            });
        }

        self.outputs.insert(
            name.to_string(),
            OutputDeclaration {
                name: name.to_string(),
                value,
                description,
            },
        );
        Ok(())
    }

    /// Consume another stack's published output through `bridge`.
    pub fn import(&mut self, bridge: &Bridge, source_stack: &str, output: &str) -> SynthResult<Value> {
        self.ensure_open("import an export")?;

        let handle: ExportHandle = bridge.export(source_stack, output);
        let value = bridge.import(&handle)?;

        if !self.imports.iter().any(|s| s == source_stack) {
            self.imports.push(source_stack.to_string());
        }
        Ok(value)
    }

    /// Seal the stack and emit its manifest.
    pub fn synthesize(&mut self, attributes: &AttributeTable) -> SynthResult<&Manifest> {
        self.ensure_open("synthesize")?;
        self.state = StackState::Synthesizing;
        info!("Synthesizing stack {} ({} resources)", self.name, self.nodes.len());

        let outputs: Vec<OutputDeclaration> = self.outputs.values().cloned().collect();
        let result = DependencyGraph::build(&self.name, &self.nodes)
            .and_then(|graph| Synthesizer::new(attributes).synthesize(&graph, &self.nodes, &outputs));

        match result {
            Ok(manifest) => {
                self.state = StackState::Synthesized;
                info!(
                    "Synthesized stack {}: {} resources, {} outputs",
                    self.name,
                    manifest.resources.len(),
                    manifest.outputs.len()
                );
                Ok(&*self.manifest.insert(manifest))
            }
            Err(e) => {
                warn!("Synthesis of stack {} failed: {}", self.name, e);
                self.state = StackState::Failed;
                Err(e)
            }
        }
    }

    /// Move to `Exported` once the outputs have been published.
    pub(crate) fn mark_exported(&mut self) -> SynthResult<()> {
        match self.state {
            StackState::Synthesized => {
                self.state = StackState::Exported;
                Ok(())
            }
            _ => Err(SynthError::StackNotSynthesized(self.name.clone())),
        }
    }
}
