//! Topological synthesis of a stack into its manifest.
//!
//! Emission follows Kahn's algorithm. Among the nodes whose dependencies
//! have all been emitted, the one declared first goes next, so the same
//! declarations always produce the same manifest.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::graph::DependencyGraph;
use crate::node::ResourceNode;
use crate::resolver::{AttributeTable, ReferenceResolver};
use crate::value::{LogicalId, Properties, Value};

/// An output registered on a stack before synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDeclaration {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
}

/// One emitted resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub id: LogicalId,
    pub kind: String,
    /// Fully literal, or carrying late-binding markers.
    pub properties: Properties,
    /// Explicit ordering hints, in emission order.
    pub depends_on: Vec<LogicalId>,
}

/// One resolved output.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestOutput {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
    /// Name under which the applier exports the value to other stacks.
    pub export_name: String,
}

/// Ordered, resolved description of a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub stack: String,
    pub resources: Vec<ManifestEntry>,
    pub outputs: Vec<ManifestOutput>,
}

impl Manifest {
    pub fn resource(&self, id: &str) -> Option<&ManifestEntry> {
        self.resources.iter().find(|r| r.id.as_str() == id)
    }

    /// Emission position of a resource.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.id.as_str() == id)
    }

    pub fn output(&self, name: &str) -> Option<&ManifestOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Resource ids in emission order.
    pub fn order(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.id.as_str()).collect()
    }

    /// Render as a template document. Resources keep emission order.
    pub fn to_template(&self) -> serde_json::Value {
        let mut resources = serde_json::Map::new();
        for entry in &self.resources {
            let mut body = serde_json::Map::new();
            body.insert("Type".to_string(), serde_json::Value::String(entry.kind.clone()));
            if !entry.properties.is_empty() {
                body.insert("Properties".to_string(), entry.properties.to_template());
            }
            if !entry.depends_on.is_empty() {
                let deps = entry
                    .depends_on
                    .iter()
                    .map(|id| serde_json::Value::String(id.to_string()))
                    .collect();
                body.insert("DependsOn".to_string(), serde_json::Value::Array(deps));
            }
            resources.insert(entry.id.to_string(), serde_json::Value::Object(body));
        }

        let mut template = serde_json::Map::new();
        template.insert("Resources".to_string(), serde_json::Value::Object(resources));

        if !self.outputs.is_empty() {
            let mut outputs = serde_json::Map::new();
            for output in &self.outputs {
                let mut body = serde_json::Map::new();
                if let Some(description) = &output.description {
                    body.insert("Description".to_string(), serde_json::Value::String(description.clone()));
                }
                body.insert("Value".to_string(), output.value.to_template());
                body.insert(
                    "Export".to_string(),
                    serde_json::json!({ "Name": output.export_name }),
                );
                outputs.insert(output.name.clone(), serde_json::Value::Object(body));
            }
            template.insert("Outputs".to_string(), serde_json::Value::Object(outputs));
        }

        serde_json::Value::Object(template)
    }

    /// Pretty-printed template JSON. Byte-stable for identical declarations.
    pub fn to_json_string(&self) -> String {
        // Serializing a `serde_json::Value` cannot fail.
        serde_json::to_string_pretty(&self.to_template()).unwrap_or_default()
    }

    /// Summary used by the cloud assembly.
    pub fn summary(&self) -> ManifestSummary {
        ManifestSummary {
            stack: self.stack.clone(),
            resources: self.resources.len(),
            outputs: self.outputs.iter().map(|o| o.export_name.clone()).collect(),
        }
    }
}

/// Serializable digest of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    pub stack: String,
    pub resources: usize,
    pub outputs: Vec<String>,
}

/// Export name of a stack output.
pub fn export_name(stack: &str, output: &str) -> String {
    format!("{}:{}", stack, output)
}

/// Emits a stack's nodes in dependency order, resolving references as it goes.
pub struct Synthesizer<'a> {
    attributes: &'a AttributeTable,
}

impl<'a> Synthesizer<'a> {
    pub fn new(attributes: &'a AttributeTable) -> Self {
        Self { attributes }
    }

    /// Synthesize `nodes` (in insertion order, matching `graph`) and `outputs`.
    ///
    /// Fails with [`SynthError::GraphMismatch`] when `nodes` is not the
    /// sequence `graph` was built from. Nothing is returned on failure;
    /// there is no partial manifest.
    pub fn synthesize(
        &self,
        graph: &DependencyGraph,
        nodes: &[ResourceNode],
        outputs: &[OutputDeclaration],
    ) -> SynthResult<Manifest> {
        let stack = graph.stack();
        let same_nodes = nodes.len() == graph.node_count()
            && nodes.iter().zip(graph.ids()).all(|(node, id)| &node.id == id);
        if !same_nodes {
            return Err(SynthError::GraphMismatch {
                stack: stack.to_string(),
                graph_nodes: graph.node_count(),
                nodes: nodes.len(),
            });
        }

        let mut resolver = ReferenceResolver::new(stack, graph.ids(), self.attributes);

        // Nothing is emitted yet, so every reference becomes a deferred token.
        let mut pending: Vec<Option<ResourceNode>> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut node = node.clone();
            resolve_properties(&resolver, &mut node)?;
            pending.push(Some(node));
        }

        let mut remaining: Vec<usize> = (0..nodes.len())
            .map(|i| graph.dependency_indices(i).len())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..nodes.len())
            .filter(|&i| remaining[i] == 0)
            .map(Reverse)
            .collect();

        let mut positions: HashMap<LogicalId, usize> = HashMap::with_capacity(nodes.len());
        let mut resources = Vec::with_capacity(nodes.len());

        while let Some(Reverse(i)) = ready.pop() {
            let Some(node) = pending[i].take() else {
                continue;
            };

            let unresolved = node.properties.iter().any(|(_, v)| !v.is_resolved());
            if unresolved {
                return Err(stalled(stack, &pending, Some(&node.id)));
            }

            resolver.mark_emitted(&node.id);
            positions.insert(node.id.clone(), resources.len());

            for &d in graph.dependent_indices(i) {
                if let Some(dependent) = pending[d].as_mut() {
                    resolve_properties(&resolver, dependent)?;
                }
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    ready.push(Reverse(d));
                }
            }

            let mut depends_on: Vec<LogicalId> = node.explicit_depends_on.into_iter().collect();
            depends_on.sort_by_key(|id| positions.get(id).copied().unwrap_or(usize::MAX));

            debug!("Emitted {} ({}) in stack {}", node.id, node.kind, stack);
            resources.push(ManifestEntry {
                id: node.id,
                kind: node.kind,
                properties: node.properties,
                depends_on,
            });
        }

        if resources.len() < nodes.len() {
            return Err(stalled(stack, &pending, None));
        }

        let outputs = outputs
            .iter()
            .map(|output| {
                let from = format!("output {}", output.name);
                Ok(ManifestOutput {
                    name: output.name.clone(),
                    value: resolver.resolve_value(&from, output.value.clone())?,
                    description: output.description.clone(),
                    export_name: export_name(stack, &output.name),
                })
            })
            .collect::<SynthResult<Vec<_>>>()?;

        Ok(Manifest {
            stack: stack.to_string(),
            resources,
            outputs,
        })
    }
}

fn resolve_properties(resolver: &ReferenceResolver<'_>, node: &mut ResourceNode) -> SynthResult<()> {
    let from = node.id.to_string();
    for value in node.properties.values_mut() {
        let current = std::mem::replace(value, Value::null());
        *value = resolver.resolve_value(&from, current)?;
    }
    Ok(())
}

fn stalled(stack: &str, pending: &[Option<ResourceNode>], current: Option<&LogicalId>) -> SynthError {
    let mut ids: Vec<LogicalId> = current.into_iter().cloned().collect();
    ids.extend(pending.iter().flatten().map(|n| n.id.clone()));
    SynthError::SynthesisStalled {
        stack: stack.to_string(),
        pending: ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Attribute, LateBinding, Reference};

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn node(name: &str, refs: &[&str]) -> ResourceNode {
        let mut props = Properties::new();
        for (i, target) in refs.iter().enumerate() {
            props.insert(format!("Ref{}", i), Reference::new(id(target), Attribute::Ref));
        }
        ResourceNode::new(id(name), "Test::Resource", props)
    }

    fn synth(nodes: &[ResourceNode]) -> SynthResult<Manifest> {
        let table = AttributeTable::new();
        let graph = DependencyGraph::build("Data", nodes)?;
        Synthesizer::new(&table).synthesize(&graph, nodes, &[])
    }

    #[test]
    fn test_independent_nodes_keep_insertion_order() {
        let manifest = synth(&[node("C", &[]), node("A", &[]), node("B", &[])]).unwrap();
        assert_eq!(manifest.order(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_dependency_precedes_dependent() {
        let manifest = synth(&[node("Subnet", &["VPC"]), node("VPC", &[])]).unwrap();
        assert_eq!(manifest.order(), vec!["VPC", "Subnet"]);
    }

    #[test]
    fn test_tie_break_by_insertion_index() {
        // Once Root is out, both B and A are ready; B was declared first.
        let nodes = vec![node("B", &["Root"]), node("Root", &[]), node("A", &["Root"])];
        let manifest = synth(&nodes).unwrap();
        assert_eq!(manifest.order(), vec!["Root", "B", "A"]);
    }

    #[test]
    fn test_references_become_markers() {
        let manifest = synth(&[node("VPC", &[]), node("Subnet", &["VPC"])]).unwrap();
        let subnet = manifest.resource("Subnet").unwrap();
        assert_eq!(
            subnet.properties.get("Ref0"),
            Some(&Value::LateBound(LateBinding::Ref { id: id("VPC") }))
        );
    }

    #[test]
    fn test_explicit_depends_on_kept_in_emission_order() {
        let mut route = node("Route", &[]);
        route.explicit_depends_on.insert(id("Zeta"));
        route.explicit_depends_on.insert(id("Alpha"));
        let manifest = synth(&[node("Zeta", &[]), node("Alpha", &[]), route]).unwrap();

        let route = manifest.resource("Route").unwrap();
        assert_eq!(route.depends_on, vec![id("Zeta"), id("Alpha")]);
    }

    #[test]
    fn test_stall_detected_on_unchecked_cycle() {
        let nodes = vec![node("A", &["B"]), node("B", &["A"]), node("C", &[])];
        let graph = DependencyGraph::build_unchecked("Data", &nodes).unwrap();
        let table = AttributeTable::new();

        let err = Synthesizer::new(&table).synthesize(&graph, &nodes, &[]).unwrap_err();
        assert_eq!(
            err,
            SynthError::SynthesisStalled {
                stack: "Data".to_string(),
                pending: vec![id("A"), id("B")],
            }
        );
    }

    #[test]
    fn test_outputs_resolved_after_emission() {
        let nodes = vec![node("Cluster", &[])];
        let outputs = vec![OutputDeclaration {
            name: "Endpoint".to_string(),
            value: Value::Reference(Reference::new(id("Cluster"), Attribute::named("Endpoint.Address"))),
            description: Some("The database endpoint".to_string()),
        }];
        let graph = DependencyGraph::build("Data", &nodes).unwrap();
        let table = AttributeTable::new();

        let manifest = Synthesizer::new(&table).synthesize(&graph, &nodes, &outputs).unwrap();
        let output = manifest.output("Endpoint").unwrap();
        assert_eq!(output.export_name, "Data:Endpoint");
        assert!(output.value.is_late_bound());
    }

    #[test]
    fn test_output_with_unknown_reference() {
        let nodes = vec![node("Cluster", &[])];
        let outputs = vec![OutputDeclaration {
            name: "Endpoint".to_string(),
            value: Value::Reference(Reference::new(id("Nope"), Attribute::Ref)),
            description: None,
        }];
        let graph = DependencyGraph::build("Data", &nodes).unwrap();
        let table = AttributeTable::new();

        let err = Synthesizer::new(&table).synthesize(&graph, &nodes, &outputs).unwrap_err();
        assert!(matches!(err, SynthError::UnknownReference { .. }));
    }

    #[test]
    fn test_nodes_not_matching_graph_rejected() {
        let table = AttributeTable::new();
        let graph = DependencyGraph::build("Data", &[node("A", &[])]).unwrap();

        let extra = vec![node("A", &[]), node("B", &[])];
        let err = Synthesizer::new(&table).synthesize(&graph, &extra, &[]).unwrap_err();
        assert_eq!(
            err,
            SynthError::GraphMismatch {
                stack: "Data".to_string(),
                graph_nodes: 1,
                nodes: 2,
            }
        );

        let renamed = vec![node("Z", &[])];
        let err = Synthesizer::new(&table).synthesize(&graph, &renamed, &[]).unwrap_err();
        assert!(matches!(err, SynthError::GraphMismatch { .. }));
    }

    #[test]
    fn test_template_shape() {
        let mut route = node("Route", &["VPC"]);
        route.explicit_depends_on.insert(id("VPC"));
        let manifest = synth(&[node("VPC", &[]), route]).unwrap();

        let template = manifest.to_template();
        assert_eq!(template["Resources"]["VPC"]["Type"], "Test::Resource");
        assert_eq!(template["Resources"]["Route"]["Properties"]["Ref0"], serde_json::json!({ "Ref": "VPC" }));
        assert_eq!(template["Resources"]["Route"]["DependsOn"], serde_json::json!(["VPC"]));
        assert!(template.get("Outputs").is_none());
    }
}
