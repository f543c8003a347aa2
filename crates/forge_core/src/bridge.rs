//! Cross-stack output bridge.
//!
//! The export table is append-only: producers publish their outputs once,
//! after synthesis, and consumers only read. Build order is the only
//! synchronization the table needs.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::stack::{Stack, StackState};
use crate::value::{LateBinding, Value};

/// Names one output of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportHandle {
    stack: String,
    output: String,
}

impl ExportHandle {
    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

/// A published output as seen by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossStackExport {
    pub source_stack: String,
    pub output_name: String,
    pub export_name: String,
    /// Literal, or carrying late-binding markers of the source stack.
    pub value: Value,
}

impl CrossStackExport {
    /// The value as a consumer stack sees it. A value that is not fully
    /// literal becomes an import marker, since the source stack's own
    /// markers mean nothing inside another stack.
    pub fn consumer_value(&self) -> Value {
        if self.value.is_resolved() && !self.value.is_late_bound() {
            self.value.clone()
        } else {
            Value::LateBound(LateBinding::Import {
                export_name: self.export_name.clone(),
            })
        }
    }
}

/// Export table shared between stacks.
#[derive(Debug, Default)]
pub struct Bridge {
    exports: IndexMap<(String, String), CrossStackExport>,
    published: IndexSet<String>,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish every output of a synthesized stack and mark it exported.
    pub fn publish(&mut self, stack: &mut Stack) -> SynthResult<usize> {
        if self.published.contains(stack.name()) {
            return Err(SynthError::DuplicateStack(stack.name().to_string()));
        }
        if stack.state() != StackState::Synthesized {
            return Err(SynthError::StackNotSynthesized(stack.name().to_string()));
        }

        let manifest = stack
            .manifest()
            .ok_or_else(|| SynthError::StackNotSynthesized(stack.name().to_string()))?;

        let mut count = 0;
        for output in &manifest.outputs {
            debug!("Publishing export {}", output.export_name);
            self.exports.insert(
                (manifest.stack.clone(), output.name.clone()),
                CrossStackExport {
                    source_stack: manifest.stack.clone(),
                    output_name: output.name.clone(),
                    export_name: output.export_name.clone(),
                    value: output.value.clone(),
                },
            );
            count += 1;
        }

        self.published.insert(stack.name().to_string());
        stack.mark_exported()?;
        Ok(count)
    }

    /// Name an output of `stack`. The handle is only checked when consumed.
    pub fn export(&self, stack: &str, output: &str) -> ExportHandle {
        ExportHandle {
            stack: stack.to_string(),
            output: output.to_string(),
        }
    }

    /// Consume an export.
    pub fn import(&self, handle: &ExportHandle) -> SynthResult<Value> {
        if !self.is_published(&handle.stack) {
            return Err(SynthError::UnresolvedExport {
                stack: handle.stack.clone(),
                output: handle.output.clone(),
            });
        }

        let export = self.get(handle).ok_or_else(|| SynthError::UnknownExport {
            stack: handle.stack.clone(),
            output: handle.output.clone(),
        })?;

        debug!("Importing {}", export.export_name);
        Ok(export.consumer_value())
    }

    pub fn get(&self, handle: &ExportHandle) -> Option<&CrossStackExport> {
        self.exports.get(&(handle.stack.clone(), handle.output.clone()))
    }

    pub fn is_published(&self, stack: &str) -> bool {
        self.published.contains(stack)
    }

    /// All exports, in publication order.
    pub fn exports(&self) -> impl Iterator<Item = &CrossStackExport> {
        self.exports.values()
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AttributeTable;
    use crate::value::Properties;

    fn data_stack() -> Stack {
        let mut stack = Stack::new("Data").unwrap();
        let cluster = stack.declare("Cluster", "AWS::RDS::DBCluster", Properties::new()).unwrap();
        stack.output("Endpoint", cluster.attr("Endpoint.Address")).unwrap();
        stack.output("Engine", "aurora-mysql").unwrap();
        stack
    }

    #[test]
    fn test_import_before_publish_fails() {
        let bridge = Bridge::new();
        let handle = bridge.export("Data", "Endpoint");
        assert_eq!(
            bridge.import(&handle).unwrap_err(),
            SynthError::UnresolvedExport {
                stack: "Data".to_string(),
                output: "Endpoint".to_string(),
            }
        );
    }

    #[test]
    fn test_publish_requires_synthesis() {
        let mut bridge = Bridge::new();
        let mut stack = data_stack();
        assert!(matches!(
            bridge.publish(&mut stack),
            Err(SynthError::StackNotSynthesized(_))
        ));
    }

    #[test]
    fn test_publish_and_import() {
        let mut bridge = Bridge::new();
        let mut stack = data_stack();
        stack.synthesize(&AttributeTable::new()).unwrap();

        assert_eq!(bridge.publish(&mut stack).unwrap(), 2);
        assert_eq!(stack.state(), StackState::Exported);

        let endpoint = bridge.import(&bridge.export("Data", "Endpoint")).unwrap();
        assert_eq!(
            endpoint,
            Value::LateBound(LateBinding::Import {
                export_name: "Data:Endpoint".to_string(),
            })
        );

        let engine = bridge.import(&bridge.export("Data", "Engine")).unwrap();
        assert_eq!(engine.as_str(), Some("aurora-mysql"));
    }

    #[test]
    fn test_materialized_export_imports_as_literal() {
        let mut attributes = AttributeTable::new();
        attributes.insert("Data", "Cluster", "Endpoint.Address", serde_json::json!("db.example.internal"));

        let mut bridge = Bridge::new();
        let mut stack = data_stack();
        stack.synthesize(&attributes).unwrap();
        bridge.publish(&mut stack).unwrap();

        let endpoint = bridge.import(&bridge.export("Data", "Endpoint")).unwrap();
        assert_eq!(endpoint.as_str(), Some("db.example.internal"));
    }

    #[test]
    fn test_unknown_export() {
        let mut bridge = Bridge::new();
        let mut stack = data_stack();
        stack.synthesize(&AttributeTable::new()).unwrap();
        bridge.publish(&mut stack).unwrap();

        let err = bridge.import(&bridge.export("Data", "Missing")).unwrap_err();
        assert!(matches!(err, SynthError::UnknownExport { .. }));
    }

    #[test]
    fn test_publish_twice_rejected() {
        let mut bridge = Bridge::new();
        let mut stack = data_stack();
        stack.synthesize(&AttributeTable::new()).unwrap();
        bridge.publish(&mut stack).unwrap();

        assert!(matches!(
            bridge.publish(&mut stack),
            Err(SynthError::DuplicateStack(_))
        ));
    }
}
