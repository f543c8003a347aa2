//! Declared resources.

use std::collections::BTreeSet;

use crate::value::{Attribute, LogicalId, Properties, Reference, Value};

/// One declared infrastructure resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub id: LogicalId,
    /// Provider type name, e.g. `AWS::EC2::VPC`.
    pub kind: String,
    pub properties: Properties,
    /// Ordering hints that no property reference expresses.
    pub explicit_depends_on: BTreeSet<LogicalId>,
}

impl ResourceNode {
    pub fn new(id: LogicalId, kind: impl Into<String>, properties: Properties) -> Self {
        Self {
            id,
            kind: kind.into(),
            properties,
            explicit_depends_on: BTreeSet::new(),
        }
    }

    /// Logical ids referenced anywhere in the property bag, deduplicated.
    pub fn referenced_ids(&self) -> BTreeSet<&LogicalId> {
        let mut refs = Vec::new();
        self.properties.collect_references(&mut refs);
        refs.into_iter().map(|r| &r.target).collect()
    }

    /// Handle for building references to this node.
    pub fn handle(&self) -> Resource {
        Resource {
            id: self.id.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// Lightweight handle returned by `Stack::declare`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    id: LogicalId,
    kind: String,
}

impl Resource {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The provider-assigned identifier of this resource.
    pub fn reference(&self) -> Value {
        Value::Reference(Reference::new(self.id.clone(), Attribute::Ref))
    }

    /// A provider-computed attribute of this resource.
    pub fn attr(&self, name: impl Into<String>) -> Value {
        Value::Reference(Reference::new(self.id.clone(), Attribute::named(name)))
    }
}
