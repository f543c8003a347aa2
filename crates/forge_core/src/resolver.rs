//! Reference resolution.
//!
//! A reference resolves only once its target has been emitted. Until then it
//! is carried as a [`DeferredToken`]. After emission it becomes a literal when
//! the applier has reported a materialized value for the attribute, and a
//! late-binding marker otherwise.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::value::{Attribute, DeferredToken, LogicalId, Reference, Value};

type AttributeMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, serde_json::Value>>>;

/// Attribute values already materialized by an applier,
/// keyed by stack, logical id and attribute name (`Ref` for the identifier).
///
/// Attribute names are stored in the form [`Attribute::parse`] accepts, so
/// `ref` and `Ref` address the same entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttributeTable(AttributeMap);

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a materialized value.
    pub fn insert(
        &mut self,
        stack: impl Into<String>,
        id: impl Into<String>,
        attribute: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.0
            .entry(stack.into())
            .or_default()
            .entry(id.into())
            .or_default()
            .insert(Attribute::parse(&attribute.into()).as_str().to_string(), value);
    }

    pub fn lookup(&self, stack: &str, reference: &Reference) -> Option<&serde_json::Value> {
        self.0
            .get(stack)?
            .get(reference.target.as_str())?
            .get(reference.attribute.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for AttributeTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = AttributeMap::deserialize(deserializer)?;
        let mut table = AttributeTable::new();
        for (stack, resources) in raw {
            for (id, attributes) in resources {
                for (attribute, value) in attributes {
                    table.insert(stack.clone(), id.clone(), attribute, value);
                }
            }
        }
        Ok(table)
    }
}

/// Resolves references for one stack while its nodes are being emitted.
pub struct ReferenceResolver<'a> {
    stack: &'a str,
    known: HashSet<&'a LogicalId>,
    emitted: HashSet<LogicalId>,
    attributes: &'a AttributeTable,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        stack: &'a str,
        known: impl IntoIterator<Item = &'a LogicalId>,
        attributes: &'a AttributeTable,
    ) -> Self {
        Self {
            stack,
            known: known.into_iter().collect(),
            emitted: HashSet::new(),
            attributes,
        }
    }

    /// Record that `id` has been emitted; references to it now resolve.
    pub fn mark_emitted(&mut self, id: &LogicalId) {
        self.emitted.insert(id.clone());
    }

    pub fn is_emitted(&self, id: &LogicalId) -> bool {
        self.emitted.contains(id)
    }

    /// Resolve a single reference made by `from`.
    pub fn resolve_reference(&self, from: &str, reference: &Reference) -> SynthResult<Value> {
        if !self.known.contains(&reference.target) {
            return Err(SynthError::UnknownReference {
                stack: self.stack.to_string(),
                from: from.to_string(),
                target: reference.target.clone(),
            });
        }

        if !self.is_emitted(&reference.target) {
            return Ok(Value::Deferred(DeferredToken {
                reference: reference.clone(),
            }));
        }

        match self.attributes.lookup(self.stack, reference) {
            Some(value) => {
                debug!("Resolved {} to materialized value", reference);
                Ok(Value::Literal(value.clone()))
            }
            None => Ok(Value::LateBound(reference.late_binding())),
        }
    }

    /// Resolve every reference and deferred token inside `value` whose target
    /// has been emitted, folding joins that became fully literal.
    pub fn resolve_value(&self, from: &str, value: Value) -> SynthResult<Value> {
        let resolved = match value {
            Value::Reference(r) => self.resolve_reference(from, &r)?,
            Value::Deferred(token) => self.resolve_reference(from, &token.reference)?,
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.resolve_value(from, item))
                    .collect::<SynthResult<Vec<_>>>()?,
            ),
            Value::Map(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, self.resolve_value(from, v)?)))
                    .collect::<SynthResult<BTreeMap<_, _>>>()?,
            ),
            Value::Join { delimiter, parts } => Value::Join {
                delimiter,
                parts: parts
                    .into_iter()
                    .map(|part| self.resolve_value(from, part))
                    .collect::<SynthResult<Vec<_>>>()?,
            },
            other => other,
        };
        Ok(resolved.fold())
    }
}
