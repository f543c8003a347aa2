//! Property values, references and late-binding markers.
//!
//! A property bag is a tree of [`Value`]s. Literals are stored as plain JSON;
//! everything that points at another resource is a tagged variant so that
//! the resolver can find and replace it by pattern matching.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SynthError, SynthResult};

/// Stable identifier of a resource, unique within its stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Create a logical id, rejecting anything that is not ASCII alphanumeric.
    pub fn new(id: impl Into<String>) -> SynthResult<Self> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SynthError::InvalidLogicalId(id));
        }
        Ok(Self(id))
    }

    #[cfg(test)]
    pub(crate) fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which attribute of a resource a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    /// The identifier the provider assigns to the resource.
    Ref,
    /// A provider-computed attribute such as `Endpoint.Address`.
    Named(String),
}

impl Attribute {
    pub fn named(name: impl Into<String>) -> Self {
        Attribute::Named(name.into())
    }

    /// Parse the textual form used in attribute files; `Ref` maps to [`Attribute::Ref`].
    pub fn parse(s: &str) -> Self {
        match s {
            "Ref" | "ref" => Attribute::Ref,
            other => Attribute::Named(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Attribute::Ref => "Ref",
            Attribute::Named(name) => name,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pointer from a property to an attribute of another resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub target: LogicalId,
    pub attribute: Attribute,
}

impl Reference {
    pub fn new(target: LogicalId, attribute: Attribute) -> Self {
        Self { target, attribute }
    }

    /// The marker an applier evaluates to obtain this value.
    pub fn late_binding(&self) -> LateBinding {
        match &self.attribute {
            Attribute::Ref => LateBinding::Ref {
                id: self.target.clone(),
            },
            Attribute::Named(name) => LateBinding::GetAtt {
                id: self.target.clone(),
                attribute: name.clone(),
            },
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// A reference whose target has not been emitted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredToken {
    pub reference: Reference,
}

/// Marker for a value that only exists once the applier has materialized
/// the resource it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LateBinding {
    Ref { id: LogicalId },
    GetAtt { id: LogicalId, attribute: String },
    Import { export_name: String },
}

impl LateBinding {
    /// Template intrinsic for this marker.
    pub fn to_template(&self) -> serde_json::Value {
        match self {
            LateBinding::Ref { id } => serde_json::json!({ "Ref": id.as_str() }),
            LateBinding::GetAtt { id, attribute } => {
                serde_json::json!({ "Fn::GetAtt": [id.as_str(), attribute] })
            }
            LateBinding::Import { export_name } => {
                serde_json::json!({ "Fn::ImportValue": export_name })
            }
        }
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Reference-free JSON.
    Literal(serde_json::Value),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// String concatenation; folds into a literal once every part is literal.
    Join { delimiter: String, parts: Vec<Value> },
    Reference(Reference),
    Deferred(DeferredToken),
    LateBound(LateBinding),
}

impl Value {
    pub fn null() -> Self {
        Value::Literal(serde_json::Value::Null)
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::Join {
            delimiter: delimiter.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
        .fold()
    }

    /// Literal JSON, if this value is fully known.
    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_literal().and_then(|v| v.as_str())
    }

    /// Collect every reference embedded in this value, depth first.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Value::Reference(r) => out.push(r),
            Value::Deferred(token) => out.push(&token.reference),
            Value::List(items) | Value::Join { parts: items, .. } => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Value::Map(map) => {
                for value in map.values() {
                    value.collect_references(out);
                }
            }
            Value::Literal(_) | Value::LateBound(_) => {}
        }
    }

    /// True when no reference or deferred token remains.
    pub fn is_resolved(&self) -> bool {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs.is_empty()
    }

    /// True when the value contains a late-binding marker anywhere.
    pub fn is_late_bound(&self) -> bool {
        match self {
            Value::LateBound(_) => true,
            Value::List(items) | Value::Join { parts: items, .. } => {
                items.iter().any(Value::is_late_bound)
            }
            Value::Map(map) => map.values().any(Value::is_late_bound),
            Value::Literal(_) | Value::Reference(_) | Value::Deferred(_) => false,
        }
    }

    /// Collapse a join whose parts are all scalar literals into a string.
    pub(crate) fn fold(self) -> Self {
        match self {
            Value::Join { delimiter, parts } => {
                let parts: Vec<Value> = parts.into_iter().map(Value::fold).collect();
                let scalars: Option<Vec<String>> = parts.iter().map(scalar_text).collect();
                match scalars {
                    Some(texts) => Value::Literal(serde_json::Value::String(texts.join(&delimiter))),
                    None => Value::Join { delimiter, parts },
                }
            }
            Value::List(items) => Value::List(items.into_iter().map(Value::fold).collect()),
            Value::Map(map) => Value::Map(map.into_iter().map(|(k, v)| (k, v.fold())).collect()),
            other => other,
        }
    }

    /// Render as template JSON, using intrinsics for anything not yet known.
    pub fn to_template(&self) -> serde_json::Value {
        match self {
            Value::Literal(v) => v.clone(),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_template).collect()),
            Value::Map(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), value.to_template());
                }
                serde_json::Value::Object(object)
            }
            Value::Join { delimiter, parts } => {
                let parts: Vec<serde_json::Value> = parts.iter().map(Value::to_template).collect();
                serde_json::json!({ "Fn::Join": [delimiter, parts] })
            }
            Value::Reference(r) => r.late_binding().to_template(),
            Value::Deferred(token) => token.reference.late_binding().to_template(),
            Value::LateBound(marker) => marker.to_template(),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Literal(serde_json::Value::String(s)) => Some(s.clone()),
        Value::Literal(serde_json::Value::Number(n)) => Some(n.to_string()),
        Value::Literal(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(serde_json::Value::String(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::from(s.as_str())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Literal(serde_json::Value::Bool(b))
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Literal(serde_json::Value::from(n))
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u16, u32, u64);

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl From<LateBinding> for Value {
    fn from(marker: LateBinding) -> Self {
        Value::LateBound(marker)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::Map(props.0)
    }
}

/// Key-sorted property bag of a resource, or a nested object inside one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.0.values_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        for value in self.0.values() {
            value.collect_references(out);
        }
    }

    pub fn to_template(&self) -> serde_json::Value {
        Value::Map(self.0.clone()).to_template()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_address() -> Reference {
        Reference::new(
            LogicalId::new("DatabaseCluster").unwrap(),
            Attribute::named("Endpoint.Address"),
        )
    }

    #[test]
    fn test_logical_id_validation() {
        assert!(LogicalId::new("PublicSubnet1").is_ok());
        assert!(LogicalId::new("").is_err());
        assert!(LogicalId::new("public-subnet").is_err());
        assert!(LogicalId::new("Vpc 1").is_err());
    }

    #[test]
    fn test_attribute_parse() {
        assert_eq!(Attribute::parse("Ref"), Attribute::Ref);
        assert_eq!(Attribute::parse("ref"), Attribute::Ref);
        assert_eq!(Attribute::parse("DNSName"), Attribute::named("DNSName"));
    }

    #[test]
    fn test_collect_references_in_nested_values() {
        let vpc = Reference::new(LogicalId::new("VPC").unwrap(), Attribute::Ref);
        let props = Properties::new()
            .with("VpcId", vpc.clone())
            .with("CidrBlock", "10.0.0.0/16")
            .with(
                "Rules",
                Value::list(vec![Value::from(
                    Properties::new().with("Target", cluster_address()),
                )]),
            );

        let mut refs = Vec::new();
        props.collect_references(&mut refs);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&&vpc));
        assert!(refs.contains(&&cluster_address()));
    }

    #[test]
    fn test_join_folds_literals() {
        let value = Value::join("", vec![Value::from("http://"), Value::from("lb.example.com")]);
        assert_eq!(value.as_str(), Some("http://lb.example.com"));

        let value = Value::join(":", vec![Value::from("port"), Value::from(3306u16)]);
        assert_eq!(value.as_str(), Some("port:3306"));
    }

    #[test]
    fn test_join_with_reference_stays_join() {
        let value = Value::join("", vec![Value::from("http://"), Value::from(cluster_address())]);
        assert!(matches!(value, Value::Join { .. }));
        assert!(!value.is_resolved());
    }

    #[test]
    fn test_template_markers() {
        assert_eq!(
            Value::from(cluster_address()).to_template(),
            serde_json::json!({ "Fn::GetAtt": ["DatabaseCluster", "Endpoint.Address"] })
        );

        let vpc = Reference::new(LogicalId::new("VPC").unwrap(), Attribute::Ref);
        assert_eq!(Value::from(vpc).to_template(), serde_json::json!({ "Ref": "VPC" }));

        let import = LateBinding::Import {
            export_name: "DatabaseStack:DatabaseEndpoint".to_string(),
        };
        assert_eq!(
            Value::from(import).to_template(),
            serde_json::json!({ "Fn::ImportValue": "DatabaseStack:DatabaseEndpoint" })
        );
    }

    #[test]
    fn test_late_bound_detection() {
        let value = Value::list(vec![
            Value::from("a"),
            Value::LateBound(cluster_address().late_binding()),
        ]);
        assert!(value.is_late_bound());
        assert!(value.is_resolved());
        assert!(!Value::from("a").is_late_bound());
    }
}
