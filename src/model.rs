//! Schema registry data model.
//!
//! A [`SchemaMap`] owns every schema instance in an arena. The arena index of an
//! instance ([`InstanceId`]) is its identity: two structurally equal definitions
//! stored at different indices are different types, and the reference matcher
//! only ever compares ids.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

// ————————————————————————————————————————————————————————————————————————————
// SCALARS & LITERALS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalarKind {
    Number,
    Integer,
    Text,
    Boolean,
    DateTime,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 5] = [
        ScalarKind::Number,
        ScalarKind::Integer,
        ScalarKind::Text,
        ScalarKind::Boolean,
        ScalarKind::DateTime,
    ];
}

/// A scalar literal held by an enumerable value holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    Text(String),
}

impl LiteralValue {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(LiteralValue::Null),
            Value::Bool(b) => Some(LiteralValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| LiteralValue::Number(OrderedFloat(f))),
            Value::String(s) => Some(LiteralValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for LiteralValue {
    /// JSON literal syntax, integral numbers without a fraction.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => f.write_str("null"),
            LiteralValue::Bool(b) => write!(f, "{b}"),
            LiteralValue::Number(n) => {
                let n = n.0;
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    write!(f, "{}", n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            LiteralValue::Text(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
        }
    }
}

/// One enumerable value exposed by a [`Instance::Values`] holder.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    Literal(LiteralValue),
    Structured(serde_json::Value),
}

impl EnumValue {
    pub fn from_json(value: serde_json::Value) -> Self {
        match LiteralValue::from_json(&value) {
            Some(literal) => EnumValue::Literal(literal),
            None => EnumValue::Structured(value),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD RULES
// ————————————————————————————————————————————————————————————————————————————

/// Identity token of an instance stored in a [`SchemaMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCandidate {
    Scalar(ScalarKind),
    ArrayMarker,
    /// Opaque object; sub-fields, if any, are declared under the field's own path.
    ObjectMarker,
    SchemaInstance(InstanceId),
}

/// Whether a field may be omitted.
///
/// A predicate is called once per generation with no record at hand, so any
/// record-dependent logic it encodes collapses to a single static answer.
#[derive(Clone)]
pub enum Optionality {
    Constant(bool),
    Predicate(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Optionality {
    pub fn evaluate(&self) -> bool {
        match self {
            Optionality::Constant(b) => *b,
            Optionality::Predicate(f) => f(),
        }
    }
}

impl Default for Optionality {
    fn default() -> Self {
        Optionality::Constant(false)
    }
}

impl fmt::Debug for Optionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Optionality::Constant(b) => f.debug_tuple("Constant").field(b).finish(),
            Optionality::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Constraints carried along with a rule. None of them affect the generated types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMetadata {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub regex: Option<String>,
    pub label: Option<String>,
    pub default_value: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    candidates: Vec<TypeCandidate>,
    pub explicit_name: Option<String>,
    pub optionality: Optionality,
    pub metadata: RuleMetadata,
}

impl FieldRule {
    pub fn new(candidate: TypeCandidate) -> Self {
        Self {
            candidates: vec![candidate],
            explicit_name: None,
            optionality: Optionality::default(),
            metadata: RuleMetadata::default(),
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(TypeCandidate::Scalar(kind))
    }

    pub fn instance(id: InstanceId) -> Self {
        Self::new(TypeCandidate::SchemaInstance(id))
    }

    /// Alternation over several candidate shapes ("one of").
    pub fn one_of(candidates: Vec<TypeCandidate>) -> Result<Self, RegistryError> {
        if candidates.is_empty() {
            return Err(RegistryError::EmptyAlternation);
        }
        Ok(Self { candidates, ..Self::new(TypeCandidate::ObjectMarker) })
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optionality = Optionality::Constant(optional);
        self
    }

    pub fn optional_when(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.optionality = Optionality::Predicate(Arc::new(predicate));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.explicit_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: RuleMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Never empty.
    pub fn candidates(&self) -> &[TypeCandidate] {
        &self.candidates
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DEFINITIONS & INSTANCES
// ————————————————————————————————————————————————————————————————————————————

/// Ordered field path → rule mapping of one schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    fields: IndexMap<String, FieldRule>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, path: impl Into<String>, rule: FieldRule) -> Self {
        self.insert(path, rule);
        self
    }

    /// Re-inserting an existing path replaces its rule but keeps its position.
    pub fn insert(&mut self, path: impl Into<String>, rule: FieldRule) {
        self.fields.insert(path.into(), rule);
    }

    pub fn get(&self, path: &str) -> Option<&FieldRule> {
        self.fields.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Immediate child segments declared under `prefix` (`""` for top level),
    /// in first-declaration order. The wildcard segment is never a child.
    pub fn child_keys<'a>(&'a self, prefix: &str, wildcard: &str) -> Vec<&'a str> {
        let mut out: Vec<&str> = Vec::new();
        for path in self.fields.keys() {
            let rest = if prefix.is_empty() {
                path.as_str()
            } else {
                match path.strip_prefix(prefix).and_then(|r| r.strip_prefix('.')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            let segment = rest.split('.').next().unwrap_or(rest);
            if segment.is_empty() || segment == wildcard || out.contains(&segment) {
                continue;
            }
            out.push(segment);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum Instance {
    Schema(SchemaDefinition),
    /// A holder that only exposes enumerable values (e.g. an external enum).
    Values(Vec<EnumValue>),
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

/// Ordered type name → instance registry, plus the arena owning every
/// instance, named or anonymous.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    arena: Vec<Instance>,
    entries: IndexMap<String, InstanceId>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance without naming it.
    pub fn add_instance(&mut self, instance: Instance) -> InstanceId {
        self.arena.push(instance);
        InstanceId(self.arena.len() - 1)
    }

    /// Allocate an id before its body exists, so a definition can refer to itself.
    pub fn reserve(&mut self) -> InstanceId {
        self.add_instance(Instance::Schema(SchemaDefinition::new()))
    }

    pub fn define(&mut self, id: InstanceId, instance: Instance) -> Result<(), RegistryError> {
        let slot = self
            .arena
            .get_mut(id.0)
            .ok_or(RegistryError::UnknownInstance { id })?;
        *slot = instance;
        Ok(())
    }

    /// Bind `name` to an already stored instance.
    pub fn bind(&mut self, name: impl Into<String>, id: InstanceId) -> Result<(), RegistryError> {
        let name = name.into();
        if id.0 >= self.arena.len() {
            return Err(RegistryError::UnknownInstance { id });
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateTypeName { name });
        }
        self.entries.insert(name, id);
        Ok(())
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        instance: Instance,
    ) -> Result<InstanceId, RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateTypeName { name });
        }
        let id = self.add_instance(instance);
        self.bind(name, id)?;
        Ok(id)
    }

    pub fn register_schema(
        &mut self,
        name: impl Into<String>,
        definition: SchemaDefinition,
    ) -> Result<InstanceId, RegistryError> {
        self.register(name, Instance::Schema(definition))
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.arena.get(id.0)
    }

    pub fn get(&self, name: &str) -> Option<InstanceId> {
        self.entries.get(name).copied()
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, InstanceId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name groups bound to one shared instance, in registry order.
    pub fn aliases(&self) -> Vec<Vec<&str>> {
        let mut groups: IndexMap<InstanceId, Vec<&str>> = IndexMap::new();
        for (name, id) in self.entries() {
            groups.entry(id).or_default().push(name);
        }
        groups.into_values().filter(|names| names.len() > 1).collect()
    }
}
