//! JSON schema documents → [`SchemaMap`].
//!
//! ```json
//! {
//!   "instances": { "MyEnum": { "$values": { "A": "a", "B": "b" } } },
//!   "schemas": {
//!     "SubType": { "aNumber": { "type": "Number", "min": 12 } },
//!     "Foo": {
//!       "sub": { "$ref": "SubType" },
//!       "flags": "Array",
//!       "flags.$": "Boolean",
//!       "kind": { "type": { "$ref": "MyEnum" }, "optional": true }
//!     },
//!     "Alias": { "$ref": "SubType" }
//!   }
//! }
//! ```
//!
//! `$ref` names a registry entry first, then a document instance; both share
//! identity with their target. `$schema` and `$values` create a fresh anonymous
//! instance at every occurrence.
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{DocumentError, RegistryError};
use crate::model::{
    EnumValue, FieldRule, Instance, InstanceId, RuleMetadata, ScalarKind, SchemaDefinition,
    SchemaMap, TypeCandidate,
};
use crate::options::GenerateOptions;

const REF_KEY: &str = "$ref";
const SCHEMA_KEY: &str = "$schema";
const VALUES_KEY: &str = "$values";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    instances: IndexMap<String, Value>,
    #[serde(default)]
    schemas: IndexMap<String, Value>,
}

/// Accumulates one registry from any number of documents. Later documents may
/// refer to names defined by earlier ones. A document that fails to load leaves
/// no names behind.
pub struct DocumentLoader<'o> {
    options: &'o GenerateOptions,
    map: SchemaMap,
    instances: IndexMap<String, InstanceId>,
    staged_schemas: IndexMap<String, InstanceId>,
    staged_instances: IndexMap<String, InstanceId>,
}

impl<'o> DocumentLoader<'o> {
    pub fn new(options: &'o GenerateOptions) -> Self {
        Self {
            options,
            map: SchemaMap::new(),
            instances: IndexMap::new(),
            staged_schemas: IndexMap::new(),
            staged_instances: IndexMap::new(),
        }
    }

    pub fn load_str(&mut self, src: &str) -> Result<(), DocumentError> {
        let raw: RawDocument = crate::path_de::from_str_with_path(src)?;
        self.load_raw(raw)
    }

    pub fn load_value(&mut self, value: Value) -> Result<(), DocumentError> {
        let raw: RawDocument = crate::path_de::from_value_with_path(value)?;
        self.load_raw(raw)
    }

    pub fn finish(self) -> SchemaMap {
        self.map
    }

    fn load_raw(&mut self, raw: RawDocument) -> Result<(), DocumentError> {
        self.options.validate()?;
        let staged = self.stage(raw);
        let schemas = std::mem::take(&mut self.staged_schemas);
        let instances = std::mem::take(&mut self.staged_instances);
        staged?;

        // names become visible only once every body is defined
        self.instances.extend(instances);
        for (name, id) in schemas {
            self.map.bind(name, id)?;
        }
        tracing::debug!(entries = self.map.len(), "schema document loaded");
        Ok(())
    }

    fn stage(&mut self, raw: RawDocument) -> Result<(), DocumentError> {
        // 1) ids first, so bodies can refer to anything in the document (or to themselves)
        let mut pending: Vec<(String, InstanceId, Value)> = Vec::new();
        for (name, body) in raw.instances {
            if self.instances.contains_key(&name) {
                return Err(DocumentError::Invalid {
                    at: format!("instances.{name}"),
                    message: "instance name is defined twice".to_owned(),
                });
            }
            let id = self.map.reserve();
            self.staged_instances.insert(name.clone(), id);
            pending.push((format!("instances.{name}"), id, body));
        }

        let mut bodies: IndexMap<String, InstanceId> = IndexMap::new();
        for (name, body) in &raw.schemas {
            if self.map.get(name).is_some() {
                return Err(RegistryError::DuplicateTypeName { name: name.clone() }.into());
            }
            if ref_target(body).is_none() {
                bodies.insert(name.clone(), self.map.reserve());
            }
        }

        // 2) stage registry names in document order
        for (name, body) in raw.schemas {
            let at = format!("schemas.{name}");
            match ref_target(&body) {
                Some(target) => {
                    let id = bodies
                        .get(target)
                        .copied()
                        .or_else(|| self.lookup(target))
                        .ok_or_else(|| DocumentError::UnknownRef { at: at.clone(), name: target.to_owned() })?;
                    tracing::debug!(name = %name, to = target, "registry alias");
                    self.staged_schemas.insert(name, id);
                }
                None => {
                    let id = bodies[&name];
                    self.staged_schemas.insert(name, id);
                    pending.push((at, id, body));
                }
            }
        }

        // 3) bodies
        for (at, id, body) in pending {
            let instance = self.instance(&at, &body)?;
            self.map.define(id, instance)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<InstanceId> {
        self.map
            .get(name)
            .or_else(|| self.staged_schemas.get(name).copied())
            .or_else(|| self.instances.get(name).copied())
            .or_else(|| self.staged_instances.get(name).copied())
    }

    /// A top-level body: `$values`, `$schema` or a bare field map.
    fn instance(&mut self, at: &str, value: &Value) -> Result<Instance, DocumentError> {
        let obj = value.as_object().ok_or_else(|| invalid(at, "expected an object"))?;
        if let Some(values) = obj.get(VALUES_KEY) {
            sole_key(at, obj, VALUES_KEY)?;
            return Ok(Instance::Values(enum_values(at, values)?));
        }
        if let Some(body) = obj.get(SCHEMA_KEY) {
            sole_key(at, obj, SCHEMA_KEY)?;
            let body = body.as_object().ok_or_else(|| invalid(at, "`$schema` must be an object"))?;
            return Ok(Instance::Schema(self.definition(at, body)?));
        }
        Ok(Instance::Schema(self.definition(at, obj)?))
    }

    fn definition(&mut self, at: &str, body: &Map<String, Value>) -> Result<SchemaDefinition, DocumentError> {
        let mut definition = SchemaDefinition::new();
        for (path, rule) in body {
            let rule = self.rule(&format!("{at}.{path}"), rule)?;
            definition.insert(path.clone(), rule);
        }
        Ok(definition)
    }

    /// Either a full rule object (`{ "type": ..., "optional": ... }`) or a bare
    /// type spec.
    fn rule(&mut self, at: &str, value: &Value) -> Result<FieldRule, DocumentError> {
        let Some(obj) = value.as_object().filter(|o| is_full_rule(o)) else {
            return Ok(FieldRule::one_of(self.candidates(at, value)?)?);
        };

        let ty = obj.get("type").ok_or_else(|| invalid(at, "a rule needs a `type`"))?;
        let mut rule = FieldRule::one_of(self.candidates(&format!("{at}.type"), ty)?)?;
        let mut metadata = RuleMetadata::default();

        for (key, v) in obj {
            match key.as_str() {
                k if k == self.options.override_key_name => {
                    let name = v
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| invalid(at, &format!("`{k}` must be a non-empty string")))?;
                    rule = rule.named(name);
                }
                "type" => {}
                "optional" => {
                    let optional = v.as_bool().ok_or_else(|| invalid(at, "`optional` must be a boolean"))?;
                    rule = rule.optional(optional);
                }
                "min" => metadata.min = Some(number(at, key, v)?),
                "max" => metadata.max = Some(number(at, key, v)?),
                "regex" => {
                    let pattern = v.as_str().ok_or_else(|| invalid(at, "`regex` must be a string"))?;
                    regex::Regex::new(pattern).map_err(|e| invalid(at, &format!("bad `regex`: {e}")))?;
                    metadata.regex = Some(pattern.to_owned());
                }
                "label" => {
                    metadata.label = Some(v.as_str().ok_or_else(|| invalid(at, "`label` must be a string"))?.to_owned());
                }
                "defaultValue" => metadata.default_value = Some(v.clone()),
                other => tracing::trace!(at, key = other, "ignoring rule attribute"),
            }
        }
        Ok(rule.with_metadata(metadata))
    }

    fn candidates(&mut self, at: &str, spec: &Value) -> Result<Vec<TypeCandidate>, DocumentError> {
        match spec {
            Value::String(kind) => Ok(vec![kind_candidate(at, kind)?]),
            Value::Array(alternatives) => {
                if alternatives.is_empty() {
                    return Err(DocumentError::EmptyAlternation { at: at.to_owned() });
                }
                let mut out = Vec::with_capacity(alternatives.len());
                for (i, alternative) in alternatives.iter().enumerate() {
                    out.extend(self.candidates(&format!("{at}[{i}]"), alternative)?);
                }
                Ok(out)
            }
            Value::Object(obj) => {
                if let Some(target) = obj.get(REF_KEY) {
                    sole_key(at, obj, REF_KEY)?;
                    let target = target.as_str().ok_or_else(|| invalid(at, "`$ref` must be a string"))?;
                    let id = self
                        .lookup(target)
                        .ok_or_else(|| DocumentError::UnknownRef { at: at.to_owned(), name: target.to_owned() })?;
                    return Ok(vec![TypeCandidate::SchemaInstance(id)]);
                }
                if obj.contains_key(SCHEMA_KEY) || obj.contains_key(VALUES_KEY) {
                    let instance = self.instance(at, spec)?;
                    return Ok(vec![TypeCandidate::SchemaInstance(self.map.add_instance(instance))]);
                }
                Err(invalid(at, "expected `$ref`, `$schema` or `$values`"))
            }
            _ => Err(invalid(at, "expected a type name, an alternation or an object")),
        }
    }
}

/// Load one document with default accumulation.
pub fn load_str(src: &str, options: &GenerateOptions) -> Result<SchemaMap, DocumentError> {
    let mut loader = DocumentLoader::new(options);
    loader.load_str(src)?;
    Ok(loader.finish())
}

/// Narrow a document to the node at `pointer` (RFC 6901).
pub fn select(mut value: Value, pointer: &str) -> Result<Value, DocumentError> {
    value
        .pointer_mut(pointer)
        .map(Value::take)
        .ok_or_else(|| DocumentError::Pointer(pointer.to_owned()))
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn ref_target(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(REF_KEY)?.as_str()
}

/// `$ref`, `$schema` and `$values` objects carry nothing else; rule attributes
/// belong in a full rule around them.
fn sole_key(at: &str, obj: &Map<String, Value>, key: &str) -> Result<(), DocumentError> {
    match obj.keys().find(|k| k.as_str() != key) {
        None => Ok(()),
        Some(other) => Err(invalid(
            at,
            &format!("`{other}` cannot sit next to `{key}`; write `{{ \"type\": {{ \"{key}\": ... }}, \"{other}\": ... }}`"),
        )),
    }
}

fn is_full_rule(obj: &Map<String, Value>) -> bool {
    !obj.contains_key(REF_KEY) && !obj.contains_key(SCHEMA_KEY) && !obj.contains_key(VALUES_KEY)
}

fn kind_candidate(at: &str, kind: &str) -> Result<TypeCandidate, DocumentError> {
    let candidate = match kind {
        "Number" => TypeCandidate::Scalar(ScalarKind::Number),
        "Integer" => TypeCandidate::Scalar(ScalarKind::Integer),
        "String" => TypeCandidate::Scalar(ScalarKind::Text),
        "Boolean" => TypeCandidate::Scalar(ScalarKind::Boolean),
        "Date" => TypeCandidate::Scalar(ScalarKind::DateTime),
        "Array" => TypeCandidate::ArrayMarker,
        "Object" => TypeCandidate::ObjectMarker,
        other => {
            return Err(DocumentError::UnknownKind { at: at.to_owned(), name: other.to_owned() });
        }
    };
    Ok(candidate)
}

fn enum_values(at: &str, values: &Value) -> Result<Vec<EnumValue>, DocumentError> {
    match values {
        Value::Array(xs) => Ok(xs.iter().cloned().map(EnumValue::from_json).collect()),
        // an enum object: its values in declaration order
        Value::Object(m) => Ok(m.values().cloned().map(EnumValue::from_json).collect()),
        _ => Err(invalid(at, "`$values` must be an array or an object")),
    }
}

fn number(at: &str, key: &str, v: &Value) -> Result<f64, DocumentError> {
    v.as_f64().ok_or_else(|| invalid(at, &format!("`{key}` must be a number")))
}

fn invalid(at: &str, message: &str) -> DocumentError {
    DocumentError::Invalid { at: at.to_owned(), message: message.to_owned() }
}
