//! Generation options. Every field has a default, so an options file only
//! needs to name what it changes.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::model::ScalarKind;

/// Highest accepted `max_depth`. Generation sizes its worker stacks for it.
pub const MAX_DEPTH_LIMIT: usize = 512;

/// Rule attributes with a fixed meaning in schema documents.
pub const RULE_ATTRIBUTES: [&str; 7] = ["type", "optional", "min", "max", "regex", "label", "defaultValue"];

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateOptions {
    /// Rule attribute (in schema documents) carrying an explicit type name.
    pub override_key_name: String,
    /// Path segment standing for "each array element".
    pub wildcard_segment: String,
    pub scalar_names: ScalarNames,
    /// Name emitted for objects without declared fields.
    pub opaque_name: String,
    pub missing_field_policy: MissingFieldPolicy,
    pub reference_policy: ReferencePolicy,
    /// Nesting limit for anonymous schemas before giving up with a cycle error.
    /// At most [`MAX_DEPTH_LIMIT`].
    pub max_depth: usize,
    /// Prefix the output with the generated-file banner.
    pub header: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ScalarNames {
    pub number: String,
    pub integer: String,
    pub text: String,
    pub boolean: String,
    pub date_time: String,
}

/// What to do with a top-level field that fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFieldPolicy {
    /// Leave the field out of its declaration and report a diagnostic.
    Skip,
    #[default]
    Abort,
}

/// How to treat an instance bound to more than one registry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferencePolicy {
    /// Use the first name in registry order.
    #[default]
    FirstMatch,
    /// Fail any resolution that goes through an aliased instance.
    Strict,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            override_key_name: "typeName".to_owned(),
            wildcard_segment: "$".to_owned(),
            scalar_names: ScalarNames::default(),
            opaque_name: "Object".to_owned(),
            missing_field_policy: MissingFieldPolicy::default(),
            reference_policy: ReferencePolicy::default(),
            max_depth: 64,
            header: true,
        }
    }
}

impl Default for ScalarNames {
    fn default() -> Self {
        Self {
            number: "number".to_owned(),
            integer: "number".to_owned(),
            text: "string".to_owned(),
            boolean: "boolean".to_owned(),
            date_time: "Date".to_owned(),
        }
    }
}

impl ScalarNames {
    pub fn get(&self, kind: ScalarKind) -> &str {
        match kind {
            ScalarKind::Number => &self.number,
            ScalarKind::Integer => &self.integer,
            ScalarKind::Text => &self.text,
            ScalarKind::Boolean => &self.boolean,
            ScalarKind::DateTime => &self.date_time,
        }
    }
}

impl GenerateOptions {
    pub fn from_json_str(src: &str) -> Result<Self, DocumentError> {
        let options: Self = crate::path_de::from_str_with_path(src)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DocumentError> {
        let src = std::fs::read_to_string(path).map_err(|error| DocumentError::Invalid {
            at: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::from_json_str(&src)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(DocumentError::Invalid {
                at: "maxDepth".to_owned(),
                message: format!("{} exceeds the limit of {MAX_DEPTH_LIMIT}", self.max_depth),
            });
        }
        let key = self.override_key_name.as_str();
        if key.is_empty() || key.starts_with('$') || RULE_ATTRIBUTES.contains(&key) {
            return Err(DocumentError::Invalid {
                at: "overrideKeyName".to_owned(),
                message: format!("`{key}` is reserved for rule attributes"),
            });
        }
        Ok(())
    }
}
