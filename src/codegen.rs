//! TypeScript declaration emission from [`TypeExpr`] trees.
//!
//! Objects at the top level become `export interface` blocks; anything else
//! becomes an `export type` alias. Nested objects are written inline every time
//! they occur.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{Field, TypeExpr};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern compiles"));

const INDENT: &str = "    ";

pub struct Codegen {
    out: String,
    opaque_name: String,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self { out: String::new(), opaque_name: "Object".to_owned() }
    }

    pub fn with_opaque_name(mut self, name: impl Into<String>) -> Self {
        self.opaque_name = name.into();
        self
    }

    /// Append one named declaration.
    pub fn emit(&mut self, ty: &TypeExpr, name: &str) {
        match ty {
            TypeExpr::ObjectOf(fields) if fields.is_empty() => {
                self.out.push_str(&format!("export interface {name} {{}}\n"));
            }
            TypeExpr::ObjectOf(fields) => {
                self.out.push_str(&format!("export interface {name} {{\n"));
                for f in fields {
                    let line = format!("{INDENT}{}: {};\n", self.property_key(f), self.expr(&f.ty));
                    self.out.push_str(&line);
                }
                self.out.push_str("}\n");
            }
            other => {
                let line = format!("export type {name} = {};\n", self.expr(other));
                self.out.push_str(&line);
            }
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    /// Inline form of a type expression.
    pub fn expr(&self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Scalar(name) | TypeExpr::Reference(name) => name.clone(),
            TypeExpr::Opaque => self.opaque_name.clone(),
            TypeExpr::ArrayOf(item) => {
                if item.is_alternation() {
                    format!("({})[]", self.expr(item))
                } else {
                    format!("{}[]", self.expr(item))
                }
            }
            TypeExpr::ObjectOf(fields) if fields.is_empty() => "{}".to_owned(),
            TypeExpr::ObjectOf(fields) => {
                let members = fields
                    .iter()
                    .map(|f| format!("{}: {}", self.property_key(f), self.expr(&f.ty)))
                    .collect::<Vec<_>>();
                format!("{{ {} }}", members.join("; "))
            }
            TypeExpr::UnionOf(arms) if arms.is_empty() => "never".to_owned(),
            TypeExpr::UnionOf(arms) => arms
                .iter()
                .map(|arm| self.expr(arm))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeExpr::LiteralEnum(values) if values.is_empty() => "never".to_owned(),
            TypeExpr::LiteralEnum(values) => values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    fn property_key(&self, field: &Field) -> String {
        let mark = if field.optional { "?" } else { "" };
        if IDENTIFIER.is_match(&field.name) {
            format!("{}{mark}", field.name)
        } else {
            format!("{}{mark}", serde_json::Value::String(field.name.clone()))
        }
    }
}

/// Render a single declaration with default settings.
pub fn render(name: &str, ty: &TypeExpr) -> String {
    let mut cg = Codegen::new();
    cg.emit(ty, name);
    cg.into_string()
}
