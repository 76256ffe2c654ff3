//! One generation pass: every registry entry → one declaration.
use std::fmt;

use rayon::prelude::*;

use crate::codegen::Codegen;
use crate::error::{GenerateError, ResolveError};
use crate::ir::TypeExpr;
use crate::model::{Instance, InstanceId, SchemaMap};
use crate::options::{GenerateOptions, MissingFieldPolicy};
use crate::resolve::Resolver;

/// Worker stack: a fixed base plus room for every nesting level the resolver
/// may reach before reporting a cycle.
const STACK_BASE: usize = 2 * 1024 * 1024;
const STACK_PER_LEVEL: usize = 64 * 1024;

pub const HEADER: &str = "\
// *************************************************************
//                Generated file: do not edit
// This file was generated by schema-to-types
// *************************************************************
";

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ty: TypeExpr,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A field left out under [`MissingFieldPolicy::Skip`].
    SkippedField { type_name: String, field: String, error: ResolveError },
    /// Several registry names are bound to one instance.
    AmbiguousReference { names: Vec<String> },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedField { type_name, field, error } => {
                write!(f, "skipped `{type_name}.{field}`: {error}")
            }
            Diagnostic::AmbiguousReference { names } => {
                write!(
                    f,
                    "one instance is registered as {}; references use `{}`",
                    names.join(", "),
                    names.first().map(String::as_str).unwrap_or_default()
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub declarations: Vec<Declaration>,
    pub diagnostics: Vec<Diagnostic>,
    header: bool,
}

impl Generated {
    /// `(type name, declaration text)` pairs in registry order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations.iter().map(|d| (d.name.as_str(), d.text.as_str()))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.header {
            out.push_str(HEADER);
        }
        for decl in &self.declarations {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&decl.text);
        }
        out
    }
}

/// Resolve and render every registry entry, in registry order.
///
/// Entries are resolved in parallel; the first failing entry in registry order
/// decides the error under [`MissingFieldPolicy::Abort`].
pub fn generate(registry: &SchemaMap, options: &GenerateOptions) -> Result<Generated, GenerateError> {
    let mut diagnostics: Vec<Diagnostic> = registry
        .aliases()
        .into_iter()
        .map(|names| {
            tracing::warn!(names = ?names, "instance registered under several names");
            Diagnostic::AmbiguousReference { names: names.into_iter().map(str::to_owned).collect() }
        })
        .collect();

    let resolver = Resolver::new(registry, options);
    let pool = rayon::ThreadPoolBuilder::new()
        .stack_size(STACK_BASE + resolver.depth_limit() * STACK_PER_LEVEL)
        .build()?;
    let entries: Vec<(&str, InstanceId)> = registry.entries().collect();
    let results: Vec<Result<(Declaration, Vec<Diagnostic>), GenerateError>> = pool.install(|| {
        entries
            .par_iter()
            .map(|(name, id)| declare(&resolver, name, *id))
            .collect()
    });

    let mut declarations = Vec::with_capacity(results.len());
    for result in results {
        let (declaration, skipped) = result?;
        declarations.push(declaration);
        diagnostics.extend(skipped);
    }
    tracing::info!(declarations = declarations.len(), diagnostics = diagnostics.len(), "generation pass done");

    Ok(Generated { declarations, diagnostics, header: options.header })
}

fn declare(
    resolver: &Resolver<'_>,
    name: &str,
    id: InstanceId,
) -> Result<(Declaration, Vec<Diagnostic>), GenerateError> {
    let options = resolver.options();
    let mut skipped = Vec::new();

    let ty = match resolver.registry().instance(id) {
        Some(Instance::Schema(definition)) => {
            let mut fields = Vec::new();
            for key in definition.child_keys("", &options.wildcard_segment) {
                match resolver.resolve_field(key, definition) {
                    Ok(field) => fields.push(field),
                    Err(error) => match options.missing_field_policy {
                        MissingFieldPolicy::Abort => {
                            return Err(GenerateError::Field {
                                type_name: name.to_owned(),
                                field: key.to_owned(),
                                source: error,
                            });
                        }
                        MissingFieldPolicy::Skip => {
                            tracing::warn!(type_name = name, field = key, error = %error, "skipping field");
                            skipped.push(Diagnostic::SkippedField {
                                type_name: name.to_owned(),
                                field: key.to_owned(),
                                error,
                            });
                        }
                    },
                }
            }
            TypeExpr::ObjectOf(fields)
        }
        Some(Instance::Values(values)) => resolver
            .resolve_values(name, values)
            .map_err(|source| GenerateError::Declaration { type_name: name.to_owned(), source })?,
        None => {
            return Err(GenerateError::Declaration {
                type_name: name.to_owned(),
                source: ResolveError::UnresolvedType {
                    path: name.to_owned(),
                    reason: format!("instance {id} is not part of this registry"),
                },
            });
        }
    };

    let mut cg = Codegen::new().with_opaque_name(options.opaque_name.clone());
    cg.emit(&ty, name);
    tracing::debug!(type_name = name, "declaration rendered");

    let declaration = Declaration { name: name.to_owned(), ty, text: cg.into_string() };
    Ok((declaration, skipped))
}
