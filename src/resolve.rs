//! Schema definition → structural type expression.
//!
//! Resolution of a field is a pure function of the registry and the field path:
//! no state survives between calls, which is what lets the generator resolve
//! registry entries on several threads at once.
//!
//! Precedence for one field rule:
//! 1. an explicit type name wins outright;
//! 2. every candidate resolves on its own, several candidates form a union;
//! 3. scalars map through the configured name table;
//! 4. arrays recurse into `<path>.<wildcard>`;
//! 5. plain objects expand their declared sub-paths, or stay opaque;
//! 6. nested instances become a reference when registered, are inlined when
//!    they carry a definition, and fall back to a literal enum otherwise.
pub mod reference;

use indexmap::IndexSet;

use crate::error::ResolveError;
use crate::ir::{Field, TypeExpr};
use crate::model::{
    EnumValue, FieldRule, Instance, InstanceId, SchemaDefinition, SchemaMap, TypeCandidate,
};
use crate::options::{GenerateOptions, MAX_DEPTH_LIMIT, ReferencePolicy};

pub use reference::{ReferenceMatch, find_reference};

pub struct Resolver<'a> {
    registry: &'a SchemaMap,
    options: &'a GenerateOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a SchemaMap, options: &'a GenerateOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &'a SchemaMap {
        self.registry
    }

    pub fn options(&self) -> &'a GenerateOptions {
        self.options
    }

    /// `max_depth`, capped at [`MAX_DEPTH_LIMIT`].
    pub fn depth_limit(&self) -> usize {
        self.options.max_depth.min(MAX_DEPTH_LIMIT)
    }

    /// Type of the field declared at `path` in `definition`.
    pub fn resolve(&self, path: &str, definition: &SchemaDefinition) -> Result<TypeExpr, ResolveError> {
        let rule = self.lookup(path, definition, 0)?;
        self.resolve_rule(path, rule, definition, 0)
    }

    /// Like [`Resolver::resolve`], keeping the field name (last path segment)
    /// and its collapsed optional flag.
    pub fn resolve_field(&self, path: &str, definition: &SchemaDefinition) -> Result<Field, ResolveError> {
        let (prefix, key) = match path.rsplit_once('.') {
            Some((prefix, key)) => (prefix, key),
            None => ("", path),
        };
        self.field_at(prefix, key, definition, 0)
    }

    /// Literal enum of a value holder (enum fallback).
    pub fn resolve_values(&self, path: &str, values: &[EnumValue]) -> Result<TypeExpr, ResolveError> {
        let mut literals: IndexSet<_> = IndexSet::with_capacity(values.len());
        for value in values {
            match value {
                EnumValue::Literal(literal) => {
                    literals.insert(literal.clone());
                }
                EnumValue::Structured(value) => {
                    return Err(ResolveError::UnresolvedType {
                        path: path.to_owned(),
                        reason: format!("enumerable value {value} is not a scalar literal"),
                    });
                }
            }
        }
        Ok(TypeExpr::LiteralEnum(literals.into_iter().collect()))
    }

    // ———————————————————————————————————————————————————————————————————————
    // INTERNAL
    // ———————————————————————————————————————————————————————————————————————

    fn lookup<'d>(
        &self,
        path: &str,
        definition: &'d SchemaDefinition,
        depth: usize,
    ) -> Result<&'d FieldRule, ResolveError> {
        let limit = self.depth_limit();
        if depth > limit {
            return Err(ResolveError::Cyclic { path: path.to_owned(), limit });
        }
        definition
            .get(path)
            .ok_or_else(|| ResolveError::Lookup { path: path.to_owned() })
    }

    fn field_at(
        &self,
        prefix: &str,
        key: &str,
        definition: &SchemaDefinition,
        depth: usize,
    ) -> Result<Field, ResolveError> {
        let path = join_path(prefix, key);
        let rule = self.lookup(&path, definition, depth)?;
        let ty = self.resolve_rule(&path, rule, definition, depth)?;
        Ok(Field { name: key.to_owned(), ty, optional: rule.optionality.evaluate() })
    }

    /// Every child declared under `prefix`, in declaration order.
    fn fields_under(
        &self,
        prefix: &str,
        definition: &SchemaDefinition,
        depth: usize,
    ) -> Result<Vec<Field>, ResolveError> {
        definition
            .child_keys(prefix, &self.options.wildcard_segment)
            .into_iter()
            .map(|key| self.field_at(prefix, key, definition, depth))
            .collect()
    }

    fn resolve_rule(
        &self,
        path: &str,
        rule: &FieldRule,
        definition: &SchemaDefinition,
        depth: usize,
    ) -> Result<TypeExpr, ResolveError> {
        if let Some(name) = &rule.explicit_name {
            return Ok(TypeExpr::Reference(name.clone()));
        }
        let arms = rule
            .candidates()
            .iter()
            .map(|candidate| self.resolve_candidate(path, candidate, definition, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TypeExpr::union(arms))
    }

    fn resolve_candidate(
        &self,
        path: &str,
        candidate: &TypeCandidate,
        definition: &SchemaDefinition,
        depth: usize,
    ) -> Result<TypeExpr, ResolveError> {
        match candidate {
            TypeCandidate::Scalar(kind) => {
                Ok(TypeExpr::Scalar(self.options.scalar_names.get(*kind).to_owned()))
            }
            TypeCandidate::ArrayMarker => {
                let element = join_path(path, &self.options.wildcard_segment);
                let rule = self.lookup(&element, definition, depth + 1)?;
                let item = self.resolve_rule(&element, rule, definition, depth + 1)?;
                Ok(TypeExpr::array_of(item))
            }
            TypeCandidate::ObjectMarker => {
                let fields = self.fields_under(path, definition, depth + 1)?;
                if fields.is_empty() {
                    Ok(TypeExpr::Opaque)
                } else {
                    Ok(TypeExpr::ObjectOf(fields))
                }
            }
            TypeCandidate::SchemaInstance(id) => self.resolve_instance(path, *id, depth),
        }
    }

    fn resolve_instance(&self, path: &str, id: InstanceId, depth: usize) -> Result<TypeExpr, ResolveError> {
        if let Some(hit) = find_reference(id, self.registry) {
            if hit.is_ambiguous() {
                if self.options.reference_policy == ReferencePolicy::Strict {
                    return Err(ResolveError::AmbiguousReference {
                        path: path.to_owned(),
                        names: hit.all_names(),
                    });
                }
                tracing::debug!(path, name = hit.name, aliases = ?hit.aliases, "aliased instance, using first name");
            }
            return Ok(TypeExpr::Reference(hit.name.to_owned()));
        }

        match self.registry.instance(id) {
            Some(Instance::Schema(nested)) => {
                let fields = self.fields_under("", nested, depth + 1)?;
                if fields.is_empty() {
                    Ok(TypeExpr::Opaque)
                } else {
                    Ok(TypeExpr::ObjectOf(fields))
                }
            }
            Some(Instance::Values(values)) => self.resolve_values(path, values),
            None => Err(ResolveError::UnresolvedType {
                path: path.to_owned(),
                reason: format!("instance {id} is not part of this registry"),
            }),
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LiteralValue, ScalarKind};
    use crate::options::ScalarNames;
    use ordered_float::OrderedFloat;
    use serde_json::json;

    fn definition<'m>(map: &'m SchemaMap, name: &str) -> &'m SchemaDefinition {
        match map.get(name).and_then(|id| map.instance(id)) {
            Some(Instance::Schema(def)) => def,
            other => panic!("{name} is not a registered schema: {other:?}"),
        }
    }

    fn scalar(name: &str) -> TypeExpr {
        TypeExpr::Scalar(name.to_owned())
    }

    fn field(name: &str, ty: TypeExpr, optional: bool) -> Field {
        Field { name: name.to_owned(), ty, optional }
    }

    #[test]
    fn scalars_follow_the_name_table() {
        let options = GenerateOptions {
            scalar_names: ScalarNames {
                number: "f64".into(),
                integer: "i64".into(),
                text: "String".into(),
                boolean: "bool".into(),
                date_time: "Timestamp".into(),
            },
            ..GenerateOptions::default()
        };
        let mut def = SchemaDefinition::new();
        for (i, kind) in ScalarKind::ALL.into_iter().enumerate() {
            def.insert(format!("f{i}"), FieldRule::scalar(kind));
        }
        let map = SchemaMap::new();
        let resolver = Resolver::new(&map, &options);
        for (i, kind) in ScalarKind::ALL.into_iter().enumerate() {
            let ty = resolver.resolve(&format!("f{i}"), &def).unwrap();
            assert_eq!(ty, scalar(options.scalar_names.get(kind)));
        }
    }

    #[test]
    fn integer_and_number_share_the_numeric_primitive() {
        let def = SchemaDefinition::new()
            .field("a", FieldRule::scalar(ScalarKind::Integer))
            .field("b", FieldRule::scalar(ScalarKind::Number));
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let resolver = Resolver::new(&map, &options);
        assert_eq!(resolver.resolve("a", &def).unwrap(), resolver.resolve("b", &def).unwrap());
    }

    #[test]
    fn array_of_booleans() {
        let def = SchemaDefinition::new()
            .field("flags", FieldRule::new(TypeCandidate::ArrayMarker))
            .field("flags.$", FieldRule::scalar(ScalarKind::Boolean));
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("flags", &def).unwrap();
        assert_eq!(ty, TypeExpr::array_of(scalar("boolean")));
    }

    #[test]
    fn array_without_element_rule_is_a_lookup_error() {
        let def = SchemaDefinition::new().field("flags", FieldRule::new(TypeCandidate::ArrayMarker));
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let err = Resolver::new(&map, &options).resolve("flags", &def).unwrap_err();
        assert_eq!(err, ResolveError::Lookup { path: "flags.$".into() });
    }

    #[test]
    fn missing_path_is_a_lookup_error() {
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let err = Resolver::new(&map, &options).resolve("nope", &SchemaDefinition::new()).unwrap_err();
        assert_eq!(err, ResolveError::Lookup { path: "nope".into() });
    }

    #[test]
    fn object_marker_expands_declared_children_or_stays_opaque() {
        let def = SchemaDefinition::new()
            .field("meta", FieldRule::new(TypeCandidate::ObjectMarker))
            .field("meta.label", FieldRule::scalar(ScalarKind::Text).optional(true))
            .field("meta.rank", FieldRule::scalar(ScalarKind::Integer))
            .field("blob", FieldRule::new(TypeCandidate::ObjectMarker));
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let resolver = Resolver::new(&map, &options);

        assert_eq!(
            resolver.resolve("meta", &def).unwrap(),
            TypeExpr::ObjectOf(vec![
                field("label", scalar("string"), true),
                field("rank", scalar("number"), false),
            ])
        );
        assert_eq!(resolver.resolve("blob", &def).unwrap(), TypeExpr::Opaque);
    }

    #[test]
    fn unregistered_instance_is_inlined() {
        let mut map = SchemaMap::new();
        let point = map.add_instance(Instance::Schema(
            SchemaDefinition::new()
                .field("x", FieldRule::scalar(ScalarKind::Number))
                .field("tags", FieldRule::new(TypeCandidate::ArrayMarker).optional(true))
                .field("tags.$", FieldRule::scalar(ScalarKind::Text)),
        ));
        map.register_schema("Shape", SchemaDefinition::new().field("origin", FieldRule::instance(point)))
            .unwrap();

        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("origin", definition(&map, "Shape")).unwrap();
        assert_eq!(
            ty,
            TypeExpr::ObjectOf(vec![
                field("x", scalar("number"), false),
                field("tags", TypeExpr::array_of(scalar("string")), true),
            ])
        );
    }

    #[test]
    fn registered_instance_is_a_reference() {
        let mut map = SchemaMap::new();
        let sub = map
            .register_schema(
                "SubType",
                SchemaDefinition::new()
                    .field("aNumber", FieldRule::scalar(ScalarKind::Number))
                    .field("other", FieldRule::scalar(ScalarKind::Text)),
            )
            .unwrap();
        map.register_schema("Foo", SchemaDefinition::new().field("aSpecificField", FieldRule::instance(sub)))
            .unwrap();

        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("aSpecificField", definition(&map, "Foo")).unwrap();
        assert_eq!(ty, TypeExpr::Reference("SubType".into()));
    }

    #[test]
    fn alternatives_keep_declared_order() {
        let mut map = SchemaMap::new();
        let shape = map.add_instance(Instance::Schema(
            SchemaDefinition::new().field("id", FieldRule::scalar(ScalarKind::Text)),
        ));
        let rule = FieldRule::one_of(vec![
            TypeCandidate::SchemaInstance(shape),
            TypeCandidate::Scalar(ScalarKind::Text),
        ])
        .unwrap();
        let def = SchemaDefinition::new().field("either", rule);

        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("either", &def).unwrap();
        assert_eq!(
            ty,
            TypeExpr::UnionOf(vec![
                TypeExpr::ObjectOf(vec![field("id", scalar("string"), false)]),
                scalar("string"),
            ])
        );
    }

    #[test]
    fn array_of_alternatives_keeps_the_union_inside() {
        let def = SchemaDefinition::new()
            .field("items", FieldRule::new(TypeCandidate::ArrayMarker))
            .field(
                "items.$",
                FieldRule::one_of(vec![
                    TypeCandidate::Scalar(ScalarKind::Text),
                    TypeCandidate::Scalar(ScalarKind::Boolean),
                ])
                .unwrap(),
            );
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("items", &def).unwrap();
        assert_eq!(
            ty,
            TypeExpr::array_of(TypeExpr::UnionOf(vec![scalar("string"), scalar("boolean")]))
        );
    }

    #[test]
    fn array_of_declared_objects() {
        let def = SchemaDefinition::new()
            .field("items", FieldRule::new(TypeCandidate::ArrayMarker))
            .field("items.$", FieldRule::new(TypeCandidate::ObjectMarker))
            .field("items.$.x", FieldRule::scalar(ScalarKind::Number))
            .field("items.$.note", FieldRule::scalar(ScalarKind::Text).optional(true));
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let resolver = Resolver::new(&map, &options);

        let ty = resolver.resolve("items", &def).unwrap();
        assert_eq!(
            ty,
            TypeExpr::array_of(TypeExpr::ObjectOf(vec![
                field("x", scalar("number"), false),
                field("note", scalar("string"), true),
            ]))
        );
        assert_eq!(crate::codegen::render("Items", &ty), "export type Items = { x: number; note?: string }[];\n");
    }

    #[test]
    fn value_holder_falls_back_to_literal_enum() {
        let mut map = SchemaMap::new();
        let values = ["a", "b", "a", "c"].into_iter().map(|v| EnumValue::from_json(json!(v))).collect();
        let my_enum = map.add_instance(Instance::Values(values));
        let def = SchemaDefinition::new().field("anEnum", FieldRule::instance(my_enum).optional(true));

        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("anEnum", &def).unwrap();
        assert_eq!(
            ty,
            TypeExpr::LiteralEnum(vec![
                LiteralValue::Text("a".into()),
                LiteralValue::Text("b".into()),
                LiteralValue::Text("c".into()),
            ])
        );
    }

    #[test]
    fn mixed_scalar_literals_keep_enumeration_order() {
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let values: Vec<_> = [json!(2), json!("two"), json!(true), json!(null)]
            .into_iter()
            .map(EnumValue::from_json)
            .collect();
        let ty = Resolver::new(&map, &options).resolve_values("n", &values).unwrap();
        assert_eq!(
            ty,
            TypeExpr::LiteralEnum(vec![
                LiteralValue::Number(OrderedFloat(2.0)),
                LiteralValue::Text("two".into()),
                LiteralValue::Bool(true),
                LiteralValue::Null,
            ])
        );
    }

    #[test]
    fn structured_enumerable_is_unresolved() {
        let mut map = SchemaMap::new();
        let holder = map.add_instance(Instance::Values(vec![
            EnumValue::from_json(json!("a")),
            EnumValue::from_json(json!({ "nested": true })),
        ]));
        let def = SchemaDefinition::new().field("odd", FieldRule::instance(holder));

        let options = GenerateOptions::default();
        let err = Resolver::new(&map, &options).resolve("odd", &def).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedType { ref path, .. } if path == "odd"), "{err:?}");
    }

    #[test]
    fn explicit_name_overrides_every_candidate() {
        let mut map = SchemaMap::new();
        let holder = map.add_instance(Instance::Values(vec![EnumValue::from_json(json!("a"))]));
        let rule = FieldRule::one_of(vec![
            TypeCandidate::SchemaInstance(holder),
            TypeCandidate::Scalar(ScalarKind::Text),
        ])
        .unwrap()
        .named("MyEnum");
        let def = SchemaDefinition::new().field("anEnumWithType", rule);

        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("anEnumWithType", &def).unwrap();
        assert_eq!(ty, TypeExpr::Reference("MyEnum".into()));
    }

    #[test]
    fn self_reference_through_the_registry_terminates() {
        let mut map = SchemaMap::new();
        let tree = map.reserve();
        map.define(
            tree,
            Instance::Schema(
                SchemaDefinition::new()
                    .field("children", FieldRule::new(TypeCandidate::ArrayMarker))
                    .field("children.$", FieldRule::instance(tree)),
            ),
        )
        .unwrap();
        map.bind("Tree", tree).unwrap();

        let options = GenerateOptions::default();
        let ty = Resolver::new(&map, &options).resolve("children", definition(&map, "Tree")).unwrap();
        assert_eq!(ty, TypeExpr::array_of(TypeExpr::Reference("Tree".into())));
    }

    #[test]
    fn anonymous_cycle_hits_the_depth_limit() {
        let mut map = SchemaMap::new();
        let a = map.reserve();
        let b = map.reserve();
        map.define(a, Instance::Schema(SchemaDefinition::new().field("b", FieldRule::instance(b)))).unwrap();
        map.define(b, Instance::Schema(SchemaDefinition::new().field("a", FieldRule::instance(a)))).unwrap();
        map.register_schema("Root", SchemaDefinition::new().field("start", FieldRule::instance(a)))
            .unwrap();

        let options = GenerateOptions { max_depth: 8, ..GenerateOptions::default() };
        let err = Resolver::new(&map, &options).resolve("start", definition(&map, "Root")).unwrap_err();
        assert!(matches!(err, ResolveError::Cyclic { limit: 8, .. }), "{err:?}");

        let unbounded = GenerateOptions { max_depth: usize::MAX, ..GenerateOptions::default() };
        assert_eq!(Resolver::new(&map, &unbounded).depth_limit(), MAX_DEPTH_LIMIT);
    }

    #[test]
    fn aliased_instance_uses_first_name_unless_strict() {
        let mut map = SchemaMap::new();
        let shared = map.register_schema("Point", SchemaDefinition::new()).unwrap();
        map.bind("Coordinate", shared).unwrap();
        let def = SchemaDefinition::new().field("at", FieldRule::instance(shared));

        let lenient = GenerateOptions::default();
        let ty = Resolver::new(&map, &lenient).resolve("at", &def).unwrap();
        assert_eq!(ty, TypeExpr::Reference("Point".into()));

        let strict = GenerateOptions { reference_policy: ReferencePolicy::Strict, ..GenerateOptions::default() };
        let err = Resolver::new(&map, &strict).resolve("at", &def).unwrap_err();
        assert_eq!(
            err,
            ResolveError::AmbiguousReference {
                path: "at".into(),
                names: vec!["Point".into(), "Coordinate".into()],
            }
        );
    }

    #[test]
    fn foreign_instance_id_is_unresolved() {
        let mut other = SchemaMap::new();
        other.reserve();
        other.reserve();
        let foreign = other.reserve();

        let map = SchemaMap::new();
        let def = SchemaDefinition::new().field("x", FieldRule::instance(foreign));
        let options = GenerateOptions::default();
        let err = Resolver::new(&map, &options).resolve("x", &def).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedType { .. }), "{err:?}");
    }

    #[test]
    fn resolve_field_keeps_name_and_optional_flag() {
        let def = SchemaDefinition::new()
            .field("meta", FieldRule::new(TypeCandidate::ObjectMarker))
            .field("meta.when", FieldRule::scalar(ScalarKind::DateTime).optional(true));
        let map = SchemaMap::new();
        let options = GenerateOptions::default();
        let f = Resolver::new(&map, &options).resolve_field("meta.when", &def).unwrap();
        assert_eq!(f, field("when", scalar("Date"), true));
    }
}
