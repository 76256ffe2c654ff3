// Structural type expressions produced by the resolver. Nothing here knows
// about schemas or instances; codegen only needs this tree.

use crate::model::LiteralValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Scalar(String),
    Reference(String),
    ArrayOf(Box<TypeExpr>),
    ObjectOf(Vec<Field>),      // declaration order
    UnionOf(Vec<TypeExpr>),    // declaration order
    LiteralEnum(Vec<LiteralValue>), // enumeration order, no duplicates
    Opaque,                    // object without declared fields
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
    pub optional: bool,
}

impl TypeExpr {
    /// One arm stays bare; several become a union.
    pub fn union(mut arms: Vec<TypeExpr>) -> TypeExpr {
        match arms.len() {
            1 => arms.remove(0),
            _ => TypeExpr::UnionOf(arms),
        }
    }

    pub fn array_of(item: TypeExpr) -> TypeExpr {
        TypeExpr::ArrayOf(Box::new(item))
    }

    /// True when the rendered form is an alternation and needs parentheses
    /// before a postfix `[]`.
    pub fn is_alternation(&self) -> bool {
        match self {
            TypeExpr::UnionOf(arms) => arms.len() > 1,
            TypeExpr::LiteralEnum(values) => values.len() > 1,
            _ => false,
        }
    }
}
