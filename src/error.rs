use thiserror::Error;

use crate::model::InstanceId;

/// Failure to resolve one field. A field resolves to a whole tree or to exactly
/// one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("no field rule declared for `{path}`")]
    Lookup { path: String },

    #[error("cannot classify the type of `{path}`: {reason}")]
    UnresolvedType { path: String, reason: String },

    #[error("nesting deeper than {limit} levels at `{path}` (anonymous schemas referring to each other must be registered under a name)")]
    Cyclic { path: String, limit: usize },

    #[error("`{path}` refers to an instance bound to several type names: {}", .names.join(", "))]
    AmbiguousReference { path: String, names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("type name `{name}` is already registered")]
    DuplicateTypeName { name: String },

    #[error("instance {id} does not exist in this registry")]
    UnknownInstance { id: InstanceId },

    #[error("an alternation must list at least one candidate")]
    EmptyAlternation,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to resolve field `{field}` of `{type_name}`")]
    Field {
        type_name: String,
        field: String,
        #[source]
        source: ResolveError,
    },

    #[error("failed to resolve declaration `{type_name}`")]
    Declaration {
        type_name: String,
        #[source]
        source: ResolveError,
    },

    #[error("failed to start the generation workers")]
    Workers(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised while turning a schema document (or an options file) into
/// typed values. `at` is the location inside the document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },

    #[error("JSON pointer `{0}` does not select anything")]
    Pointer(String),

    #[error("`{at}`: unknown type `{name}`")]
    UnknownKind { at: String, name: String },

    #[error("`{at}`: `$ref` target `{name}` is not defined")]
    UnknownRef { at: String, name: String },

    #[error("`{at}`: an alternation must list at least one type")]
    EmptyAlternation { at: String },

    #[error("`{at}`: {message}")]
    Invalid { at: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
