use serde::de::DeserializeOwned;

use crate::error::DocumentError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DocumentError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(located)
}

/// Same as [`from_str_with_path`] for an already parsed (or pointer-selected) value.
pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, DocumentError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(located)
}

fn located<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> DocumentError {
    DocumentError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}
