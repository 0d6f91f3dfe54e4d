//! Identifier validation for docbase
//!
//! Rules for collection names, document field names and `_id` values.
//! These run on every write, before schema validation.

use thiserror::Error;

use crate::storage::document::{Fields, Value};

/// Identifier errors
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("Invalid identifier '{0}': {1}")]
    InvalidIdentifier(String, &'static str),

    #[error("Identifier '{0}' is too long (max {1} characters)")]
    TooLong(String, usize),

    #[error("Identifier cannot be empty")]
    Empty,

    #[error("Reserved name: '{0}'")]
    Reserved(String),
}

/// Maximum length for collection names
pub const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// Prefix reserved for internal collections
const RESERVED_PREFIX: &str = "system.";

/// Validate a collection name
///
/// Rules:
/// - Must be 1-120 characters
/// - Cannot contain `$` or NUL
/// - Cannot start with `system.`
pub fn validate_collection_name(name: &str) -> Result<(), IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty);
    }

    if name.len() > MAX_COLLECTION_NAME_LENGTH {
        return Err(IdentifierError::TooLong(name.to_string(), MAX_COLLECTION_NAME_LENGTH));
    }

    if name.contains('$') || name.contains('\0') {
        return Err(IdentifierError::InvalidIdentifier(
            name.to_string(),
            "contains invalid characters ('$' and NUL are not allowed)",
        ));
    }

    if name.starts_with(RESERVED_PREFIX) {
        return Err(IdentifierError::Reserved(name.to_string()));
    }

    Ok(())
}

/// Validate a stored field name
///
/// Operator-like (`$`-prefixed) and dotted names would be ambiguous with
/// filter operators and nested paths, so they are rejected.
pub fn validate_field_name(name: &str) -> Result<(), IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty);
    }

    if name.starts_with('$') {
        return Err(IdentifierError::InvalidIdentifier(
            name.to_string(),
            "field names cannot start with '$'",
        ));
    }

    if name.contains('.') {
        return Err(IdentifierError::InvalidIdentifier(
            name.to_string(),
            "field names cannot contain '.'",
        ));
    }

    Ok(())
}

/// Validate every field name in a document, recursing into nested
/// objects and arrays
pub fn validate_field_names(fields: &Fields) -> Result<(), IdentifierError> {
    for (name, value) in fields {
        validate_field_name(name)?;
        validate_nested_names(value)?;
    }
    Ok(())
}

fn validate_nested_names(value: &Value) -> Result<(), IdentifierError> {
    match value {
        Value::Object(fields) => validate_field_names(fields),
        Value::Array(items) => items.iter().try_for_each(validate_nested_names),
        _ => Ok(()),
    }
}

/// Validate a document `_id` value
///
/// Arrays cannot serve as identifiers; null is reserved for "unassigned".
pub fn validate_document_id(id: &Value) -> Result<(), IdentifierError> {
    match id {
        Value::Array(_) => Err(IdentifierError::InvalidIdentifier(
            id.to_string(),
            "_id cannot be an array",
        )),
        Value::Null => Err(IdentifierError::InvalidIdentifier(
            id.to_string(),
            "_id cannot be null",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_collection_names() {
        assert!(validate_collection_name("Productos").is_ok());
        assert!(validate_collection_name("ferreteria.productos").is_ok());
        assert!(validate_collection_name("a").is_ok());
    }

    #[test]
    fn test_invalid_collection_names() {
        assert!(matches!(validate_collection_name(""), Err(IdentifierError::Empty)));
        assert!(validate_collection_name("price$list").is_err());
        assert!(validate_collection_name("bad\0name").is_err());
        assert!(matches!(
            validate_collection_name("system.users"),
            Err(IdentifierError::Reserved(_))
        ));
        let long_name = "a".repeat(121);
        assert!(matches!(
            validate_collection_name(&long_name),
            Err(IdentifierError::TooLong(_, 120))
        ));
    }

    #[test]
    fn test_field_names() {
        assert!(validate_field_name("precio").is_ok());
        assert!(validate_field_name("_id").is_ok());
        assert!(validate_field_name("$set").is_err());
        assert!(validate_field_name("a.b").is_err());
        assert!(validate_field_name("").is_err());
    }

    #[test]
    fn test_nested_field_names() {
        let ok = Value::parse("{proveedor: {nombre: 'X'}, tags: [{label: 'a'}]}").unwrap();
        assert!(validate_field_names(ok.as_object().unwrap()).is_ok());

        let bad = Value::parse("{tags: [{'$bad': 1}]}").unwrap();
        assert!(validate_field_names(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_document_ids() {
        assert!(validate_document_id(&Value::from("P001")).is_ok());
        assert!(validate_document_id(&Value::Int(7)).is_ok());
        assert!(validate_document_id(&Value::Array(vec![])).is_err());
        assert!(validate_document_id(&Value::Null).is_err());
    }
}
