//! Schema validator
//!
//! A single recursive interpreter over the constraint tree. For each node:
//! type membership first, then constraints in their fixed order. The first
//! failure short-circuits; errors are never aggregated.
//!
//! Validation does not mutate documents and has no side effects.

use std::cmp::Ordering;

use super::{Constraint, FieldType, ObjectSchema, Schema};
use crate::storage::document::{Document, Fields, Value, ID_FIELD};

/// Validation error, naming the offending field by its dotted path
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingRequired { field: String },

    #[error("field '{field}' has type {actual}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field '{field}' {reason}")]
    Constraint { field: String, reason: String },

    #[error("field '{field}' is not declared by the schema")]
    UnknownField { field: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingRequired { field }
            | ValidationError::TypeMismatch { field, .. }
            | ValidationError::Constraint { field, .. }
            | ValidationError::UnknownField { field } => field,
        }
    }

    /// Human-readable reason, without the field name
    pub fn reason(&self) -> String {
        match self {
            ValidationError::MissingRequired { .. } => "is required".to_string(),
            ValidationError::TypeMismatch { expected, actual, .. } => {
                format!("has type {}, expected {}", actual, expected)
            }
            ValidationError::Constraint { reason, .. } => reason.clone(),
            ValidationError::UnknownField { .. } => "is not declared".to_string(),
        }
    }
}

type Outcome = Result<(), ValidationError>;

/// Validate a document against a schema
///
/// The root `_id` field is always treated as declared, so closed schemas
/// need not list it.
pub fn validate(doc: &Document, schema: &Schema) -> Outcome {
    if let Some(types) = &schema.types {
        if !types.contains(&FieldType::Object) {
            return Err(ValidationError::TypeMismatch {
                field: display_path(""),
                expected: types.iter().map(|t| t.name()).collect::<Vec<_>>().join(" | "),
                actual: "object".to_string(),
            });
        }
    }

    for constraint in schema.constraints() {
        match constraint {
            Constraint::Properties(object) => validate_object(&doc.fields, object, "", true)?,
            other => check_constraint(&Value::Object(doc.fields.clone()), other, "")?,
        }
    }
    Ok(())
}

fn validate_value(value: &Value, schema: &Schema, path: &str) -> Outcome {
    check_types(value, schema, path)?;
    for constraint in schema.constraints() {
        check_constraint(value, constraint, path)?;
    }
    Ok(())
}

fn check_types(value: &Value, schema: &Schema, path: &str) -> Outcome {
    let Some(types) = &schema.types else {
        return Ok(());
    };
    if types.iter().any(|t| t.matches(value)) {
        return Ok(());
    }
    Err(ValidationError::TypeMismatch {
        field: display_path(path),
        expected: types.iter().map(|t| t.name()).collect::<Vec<_>>().join(" | "),
        actual: value.type_name().to_string(),
    })
}

fn validate_object(fields: &Fields, object: &ObjectSchema, path: &str, is_root: bool) -> Outcome {
    for name in &object.required {
        if !fields.contains_key(name) {
            return Err(ValidationError::MissingRequired {
                field: join_path(path, name),
            });
        }
    }

    for (name, value) in fields {
        let field_path = join_path(path, name);
        match object.properties.get(name) {
            Some(sub) => validate_value(value, sub, &field_path)?,
            None if is_root && name == ID_FIELD => {}
            None if !object.additional_properties => {
                return Err(ValidationError::UnknownField { field: field_path });
            }
            None => {}
        }
    }

    Ok(())
}

fn check_constraint(value: &Value, constraint: &Constraint, path: &str) -> Outcome {
    let fail = |reason: String| {
        Err(ValidationError::Constraint {
            field: display_path(path),
            reason,
        })
    };

    match (constraint, value) {
        (Constraint::Pattern(pattern), Value::String(s)) => {
            if !pattern.is_match(s) {
                return fail(format!("does not match pattern '{}'", pattern.as_str()));
            }
        }
        (Constraint::MinLength(min), Value::String(s)) => {
            let len = s.chars().count();
            if len < *min {
                return fail(format!("has length {}, below minLength {}", len, min));
            }
        }
        (Constraint::MaxLength(max), Value::String(s)) => {
            let len = s.chars().count();
            if len > *max {
                return fail(format!("has length {}, above maxLength {}", len, max));
            }
        }
        (Constraint::Minimum(bound), v) if v.is_numeric() => {
            let below = match v.compare(&bound.value) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => bound.exclusive,
                _ => false,
            };
            if below {
                return fail(format!("value {} is below minimum {}", v, bound.value));
            }
        }
        (Constraint::Maximum(bound), v) if v.is_numeric() => {
            let above = match v.compare(&bound.value) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => bound.exclusive,
                _ => false,
            };
            if above {
                return fail(format!("value {} is above maximum {}", v, bound.value));
            }
        }
        (Constraint::MinItems(min), Value::Array(items)) => {
            if items.len() < *min {
                return fail(format!("has {} items, below minItems {}", items.len(), min));
            }
        }
        (Constraint::MaxItems(max), Value::Array(items)) => {
            if items.len() > *max {
                return fail(format!("has {} items, above maxItems {}", items.len(), max));
            }
        }
        (Constraint::Enum(allowed), v) => {
            if !allowed.contains(v) {
                return fail(format!("value {} is not one of the allowed values", v));
            }
        }
        (Constraint::Items(item_schema), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(item, item_schema, &join_path(path, &i.to_string()))?;
            }
        }
        (Constraint::UniqueItems, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if items[..i].contains(item) {
                    return fail(format!("has duplicate item {} at index {}", item, i));
                }
            }
        }
        (Constraint::Properties(object), Value::Object(fields)) => {
            validate_object(fields, object, path, false)?;
        }
        // Constraints only apply to values of their own kind
        _ => {}
    }

    Ok(())
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$root".to_string()
    } else {
        path.to_string()
    }
}
