//! Error types for docbase
//!
//! Provides structured error types with context for better debugging
//! and user-friendly error messages.

use thiserror::Error;

use crate::schema::ValidationError;

/// The main error type for docbase operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Collection Errors
    // ==========================================================================
    #[error("Collection '{name}' does not exist")]
    CollectionNotFound { name: String },

    #[error("Collection '{name}' already exists")]
    CollectionAlreadyExists { name: String },

    // ==========================================================================
    // Document Errors
    // ==========================================================================
    #[error("Document '{id}' not found in collection '{collection}'")]
    DocumentNotFound { collection: String, id: String },

    #[error("Duplicate key: document '{id}' already exists in collection '{collection}'")]
    DuplicateKey { collection: String, id: String },

    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    #[error("Document failed validation for collection '{collection}': {source}")]
    Validation {
        collection: String,
        #[source]
        source: ValidationError,
    },

    #[error("Unknown field '{field}' is not allowed by the schema of collection '{collection}'")]
    UnknownField { collection: String, field: String },

    #[error("Invalid schema descriptor: {message}")]
    InvalidSchema { message: String },

    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    // ==========================================================================
    // Identifier Errors
    // ==========================================================================
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Reserved name '{name}' cannot be used")]
    ReservedName { name: String },

    // ==========================================================================
    // Query Errors
    // ==========================================================================
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Invalid projection: {message}")]
    Projection { message: String },

    #[error("Invalid update: {message}")]
    InvalidUpdate { message: String },

    #[error("Literal parse error: {message}")]
    ParseError { message: String },

    // ==========================================================================
    // Serialization Errors
    // ==========================================================================
    #[error("Failed to convert JSON: {message}")]
    JsonError { message: String },
}

/// Result type alias for docbase operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError {
            message: err.to_string(),
        }
    }
}

impl From<dql::ParseError> for Error {
    fn from(err: dql::ParseError) -> Self {
        Error::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<crate::validation::IdentifierError> for Error {
    fn from(err: crate::validation::IdentifierError) -> Self {
        use crate::validation::IdentifierError;

        match err {
            IdentifierError::InvalidIdentifier(value, reason) => Error::InvalidIdentifier {
                kind: "identifier",
                value,
                reason,
            },
            IdentifierError::TooLong(value, _max) => Error::InvalidIdentifier {
                kind: "identifier",
                value,
                reason: "exceeds maximum length",
            },
            IdentifierError::Empty => Error::InvalidIdentifier {
                kind: "identifier",
                value: String::new(),
                reason: "cannot be empty",
            },
            IdentifierError::Reserved(name) => Error::ReservedName { name },
        }
    }
}

impl Error {
    /// Attach the collection name to a schema validation failure
    pub fn validation(collection: &str, err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownField { field } => Error::UnknownField {
                collection: collection.to_string(),
                field,
            },
            source => Error::Validation {
                collection: collection.to_string(),
                source,
            },
        }
    }

    /// Field named by a validation failure, if this is one
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { source, .. } => Some(source.field()),
            Error::UnknownField { field, .. } | Error::TypeMismatch { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::CollectionNotFound { .. } => {
                Some("Create the collection first with Database::create_collection")
            }
            Error::DocumentNotFound { .. } => Some("Check the document _id and collection name"),
            Error::DuplicateKey { .. } => Some("Omit _id to let the store assign a fresh one"),
            Error::Validation { .. } => Some("Correct the named field and retry the write"),
            Error::UnknownField { .. } => {
                Some("Remove the field or declare it under the schema's properties")
            }
            Error::Projection { .. } => {
                Some("Use only inclusions (1) or only exclusions (0); _id may always be excluded")
            }
            _ => None,
        }
    }

    /// Returns true if this error is recoverable
    ///
    /// Every write failure leaves the collection untouched, so these can be
    /// retried with corrected input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CollectionNotFound { .. }
                | Error::DocumentNotFound { .. }
                | Error::DuplicateKey { .. }
                | Error::Validation { .. }
                | Error::UnknownField { .. }
                | Error::TypeMismatch { .. }
                | Error::InvalidIdentifier { .. }
                | Error::ParseError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CollectionNotFound {
            name: "Productos".to_string(),
        };
        assert_eq!(err.to_string(), "Collection 'Productos' does not exist");
    }

    #[test]
    fn test_error_suggestion() {
        let err = Error::CollectionNotFound {
            name: "Productos".to_string(),
        };
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_validation_routes_unknown_fields() {
        let err = Error::validation(
            "Productos",
            ValidationError::UnknownField { field: "color".into() },
        );
        assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "color"));

        let err = Error::validation(
            "Productos",
            ValidationError::MissingRequired { field: "sku".into() },
        );
        assert_eq!(err.field(), Some("sku"));
        assert!(err.is_recoverable());
    }
}
