//! Collection - a named group of documents sharing one validator
//!
//! A collection owns its document store and its options. Readers take a
//! snapshot under a short read lock; writers hold the write lock for their
//! whole validate → commit sequence.
//!
//! ```text
//! Collection ──► RwLock<CollectionState>
//!                  ├── DocumentStore  (Arc<Vec<Document>>, copy-on-write)
//!                  └── CollectionOptions
//!                        ├── validator: Option<Schema>
//!                        ├── validation_level: strict | moderate | off
//!                        └── validation_action: error | warn
//! ```

use parking_lot::RwLock;
use serde::Deserialize;

use super::document::{Document, DocumentId, Value};
use super::store::{DocumentStore, Snapshot};
use crate::error::{Error, Result};
use crate::query::executor::{self, DeleteResult, UpdateResult};
use crate::query::{Filter, FindOptions, Update};
use crate::schema::Schema;

/// Which writes are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Validate every insert and update
    #[default]
    Strict,
    /// Skip updates to documents that were already invalid
    Moderate,
    /// Never validate
    Off,
}

/// What happens to a write that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    /// Reject the write
    #[default]
    Error,
    /// Log a warning and commit anyway
    Warn,
}

/// Options attached to a collection at creation
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    pub validator: Option<Schema>,
    pub validation_level: ValidationLevel,
    pub validation_action: ValidationAction,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator(mut self, schema: Schema) -> Self {
        self.validator = Some(schema);
        self
    }

    pub fn level(mut self, level: ValidationLevel) -> Self {
        self.validation_level = level;
        self
    }

    pub fn action(mut self, action: ValidationAction) -> Self {
        self.validation_action = action;
        self
    }

    /// Parse options from a shell-style literal
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(&Value::parse(text)?)
    }

    /// Build options from `{validator: {$jsonSchema: {...}}, validationLevel, validationAction}`
    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_object().ok_or_else(|| Error::InvalidSchema {
            message: format!("collection options must be an object, found {}", value.type_name()),
        })?;

        let mut options = Self::default();
        for (key, value) in fields {
            match key.as_str() {
                "validator" => {
                    let schema = value
                        .as_object()
                        .and_then(|v| v.get("$jsonSchema"))
                        .ok_or_else(|| Error::InvalidSchema {
                            message: "only {$jsonSchema: ...} validators are supported".into(),
                        })?;
                    options.validator = Some(Schema::from_value(schema)?);
                }
                "validationLevel" => options.validation_level = option_enum(key, value)?,
                "validationAction" => options.validation_action = option_enum(key, value)?,
                other => {
                    return Err(Error::InvalidSchema {
                        message: format!("unknown collection option '{}'", other),
                    })
                }
            }
        }
        Ok(options)
    }
}

fn option_enum<T: serde::de::DeserializeOwned>(key: &str, value: &Value) -> Result<T> {
    let name = value.as_str().ok_or_else(|| Error::InvalidSchema {
        message: format!("{} must be a string", key),
    })?;
    serde_json::from_value(serde_json::Value::String(name.to_string())).map_err(|_| {
        Error::InvalidSchema {
            message: format!("unknown {} '{}'", key, name),
        }
    })
}

/// Mutable state of a collection, guarded by its lock
#[derive(Debug)]
pub(crate) struct CollectionState {
    pub(crate) store: DocumentStore,
    pub(crate) options: CollectionOptions,
}

impl CollectionState {
    /// Run the configured validator against a document about to be written
    ///
    /// `previous` is the stored version for updates, `None` for inserts.
    pub(crate) fn check(
        &self,
        collection: &str,
        doc: &Document,
        previous: Option<&Document>,
    ) -> Result<()> {
        let Some(schema) = &self.options.validator else {
            return Ok(());
        };

        match self.options.validation_level {
            ValidationLevel::Off => return Ok(()),
            ValidationLevel::Moderate => {
                if previous.is_some_and(|prev| schema.validate(prev).is_err()) {
                    return Ok(());
                }
            }
            ValidationLevel::Strict => {}
        }

        match schema.validate(doc) {
            Ok(()) => Ok(()),
            Err(err) => match self.options.validation_action {
                ValidationAction::Error => Err(Error::validation(collection, err)),
                ValidationAction::Warn => {
                    tracing::warn!(
                        collection,
                        field = err.field(),
                        "Document failed validation, writing anyway: {}",
                        err
                    );
                    Ok(())
                }
            },
        }
    }
}

/// A collection of documents
#[derive(Debug)]
pub struct Collection {
    name: String,
    state: RwLock<CollectionState>,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        let name = name.into();
        Self {
            state: RwLock::new(CollectionState {
                store: DocumentStore::new(name.clone()),
                options,
            }),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current options (a copy)
    pub fn options(&self) -> CollectionOptions {
        self.state.read().options.clone()
    }

    /// The attached validator schema, if any
    pub fn schema(&self) -> Option<Schema> {
        self.state.read().options.validator.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().store.is_empty()
    }

    /// Consistent snapshot of every document, in insertion order
    pub fn scan(&self) -> Snapshot {
        self.state.read().store.scan()
    }

    /// Drop the collection's contents: remove every document and detach
    /// the validator
    pub fn reset(&self) {
        self.recreate(CollectionOptions::default());
    }

    /// Remove every document and attach new options
    pub fn recreate(&self, options: CollectionOptions) {
        let mut state = self.state.write();
        let removed = state.store.len();
        state.store.clear();
        state.options = options;
        tracing::info!(collection = %self.name, removed, "Collection reset");
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert one document, returning its identifier
    pub fn insert_one(&self, doc: Document) -> Result<DocumentId> {
        let mut state = self.state.write();
        executor::insert_one(&mut state, &self.name, doc)
    }

    /// Insert several documents; either all are inserted or none
    pub fn insert_many(&self, docs: impl IntoIterator<Item = Document>) -> Result<Vec<DocumentId>> {
        let mut state = self.state.write();
        executor::insert_many(&mut state, &self.name, docs.into_iter().collect())
    }

    /// Apply `update` to the first document matching `filter`
    pub fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let mut state = self.state.write();
        executor::update_one(&mut state, &self.name, filter, update)
    }

    /// Apply `update` to every document matching `filter`
    pub fn update_many(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let mut state = self.state.write();
        executor::update_many(&mut state, &self.name, filter, update)
    }

    /// Update the first match, or insert a document built from the filter
    /// and update if nothing matches
    pub fn upsert(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let mut state = self.state.write();
        executor::upsert(&mut state, &self.name, filter, update)
    }

    pub fn delete_one(&self, filter: &Filter) -> Result<DeleteResult> {
        let mut state = self.state.write();
        executor::delete_one(&mut state, &self.name, filter)
    }

    pub fn delete_many(&self, filter: &Filter) -> Result<DeleteResult> {
        let mut state = self.state.write();
        executor::delete_many(&mut state, &self.name, filter)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Documents matching `filter`, shaped by `options`
    pub fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
        executor::find(&self.scan(), filter, options)
    }

    pub fn find_one(&self, filter: &Filter, options: &FindOptions) -> Result<Option<Document>> {
        executor::find_one(&self.scan(), filter, options)
    }

    pub fn count_documents(&self, filter: &Filter) -> usize {
        executor::count(&self.scan(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::parse("{bsonType: 'object', required: ['sku'], properties: {sku: {bsonType: 'string'}}}")
            .unwrap()
    }

    #[test]
    fn test_options_from_script_shape() {
        let options = CollectionOptions::parse(
            r#"{
                validator: { $jsonSchema: { bsonType: "object", required: ["sku"] } },
                validationLevel: "moderate",
                validationAction: "warn"
            }"#,
        )
        .unwrap();
        assert!(options.validator.is_some());
        assert_eq!(options.validation_level, ValidationLevel::Moderate);
        assert_eq!(options.validation_action, ValidationAction::Warn);
    }

    #[test]
    fn test_options_defaults_and_errors() {
        let options = CollectionOptions::parse("{}").unwrap();
        assert!(options.validator.is_none());
        assert_eq!(options.validation_level, ValidationLevel::Strict);
        assert_eq!(options.validation_action, ValidationAction::Error);

        assert!(matches!(
            CollectionOptions::parse("{validationLevel: 'sometimes'}"),
            Err(Error::InvalidSchema { .. })
        ));
        assert!(matches!(
            CollectionOptions::parse("{validator: {sku: 'P001'}}"),
            Err(Error::InvalidSchema { .. })
        ));
        assert!(matches!(
            CollectionOptions::parse("{capped: true}"),
            Err(Error::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_check_levels_and_actions() {
        let invalid = Document::parse("{sku: 1}").unwrap();
        let valid = Document::parse("{sku: 'P001'}").unwrap();

        let mut state = CollectionState {
            store: DocumentStore::new("Productos"),
            options: CollectionOptions::new().validator(schema()),
        };
        assert!(matches!(
            state.check("Productos", &invalid, None),
            Err(Error::Validation { .. })
        ));
        assert!(state.check("Productos", &valid, None).is_ok());

        state.options.validation_level = ValidationLevel::Moderate;
        // already-invalid documents may stay invalid
        assert!(state.check("Productos", &invalid, Some(&invalid)).is_ok());
        assert!(state.check("Productos", &invalid, Some(&valid)).is_err());

        state.options.validation_level = ValidationLevel::Off;
        assert!(state.check("Productos", &invalid, None).is_ok());

        state.options = CollectionOptions::new()
            .validator(schema())
            .action(ValidationAction::Warn);
        assert!(state.check("Productos", &invalid, None).is_ok());
    }

    #[test]
    fn test_reset_and_recreate() {
        let collection = Collection::new("Productos", CollectionOptions::new().validator(schema()));
        collection.insert_one(Document::parse("{sku: 'P001'}").unwrap()).unwrap();
        assert_eq!(collection.len(), 1);

        collection.reset();
        assert!(collection.is_empty());
        assert!(collection.schema().is_none());
        collection.insert_one(Document::parse("{sku: 5}").unwrap()).unwrap();

        collection.recreate(CollectionOptions::new().validator(schema()));
        assert!(collection.is_empty());
        assert!(collection.insert_one(Document::parse("{sku: 5}").unwrap()).is_err());
    }
}
