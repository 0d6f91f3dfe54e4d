//! docbase - embedded document store with schema validation
//!
//! Collections of schemaless documents, an optional `$jsonSchema`-style
//! validator per collection, and a Mongo-flavoured query surface: find with
//! projection/sort/skip/limit, update, upsert and delete by filter.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        docbase Database                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │   dql       │  │  Filter /   │  │   Schema                │  │
//! │  │   Literal   │  │  Update /   │  │   (constraint tree +    │  │
//! │  │   Parser    │  │  Projection │  │    recursive validator) │  │
//! │  └──────┬──────┘  └──────┬──────┘  └───────────┬─────────────┘  │
//! │         │                │                     │                │
//! │         ▼                ▼                     ▼                │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                    Query Executor                           ││
//! │  │  (find, updateOne/Many, upsert, deleteOne/Many, insert)     ││
//! │  └──────────────────────────┬──────────────────────────────────┘│
//! │                             │                                   │
//! │                             ▼                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                   Storage Layer                             ││
//! │  │  ┌─────────────┐  ┌─────────────────────────────────────┐   ││
//! │  │  │ Collection  │  │  Document Store                     │   ││
//! │  │  │ (RwLock,    │──│  (Arc<Vec<Document>>, copy-on-write │   ││
//! │  │  │  options)   │  │   snapshots, insertion order)       │   ││
//! │  │  └─────────────┘  └─────────────────────────────────────┘   ││
//! │  └─────────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use docbase::{CollectionOptions, Database, Document, Filter, FindOptions, Update};
//!
//! # fn main() -> docbase::Result<()> {
//! let db = Database::new();
//! let productos = db.create_collection(
//!     "Productos",
//!     CollectionOptions::parse(r#"{
//!         validator: { $jsonSchema: {
//!             bsonType: "object",
//!             required: ["sku", "precio"],
//!             properties: { precio: { bsonType: ["int", "double"], minimum: 0 } }
//!         } }
//!     }"#)?,
//! )?;
//!
//! productos.insert_one(Document::parse("{sku: 'P001', precio: 7500}")?)?;
//! productos.update_one(&Filter::parse("{sku: 'P001'}")?, &Update::parse("{$set: {precio: 8000}}")?)?;
//!
//! let found = productos.find(&Filter::parse("{precio: {$gt: 7900}}")?, &FindOptions::new())?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod query;
pub mod schema;
pub mod storage;
pub mod validation;

pub use error::{Error, Result};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

pub use query::{
    DeleteResult, Filter, FindOptions, Projection, Sort, SortDirection, Update, UpdateResult,
};
pub use schema::{FieldType, ObjectSchema, Schema, ValidationError};
pub use storage::collection::{Collection, CollectionOptions, ValidationAction, ValidationLevel};
pub use storage::document::{Document, DocumentId, FieldPath, Value};

use validation::validate_collection_name;

/// The main database handle
///
/// Holds named collections. Handles are shared `Arc<Collection>`s, so a
/// caller keeps using a collection without going back through the registry.
#[derive(Debug, Default)]
pub struct Database {
    collections: RwLock<BTreeMap<String, Arc<Collection>>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection with the given options
    pub fn create_collection(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<Arc<Collection>> {
        validate_collection_name(name)?;

        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(Error::CollectionAlreadyExists {
                name: name.to_string(),
            });
        }

        let validated = options.validator.is_some();
        let collection = Arc::new(Collection::new(name, options));
        collections.insert(name.to_string(), Arc::clone(&collection));
        tracing::info!(collection = name, validated, "Created collection");
        Ok(collection)
    }

    /// Handle to an existing collection
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CollectionNotFound {
                name: name.to_string(),
            })
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.read().contains_key(name)
    }

    /// Drop a collection, returning whether it existed
    ///
    /// Outstanding handles see an empty collection without a validator.
    pub fn drop_collection(&self, name: &str) -> bool {
        match self.collections.write().remove(name) {
            Some(collection) => {
                collection.reset();
                tracing::info!(collection = name, "Dropped collection");
                true
            }
            None => false,
        }
    }

    /// Collection names in sorted order
    pub fn list_collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_lifecycle() {
        let db = Database::new();
        db.create_collection("Productos", CollectionOptions::new()).unwrap();
        db.create_collection("Clientes", CollectionOptions::new()).unwrap();
        assert_eq!(db.list_collection_names(), vec!["Clientes", "Productos"]);

        assert!(matches!(
            db.create_collection("Productos", CollectionOptions::new()),
            Err(Error::CollectionAlreadyExists { .. })
        ));

        let handle = db.collection("Productos").unwrap();
        handle.insert_one(Document::parse("{sku: 'P001'}").unwrap()).unwrap();

        assert!(db.drop_collection("Productos"));
        assert!(!db.drop_collection("Productos"));
        assert!(handle.is_empty());
        assert!(matches!(db.collection("Productos"), Err(Error::CollectionNotFound { .. })));
        assert!(!db.has_collection("Productos"));
    }

    #[test]
    fn test_invalid_collection_names() {
        let db = Database::new();
        assert!(matches!(
            db.create_collection("system.views", CollectionOptions::new()),
            Err(Error::ReservedName { .. })
        ));
        assert!(matches!(
            db.create_collection("a$b", CollectionOptions::new()),
            Err(Error::InvalidIdentifier { .. })
        ));
    }
}
