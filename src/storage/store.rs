//! Ordered in-memory document store
//!
//! Documents are kept in insertion order inside an `Arc<Vec<_>>`. Writers go
//! through `Arc::make_mut`, so a [`Snapshot`] taken by a reader stays frozen
//! while later writes land in a fresh copy.

use std::sync::Arc;

use super::document::{Document, DocumentId, Value, ID_FIELD};
use crate::error::{Error, Result};
use crate::validation::validate_document_id;

/// The documents of one collection
#[derive(Debug, Clone)]
pub struct DocumentStore {
    /// Owning collection, for error messages
    collection: String,
    docs: Arc<Vec<Document>>,
}

/// An immutable view of the store at the moment [`DocumentStore::scan`] ran
#[derive(Debug, Clone)]
pub struct Snapshot {
    docs: Arc<Vec<Document>>,
}

impl Snapshot {
    /// Documents in insertion order; every call starts from the beginning
    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, &Document)> + '_ {
        self.docs.iter().map(|doc| (id_of(doc), doc))
    }

    /// Documents in insertion order, without identifiers
    pub fn documents(&self) -> impl Iterator<Item = &Document> + '_ {
        self.docs.iter()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn id_of(doc: &Document) -> DocumentId {
    doc.id().unwrap_or_else(|| DocumentId::from(Value::Null))
}

impl DocumentStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            docs: Arc::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Take a consistent snapshot for reading
    pub fn scan(&self) -> Snapshot {
        Snapshot {
            docs: Arc::clone(&self.docs),
        }
    }

    /// Look up a document by identifier
    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.position(id).map(|i| &self.docs[i])
    }

    /// Append a document, assigning an identifier if it has none
    ///
    /// Fails with `DuplicateKey` if the caller-supplied identifier is taken.
    pub fn insert(&mut self, mut doc: Document) -> Result<DocumentId> {
        let id = doc.ensure_id();
        validate_document_id(id.as_value())?;
        if self.position(&id).is_some() {
            return Err(Error::DuplicateKey {
                collection: self.collection.clone(),
                id: id.to_string(),
            });
        }

        Arc::make_mut(&mut self.docs).push(doc);
        Ok(id)
    }

    /// Overwrite the document stored under `id`
    ///
    /// The replacement keeps the stored identifier; a differing `_id` is
    /// rejected.
    pub fn replace(&mut self, id: &DocumentId, mut doc: Document) -> Result<()> {
        let index = self.position(id).ok_or_else(|| self.not_found(id))?;

        match doc.id() {
            Some(new_id) if new_id != *id => {
                return Err(Error::InvalidUpdate {
                    message: format!("_id is immutable (attempted change from {} to {})", id, new_id),
                })
            }
            Some(_) => {}
            None => {
                doc.fields.shift_insert(0, ID_FIELD.to_string(), id.as_value().clone());
            }
        }

        Arc::make_mut(&mut self.docs)[index] = doc;
        Ok(())
    }

    /// Remove the document stored under `id`
    pub fn delete(&mut self, id: &DocumentId) -> Result<Document> {
        let index = self.position(id).ok_or_else(|| self.not_found(id))?;
        Ok(Arc::make_mut(&mut self.docs).remove(index))
    }

    /// Remove the document stored under `id` if present, returning how many
    /// documents were removed (0 or 1)
    pub fn remove(&mut self, id: &DocumentId) -> usize {
        match self.position(id) {
            Some(index) => {
                Arc::make_mut(&mut self.docs).remove(index);
                1
            }
            None => 0,
        }
    }

    /// Keep only documents for which `keep` returns true; returns the
    /// number removed
    pub fn retain(&mut self, mut keep: impl FnMut(&Document) -> bool) -> usize {
        if self.docs.iter().all(|doc| keep(doc)) {
            return 0;
        }
        let docs = Arc::make_mut(&mut self.docs);
        let before = docs.len();
        docs.retain(|doc| keep(doc));
        before - docs.len()
    }

    /// Remove every document
    pub fn clear(&mut self) {
        self.docs = Arc::new(Vec::new());
    }

    fn position(&self, id: &DocumentId) -> Option<usize> {
        self.docs
            .iter()
            .position(|doc| doc.get(ID_FIELD) == Some(id.as_value()))
    }

    fn not_found(&self, id: &DocumentId) -> Error {
        Error::DocumentNotFound {
            collection: self.collection.clone(),
            id: id.to_string(),
        }
    }
}
