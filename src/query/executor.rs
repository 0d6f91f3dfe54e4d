//! Query execution engine
//!
//! Reads run over a store snapshot: filter → sort → skip → limit →
//! projection. Writes run under the collection's write lock and follow
//! validate → commit; nothing is written until every document the
//! operation touches has passed validation.

use crate::error::Result;
use crate::storage::collection::CollectionState;
use crate::storage::document::{Document, DocumentId};
use crate::storage::store::{DocumentStore, Snapshot};
use crate::validation::validate_field_names;

use super::filter::Filter;
use super::options::FindOptions;
use super::update::Update;

/// Outcome of an update or upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: usize,
    pub modified_count: usize,
    /// Set when an upsert inserted a new document
    pub upserted_id: Option<DocumentId>,
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: usize,
}

// =============================================================================
// Reads
// =============================================================================

pub(crate) fn find(
    snapshot: &Snapshot,
    filter: &Filter,
    options: &FindOptions,
) -> Result<Vec<Document>> {
    let mut docs: Vec<Document> = snapshot
        .documents()
        .filter(|doc| filter.matches(doc))
        .cloned()
        .collect();

    if let Some(sort) = &options.sort {
        sort.apply(&mut docs)?;
    }

    docs.iter()
        .skip(options.skip)
        .take(options.take())
        .map(|doc| options.projection.apply(doc))
        .collect()
}

pub(crate) fn find_one(
    snapshot: &Snapshot,
    filter: &Filter,
    options: &FindOptions,
) -> Result<Option<Document>> {
    let options = FindOptions {
        limit: Some(1),
        ..options.clone()
    };
    Ok(find(snapshot, filter, &options)?.into_iter().next())
}

pub(crate) fn count(snapshot: &Snapshot, filter: &Filter) -> usize {
    snapshot.documents().filter(|doc| filter.matches(doc)).count()
}

// =============================================================================
// Inserts
// =============================================================================

pub(crate) fn insert_one(
    state: &mut CollectionState,
    collection: &str,
    mut doc: Document,
) -> Result<DocumentId> {
    doc.ensure_id();
    validate_field_names(&doc.fields)?;
    state.check(collection, &doc, None)?;
    let id = state.store.insert(doc)?;
    tracing::debug!(collection, id = %id, "insertOne");
    Ok(id)
}

/// Insert into a staged copy of the store and swap it in only if every
/// document was accepted
pub(crate) fn insert_many(
    state: &mut CollectionState,
    collection: &str,
    docs: Vec<Document>,
) -> Result<Vec<DocumentId>> {
    let mut staged: DocumentStore = state.store.clone();
    let mut ids = Vec::with_capacity(docs.len());
    for mut doc in docs {
        doc.ensure_id();
        validate_field_names(&doc.fields)?;
        state.check(collection, &doc, None)?;
        ids.push(staged.insert(doc)?);
    }
    state.store = staged;
    tracing::debug!(collection, inserted = ids.len(), "insertMany");
    Ok(ids)
}

// =============================================================================
// Updates
// =============================================================================

fn first_match(store: &DocumentStore, filter: &Filter) -> Option<(DocumentId, Document)> {
    store
        .scan()
        .iter()
        .find(|(_, doc)| filter.matches(doc))
        .map(|(id, doc)| (id, doc.clone()))
}

/// The validated post-update version of `current`, or `None` if the update
/// leaves it unchanged
fn updated_version(
    state: &CollectionState,
    collection: &str,
    current: &Document,
    update: &Update,
) -> Result<Option<Document>> {
    let mut next = current.clone();
    update.apply(&mut next)?;
    if next.identical(current) {
        return Ok(None);
    }
    validate_field_names(&next.fields)?;
    state.check(collection, &next, Some(current))?;
    Ok(Some(next))
}

pub(crate) fn update_one(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
    update: &Update,
) -> Result<UpdateResult> {
    let mut result = UpdateResult::default();
    if let Some((id, current)) = first_match(&state.store, filter) {
        result.matched_count = 1;
        if let Some(next) = updated_version(state, collection, &current, update)? {
            state.store.replace(&id, next)?;
            result.modified_count = 1;
        }
    }
    tracing::debug!(
        collection,
        matched = result.matched_count,
        modified = result.modified_count,
        "updateOne"
    );
    Ok(result)
}

pub(crate) fn update_many(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
    update: &Update,
) -> Result<UpdateResult> {
    let matches: Vec<(DocumentId, Document)> = state
        .store
        .scan()
        .iter()
        .filter(|(_, doc)| filter.matches(doc))
        .map(|(id, doc)| (id, doc.clone()))
        .collect();

    let mut changes = Vec::new();
    for (id, current) in &matches {
        if let Some(next) = updated_version(state, collection, current, update)? {
            changes.push((id, next));
        }
    }

    let result = UpdateResult {
        matched_count: matches.len(),
        modified_count: changes.len(),
        upserted_id: None,
    };
    for (id, next) in changes {
        state.store.replace(id, next)?;
    }

    tracing::debug!(
        collection,
        matched = result.matched_count,
        modified = result.modified_count,
        "updateMany"
    );
    Ok(result)
}

/// Update the first match; with no match, insert a document built from the
/// filter's equality terms, `$set`/`$inc` and `$setOnInsert`
pub(crate) fn upsert(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
    update: &Update,
) -> Result<UpdateResult> {
    if first_match(&state.store, filter).is_some() {
        return update_one(state, collection, filter, update);
    }

    let mut doc = Document::new();
    for (path, value) in filter.equality_terms() {
        doc.set_path(path, value.clone())?;
    }
    update.apply_on_insert(&mut doc)?;
    doc.ensure_id();
    validate_field_names(&doc.fields)?;
    state.check(collection, &doc, None)?;
    let id = state.store.insert(doc)?;

    tracing::debug!(collection, upserted = %id, "upsert inserted");
    Ok(UpdateResult {
        matched_count: 0,
        modified_count: 0,
        upserted_id: Some(id),
    })
}

// =============================================================================
// Deletes
// =============================================================================

pub(crate) fn delete_one(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
) -> Result<DeleteResult> {
    let deleted_count = match first_match(&state.store, filter) {
        Some((id, _)) => state.store.remove(&id),
        None => 0,
    };
    tracing::debug!(collection, deleted = deleted_count, "deleteOne");
    Ok(DeleteResult { deleted_count })
}

pub(crate) fn delete_many(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
) -> Result<DeleteResult> {
    let deleted_count = state.store.retain(|doc| !filter.matches(doc));
    tracing::debug!(collection, deleted = deleted_count, "deleteMany");
    Ok(DeleteResult { deleted_count })
}
