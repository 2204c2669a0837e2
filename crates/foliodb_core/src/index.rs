//! Named secondary indexes.
//!
//! An index covers a declared list of document fields and supports
//! exact-match lookup. Definitions are created idempotently at startup by
//! callers and maintained on every mutation; they are not persisted.

use crate::document::{Document, DocumentId};
use crate::error::{StoreError, StoreResult};
use std::collections::{BTreeSet, HashMap};

/// A named index over a declared field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Covered fields, e.g. `["title"]`.
    pub fields: Vec<String>,
}

#[derive(Debug, Default)]
struct NamedIndex {
    fields: Vec<String>,
    /// (field, value) -> ids holding that value.
    postings: HashMap<(String, String), BTreeSet<DocumentId>>,
}

impl NamedIndex {
    fn insert(&mut self, doc: &Document) {
        for field in &self.fields {
            if let Some(value) = doc.field(field) {
                self.postings
                    .entry((field.clone(), value.to_string()))
                    .or_default()
                    .insert(doc.id().clone());
            }
        }
    }

    fn remove(&mut self, doc: &Document) {
        for field in &self.fields {
            if let Some(value) = doc.field(field) {
                let key = (field.clone(), value.to_string());
                if let Some(ids) = self.postings.get_mut(&key) {
                    ids.remove(doc.id());
                    if ids.is_empty() {
                        self.postings.remove(&key);
                    }
                }
            }
        }
    }
}

/// Maintains all named indexes of a store.
#[derive(Debug, Default)]
pub struct IndexEngine {
    indexes: HashMap<String, NamedIndex>,
}

impl IndexEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index idempotently, building it from `docs`.
    ///
    /// Returns `true` if the index was created or redefined, `false` if an
    /// identical definition already existed.
    pub fn create<'a>(
        &mut self,
        name: impl Into<String>,
        fields: Vec<String>,
        docs: impl Iterator<Item = &'a Document>,
    ) -> bool {
        let name = name.into();
        if let Some(existing) = self.indexes.get(&name) {
            if existing.fields == fields {
                return false;
            }
        }

        let mut index = NamedIndex {
            fields,
            postings: HashMap::new(),
        };
        for doc in docs {
            index.insert(doc);
        }
        self.indexes.insert(name, index);
        true
    }

    /// Exact-match lookup. Ids are returned in id order.
    pub fn query(&self, name: &str, field: &str, value: &str) -> StoreResult<Vec<DocumentId>> {
        let index = self.indexes.get(name).ok_or_else(|| StoreError::UnknownIndex {
            name: name.to_string(),
        })?;

        if !index.fields.iter().any(|f| f == field) {
            return Err(StoreError::FieldNotIndexed {
                index: name.to_string(),
                field: field.to_string(),
            });
        }

        Ok(index
            .postings
            .get(&(field.to_string(), value.to_string()))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Applies a document write: `old` is the previous version, if any.
    pub fn apply_put(&mut self, old: Option<&Document>, new: &Document) {
        for index in self.indexes.values_mut() {
            if let Some(old) = old {
                index.remove(old);
            }
            index.insert(new);
        }
    }

    /// Applies a document delete.
    pub fn apply_delete(&mut self, old: &Document) {
        for index in self.indexes.values_mut() {
            index.remove(old);
        }
    }

    /// Returns the current definitions, sorted by name.
    pub fn definitions(&self) -> Vec<IndexDefinition> {
        let mut defs: Vec<_> = self
            .indexes
            .iter()
            .map(|(name, index)| IndexDefinition {
                name: name.clone(),
                fields: index.fields.clone(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;

    fn doc(id: &str, title: &str) -> Document {
        Document::with_id(DocumentId::new(id).unwrap(), title, "body")
    }

    #[test]
    fn create_is_idempotent() {
        let mut engine = IndexEngine::new();
        let docs = [doc("a", "x")];

        assert!(engine.create("by_title", vec!["title".into()], docs.iter()));
        assert!(!engine.create("by_title", vec!["title".into()], docs.iter()));
        // A different field list redefines the index.
        assert!(engine.create("by_title", vec!["title".into(), "body".into()], docs.iter()));
    }

    #[test]
    fn query_finds_exact_matches() {
        let mut engine = IndexEngine::new();
        let docs = [doc("a", "notes"), doc("b", "notes"), doc("c", "other")];
        engine.create("by_title", vec!["title".into()], docs.iter());

        let ids = engine.query("by_title", "title", "notes").unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), "a");

        assert!(engine.query("by_title", "title", "missing").unwrap().is_empty());
    }

    #[test]
    fn unknown_index_and_field_errors() {
        let mut engine = IndexEngine::new();
        engine.create("by_title", vec!["title".into()], [].iter());

        assert!(matches!(
            engine.query("nope", "title", "x"),
            Err(StoreError::UnknownIndex { .. })
        ));
        assert!(matches!(
            engine.query("by_title", "body", "x"),
            Err(StoreError::FieldNotIndexed { .. })
        ));
    }

    #[test]
    fn put_and_delete_keep_postings_current() {
        let mut engine = IndexEngine::new();
        engine.create("by_title", vec!["title".into()], [].iter());

        let old = doc("a", "draft");
        engine.apply_put(None, &old);
        assert_eq!(engine.query("by_title", "title", "draft").unwrap().len(), 1);

        let new = doc("a", "final");
        engine.apply_put(Some(&old), &new);
        assert!(engine.query("by_title", "title", "draft").unwrap().is_empty());
        assert_eq!(engine.query("by_title", "title", "final").unwrap().len(), 1);

        engine.apply_delete(&new);
        assert!(engine.query("by_title", "title", "final").unwrap().is_empty());
    }
}
