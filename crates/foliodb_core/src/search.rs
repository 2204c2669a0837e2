//! Pattern search over document fields.

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use regex::RegexBuilder;

/// Field a search pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// Match against the document title.
    Title,
    /// Match against the document body.
    Body,
}

impl SearchField {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
        }
    }
}

/// Filters `docs` by a case-insensitive, unanchored regex over `field`.
///
/// An empty pattern matches every document. A pattern that matches nothing
/// yields an empty vec, never an error. Patterns that fail to compile are
/// rejected as [`StoreError::InvalidQuery`].
pub(crate) fn filter<'a>(
    docs: impl Iterator<Item = &'a Document>,
    field: SearchField,
    pattern: &str,
) -> StoreResult<Vec<Document>> {
    if pattern.is_empty() {
        return Ok(docs.cloned().collect());
    }

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| StoreError::InvalidQuery(err.to_string()))?;

    Ok(docs
        .filter(|doc| {
            doc.field(field.name())
                .is_some_and(|value| regex.is_match(value))
        })
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;

    fn doc(id: &str, title: &str, body: &str) -> Document {
        Document::with_id(DocumentId::new(id).unwrap(), title, body)
    }

    #[test]
    fn empty_pattern_matches_all() {
        let docs = [doc("a", "one", ""), doc("b", "two", "")];
        let hits = filter(docs.iter(), SearchField::Title, "").unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let docs = [doc("a", "Meeting Notes", ""), doc("b", "groceries", "")];
        let hits = filter(docs.iter(), SearchField::Title, "notes").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id().as_str(), "a");
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let docs = [doc("a", "one", "")];
        let hits = filter(docs.iter(), SearchField::Title, "zzz").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn regex_syntax_is_supported() {
        let docs = [doc("a", "", "report 2024"), doc("b", "", "report draft")];
        let hits = filter(docs.iter(), SearchField::Body, r"report \d+").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id().as_str(), "a");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let docs = [doc("a", "one", "")];
        assert!(matches!(
            filter(docs.iter(), SearchField::Title, "(unclosed"),
            Err(StoreError::InvalidQuery(_))
        ));
    }
}
