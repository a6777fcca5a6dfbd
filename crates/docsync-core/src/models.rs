//! Core data models that flow through scanning, chunking, reconciliation
//! and retrieval.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// One entry of a directory scan: which file, and what its bytes hash to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// File name without its extension.
    pub id: String,
    /// File name as found on disk.
    pub filename: String,
    /// Hex digest of the raw file bytes.
    pub fingerprint: String,
}

/// Typed front-matter fields. Absent fields take the defaults: no date,
/// no tags, no categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub date: Option<NaiveDateTime>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// A parsed document: title, trimmed body, and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    /// Front-matter title, or the file name when none is given.
    pub title: String,
    /// Body text with front matter removed, trimmed.
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A window of document text, the unit that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub doc_id: String,
    pub title: String,
    /// Zero-based, contiguous within one document.
    pub chunk_index: usize,
}

impl Chunk {
    /// Stable identifier of this chunk within the index.
    pub fn chunk_id(&self) -> String {
        format!("{}_{}", self.doc_id, self.chunk_index)
    }
}

/// A chunk returned by a similarity query, with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub doc_id: String,
    pub text: String,
    pub chunk_index: usize,
    /// Squared Euclidean distance; smaller is more similar.
    pub distance: f32,
}

/// Last indexed fingerprint per document title.
///
/// Keyed by title rather than id, so two documents sharing a title share
/// one entry. The first fingerprint recorded for a title is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintTable {
    entries: BTreeMap<String, String>,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `fingerprint` for `title` unless the title is already present.
    /// Returns `false` when an earlier entry was kept.
    pub fn record(&mut self, title: impl Into<String>, fingerprint: impl Into<String>) -> bool {
        match self.entries.entry(title.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(fingerprint.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.entries.get(title).map(String::as_str)
    }

    /// Titles in sorted order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Into<String>, F: Into<String>> FromIterator<(T, F)> for FingerprintTable {
    fn from_iter<I: IntoIterator<Item = (T, F)>>(iter: I) -> Self {
        let mut table = FingerprintTable::new();
        for (title, fingerprint) in iter {
            table.record(title, fingerprint);
        }
        table
    }
}
