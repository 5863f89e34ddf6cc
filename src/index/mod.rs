/// Index store abstraction layer
///
/// Provides the IndexStore trait the evaluator reads every statistic through: document
/// id mapping, per-field lengths, term statistics, term vectors and attributes. All
/// operations are read-only. `memory` holds the in-memory implementation built from a
/// JSON corpus.

use crate::errors::RankError;
use crate::posting::{DocId, PostingList};

pub mod memory;

pub use memory::{DocumentRecord, InMemoryIndex};

/// One stem of a document's term vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermVectorEntry {
    pub stem: String,
    /// Occurrences in this document field
    pub tf: u64,
    /// Documents in the collection containing the stem in this field
    pub df: u64,
}

/// The stems of one field of one document, sorted by stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermVector {
    pub field: String,
    /// Field length in tokens
    pub length: u64,
    entries: Vec<TermVectorEntry>,
}

impl TermVector {
    pub fn new(field: &str, length: u64, mut entries: Vec<TermVectorEntry>) -> Self {
        entries.sort_by(|a, b| a.stem.cmp(&b.stem));
        TermVector {
            field: field.to_string(),
            length,
            entries,
        }
    }

    pub fn stems(&self) -> &[TermVectorEntry] {
        &self.entries
    }

    pub fn lookup(&self, stem: &str) -> Option<&TermVectorEntry> {
        self.entries
            .binary_search_by(|e| e.stem.as_str().cmp(stem))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only access to an inverted index.
///
/// Implementations are expected to answer every call in O(1) or O(log n); the
/// evaluator calls them once per scored document and leaf.
pub trait IndexStore {
    /// Total number of documents.
    fn num_docs(&self) -> u64;

    /// Map an external document id to the internal one.
    fn internal_docid(&self, external_id: &str) -> Result<DocId, RankError>;

    /// Map an internal document id back to the external one.
    fn external_docid(&self, docid: DocId) -> Result<String, RankError>;

    /// Length in tokens of `field` in `docid` (0 when the field is missing).
    fn field_length(&self, field: &str, docid: DocId) -> u64;

    /// Sum of `field` lengths over the collection.
    fn sum_of_field_lengths(&self, field: &str) -> u64;

    /// Number of documents with a non-empty `field`.
    fn doc_count(&self, field: &str) -> u64;

    /// Inverted list of `term` in `field` (empty when the term is unknown).
    fn postings(&self, field: &str, term: &str) -> PostingList;

    /// Collection term frequency of `term` in `field`.
    fn total_term_freq(&self, field: &str, term: &str) -> u64;

    /// Document frequency of `term` in `field`.
    fn doc_freq(&self, field: &str, term: &str) -> u64;

    /// Term vector of `field` in `docid`, None when the document lacks the field.
    fn term_vector(&self, docid: DocId, field: &str) -> Option<TermVector>;

    /// Arbitrary document attribute (e.g., "PageRank", "spamScore", "rawUrl").
    fn attribute(&self, name: &str, docid: DocId) -> Option<String>;
}
