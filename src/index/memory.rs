/// In-memory IndexStore built from a list of documents
///
/// Documents carry an external id, named text fields and string attributes. Field text
/// is lowercased and split on non-alphanumeric characters; positions are token offsets
/// within the field. Internal ids are assigned in input order, so every posting list is
/// built already sorted.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::RankError;
use crate::posting::{DocId, PostingList};

use super::{IndexStore, TermVector, TermVectorEntry};

/// One document of a JSON corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl DocumentRecord {
    pub fn new(id: &str) -> Self {
        DocumentRecord {
            id: id.to_string(),
            fields: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: &str, text: &str) -> Self {
        self.fields.insert(field.to_string(), text.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct Corpus {
    documents: Vec<DocumentRecord>,
}

/// Lowercase `text` and split it into alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[derive(Debug, Default)]
struct FieldIndex {
    inverted: HashMap<String, PostingList>,
    /// Per document (stem, tf), in stem order; indexed by internal document id
    forward: Vec<Vec<(String, u64)>>,
    /// Indexed by internal document id
    lengths: Vec<u64>,
    total_length: u64,
    doc_count: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    external_ids: Vec<String>,
    internal_ids: HashMap<String, DocId>,
    fields: HashMap<String, FieldIndex>,
    attributes: Vec<BTreeMap<String, String>>,
}

impl InMemoryIndex {
    /// Build an index over `documents`; duplicate external ids are rejected.
    pub fn from_documents(documents: Vec<DocumentRecord>) -> Result<Self, RankError> {
        let mut index = InMemoryIndex::default();
        let num_docs = documents.len();

        for (i, doc) in documents.into_iter().enumerate() {
            let docid = i as DocId;
            if index.internal_ids.insert(doc.id.clone(), docid).is_some() {
                return Err(RankError::Index(format!("Duplicate document id: {}", doc.id)));
            }
            index.external_ids.push(doc.id);

            for (field, text) in &doc.fields {
                let entry = index.fields.entry(field.clone()).or_default();
                if entry.lengths.is_empty() {
                    entry.lengths = vec![0; num_docs];
                    entry.forward = vec![Vec::new(); num_docs];
                }
                let tokens = tokenize(text);
                if tokens.is_empty() {
                    continue;
                }

                let mut positions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
                for (pos, token) in tokens.iter().enumerate() {
                    positions.entry(token.as_str()).or_default().push(pos as u32);
                }
                for (term, locs) in positions {
                    entry.forward[i].push((term.to_string(), locs.len() as u64));
                    entry
                        .inverted
                        .entry(term.to_string())
                        .or_insert_with(|| PostingList::new(field))
                        .append(docid, locs);
                }

                entry.lengths[i] = tokens.len() as u64;
                entry.total_length += tokens.len() as u64;
                entry.doc_count += 1;
            }
            index.attributes.push(doc.attributes);
        }

        Ok(index)
    }

    /// Load a `{"documents": [...]}` corpus file.
    pub fn load(path: &Path) -> Result<Self, RankError> {
        let file = std::fs::File::open(path).map_err(|e| RankError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let corpus: Corpus = serde_json::from_reader(reader)
            .map_err(|e| RankError::Index(format!("Unreadable corpus {}: {}", path.display(), e)))?;
        let index = Self::from_documents(corpus.documents)?;
        tracing::info!(
            path = %path.display(),
            documents = index.external_ids.len(),
            fields = index.fields.len(),
            "Index loaded"
        );
        Ok(index)
    }
}

impl IndexStore for InMemoryIndex {
    fn num_docs(&self) -> u64 {
        self.external_ids.len() as u64
    }

    fn internal_docid(&self, external_id: &str) -> Result<DocId, RankError> {
        self.internal_ids
            .get(external_id)
            .copied()
            .ok_or_else(|| RankError::Index(format!("Unknown external document id: {}", external_id)))
    }

    fn external_docid(&self, docid: DocId) -> Result<String, RankError> {
        self.external_ids
            .get(docid as usize)
            .cloned()
            .ok_or_else(|| RankError::Index(format!("Unknown internal document id: {}", docid)))
    }

    fn field_length(&self, field: &str, docid: DocId) -> u64 {
        self.fields
            .get(field)
            .and_then(|f| f.lengths.get(docid as usize))
            .copied()
            .unwrap_or(0)
    }

    fn sum_of_field_lengths(&self, field: &str) -> u64 {
        self.fields.get(field).map_or(0, |f| f.total_length)
    }

    fn doc_count(&self, field: &str) -> u64 {
        self.fields.get(field).map_or(0, |f| f.doc_count)
    }

    fn postings(&self, field: &str, term: &str) -> PostingList {
        self.fields
            .get(field)
            .and_then(|f| f.inverted.get(term))
            .cloned()
            .unwrap_or_else(|| PostingList::new(field))
    }

    fn total_term_freq(&self, field: &str, term: &str) -> u64 {
        self.fields
            .get(field)
            .and_then(|f| f.inverted.get(term))
            .map_or(0, |l| l.ctf())
    }

    fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.fields
            .get(field)
            .and_then(|f| f.inverted.get(term))
            .map_or(0, |l| l.df() as u64)
    }

    fn term_vector(&self, docid: DocId, field: &str) -> Option<TermVector> {
        let index = self.fields.get(field)?;
        let length = index.lengths.get(docid as usize).copied().unwrap_or(0);
        if length == 0 {
            return None;
        }
        let entries = index
            .forward
            .get(docid as usize)?
            .iter()
            .map(|(stem, tf)| TermVectorEntry {
                stem: stem.clone(),
                tf: *tf,
                df: index.inverted.get(stem).map_or(0, |l| l.df() as u64),
            })
            .collect();
        Some(TermVector::new(field, length, entries))
    }

    fn attribute(&self, name: &str, docid: DocId) -> Option<String> {
        self.attributes
            .get(docid as usize)
            .and_then(|a| a.get(name))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> InMemoryIndex {
        InMemoryIndex::from_documents(vec![
            DocumentRecord::new("d0")
                .with_field("body", "The quick brown fox, the end.")
                .with_field("title", "Fox")
                .with_attribute("PageRank", "0.25"),
            DocumentRecord::new("d1").with_field("body", "brown dog"),
        ])
        .unwrap()
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("The quick, BROWN fox."), vec!["the", "quick", "brown", "fox"]);
        assert!(tokenize(" ,. ").is_empty());
    }

    #[test]
    fn test_id_mapping() {
        let ix = index();
        assert_eq!(ix.num_docs(), 2);
        assert_eq!(ix.internal_docid("d1").unwrap(), 1);
        assert_eq!(ix.external_docid(0).unwrap(), "d0");
        assert!(ix.internal_docid("nope").is_err());
        assert!(ix.external_docid(7).is_err());
    }

    #[test]
    fn test_field_statistics() {
        let ix = index();
        assert_eq!(ix.field_length("body", 0), 6);
        assert_eq!(ix.field_length("title", 1), 0);
        assert_eq!(ix.sum_of_field_lengths("body"), 8);
        assert_eq!(ix.doc_count("title"), 1);
        assert_eq!(ix.doc_count("body"), 2);
    }

    #[test]
    fn test_postings_carry_positions() {
        let ix = index();
        let the = ix.postings("body", "the");
        assert_eq!(the.df(), 1);
        assert_eq!(the.postings()[0].positions, vec![0, 4]);
        assert_eq!(ix.total_term_freq("body", "brown"), 2);
        assert_eq!(ix.doc_freq("body", "brown"), 2);
        assert!(ix.postings("body", "cat").is_empty());
    }

    #[test]
    fn test_term_vector_and_attributes() {
        let ix = index();
        let tv = ix.term_vector(0, "body").unwrap();
        assert_eq!(tv.length, 6);
        assert_eq!(tv.lookup("the").map(|e| e.tf), Some(2));
        assert_eq!(tv.lookup("brown").map(|e| e.df), Some(2));
        assert!(ix.term_vector(1, "title").is_none());
        assert!(ix.term_vector(9, "body").is_none());

        // Only the document's own stems, in stem order
        let stems: Vec<_> = tv.stems().iter().map(|e| e.stem.as_str()).collect();
        assert_eq!(stems, vec!["brown", "end", "fox", "quick", "the"]);
        let dog = ix.term_vector(1, "body").unwrap();
        assert_eq!(dog.stems().len(), 2);
        assert_eq!(dog.lookup("dog").map(|e| (e.tf, e.df)), Some((1, 1)));
        assert_eq!(ix.attribute("PageRank", 0).as_deref(), Some("0.25"));
        assert_eq!(ix.attribute("PageRank", 1), None);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = InMemoryIndex::from_documents(vec![
            DocumentRecord::new("x"),
            DocumentRecord::new("x"),
        ])
        .unwrap_err();
        assert!(matches!(err, RankError::Index(_)));
    }
}
