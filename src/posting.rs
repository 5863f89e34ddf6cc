/// Posting lists and the forward-only cursor over them
///
/// A posting list is the unit every query operator consumes: leaf terms read one from
/// the index store, proximity operators synthesize one from their arguments. Both are
/// walked through `PostingCursor`, which only ever moves forward (document index and
/// position index are monotonic).

/// Internal document identifier.
pub type DocId = u32;

/// Occurrences of one term (or proximity match) in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub docid: DocId,
    /// Strictly increasing token positions; the term frequency is their count
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(docid: DocId, positions: Vec<u32>) -> Self {
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        Posting { docid, positions }
    }

    pub fn tf(&self) -> usize {
        self.positions.len()
    }
}

/// Postings of a single term or derived operator, sorted by ascending document id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    /// Field the occurrences were counted in
    pub field: String,
    postings: Vec<Posting>,
    ctf: u64,
}

impl PostingList {
    pub fn new(field: &str) -> Self {
        PostingList {
            field: field.to_string(),
            postings: Vec::new(),
            ctf: 0,
        }
    }

    /// Append the postings for `docid`, which must be greater than every id already held.
    ///
    /// Documents without occurrences are not recorded, so `df` only counts real matches.
    pub fn append(&mut self, docid: DocId, positions: Vec<u32>) {
        debug_assert!(self.postings.last().map_or(true, |p| p.docid < docid));
        if positions.is_empty() {
            return;
        }
        self.ctf += positions.len() as u64;
        self.postings.push(Posting::new(docid, positions));
    }

    /// Document frequency.
    pub fn df(&self) -> usize {
        self.postings.len()
    }

    /// Collection term frequency.
    pub fn ctf(&self) -> u64 {
        self.ctf
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Term frequency in `docid`, 0 when absent.
    pub fn tf(&self, docid: DocId) -> usize {
        self.postings
            .binary_search_by_key(&docid, |p| p.docid)
            .map(|i| self.postings[i].tf())
            .unwrap_or(0)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.iter().map(|p| p.docid)
    }
}

/// Cursor over an owned posting list: a document index plus a position index
/// inside the current document.
#[derive(Debug, Clone)]
pub struct PostingCursor {
    list: PostingList,
    doc: usize,
    loc: usize,
}

impl PostingCursor {
    pub fn new(list: PostingList) -> Self {
        PostingCursor { list, doc: 0, loc: 0 }
    }

    pub fn list(&self) -> &PostingList {
        &self.list
    }

    pub fn current_doc(&self) -> Option<DocId> {
        self.current_posting().map(|p| p.docid)
    }

    pub fn current_posting(&self) -> Option<&Posting> {
        self.list.postings.get(self.doc)
    }

    /// Move to the first document with id >= `docid`.
    pub fn advance_to(&mut self, docid: DocId) {
        let skipped = self.list.postings[self.doc..].partition_point(|p| p.docid < docid);
        self.move_doc(skipped);
    }

    /// Move to the first document with id > `docid`.
    pub fn advance_past(&mut self, docid: DocId) {
        let skipped = self.list.postings[self.doc..].partition_point(|p| p.docid <= docid);
        self.move_doc(skipped);
    }

    fn move_doc(&mut self, skipped: usize) {
        if skipped > 0 {
            self.doc += skipped;
            self.loc = 0;
        }
    }

    /// Current position within the current document, if any remain.
    pub fn current_loc(&self) -> Option<u32> {
        self.current_posting()
            .and_then(|p| p.positions.get(self.loc).copied())
    }

    pub fn advance_loc(&mut self) {
        self.loc += 1;
    }

    /// Move to the first position in the current document that is > `pos`.
    pub fn advance_loc_past(&mut self, pos: u32) {
        if let Some(p) = self.list.postings.get(self.doc) {
            self.loc += p.positions[self.loc.min(p.positions.len())..].partition_point(|&x| x <= pos);
        }
    }
}
