/// Ranked result lists
///
/// A `ScoreList` holds (internal docid, score) pairs. Evaluation produces them in
/// document order; `sort` puts them in ranking order: score descending, ties broken
/// by ascending document id so output is deterministic.

use std::cmp::Ordering;

use crate::posting::DocId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEntry {
    pub docid: DocId,
    pub score: f64,
}

/// Ranking order.
pub fn by_rank(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.docid.cmp(&b.docid))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreList {
    entries: Vec<ScoreEntry>,
}

impl ScoreList {
    pub fn new() -> Self {
        ScoreList::default()
    }

    pub fn push(&mut self, docid: DocId, score: f64) {
        self.entries.push(ScoreEntry { docid, score });
    }

    pub fn sort(&mut self) {
        self.entries.sort_by(by_rank);
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoreEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score of `docid`, if the list holds it.
    pub fn score_of(&self, docid: DocId) -> Option<f64> {
        self.entries.iter().find(|e| e.docid == docid).map(|e| e.score)
    }
}

impl FromIterator<(DocId, f64)> for ScoreList {
    fn from_iter<I: IntoIterator<Item = (DocId, f64)>>(iter: I) -> Self {
        ScoreList {
            entries: iter
                .into_iter()
                .map(|(docid, score)| ScoreEntry { docid, score })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ScoreList {
    type Item = &'a ScoreEntry;
    type IntoIter = std::slice::Iter<'a, ScoreEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_score_then_docid() {
        let mut list: ScoreList = vec![(4, 0.5), (2, 0.9), (1, 0.5), (3, -1.0)].into_iter().collect();
        list.sort();
        let order: Vec<_> = list.iter().map(|e| e.docid).collect();
        assert_eq!(order, vec![2, 1, 4, 3]);
    }

    #[test]
    fn test_truncate_and_lookup() {
        let mut list: ScoreList = vec![(1, 3.0), (2, 2.0), (3, 1.0)].into_iter().collect();
        list.truncate(2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.score_of(2), Some(2.0));
        assert_eq!(list.score_of(3), None);
    }
}
