/// Per-query intent score map
///
/// Column 0 holds the base ranking's scores, columns 1..=m the intents' in ascending
/// intent id order. A document missing from a ranking scores 0 in that column.

use std::collections::BTreeMap;

use crate::posting::DocId;
use crate::ranking::ScoreList;

#[derive(Debug, Clone, PartialEq)]
pub struct IntentScoreMap {
    intent_ids: Vec<u32>,
    scores: BTreeMap<DocId, Vec<f64>>,
    normalizer: Option<f64>,
}

impl IntentScoreMap {
    /// Build the map over the union of all rankings' documents.
    ///
    /// When any raw score exceeds 1.0, every score is divided by the largest column
    /// sum, one constant for the whole query.
    pub fn build(base: &ScoreList, intents: &BTreeMap<u32, ScoreList>) -> Self {
        let width = intents.len() + 1;
        let mut scores: BTreeMap<DocId, Vec<f64>> = BTreeMap::new();
        let mut column_sums = vec![0.0; width];
        let mut needs_scaling = false;

        let columns = std::iter::once(base).chain(intents.values());
        for (col, ranking) in columns.enumerate() {
            for entry in ranking {
                scores.entry(entry.docid).or_insert_with(|| vec![0.0; width])[col] = entry.score;
                column_sums[col] += entry.score;
                needs_scaling |= entry.score > 1.0;
            }
        }

        let normalizer = needs_scaling
            .then(|| column_sums.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .filter(|max| *max > 0.0);
        if let Some(max) = normalizer {
            for row in scores.values_mut() {
                for s in row.iter_mut() {
                    *s /= max;
                }
            }
        }

        IntentScoreMap {
            intent_ids: intents.keys().copied().collect(),
            scores,
            normalizer,
        }
    }

    /// Number of intents (m), excluding the base column.
    pub fn intent_count(&self) -> usize {
        self.intent_ids.len()
    }

    pub fn intent_ids(&self) -> &[u32] {
        &self.intent_ids
    }

    /// Number of candidate documents.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Candidates in ascending document id order; each row has m + 1 columns.
    pub fn candidates(&self) -> impl Iterator<Item = (DocId, &[f64])> + '_ {
        self.scores.iter().map(|(d, row)| (*d, row.as_slice()))
    }

    pub fn row(&self, docid: DocId) -> Option<&[f64]> {
        self.scores.get(&docid).map(Vec::as_slice)
    }

    /// The constant scores were divided by, if scaling happened.
    pub fn normalizer(&self) -> Option<f64> {
        self.normalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(pairs: &[(DocId, f64)]) -> ScoreList {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_probabilities_are_kept_as_is() {
        let base = list(&[(1, 0.9), (2, 0.5)]);
        let intents = BTreeMap::from([(1, list(&[(2, 0.7)])), (2, list(&[(3, 0.2)]))]);
        let map = IntentScoreMap::build(&base, &intents);
        assert_eq!(map.normalizer(), None);
        assert_eq!(map.intent_count(), 2);
        assert_eq!(map.len(), 3);
        assert_eq!(map.row(2), Some(&[0.5, 0.7, 0.0][..]));
        assert_eq!(map.row(3), Some(&[0.0, 0.0, 0.2][..]));
    }

    #[test]
    fn test_scaling_uses_one_global_constant() {
        // Column sums: base 3.0 + 1.0 = 4.0, intent 1: 2.0, intent 2: 0.5
        let base = list(&[(1, 3.0), (2, 1.0)]);
        let intents = BTreeMap::from([(1, list(&[(1, 2.0)])), (4, list(&[(2, 0.5)]))]);
        let map = IntentScoreMap::build(&base, &intents);
        assert_eq!(map.normalizer(), Some(4.0));
        assert_eq!(map.row(1), Some(&[0.75, 0.5, 0.0][..]));
        assert_eq!(map.row(2), Some(&[0.25, 0.0, 0.125][..]));
        assert_eq!(map.intent_ids(), &[1, 4]);
    }

    #[test]
    fn test_candidates_in_docid_order() {
        let base = list(&[(9, 0.1), (3, 0.2), (5, 0.3)]);
        let map = IntentScoreMap::build(&base, &BTreeMap::new());
        let ids: Vec<_> = map.candidates().map(|(d, _)| d).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
