/// xQuAD: relevance plus coverage of intents not yet satisfied
///
/// Intents are weighted uniformly. After each pick every intent's penalty is
/// multiplied by `1 - score(d, intent)`, so intents already covered by earlier
/// documents count for less.

use std::collections::BTreeSet;

use crate::posting::DocId;
use crate::ranking::ScoreList;

use super::intents::IntentScoreMap;

pub fn xquad(map: &IntentScoreMap, output_length: usize, lambda: f64) -> ScoreList {
    let m = map.intent_count();
    let mut out = ScoreList::new();
    if m == 0 {
        return out;
    }

    let weight = 1.0 / m as f64;
    let mut penalties = vec![1.0; m];
    let mut placed: BTreeSet<DocId> = BTreeSet::new();

    while out.len() < output_length {
        let mut best: Option<(DocId, f64)> = None;
        for (docid, row) in map.candidates() {
            if placed.contains(&docid) {
                continue;
            }
            let coverage: f64 = penalties
                .iter()
                .zip(&row[1..])
                .map(|(p, s)| weight * p * s)
                .sum();
            let score = (1.0 - lambda) * row[0] + lambda * coverage;
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((docid, score));
            }
        }

        let Some((docid, score)) = best else {
            break;
        };
        placed.insert(docid);
        out.push(docid, score);

        if let Some(row) = map.row(docid) {
            for (p, s) in penalties.iter_mut().zip(&row[1..]) {
                *p *= 1.0 - s;
            }
        }
    }

    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn list(pairs: &[(DocId, f64)]) -> ScoreList {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_covered_intent_is_discounted() {
        // Doc 1 covers intent 1 with 0.8; docs 2 and 3 are equally good on intents 1 and 2.
        let base = list(&[(1, 0.5), (2, 0.4), (3, 0.4)]);
        let intents = BTreeMap::from([
            (1, list(&[(1, 0.8), (2, 0.6)])),
            (2, list(&[(3, 0.6)])),
        ]);
        let map = IntentScoreMap::build(&base, &intents);
        let out = xquad(&map, 3, 0.5);
        let order: Vec<_> = out.iter().map(|e| e.docid).collect();
        assert_eq!(order, vec![1, 3, 2]);

        // Picking doc 1 left intent 1 with a 0.2 penalty; intent 2 was untouched
        let doc2 = out.score_of(2).unwrap();
        let doc3 = out.score_of(3).unwrap();
        assert!(doc3 > doc2);
        assert!((doc3 - (0.5 * 0.4 + 0.5 * 0.5 * 0.6)).abs() < 1e-12);
    }

    #[test]
    fn test_lambda_zero_is_the_base_ranking() {
        let base = list(&[(1, 0.2), (2, 0.9), (3, 0.5)]);
        let intents = BTreeMap::from([(1, list(&[(1, 0.99)]))]);
        let map = IntentScoreMap::build(&base, &intents);
        let order: Vec<_> = xquad(&map, 3, 0.0).iter().map(|e| e.docid).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_output_bounded_by_candidates_and_length() {
        let base = list(&[(1, 0.2), (2, 0.9), (3, 0.5)]);
        let intents = BTreeMap::from([(1, list(&[(4, 0.3)]))]);
        let map = IntentScoreMap::build(&base, &intents);
        assert_eq!(xquad(&map, 2, 0.5).len(), 2);
        assert_eq!(xquad(&map, 10, 0.5).len(), 4);
    }
}
