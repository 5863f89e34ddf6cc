/// Pseudo-relevance feedback
///
/// Mines the body term vectors of the top documents of an initial ranking for
/// expansion terms, then combines the expansion clause with the original query.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use crate::config::FeedbackConfig;
use crate::errors::RankError;
use crate::index::IndexStore;
use crate::query::{Combinator, QueryNode, DEFAULT_FIELD};
use crate::ranking::ScoreList;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackParams {
    pub docs: usize,
    pub terms: usize,
    pub mu: f64,
    pub orig_weight: f64,
}

impl FeedbackParams {
    pub fn from_config(config: &FeedbackConfig) -> Result<Self, RankError> {
        if !(0.0..=1.0).contains(&config.orig_weight) {
            return Err(RankError::Config(format!(
                "feedback.orig_weight must lie in [0, 1], got {}",
                config.orig_weight
            )));
        }
        if config.mu < 0.0 {
            return Err(RankError::Config(format!(
                "feedback.mu must be non-negative, got {}",
                config.mu
            )));
        }
        Ok(FeedbackParams {
            docs: config.docs,
            terms: config.terms,
            mu: config.mu,
            orig_weight: config.orig_weight,
        })
    }
}

/// Weighted expansion terms, best first, weights rounded to 4 decimals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    terms: Vec<(String, f64)>,
}

impl Expansion {
    pub fn terms(&self) -> &[(String, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The expansion as a `#wand` over body terms.
    pub fn to_query(&self) -> Result<QueryNode, RankError> {
        QueryNode::wand(
            self.terms
                .iter()
                .map(|(t, w)| (*w, QueryNode::term(t, DEFAULT_FIELD)))
                .collect(),
        )
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#wand (")?;
        for (term, weight) in &self.terms {
            write!(f, " {:.4} {}", weight, term)?;
        }
        write!(f, " )")
    }
}

/// Stems that cannot be written back into a query.
fn expressible(stem: &str) -> bool {
    stem.chars().any(|c| c.is_alphanumeric()) && !stem.contains(['.', ','])
}

struct Candidate {
    score: f64,
    term: String,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score wins; on ties the alphabetically smaller term does.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.term.cmp(&self.term))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Select expansion terms from the top `params.docs` documents of a sorted ranking.
pub fn expand(
    ranking: &ScoreList,
    index: &dyn IndexStore,
    params: &FeedbackParams,
) -> Result<Expansion, RankError> {
    let field_total = index.sum_of_field_lengths(DEFAULT_FIELD) as f64;
    let top = &ranking.entries()[..params.docs.min(ranking.len())];

    let vectors: Vec<_> = top
        .iter()
        .filter_map(|e| index.term_vector(e.docid, DEFAULT_FIELD).map(|tv| (e.score, tv)))
        .collect();

    // Collection probability per candidate term.
    let mut p_mle: HashMap<&str, f64> = HashMap::new();
    for (_, tv) in &vectors {
        for entry in tv.stems() {
            if expressible(&entry.stem) && !p_mle.contains_key(entry.stem.as_str()) {
                let ctf = index.total_term_freq(DEFAULT_FIELD, &entry.stem) as f64;
                p_mle.insert(entry.stem.as_str(), ctf / field_total.max(1.0));
            }
        }
    }

    // Every candidate collects a contribution from every top document, present or not.
    let mut scores: HashMap<&str, f64> = HashMap::with_capacity(p_mle.len());
    for (doc_score, tv) in &vectors {
        let doc_len = tv.length as f64;
        for (&term, &p) in &p_mle {
            let tf = tv.lookup(term).map_or(0.0, |e| e.tf as f64);
            let contribution =
                (1.0 / p).ln() * (tf + params.mu * p) / (doc_len + params.mu) * doc_score;
            *scores.entry(term).or_insert(0.0) += contribution;
        }
    }

    let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(params.terms + 1);
    for (term, score) in scores {
        heap.push(Reverse(Candidate {
            score,
            term: term.to_string(),
        }));
        if heap.len() > params.terms {
            heap.pop();
        }
    }

    // into_sorted_vec on Reverse yields best first
    let terms = heap
        .into_sorted_vec()
        .into_iter()
        .map(|Reverse(c)| (c.term, (c.score * 10_000.0).round() / 10_000.0))
        .filter(|(_, w)| *w > 0.0)
        .collect();
    Ok(Expansion { terms })
}

/// `#wand( w original (1-w) expansion )`; either side alone at the extremes.
pub fn combine(
    original: QueryNode,
    expansion: &Expansion,
    orig_weight: f64,
) -> Result<QueryNode, RankError> {
    if expansion.is_empty() || orig_weight >= 1.0 {
        return Ok(original);
    }
    let expanded = expansion.to_query()?;
    if orig_weight <= 0.0 {
        return Ok(expanded);
    }
    QueryNode::wand(vec![(orig_weight, original), (1.0 - orig_weight, expanded)])
}

/// Parse `text` under `default_op` and combine it with `expansion`.
pub fn expanded_query(
    text: &str,
    default_op: Combinator,
    expansion: &Expansion,
    orig_weight: f64,
) -> Result<QueryNode, RankError> {
    let original = crate::query::parse_with_default(text, default_op)?;
    combine(original, expansion, orig_weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocumentRecord, InMemoryIndex};
    use crate::query::Operator;

    fn index() -> InMemoryIndex {
        InMemoryIndex::from_documents(vec![
            DocumentRecord::new("a").with_field("body", "jaguar cat cat jungle"),
            DocumentRecord::new("b").with_field("body", "jaguar car engine"),
            DocumentRecord::new("c").with_field("body", "cat food"),
            DocumentRecord::new("d").with_field("body", "engine oil engine"),
        ])
        .unwrap()
    }

    fn params(docs: usize, terms: usize) -> FeedbackParams {
        FeedbackParams { docs, terms, mu: 0.0, orig_weight: 0.5 }
    }

    #[test]
    fn test_expansion_prefers_terms_of_top_documents() {
        let ix = index();
        let ranking: ScoreList = vec![(0, 1.0), (1, 0.5), (3, 0.1)].into_iter().collect();
        let exp = expand(&ranking, &ix, &params(2, 3)).unwrap();
        let terms: Vec<_> = exp.terms().iter().map(|(t, _)| t.as_str()).collect();
        // "jaguar" appears in both top documents; "oil" only outside them
        assert_eq!(terms, vec!["jaguar", "cat", "jungle"]);
        assert!(!terms.contains(&"oil"));
        assert!(exp.terms().windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_absent_terms_still_contribute_with_mu() {
        let ix = index();
        let ranking: ScoreList = vec![(0, 1.0), (2, 1.0)].into_iter().collect();
        let p = FeedbackParams { mu: 10.0, ..params(2, 10) };
        let exp = expand(&ranking, &ix, &p).unwrap();
        assert_eq!(exp.terms().len(), 4);
        // Same ctf; food occurs in the shorter document
        let jungle = exp.terms().iter().find(|(t, _)| t == "jungle").unwrap().1;
        let food = exp.terms().iter().find(|(t, _)| t == "food").unwrap().1;
        assert!(food > jungle);
    }

    #[test]
    fn test_clause_format() {
        let exp = Expansion {
            terms: vec![("cat".to_string(), 0.123456), ("dog".to_string(), 0.1)],
        };
        assert_eq!(exp.to_string(), "#wand ( 0.1235 cat 0.1000 dog )");
    }

    #[test]
    fn test_combine_weights() {
        let orig = QueryNode::and(vec![QueryNode::term("jaguar", "body")]);
        let exp = Expansion { terms: vec![("cat".to_string(), 0.5)] };

        let both = combine(orig.clone(), &exp, 0.7).unwrap();
        match both.op() {
            Operator::Wand { weights } => {
                assert!((weights[0] - 0.7).abs() < 1e-12);
                assert!((weights[1] - 0.3).abs() < 1e-12);
            }
            other => panic!("unexpected operator {:?}", other),
        }
        assert_eq!(combine(orig.clone(), &exp, 1.0).unwrap(), orig);
        assert_eq!(combine(orig.clone(), &exp, 0.0).unwrap(), exp.to_query().unwrap());
        assert_eq!(combine(orig.clone(), &Expansion::default(), 0.3).unwrap(), orig);
    }

    #[test]
    fn test_unexpressible_stems_skipped() {
        assert!(expressible("cat"));
        assert!(!expressible("..."));
        assert!(!expressible("u.s"));
        assert!(!expressible("1,000"));
    }

    #[test]
    fn test_orig_weight_validated() {
        let mut cfg = FeedbackConfig::default();
        cfg.orig_weight = 1.5;
        assert!(FeedbackParams::from_config(&cfg).is_err());
    }
}
