/// Intent-aware diversification of rankings
///
/// A query's base ranking and its per-intent rankings are merged into an
/// `IntentScoreMap`, then re-ranked greedily by PM2 or xQuAD. The map lives for one
/// query only.

pub mod intents;
pub mod pm2;
pub mod xquad;

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::DiversityConfig;
use crate::errors::RankError;
use crate::index::IndexStore;
use crate::model::RetrievalModel;
use crate::query;
use crate::ranking::ScoreList;
use crate::trec::{InitialRankings, QueryLine};

pub use intents::IntentScoreMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiversityAlgorithm {
    Pm2,
    Xquad,
}

impl FromStr for DiversityAlgorithm {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pm2" => Ok(DiversityAlgorithm::Pm2),
            "xquad" => Ok(DiversityAlgorithm::Xquad),
            other => Err(RankError::Config(format!(
                "Unknown diversification algorithm: {}",
                other
            ))),
        }
    }
}

impl DiversityAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DiversityAlgorithm::Pm2 => "pm2",
            DiversityAlgorithm::Xquad => "xquad",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityParams {
    pub algorithm: DiversityAlgorithm,
    pub lambda: f64,
    pub max_input_rankings_length: usize,
    pub max_result_ranking_length: usize,
}

impl DiversityParams {
    pub fn from_config(config: &DiversityConfig) -> Result<Self, RankError> {
        if !(0.0..=1.0).contains(&config.lambda) {
            return Err(RankError::Config(format!(
                "diversity.lambda must lie in [0, 1], got {}",
                config.lambda
            )));
        }
        Ok(DiversityParams {
            algorithm: config.algorithm.parse()?,
            lambda: config.lambda,
            max_input_rankings_length: config.max_input_rankings_length,
            max_result_ranking_length: config.max_result_ranking_length,
        })
    }
}

/// One query's rankings before diversification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiversityInput {
    pub base: ScoreList,
    pub intents: BTreeMap<u32, ScoreList>,
}

impl DiversityInput {
    /// Sort every ranking and keep its first `len` entries.
    pub fn truncated(mut self, len: usize) -> Self {
        for list in std::iter::once(&mut self.base).chain(self.intents.values_mut()) {
            list.sort();
            list.truncate(len);
        }
        self
    }
}

/// Diversify one query. Without intents the (truncated) base ranking is returned.
pub fn diversify(qid: &str, input: &DiversityInput, params: &DiversityParams) -> ScoreList {
    if input.intents.is_empty() {
        tracing::warn!(qid, "No intents for query, keeping its base ranking");
        let mut base = input.base.clone();
        base.sort();
        base.truncate(params.max_result_ranking_length);
        return base;
    }

    let map = IntentScoreMap::build(&input.base, &input.intents);
    tracing::debug!(
        qid,
        candidates = map.len(),
        intents = map.intent_count(),
        normalizer = ?map.normalizer(),
        "Intent score map built"
    );
    match params.algorithm {
        DiversityAlgorithm::Pm2 => pm2::pm2(&map, params.max_result_ranking_length, params.lambda),
        DiversityAlgorithm::Xquad => {
            xquad::xquad(&map, params.max_result_ranking_length, params.lambda)
        }
    }
}

/// Inputs read back from a run file, keyed by query id.
pub fn inputs_from_rankings(rankings: InitialRankings) -> BTreeMap<String, DiversityInput> {
    let InitialRankings { base, mut intents } = rankings;
    base.into_iter()
        .map(|(qid, base)| {
            let intents = intents.remove(&qid).unwrap_or_default();
            (qid, DiversityInput { base, intents })
        })
        .collect()
}

/// Evaluate a query and each of its intent queries with `model`.
pub fn input_from_queries(
    query: &QueryLine,
    intent_queries: &[(u32, String)],
    model: &RetrievalModel,
    index: &dyn IndexStore,
) -> Result<DiversityInput, RankError> {
    let base = query::search(&query.text, model, index)?;
    let mut intents = BTreeMap::new();
    for (intent, text) in intent_queries {
        intents.insert(*intent, query::search(text, model, index)?);
    }
    Ok(DiversityInput { base, intents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocumentRecord, InMemoryIndex};
    use crate::posting::DocId;

    fn list(pairs: &[(DocId, f64)]) -> ScoreList {
        pairs.iter().copied().collect()
    }

    fn params(algorithm: DiversityAlgorithm) -> DiversityParams {
        DiversityParams {
            algorithm,
            lambda: 0.5,
            max_input_rankings_length: 100,
            max_result_ranking_length: 2,
        }
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("PM2".parse::<DiversityAlgorithm>().unwrap(), DiversityAlgorithm::Pm2);
        assert_eq!(" xQuAD".parse::<DiversityAlgorithm>().unwrap(), DiversityAlgorithm::Xquad);
        assert!(matches!("mmr".parse::<DiversityAlgorithm>(), Err(RankError::Config(_))));
    }

    #[test]
    fn test_params_from_config() {
        let mut cfg = DiversityConfig::default();
        cfg.algorithm = "pm2".to_string();
        assert_eq!(DiversityParams::from_config(&cfg).unwrap().algorithm, DiversityAlgorithm::Pm2);
        cfg.lambda = 2.0;
        assert!(DiversityParams::from_config(&cfg).is_err());
    }

    #[test]
    fn test_truncation_sorts_first() {
        let input = DiversityInput {
            base: list(&[(1, 0.1), (2, 0.9), (3, 0.5)]),
            intents: BTreeMap::from([(1, list(&[(4, 0.2), (5, 0.3)]))]),
        }
        .truncated(1);
        assert_eq!(input.base, list(&[(2, 0.9)]));
        assert_eq!(input.intents[&1], list(&[(5, 0.3)]));
    }

    #[test]
    fn test_query_without_intents_keeps_base() {
        let input = DiversityInput {
            base: list(&[(1, 0.1), (2, 0.9), (3, 0.5)]),
            intents: BTreeMap::new(),
        };
        let out = diversify("7", &input, &params(DiversityAlgorithm::Xquad));
        assert_eq!(out, list(&[(2, 0.9), (3, 0.5)]));
    }

    #[test]
    fn test_both_algorithms_fill_output() {
        let input = DiversityInput {
            base: list(&[(1, 0.9), (2, 0.8), (3, 0.7)]),
            intents: BTreeMap::from([(1, list(&[(1, 0.9)])), (2, list(&[(3, 0.6)]))]),
        };
        for alg in [DiversityAlgorithm::Pm2, DiversityAlgorithm::Xquad] {
            let out = diversify("1", &input, &params(alg));
            assert_eq!(out.len(), 2);
            let ids: Vec<_> = out.iter().map(|e| e.docid).collect();
            assert!(ids.contains(&1) && ids.contains(&3), "{} picked {:?}", alg.name(), ids);
        }
    }

    #[test]
    fn test_inputs_from_rankings_pairs_intents() {
        let ix = InMemoryIndex::from_documents(vec![DocumentRecord::new("x"), DocumentRecord::new("y")])
            .unwrap();
        let rows = crate::trec::parse_run(
            "3 Q0 x 1 0.5 r\n3.1 Q0 y 1 0.4 r\n4 Q0 y 1 0.2 r\n".as_bytes(),
            "mem",
        )
        .unwrap();
        let inputs = inputs_from_rankings(InitialRankings::from_rows(&rows, &ix).unwrap());
        assert_eq!(inputs["3"].intents.len(), 1);
        assert!(inputs["4"].intents.is_empty());
    }
}
