/// Retrieval models and the score combination table
///
/// A model decides three things: how a leaf scores a matching document, how a score
/// operator combines the scores of its arguments, and which match rule (all / min)
/// that operator uses. Unsupported (operator, model) pairs are reported when the node
/// is scored.

use std::fmt;

use crate::config::ModelConfig;
use crate::errors::RankError;
use crate::query::Combinator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Query-term weight parameter; every query term has qtf = 1 here
    pub k3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndriParams {
    pub mu: f64,
    pub lambda: f64,
}

impl Bm25Params {
    pub fn from_config(config: &ModelConfig) -> Result<Self, RankError> {
        let p = config.bm25;
        if p.k1 < 0.0 || !(0.0..=1.0).contains(&p.b) || p.k3 < 0.0 {
            return Err(RankError::Config(format!(
                "Invalid BM25 parameters: k1={} b={} k3={}",
                p.k1, p.b, p.k3
            )));
        }
        Ok(Bm25Params { k1: p.k1, b: p.b, k3: p.k3 })
    }
}

impl IndriParams {
    pub fn from_config(config: &ModelConfig) -> Result<Self, RankError> {
        let p = config.indri;
        if p.mu < 0.0 || !(0.0..=1.0).contains(&p.lambda) {
            return Err(RankError::Config(format!(
                "Invalid Indri parameters: mu={} lambda={}",
                p.mu, p.lambda
            )));
        }
        Ok(IndriParams { mu: p.mu, lambda: p.lambda })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalModel {
    UnrankedBoolean,
    RankedBoolean,
    Bm25(Bm25Params),
    Indri(IndriParams),
}

/// How a score operator picks the next candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Documents every argument matches
    All,
    /// Documents any argument matches
    Min,
}

/// An argument's contribution to one combined score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgScore {
    Matched(f64),
    /// The argument does not match the document; carries its default score
    Missing(f64),
}

impl RetrievalModel {
    pub fn from_config(config: &ModelConfig) -> Result<Self, RankError> {
        match config.algorithm.trim().to_lowercase().as_str() {
            "unrankedboolean" => Ok(RetrievalModel::UnrankedBoolean),
            "rankedboolean" => Ok(RetrievalModel::RankedBoolean),
            "bm25" => Self::bm25(config),
            "indri" => Self::indri(config),
            "letor" => Err(RankError::Config(
                "letor rankings are produced by the letor command".to_string(),
            )),
            other => Err(RankError::Config(format!("Unknown retrieval model: {}", other))),
        }
    }

    /// BM25 from `model.bm25`, regardless of the selected algorithm.
    pub fn bm25(config: &ModelConfig) -> Result<Self, RankError> {
        Bm25Params::from_config(config).map(RetrievalModel::Bm25)
    }

    /// Indri from `model.indri`, regardless of the selected algorithm.
    pub fn indri(config: &ModelConfig) -> Result<Self, RankError> {
        IndriParams::from_config(config).map(RetrievalModel::Indri)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RetrievalModel::UnrankedBoolean => "UnrankedBoolean",
            RetrievalModel::RankedBoolean => "RankedBoolean",
            RetrievalModel::Bm25(_) => "BM25",
            RetrievalModel::Indri(_) => "Indri",
        }
    }

    /// Operator wrapped around a query that does not start with one.
    pub fn default_operator(&self) -> Combinator {
        match self {
            RetrievalModel::UnrankedBoolean | RetrievalModel::RankedBoolean => Combinator::Or,
            RetrievalModel::Bm25(_) => Combinator::Sum,
            RetrievalModel::Indri(_) => Combinator::And,
        }
    }

    /// And and Wand need every argument except under Indri, whose missing
    /// arguments contribute default scores.
    pub fn match_mode(&self, op: Combinator) -> MatchMode {
        match (op, self) {
            (Combinator::And | Combinator::Wand, RetrievalModel::Indri(_)) => MatchMode::Min,
            (Combinator::And | Combinator::Wand, _) => MatchMode::All,
            (Combinator::Or | Combinator::Sum, _) => MatchMode::Min,
        }
    }

    /// Whether non-matching arguments contribute a default score.
    pub fn uses_default_scores(&self) -> bool {
        matches!(self, RetrievalModel::Indri(_))
    }

    /// Combine argument scores for operator `op`; `weights` is only read for Wand.
    pub fn combine(
        &self,
        op: Combinator,
        args: &[ArgScore],
        weights: &[f64],
    ) -> Result<f64, RankError> {
        use RetrievalModel::*;

        let matched = || {
            args.iter().map(|a| match a {
                ArgScore::Matched(s) => *s,
                ArgScore::Missing(_) => 0.0,
            })
        };

        match (op, self) {
            (Combinator::And | Combinator::Or, UnrankedBoolean) => Ok(1.0),
            (Combinator::And, RankedBoolean) => Ok(matched().fold(f64::INFINITY, f64::min)),
            (Combinator::Or, RankedBoolean) => Ok(matched().fold(0.0, f64::max)),
            (Combinator::Sum, Bm25(_)) => Ok(matched().sum()),
            (Combinator::And, Indri(_)) => {
                let n = args.len() as f64;
                Ok(args.iter().map(|a| arg_value(a).powf(1.0 / n)).product())
            }
            (Combinator::Wand, Indri(_)) => {
                let total: f64 = weights.iter().sum();
                Ok(args
                    .iter()
                    .zip(weights)
                    .map(|(a, w)| arg_value(a).powf(w / total))
                    .product())
            }
            _ => Err(RankError::UnsupportedCombinator {
                operator: op.name(),
                model: self.name(),
            }),
        }
    }
}

fn arg_value(a: &ArgScore) -> f64 {
    match a {
        ArgScore::Matched(s) | ArgScore::Missing(s) => *s,
    }
}

impl fmt::Display for RetrievalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Leaf formulas
// ---------------------------------------------------------------------------

/// Robertson-Sparck Jones idf, floored at zero for very common terms.
pub fn bm25_idf(num_docs: f64, df: f64) -> f64 {
    ((num_docs - df + 0.5) / (df + 0.5)).ln().max(0.0)
}

/// Saturated, length-normalized term frequency.
pub fn bm25_tf_weight(tf: f64, doc_len: f64, avg_len: f64, p: &Bm25Params) -> f64 {
    let norm = if avg_len > 0.0 { doc_len / avg_len } else { 0.0 };
    tf / (tf + p.k1 * ((1.0 - p.b) + p.b * norm))
}

/// Query-side weight for a term occurring `qtf` times in the query.
pub fn bm25_user_weight(qtf: f64, p: &Bm25Params) -> f64 {
    (p.k3 + 1.0) * qtf / (p.k3 + qtf)
}

/// Full BM25 leaf score for a query term with qtf = 1.
pub fn bm25_score(tf: f64, df: f64, num_docs: f64, doc_len: f64, avg_len: f64, p: &Bm25Params) -> f64 {
    bm25_idf(num_docs, df) * bm25_tf_weight(tf, doc_len, avg_len, p) * bm25_user_weight(1.0, p)
}

/// Two-stage (Dirichlet then Jelinek-Mercer) smoothed probability of a term in a
/// document field. `tf = 0` yields the default score used for non-matching documents.
pub fn indri_score(tf: f64, doc_len: f64, ctf: f64, field_total: f64, p: &IndriParams) -> f64 {
    // Terms never seen in the field still get a small background probability.
    let ctf = if ctf == 0.0 { 0.5 } else { ctf };
    let p_mle = ctf / field_total.max(1.0);
    let score = (1.0 - p.lambda) * (tf + p.mu * p_mle) / (doc_len + p.mu) + p.lambda * p_mle;
    if score > 1.0 {
        tracing::warn!(
            score,
            tf,
            doc_len,
            ctf,
            background = p.lambda * p_mle,
            "Indri probability above 1.0"
        );
    }
    score
}
