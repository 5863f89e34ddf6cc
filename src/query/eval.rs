/// Document-at-a-time evaluation of an operator tree
///
/// `ScoreNode` is the runtime twin of `QueryNode`: leaves own a cursor over their
/// (possibly synthesized) posting list, score operators own their children and a match
/// rule fixed by the retrieval model when the tree is built. Scoring a node is only
/// valid for the document its last `next_match` returned.

use crate::errors::RankError;
use crate::index::IndexStore;
use crate::model::{self, ArgScore, MatchMode, RetrievalModel};
use crate::posting::{DocId, PostingCursor};
use crate::ranking::ScoreList;

use super::cursor::{advance_all_past, match_all, match_min, DocCursor};
use super::proximity::posting_list;
use super::{parser, Combinator, QueryNode};

/// Session-wide scoring inputs.
#[derive(Clone, Copy)]
pub struct Scorer<'a> {
    pub model: &'a RetrievalModel,
    pub index: &'a dyn IndexStore,
}

impl Scorer<'_> {
    fn leaf_score(&self, cursor: &PostingCursor) -> f64 {
        let Some(posting) = cursor.current_posting() else {
            return 0.0;
        };
        let list = cursor.list();
        let tf = posting.tf() as f64;
        let field = list.field.as_str();
        match self.model {
            RetrievalModel::UnrankedBoolean => 1.0,
            RetrievalModel::RankedBoolean => tf,
            RetrievalModel::Bm25(p) => {
                let doc_count = self.index.doc_count(field) as f64;
                let avg_len = if doc_count > 0.0 {
                    self.index.sum_of_field_lengths(field) as f64 / doc_count
                } else {
                    0.0
                };
                model::bm25_score(
                    tf,
                    list.df() as f64,
                    self.index.num_docs() as f64,
                    self.index.field_length(field, posting.docid) as f64,
                    avg_len,
                    p,
                )
            }
            RetrievalModel::Indri(p) => model::indri_score(
                tf,
                self.index.field_length(field, posting.docid) as f64,
                list.ctf() as f64,
                self.index.sum_of_field_lengths(field) as f64,
                p,
            ),
        }
    }

    fn leaf_default(&self, cursor: &PostingCursor, docid: DocId) -> f64 {
        let RetrievalModel::Indri(p) = self.model else {
            return 0.0;
        };
        let field = cursor.list().field.as_str();
        model::indri_score(
            0.0,
            self.index.field_length(field, docid) as f64,
            cursor.list().ctf() as f64,
            self.index.sum_of_field_lengths(field) as f64,
            p,
        )
    }
}

enum NodeKind {
    Leaf(PostingCursor),
    Combine {
        op: Combinator,
        mode: MatchMode,
        weights: Vec<f64>,
        args: Vec<ScoreNode>,
    },
}

pub struct ScoreNode {
    kind: NodeKind,
}

impl ScoreNode {
    pub fn build(
        node: &QueryNode,
        model: &RetrievalModel,
        index: &dyn IndexStore,
    ) -> Result<Self, RankError> {
        let Some(op) = node.combinator() else {
            let list = posting_list(node, index)?;
            return Ok(ScoreNode {
                kind: NodeKind::Leaf(PostingCursor::new(list)),
            });
        };
        let weights = match node.op() {
            super::Operator::Wand { weights } => weights.clone(),
            _ => Vec::new(),
        };
        let args = node
            .args()
            .iter()
            .map(|arg| ScoreNode::build(arg, model, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScoreNode {
            kind: NodeKind::Combine {
                op,
                mode: model.match_mode(op),
                weights,
                args,
            },
        })
    }

    /// Score of the document this node currently matches.
    pub fn score(&mut self, scorer: &Scorer<'_>) -> Result<f64, RankError> {
        let Some(docid) = self.next_match() else {
            return Ok(0.0);
        };
        match &mut self.kind {
            NodeKind::Leaf(cursor) => Ok(scorer.leaf_score(cursor)),
            NodeKind::Combine { op, weights, args, .. } => {
                let with_defaults = scorer.model.uses_default_scores();
                let mut parts = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    if arg.next_match() == Some(docid) {
                        parts.push(ArgScore::Matched(arg.score(scorer)?));
                    } else if with_defaults {
                        parts.push(ArgScore::Missing(arg.default_score(scorer, docid)));
                    } else {
                        parts.push(ArgScore::Missing(0.0));
                    }
                }
                scorer.model.combine(*op, &parts, weights)
            }
        }
    }

    /// Indri score of `docid` for a node that does not match it.
    pub fn default_score(&self, scorer: &Scorer<'_>, docid: DocId) -> f64 {
        match &self.kind {
            NodeKind::Leaf(cursor) => scorer.leaf_default(cursor, docid),
            NodeKind::Combine { weights, args, .. } => {
                if args.is_empty() {
                    return 0.0;
                }
                if weights.is_empty() {
                    let n = args.len() as f64;
                    args.iter()
                        .map(|a| a.default_score(scorer, docid).powf(1.0 / n))
                        .product()
                } else {
                    let total: f64 = weights.iter().sum();
                    args.iter()
                        .zip(weights)
                        .map(|(a, w)| a.default_score(scorer, docid).powf(w / total))
                        .product()
                }
            }
        }
    }
}

impl DocCursor for ScoreNode {
    fn next_match(&mut self) -> Option<DocId> {
        match &mut self.kind {
            NodeKind::Leaf(cursor) => cursor.current_doc(),
            NodeKind::Combine { mode, args, .. } => match mode {
                MatchMode::All => match_all(args),
                MatchMode::Min => match_min(args),
            },
        }
    }

    fn advance_to(&mut self, docid: DocId) {
        match &mut self.kind {
            NodeKind::Leaf(cursor) => cursor.advance_to(docid),
            NodeKind::Combine { args, .. } => {
                for arg in args.iter_mut() {
                    arg.advance_to(docid);
                }
            }
        }
    }

    fn advance_past(&mut self, docid: DocId) {
        match &mut self.kind {
            NodeKind::Leaf(cursor) => cursor.advance_past(docid),
            NodeKind::Combine { args, .. } => advance_all_past(args, docid),
        }
    }
}

/// Score every document matched by `query`. The result is unsorted, in document order.
pub fn evaluate(
    query: &QueryNode,
    model: &RetrievalModel,
    index: &dyn IndexStore,
) -> Result<ScoreList, RankError> {
    let mut root = ScoreNode::build(query, model, index)?;
    let scorer = Scorer { model, index };
    let mut results = ScoreList::new();

    while let Some(docid) = root.next_match() {
        let score = root.score(&scorer)?;
        results.push(docid, score);
        root.advance_past(docid);
    }
    Ok(results)
}

/// Parse `text` under the model's default operator, evaluate it and sort the result.
pub fn search(
    text: &str,
    model: &RetrievalModel,
    index: &dyn IndexStore,
) -> Result<ScoreList, RankError> {
    let query = parser::parse_with_default(text, model.default_operator())?;
    tracing::debug!(query = %query, model = %model, "Evaluating query");
    let mut results = evaluate(&query, model, index)?;
    results.sort();
    Ok(results)
}
