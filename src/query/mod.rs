/// Query operator trees and their evaluation
///
/// A query is an immutable tree of operators: leaf terms and proximity operators produce
/// posting lists, score operators (And, Or, Sum, Wand) combine the scores of their
/// arguments under the session's retrieval model.
///
/// - `cursor`: shared match combinators (all / min / first) over forward-only cursors
/// - `proximity`: Near and Window posting-list synthesis
/// - `eval`: runtime scoring tree and the document-at-a-time evaluation loop
/// - `parser`: operator syntax (`#and( a b.title )`) to QueryNode

pub mod cursor;
pub mod eval;
pub mod parser;
pub mod proximity;

use std::fmt;

use crate::errors::RankError;

pub use eval::{evaluate, search};
pub use parser::{parse, parse_with_default};

/// Field searched when a term carries no `.field` suffix.
pub const DEFAULT_FIELD: &str = "body";

/// Score operators: the nodes whose score depends on the retrieval model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    And,
    Or,
    Sum,
    Wand,
}

impl Combinator {
    pub fn name(&self) -> &'static str {
        match self {
            Combinator::And => "#and",
            Combinator::Or => "#or",
            Combinator::Sum => "#sum",
            Combinator::Wand => "#wand",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Term { term: String, field: String },
    And,
    Or,
    Sum,
    /// One strictly positive weight per argument
    Wand { weights: Vec<f64> },
    /// Ordered occurrences, each consecutive gap at most `distance`
    Near { distance: u32 },
    /// Unordered occurrences spanning fewer than `distance` positions
    Window { distance: u32 },
}

/// A node of the operator tree. The tree owns its children and never changes after
/// construction; constructors enforce the weight invariants of Wand.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryNode {
    op: Operator,
    args: Vec<QueryNode>,
}

impl QueryNode {
    pub fn term(term: &str, field: &str) -> Self {
        QueryNode {
            op: Operator::Term {
                term: term.to_string(),
                field: field.to_string(),
            },
            args: Vec::new(),
        }
    }

    pub fn combine(op: Combinator, args: Vec<QueryNode>) -> Result<Self, RankError> {
        let op = match op {
            Combinator::And => Operator::And,
            Combinator::Or => Operator::Or,
            Combinator::Sum => Operator::Sum,
            Combinator::Wand => {
                return Err(RankError::Query("#wand requires weights".to_string()));
            }
        };
        Ok(QueryNode { op, args })
    }

    pub fn and(args: Vec<QueryNode>) -> Self {
        QueryNode { op: Operator::And, args }
    }

    pub fn or(args: Vec<QueryNode>) -> Self {
        QueryNode { op: Operator::Or, args }
    }

    pub fn sum(args: Vec<QueryNode>) -> Self {
        QueryNode { op: Operator::Sum, args }
    }

    pub fn wand(weighted: Vec<(f64, QueryNode)>) -> Result<Self, RankError> {
        if let Some((w, _)) = weighted.iter().find(|(w, _)| !(w.is_finite() && *w > 0.0)) {
            return Err(RankError::Query(format!(
                "#wand weights must be positive, got {}",
                w
            )));
        }
        let (weights, args) = weighted.into_iter().unzip();
        Ok(QueryNode {
            op: Operator::Wand { weights },
            args,
        })
    }

    pub fn near(distance: u32, args: Vec<QueryNode>) -> Self {
        QueryNode {
            op: Operator::Near { distance },
            args,
        }
    }

    pub fn window(distance: u32, args: Vec<QueryNode>) -> Self {
        QueryNode {
            op: Operator::Window { distance },
            args,
        }
    }

    pub fn op(&self) -> &Operator {
        &self.op
    }

    pub fn args(&self) -> &[QueryNode] {
        &self.args
    }

    /// The score combinator of this node, None for terms and proximity operators.
    pub fn combinator(&self) -> Option<Combinator> {
        match self.op {
            Operator::And => Some(Combinator::And),
            Operator::Or => Some(Combinator::Or),
            Operator::Sum => Some(Combinator::Sum),
            Operator::Wand { .. } => Some(Combinator::Wand),
            _ => None,
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            Operator::Term { term, field } => return write!(f, "{}.{}", term, field),
            Operator::Near { distance } => write!(f, "#near/{}(", distance)?,
            Operator::Window { distance } => write!(f, "#window/{}(", distance)?,
            Operator::Wand { weights } => {
                write!(f, "#wand(")?;
                for (w, arg) in weights.iter().zip(&self.args) {
                    write!(f, " {} {}", w, arg)?;
                }
                return write!(f, " )");
            }
            _ => {
                if let Some(c) = self.combinator() {
                    write!(f, "{}(", c)?;
                }
            }
        }
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, " )")
    }
}
