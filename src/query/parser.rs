/// Operator query syntax
///
/// ```text
/// #and( apple pie.title #near/3( apple tart ) )
/// #wand( 0.7 apple 0.3 #window/8( pie crust ) )
/// ```
///
/// Operator names are case-insensitive. A bare term searches the body field; a
/// `term.field` suffix selects one of the known fields. Terms go through the same
/// tokenizer as the index, so a token like `u.s` can expand to several terms.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::RankError;
use crate::index::memory::tokenize;

use super::{Combinator, QueryNode, DEFAULT_FIELD};

/// Field names accepted as a `.field` suffix.
pub const FIELDS: [&str; 5] = ["body", "title", "url", "inlink", "keywords"];

fn lexer() -> &'static Regex {
    static LEXER: OnceLock<Regex> = OnceLock::new();
    LEXER.get_or_init(|| {
        Regex::new(r"#[A-Za-z]+(?:/\d+)?|[()]|[^\s()]+").expect("static lexer pattern")
    })
}

/// Parse a query that is a single operator (or a single term).
pub fn parse(text: &str) -> Result<QueryNode, RankError> {
    let mut parser = Parser::new(text);
    let mut nodes = parser.sequence()?;
    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        0 => Err(RankError::Query(format!("Empty query: {:?}", text))),
        _ => Err(RankError::Query(format!(
            "Expected a single operator, found {} operands in {:?}",
            nodes.len(),
            text
        ))),
    }
}

/// Parse `text` as the arguments of `op`, the way a plain keyword query is read.
pub fn parse_with_default(text: &str, op: Combinator) -> Result<QueryNode, RankError> {
    let mut parser = Parser::new(text);
    let args = parser.sequence()?;
    QueryNode::combine(op, args)
}

struct Parser<'t> {
    tokens: Vec<&'t str>,
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(text: &'t str) -> Self {
        Parser {
            tokens: lexer().find_iter(text).map(|m| m.as_str()).collect(),
            pos: 0,
        }
    }

    fn next(&mut self) -> Option<&'t str> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += 1;
        tok
    }

    /// Top-level operands up to the end of input.
    fn sequence(&mut self) -> Result<Vec<QueryNode>, RankError> {
        let mut out = Vec::new();
        while let Some(tok) = self.next() {
            if tok == ")" {
                return Err(RankError::Query("Unbalanced ')'".to_string()));
            }
            out.extend(self.operand(tok)?);
        }
        Ok(out)
    }

    fn operand(&mut self, tok: &'t str) -> Result<Vec<QueryNode>, RankError> {
        if tok.starts_with('#') {
            return Ok(vec![self.operator(tok)?]);
        }
        if tok == "(" {
            return Err(RankError::Query("'(' must follow an operator name".to_string()));
        }
        Ok(terms(tok))
    }

    fn operator(&mut self, tok: &'t str) -> Result<QueryNode, RankError> {
        if self.next() != Some("(") {
            return Err(RankError::Query(format!("Expected '(' after {}", tok)));
        }
        let (name, distance) = match tok[1..].split_once('/') {
            Some((name, d)) => {
                let d = d
                    .parse::<u32>()
                    .map_err(|_| RankError::Query(format!("Invalid distance in {}", tok)))?;
                (name.to_lowercase(), Some(d))
            }
            None => (tok[1..].to_lowercase(), None),
        };

        let node = match (name.as_str(), distance) {
            ("and", None) => QueryNode::and(self.arguments()?),
            ("or", None) => QueryNode::or(self.arguments()?),
            ("sum", None) => QueryNode::sum(self.arguments()?),
            ("wand", None) => QueryNode::wand(self.weighted_arguments()?)?,
            ("near", Some(d)) => QueryNode::near(d, self.arguments()?),
            ("window", Some(d)) => QueryNode::window(d, self.arguments()?),
            ("near" | "window", None) => {
                return Err(RankError::Query(format!("{} requires a /distance", tok)));
            }
            _ => return Err(RankError::Query(format!("Unknown operator {}", tok))),
        };
        Ok(node)
    }

    fn arguments(&mut self) -> Result<Vec<QueryNode>, RankError> {
        let mut out = Vec::new();
        loop {
            match self.next() {
                None => return Err(RankError::Query("Missing ')'".to_string())),
                Some(")") => return Ok(out),
                Some(tok) => out.extend(self.operand(tok)?),
            }
        }
    }

    fn weighted_arguments(&mut self) -> Result<Vec<(f64, QueryNode)>, RankError> {
        let mut out = Vec::new();
        loop {
            let weight = match self.next() {
                None => return Err(RankError::Query("Missing ')'".to_string())),
                Some(")") => return Ok(out),
                Some(tok) => tok
                    .parse::<f64>()
                    .map_err(|_| RankError::Query(format!("Expected a weight, found {}", tok)))?,
            };
            let tok = match self.next() {
                None | Some(")") => {
                    return Err(RankError::Query(format!("Weight {} has no operand", weight)));
                }
                Some(tok) => tok,
            };
            for node in self.operand(tok)? {
                out.push((weight, node));
            }
        }
    }
}

/// Term nodes for one lexical token, honoring a known `.field` suffix.
fn terms(tok: &str) -> Vec<QueryNode> {
    let (text, field) = match tok.rsplit_once('.') {
        Some((text, field)) if FIELDS.contains(&field.to_lowercase().as_str()) => {
            (text, field.to_lowercase())
        }
        _ => (tok, DEFAULT_FIELD.to_string()),
    };
    tokenize(text)
        .iter()
        .map(|t| QueryNode::term(t, &field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;

    #[test]
    fn test_default_operator_wraps_keywords() {
        let q = parse_with_default("Apple PIE.title", Combinator::Sum).unwrap();
        assert_eq!(
            q,
            QueryNode::sum(vec![QueryNode::term("apple", "body"), QueryNode::term("pie", "title")])
        );
    }

    #[test]
    fn test_nested_operators() {
        let q = parse("#AND( a #near/3( b c.url ) #Window/5(d e) )").unwrap();
        assert_eq!(q.args().len(), 3);
        assert_eq!(q.args()[1].op(), &Operator::Near { distance: 3 });
        assert_eq!(q.args()[1].args()[1], QueryNode::term("c", "url"));
        assert_eq!(q.args()[2].op(), &Operator::Window { distance: 5 });
    }

    #[test]
    fn test_wand_weights() {
        let q = parse("#wand( 0.7 apple 0.3 #and(pie tart) )").unwrap();
        assert_eq!(q.op(), &Operator::Wand { weights: vec![0.7, 0.3] });
        assert!(parse("#wand( apple )").is_err());
        assert!(parse("#wand( 0.5 )").is_err());
        assert!(parse("#wand( 0 apple )").is_err());
    }

    #[test]
    fn test_unknown_suffix_is_part_of_the_term() {
        let q = parse_with_default("u.s", Combinator::Or).unwrap();
        assert_eq!(q.args(), &[QueryNode::term("u", "body"), QueryNode::term("s", "body")]);
    }

    #[test]
    fn test_punctuation_terms_vanish() {
        let q = parse_with_default("apple , -", Combinator::And).unwrap();
        assert_eq!(q.args().len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("#and( a").is_err());
        assert!(parse("a )").is_err());
        assert!(parse("#near( a b )").is_err());
        assert!(parse("#and/2( a )").is_err());
        assert!(parse("#bogus( a )").is_err());
        assert!(parse("#and a").is_err());
        assert!(parse("a b").is_err());
    }
}
