/// Near and Window: posting lists synthesized from positional matches
///
/// Both operators visit only documents every argument contains, then walk the
/// arguments' positions forward. Each recorded position is the end of one match, and
/// the arguments taking part in it are consumed, so matches never overlap.

use crate::errors::RankError;
use crate::index::IndexStore;
use crate::posting::{PostingCursor, PostingList};

use super::cursor::{advance_all_past, match_all};
use super::{Operator, QueryNode};

/// Materialize the posting list of a term or proximity node.
pub fn posting_list(node: &QueryNode, index: &dyn IndexStore) -> Result<PostingList, RankError> {
    match node.op() {
        Operator::Term { term, field } => Ok(index.postings(field, term)),
        Operator::Near { distance } => {
            let args = argument_lists(node, index)?;
            Ok(merge(args, |c| near_positions(c, *distance)))
        }
        Operator::Window { distance } => {
            let args = argument_lists(node, index)?;
            Ok(merge(args, |c| window_positions(c, *distance)))
        }
        _ => Err(RankError::Query(format!(
            "Score operator cannot appear inside a proximity operator: {}",
            node
        ))),
    }
}

fn argument_lists(node: &QueryNode, index: &dyn IndexStore) -> Result<Vec<PostingList>, RankError> {
    let lists = node
        .args()
        .iter()
        .map(|arg| posting_list(arg, index))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(first) = lists.first() {
        if let Some(other) = lists.iter().find(|l| l.field != first.field) {
            return Err(RankError::Query(format!(
                "Proximity arguments must share a field ({} vs {}) in {}",
                first.field, other.field, node
            )));
        }
    }
    Ok(lists)
}

fn merge<F>(args: Vec<PostingList>, mut positions: F) -> PostingList
where
    F: FnMut(&mut [PostingCursor]) -> Vec<u32>,
{
    let field = args.first().map(|l| l.field.clone()).unwrap_or_default();
    let mut out = PostingList::new(&field);
    let mut cursors: Vec<PostingCursor> = args.into_iter().map(PostingCursor::new).collect();

    while let Some(doc) = match_all(&mut cursors) {
        out.append(doc, positions(&mut cursors));
        advance_all_past(&mut cursors, doc);
    }
    out
}

/// Ordered matches: each argument occurs after the previous one, within `distance`.
/// Records the position of the last argument.
fn near_positions(cursors: &mut [PostingCursor], distance: u32) -> Vec<u32> {
    let mut found = Vec::new();
    let Some((first, rest)) = cursors.split_first_mut() else {
        return found;
    };
    'scan: while let Some(mut prev) = first.current_loc() {
        for cursor in rest.iter_mut() {
            cursor.advance_loc_past(prev);
            let Some(loc) = cursor.current_loc() else {
                break 'scan;
            };
            if loc - prev > distance {
                first.advance_loc();
                continue 'scan;
            }
            prev = loc;
        }
        found.push(prev);
        first.advance_loc();
        for cursor in rest.iter_mut() {
            cursor.advance_loc();
        }
    }
    found
}

/// Unordered matches: all arguments inside a span of fewer than `distance` positions.
/// Records the largest position of the span.
fn window_positions(cursors: &mut [PostingCursor], distance: u32) -> Vec<u32> {
    let mut found = Vec::new();
    loop {
        let mut lowest: Option<(usize, u32)> = None;
        let mut highest = 0;
        for (i, cursor) in cursors.iter().enumerate() {
            let Some(loc) = cursor.current_loc() else {
                return found;
            };
            if lowest.map_or(true, |(_, l)| loc < l) {
                lowest = Some((i, loc));
            }
            highest = highest.max(loc);
        }
        let Some((earliest, low)) = lowest else {
            return found;
        };

        if highest - low < distance {
            found.push(highest);
            for cursor in cursors.iter_mut() {
                cursor.advance_loc();
            }
        } else {
            cursors[earliest].advance_loc();
        }
    }
}
