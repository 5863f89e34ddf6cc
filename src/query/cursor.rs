/// Forward-only document cursors and the match rules shared by every operator
///
/// Cursors never move backward. Each rule repositions cursors only forward and reports
/// the candidate document, or None once no further match exists.

use crate::posting::{DocId, PostingCursor};

pub trait DocCursor {
    /// The document this cursor currently matches, without moving it.
    fn next_match(&mut self) -> Option<DocId>;

    /// Move to the first match with id >= `docid`.
    fn advance_to(&mut self, docid: DocId);

    /// Move to the first match with id > `docid`.
    fn advance_past(&mut self, docid: DocId);
}

impl DocCursor for PostingCursor {
    fn next_match(&mut self) -> Option<DocId> {
        self.current_doc()
    }

    fn advance_to(&mut self, docid: DocId) {
        PostingCursor::advance_to(self, docid)
    }

    fn advance_past(&mut self, docid: DocId) {
        PostingCursor::advance_past(self, docid)
    }
}

/// Smallest document matched by every cursor. Empty input never matches.
pub fn match_all<C: DocCursor>(args: &mut [C]) -> Option<DocId> {
    let (first, rest) = args.split_first_mut()?;
    'candidate: loop {
        let target = first.next_match()?;
        for arg in rest.iter_mut() {
            arg.advance_to(target);
            let doc = arg.next_match()?;
            if doc != target {
                first.advance_to(doc);
                continue 'candidate;
            }
        }
        return Some(target);
    }
}

/// Smallest document matched by any cursor.
pub fn match_min<C: DocCursor>(args: &mut [C]) -> Option<DocId> {
    args.iter_mut().filter_map(|a| a.next_match()).min()
}

/// Document matched by the first cursor, whatever the others hold.
pub fn match_first<C: DocCursor>(args: &mut [C]) -> Option<DocId> {
    args.first_mut()?.next_match()
}

pub fn advance_all_past<C: DocCursor>(args: &mut [C], docid: DocId) {
    for arg in args.iter_mut() {
        arg.advance_past(docid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::PostingList;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn cursor(docs: &[DocId]) -> PostingCursor {
        let mut list = PostingList::new("body");
        for &d in docs {
            list.append(d, vec![0]);
        }
        PostingCursor::new(list)
    }

    fn drain(args: &mut [PostingCursor], rule: fn(&mut [PostingCursor]) -> Option<DocId>) -> Vec<DocId> {
        let mut out = Vec::new();
        while let Some(d) = rule(args) {
            out.push(d);
            advance_all_past(args, d);
        }
        out
    }

    #[test]
    fn test_match_all_intersects() {
        let mut args = vec![cursor(&[1, 3, 5, 9]), cursor(&[2, 3, 9]), cursor(&[3, 4, 9, 10])];
        assert_eq!(drain(&mut args, match_all), vec![3, 9]);
    }

    #[test]
    fn test_match_min_unions() {
        let mut args = vec![cursor(&[1, 5]), cursor(&[2, 5, 8])];
        assert_eq!(drain(&mut args, match_min), vec![1, 2, 5, 8]);
    }

    #[test]
    fn test_match_first_follows_first_cursor() {
        let mut args = vec![cursor(&[4, 6]), cursor(&[1])];
        assert_eq!(drain(&mut args, match_first), vec![4, 6]);
    }

    #[test]
    fn test_empty_inputs() {
        let mut none: Vec<PostingCursor> = Vec::new();
        assert_eq!(match_all(&mut none), None);
        assert_eq!(match_min(&mut none), None);
        let mut args = vec![cursor(&[1, 2]), cursor(&[])];
        assert_eq!(match_all(&mut args), None);
    }

    proptest! {
        #[test]
        fn prop_match_all_is_set_intersection(
            a in prop::collection::btree_set(0u32..64, 0..20),
            b in prop::collection::btree_set(0u32..64, 0..20),
        ) {
            let av: Vec<_> = a.iter().copied().collect();
            let bv: Vec<_> = b.iter().copied().collect();
            let mut args = vec![cursor(&av), cursor(&bv)];
            let expected: Vec<_> = a.intersection(&b).copied().collect();
            prop_assert_eq!(drain(&mut args, match_all), expected);
        }

        #[test]
        fn prop_match_min_is_set_union(
            a in prop::collection::btree_set(0u32..64, 0..20),
            b in prop::collection::btree_set(0u32..64, 0..20),
        ) {
            let av: Vec<_> = a.iter().copied().collect();
            let bv: Vec<_> = b.iter().copied().collect();
            let mut args = vec![cursor(&av), cursor(&bv)];
            let expected: Vec<_> = a.union(&b).copied().collect::<BTreeSet<_>>().into_iter().collect();
            prop_assert_eq!(drain(&mut args, match_min), expected);
        }
    }
}
