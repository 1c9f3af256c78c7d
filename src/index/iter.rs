//! # Range Iterators
//!
//! Ordered traversal over the leaf entries of a [`BTree`], ascending or
//! descending, bounded by an inclusive `[start, end]` key range.
//!
//! ## Ancestor-Chain Re-Walk
//!
//! Leaves are not linked to each other. An iterator instead keeps the
//! root-to-leaf ancestor stack recorded by
//! [`BTree::search_node_with_history`] and, whenever it exhausts a leaf,
//! pops ancestors until one offers a sibling on the traversal side, then
//! descends to that sibling's outermost leaf, pushing the intervening
//! nodes back onto the stack. Nothing is cached beyond the current path.
//!
//! ## Positioning
//!
//! Construction probes with a value sentinel (`i64::MIN` ascending,
//! `i64::MAX` descending) so that in non-unique trees the probe lands at
//! the boundary of the entry group for the bound key. The probe returns an
//! insertion position, not necessarily a match, so the start position is
//! adjusted linearly to the first entry inside the range.
//!
//! ## Bound Checks
//!
//! The range check runs eagerly after every advance: the moment the
//! current entry falls outside the bound, the iterator becomes exhausted
//! and stays exhausted. `next()` is therefore O(1) beyond the node hops it
//! already performs.
//!
//! ## Consistency
//!
//! An iterator borrows the tree for its whole lifetime, so structural
//! mutation between steps cannot compile. This is deliberately stricter
//! than runtime-checked designs that tolerate some interleaved mutation
//! and fail late on the rest.

use crate::index::node::BTreeNode;
use crate::index::tree::{AncestorStack, BTree};

/// Ascending iterator over `(key, value)` entries in `[start, end]`.
pub struct AscendingLeafIterator<'a> {
    ancestors: AncestorStack<'a>,
    cur_leaf: Option<&'a BTreeNode>,
    cur_pos: usize,
    start: i64,
    end: i64,
}

impl<'a> AscendingLeafIterator<'a> {
    pub(crate) fn new(tree: &'a BTree, start: i64, end: i64) -> Self {
        let mut iter = Self {
            ancestors: AncestorStack::new(),
            cur_leaf: None,
            cur_pos: 0,
            start,
            end,
        };
        if tree.is_empty() || start > end {
            return iter;
        }

        let (ancestors, leaf) = tree.search_node_with_history(start, i64::MIN);
        iter.ancestors = ancestors;
        // The probe yields an insertion position, which is one off.
        let pos = leaf.find_key_value_pos(start, i64::MIN);
        iter.cur_pos = pos.saturating_sub(1);
        iter.cur_leaf = Some(leaf);

        // Step forward to the first entry with key >= start; the probe may
        // have landed just before the entry group for the bound key.
        while let Some(leaf) = iter.cur_leaf {
            if leaf.key_at(iter.cur_pos) >= iter.start {
                break;
            }
            iter.advance();
        }
        // The whole tree may sort below the requested range.
        if let Some(leaf) = iter.cur_leaf {
            if leaf.key_at(iter.cur_pos) > iter.end {
                iter.cur_leaf = None;
            }
        }
        iter
    }

    fn advance(&mut self) {
        let Some(leaf) = self.cur_leaf else { return };

        if self.cur_pos + 1 < leaf.num_keys() {
            self.cur_pos += 1;
        } else {
            self.cur_pos = 0;
            let mut from: &'a BTreeNode = leaf;
            let mut sibling: Option<&'a BTreeNode> = None;
            while sibling.is_none() {
                let Some(ancestor) = self.ancestors.pop() else { break };
                sibling = from.right_sibling(ancestor);
                if sibling.is_some() {
                    self.ancestors.push(ancestor);
                }
                from = ancestor;
            }
            match sibling {
                None => {
                    self.cur_leaf = None;
                    return;
                }
                Some(mut node) => {
                    while !node.is_leaf() {
                        self.ancestors.push(node);
                        node = node.first_child();
                    }
                    self.cur_leaf = Some(node);
                }
            }
        }

        // Eager bound check keeps next() O(1).
        if let Some(leaf) = self.cur_leaf {
            if leaf.key_at(self.cur_pos) > self.end {
                self.cur_leaf = None;
            }
        }
    }
}

impl Iterator for AscendingLeafIterator<'_> {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<(i64, i64)> {
        let leaf = self.cur_leaf?;
        let entry = leaf.entry_at(self.cur_pos);
        self.advance();
        Some(entry)
    }
}

/// Descending iterator over `(key, value)` entries in `[start, end]`,
/// yielding them from `end` down to `start`.
pub struct DescendingLeafIterator<'a> {
    ancestors: AncestorStack<'a>,
    cur_leaf: Option<&'a BTreeNode>,
    cur_pos: usize,
    start: i64,
    end: i64,
}

impl<'a> DescendingLeafIterator<'a> {
    pub(crate) fn new(tree: &'a BTree, start: i64, end: i64) -> Self {
        let mut iter = Self {
            ancestors: AncestorStack::new(),
            cur_leaf: None,
            cur_pos: 0,
            start,
            end,
        };
        if tree.is_empty() || start > end {
            return iter;
        }

        let (ancestors, leaf) = tree.search_node_with_history(end, i64::MAX);
        iter.ancestors = ancestors;
        let pos = leaf.find_key_value_pos(end, i64::MAX);
        iter.cur_pos = pos.saturating_sub(1);
        iter.cur_leaf = Some(leaf);

        // Step backward past entries above end (possible only when the
        // probe landed at the very front of the leftmost candidate leaf).
        while let Some(leaf) = iter.cur_leaf {
            if leaf.key_at(iter.cur_pos) <= iter.end {
                break;
            }
            iter.advance();
        }
        // The whole tree may sort above the requested range.
        if let Some(leaf) = iter.cur_leaf {
            if leaf.key_at(iter.cur_pos) < iter.start {
                iter.cur_leaf = None;
            }
        }
        iter
    }

    fn advance(&mut self) {
        let Some(leaf) = self.cur_leaf else { return };

        if self.cur_pos > 0 {
            self.cur_pos -= 1;
        } else {
            let mut from: &'a BTreeNode = leaf;
            let mut sibling: Option<&'a BTreeNode> = None;
            while sibling.is_none() {
                let Some(ancestor) = self.ancestors.pop() else { break };
                sibling = from.left_sibling(ancestor);
                if sibling.is_some() {
                    self.ancestors.push(ancestor);
                }
                from = ancestor;
            }
            match sibling {
                None => {
                    self.cur_leaf = None;
                    return;
                }
                Some(mut node) => {
                    while !node.is_leaf() {
                        self.ancestors.push(node);
                        node = node.last_child();
                    }
                    self.cur_pos = node.num_keys() - 1;
                    self.cur_leaf = Some(node);
                }
            }
        }

        if let Some(leaf) = self.cur_leaf {
            if leaf.key_at(self.cur_pos) < self.start {
                self.cur_leaf = None;
            }
        }
    }
}

impl Iterator for DescendingLeafIterator<'_> {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<(i64, i64)> {
        let leaf = self.cur_leaf?;
        let entry = leaf.entry_at(self.cur_pos);
        self.advance();
        Some(entry)
    }
}

impl BTree {
    /// Iterates entries with keys in `[start, end]` in ascending
    /// (key, value) order.
    pub fn ascending_range(&self, start: i64, end: i64) -> AscendingLeafIterator<'_> {
        AscendingLeafIterator::new(self, start, end)
    }

    /// Iterates entries with keys in `[start, end]` in descending
    /// (key, value) order.
    pub fn descending_range(&self, start: i64, end: i64) -> DescendingLeafIterator<'_> {
        DescendingLeafIterator::new(self, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tree::test_support::SeqAllocator;

    fn populated_tree(order: u32, keys: &[i64]) -> BTree {
        let mut alloc = SeqAllocator(1);
        let mut tree = BTree::new(order, true, 0).unwrap();
        for &key in keys {
            tree.insert(&mut alloc, key, key * 10).unwrap();
        }
        tree
    }

    fn shuffled(n: i64, mut seed: u64) -> Vec<i64> {
        let mut keys: Vec<i64> = (0..n).collect();
        for i in (1..keys.len()).rev() {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            keys.swap(i, (seed % (i as u64 + 1)) as usize);
        }
        keys
    }

    #[test]
    fn full_range_yields_all_entries_in_order() {
        let tree = populated_tree(4, &shuffled(200, 0xBEEF));

        let entries: Vec<(i64, i64)> = tree.ascending_range(i64::MIN, i64::MAX).collect();
        let expected: Vec<(i64, i64)> = (0..200).map(|k| (k, k * 10)).collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn descending_is_the_exact_reverse_of_ascending() {
        let tree = populated_tree(6, &shuffled(137, 0xF00D));

        for (start, end) in [(i64::MIN, i64::MAX), (10, 100), (25, 26), (0, 0), (-5, 300)] {
            let up: Vec<(i64, i64)> = tree.ascending_range(start, end).collect();
            let mut down: Vec<(i64, i64)> = tree.descending_range(start, end).collect();
            down.reverse();
            assert_eq!(up, down, "range [{}, {}]", start, end);
        }
    }

    #[test]
    fn range_matches_reference_filter() {
        let keys = shuffled(300, 0xCAFE);
        let tree = populated_tree(4, &keys);
        let reference: std::collections::BTreeSet<i64> = keys.iter().copied().collect();

        for (start, end) in [(0, 299), (37, 199), (100, 100), (250, 500), (-100, 50)] {
            let got: Vec<i64> = tree.ascending_range(start, end).map(|(k, _)| k).collect();
            let expected: Vec<i64> =
                reference.iter().copied().filter(|k| (start..=end).contains(k)).collect();
            assert_eq!(got, expected, "range [{}, {}]", start, end);
        }
    }

    #[test]
    fn bounds_are_inclusive_on_both_ends() {
        let tree = populated_tree(4, &[10, 20, 30, 40]);

        let got: Vec<i64> = tree.ascending_range(20, 30).map(|(k, _)| k).collect();
        assert_eq!(got, vec![20, 30]);
    }

    #[test]
    fn empty_tree_and_empty_ranges_yield_nothing() {
        let empty = BTree::new(4, true, 0).unwrap();
        assert_eq!(empty.ascending_range(i64::MIN, i64::MAX).count(), 0);
        assert_eq!(empty.descending_range(i64::MIN, i64::MAX).count(), 0);

        let tree = populated_tree(4, &[10, 20, 30]);
        // Inverted bounds.
        assert_eq!(tree.ascending_range(30, 10).count(), 0);
        // Range entirely below the smallest key.
        assert_eq!(tree.ascending_range(-10, 5).count(), 0);
        assert_eq!(tree.descending_range(-10, 5).count(), 0);
        // Range entirely above the largest key.
        assert_eq!(tree.ascending_range(31, 99).count(), 0);
        assert_eq!(tree.descending_range(31, 99).count(), 0);
        // Range between two keys.
        assert_eq!(tree.ascending_range(21, 29).count(), 0);
        assert_eq!(tree.descending_range(21, 29).count(), 0);
    }

    #[test]
    fn duplicate_keys_are_scanned_in_value_order() {
        let mut alloc = SeqAllocator(1);
        let mut tree = BTree::new(4, false, 0).unwrap();
        tree.insert(&mut alloc, 5, 20).unwrap();
        tree.insert(&mut alloc, 5, 10).unwrap();
        tree.insert(&mut alloc, 4, 1).unwrap();
        tree.insert(&mut alloc, 6, 1).unwrap();

        let got: Vec<(i64, i64)> = tree.ascending_range(5, 5).collect();
        assert_eq!(got, vec![(5, 10), (5, 20)]);

        let down: Vec<(i64, i64)> = tree.descending_range(5, 5).collect();
        assert_eq!(down, vec![(5, 20), (5, 10)]);
    }

    #[test]
    fn duplicates_spanning_leaves_scan_completely() {
        let mut alloc = SeqAllocator(1);
        let mut tree = BTree::new(4, false, 0).unwrap();
        for value in 0..50 {
            tree.insert(&mut alloc, 7, value).unwrap();
        }
        tree.insert(&mut alloc, 1, 0).unwrap();
        tree.insert(&mut alloc, 9, 0).unwrap();

        let got: Vec<(i64, i64)> = tree.ascending_range(7, 7).collect();
        let expected: Vec<(i64, i64)> = (0..50).map(|v| (7, v)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn single_entry_tree_round_trips_both_directions() {
        let tree = populated_tree(4, &[42]);

        assert_eq!(tree.ascending_range(i64::MIN, i64::MAX).collect::<Vec<_>>(), vec![(42, 420)]);
        assert_eq!(tree.descending_range(i64::MIN, i64::MAX).collect::<Vec<_>>(), vec![(42, 420)]);
        assert_eq!(tree.ascending_range(42, 42).count(), 1);
        assert_eq!(tree.descending_range(42, 42).count(), 1);
    }

    #[test]
    fn extreme_sentinel_keys_are_iterable() {
        let mut alloc = SeqAllocator(1);
        let mut tree = BTree::new(4, true, 0).unwrap();
        tree.insert(&mut alloc, i64::MIN, 1).unwrap();
        tree.insert(&mut alloc, 0, 2).unwrap();
        tree.insert(&mut alloc, i64::MAX, 3).unwrap();

        let got: Vec<(i64, i64)> = tree.ascending_range(i64::MIN, i64::MAX).collect();
        assert_eq!(got, vec![(i64::MIN, 1), (0, 2), (i64::MAX, 3)]);

        let down: Vec<(i64, i64)> = tree.descending_range(i64::MIN, i64::MAX).collect();
        assert_eq!(down, vec![(i64::MAX, 3), (0, 2), (i64::MIN, 1)]);
    }
}
