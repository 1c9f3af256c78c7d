//! # B+Tree Algorithm
//!
//! This module implements `BTree`, the tree-level algorithm over
//! [`BTreeNode`]: search, insert with pre-emptive splitting, delete with
//! borrow-then-merge rebalancing, and the history descent both mutation
//! and range iteration build on.
//!
//! ## Insert: Pre-emptive Splitting
//!
//! Insertion splits any full node it meets on the way down (a full root
//! first grows the tree by one level), so by the time the target leaf is
//! reached it is guaranteed non-full and the entry goes in with a single
//! downward pass - there is no second pass propagating splits back up.
//! Splitting a full node of `order - 1` keys leaves both halves at or
//! above their minimum occupancy because orders are even.
//!
//! ## Delete: Borrow, then Merge
//!
//! Deletion descends recursively; the call stack is the explicit
//! root-to-leaf path (nodes hold no parent references). After the entry is
//! removed, each level on the way back up checks whether its child went
//! below minimum occupancy and repairs it:
//!
//! 1. **Borrow** one entry from a sibling that has keys to spare, rotating
//!    the separator through the parent.
//! 2. **Merge** with a sibling otherwise, removing the separator from the
//!    parent; the parent's own underflow is handled one frame up.
//!
//! When a cascade of merges leaves the root with no keys, its single
//! surviving child becomes the new root and the tree height shrinks by one.
//!
//! ## Dirty-Page Tracking
//!
//! Every structural change records the page ids of the touched nodes in a
//! [`PrimLongSet`] owned by the tree. The persistence layer writes exactly
//! those nodes back and clears the set. This replaces change-notification
//! on every node mutation with one explicit write-back list.
//!
//! ## Duplicates
//!
//! All operations order strictly by (key, value) in non-unique mode, so
//! multiple entries may share a key while range scans still observe one
//! total order. Re-inserting an existing (key, value) pair is an idempotent
//! no-op; in unique mode inserting a present key is an error the caller can
//! handle.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::config::{MAX_TREE_DEPTH, MIN_ORDER};
use crate::index::node::BTreeNode;
use crate::storage::PageAllocator;
use crate::util::PrimLongSet;

/// Ancestor stack of a root-to-leaf descent, nearest ancestor last.
pub type AncestorStack<'a> = SmallVec<[&'a BTreeNode; MAX_TREE_DEPTH]>;

#[derive(Debug)]
pub struct BTree {
    root: BTreeNode,
    order: u32,
    unique: bool,
    entry_count: u64,
    dirty: PrimLongSet,
}

impl BTree {
    /// Creates an empty tree whose root leaf lives on `root_page_id`.
    pub fn new(order: u32, unique: bool, root_page_id: u32) -> Result<Self> {
        ensure!(
            order >= MIN_ORDER && order % 2 == 0,
            "tree order must be even and at least {}, got {}",
            MIN_ORDER,
            order
        );
        let root = BTreeNode::new_leaf(root_page_id, order, unique, true);
        let mut dirty = PrimLongSet::new();
        dirty.add(root_page_id as i64);
        Ok(Self { root, order, unique, entry_count: 0, dirty })
    }

    /// Rebuilds a tree from persisted parts; nothing starts dirty.
    pub(crate) fn from_parts(root: BTreeNode, order: u32, unique: bool, entry_count: u64) -> Self {
        Self { root, order, unique, entry_count, dirty: PrimLongSet::new() }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Number of (key, value) entries in the tree.
    pub fn len(&self) -> u64 {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn root(&self) -> &BTreeNode {
        &self.root
    }

    pub fn root_page_id(&self) -> u32 {
        self.root.page_id()
    }

    /// Distance from the root to the leaves, counting both ends.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while !node.is_leaf() {
            height += 1;
            node = node.first_child();
        }
        height
    }

    /// Pages whose nodes changed since the last write-back.
    pub fn dirty_pages(&self) -> &PrimLongSet {
        &self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Whether the exact entry is present ((key, value) pair in non-unique
    /// mode, key alone in unique mode).
    pub fn contains(&self, key: i64, value: i64) -> bool {
        self.leaf_for(key, value).binary_search(key, value).is_ok()
    }

    /// Looks up the value stored under `key` in a unique tree.
    pub fn get(&self, key: i64) -> Option<i64> {
        debug_assert!(self.unique, "get by key alone is only meaningful on unique trees");
        let leaf = self.leaf_for(key, 0);
        leaf.binary_search(key, 0).ok().map(|pos| leaf.value_at(pos))
    }

    fn leaf_for(&self, key: i64, value: i64) -> &BTreeNode {
        let mut node = &self.root;
        while !node.is_leaf() {
            node = &node.children()[node.find_key_value_pos(key, value)];
        }
        node
    }

    /// Descends to the leaf where `(key, value)` belongs, recording the
    /// root-to-leaf path. Iterators use the recorded ancestors to re-derive
    /// the next leaf on every boundary crossing instead of caching
    /// leaf-to-leaf links.
    pub fn search_node_with_history(&self, key: i64, value: i64) -> (AncestorStack<'_>, &BTreeNode) {
        let mut ancestors = AncestorStack::new();
        let mut node = &self.root;
        while !node.is_leaf() {
            ancestors.push(node);
            node = &node.children()[node.find_key_value_pos(key, value)];
        }
        (ancestors, node)
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Inserts `(key, value)`, allocating pages for any nodes created by
    /// splits along the way. Returns `true` if the entry was added, `false`
    /// if the exact entry was already present (idempotent). Inserting a
    /// duplicate key into a unique tree is an error.
    pub fn insert(
        &mut self,
        alloc: &mut dyn PageAllocator,
        key: i64,
        value: i64,
    ) -> Result<bool> {
        if self.root.is_full() {
            self.grow_root(alloc)?;
        }

        let unique = self.unique;
        let mut node = &mut self.root;
        while !node.is_leaf() {
            let mut idx = node.find_key_value_pos(key, value);
            if node.children()[idx].is_full() {
                let right_page = alloc.allocate_page()?;
                Self::split_child(node, idx, right_page, &mut self.dirty);
                // The new separator may re-route the descent.
                idx = node.find_key_value_pos(key, value);
            }
            node = &mut node.children_mut()[idx];
        }

        match node.binary_search(key, value) {
            Ok(pos) => {
                if unique && node.value_at(pos) != value {
                    bail!(
                        "duplicate key {} in unique index (existing value {}, new value {})",
                        key,
                        node.value_at(pos),
                        value
                    );
                }
                Ok(false)
            }
            Err(_) => {
                node.put(key, value);
                self.dirty.add(node.page_id() as i64);
                self.entry_count += 1;
                Ok(true)
            }
        }
    }

    /// Grows the tree by one level: a fresh inner root adopts the old root
    /// as its only child and immediately splits it.
    fn grow_root(&mut self, alloc: &mut dyn PageAllocator) -> Result<()> {
        let new_root_page = alloc.allocate_page()?;
        let mut old_root = std::mem::replace(
            &mut self.root,
            BTreeNode::new_inner(new_root_page, self.order, self.unique, true),
        );
        old_root.set_root(false);
        self.root.children_mut().push(old_root);
        self.dirty.add(new_root_page as i64);

        let right_page = alloc.allocate_page()?;
        Self::split_child(&mut self.root, 0, right_page, &mut self.dirty);
        Ok(())
    }

    /// Splits the full child at `idx` of `parent`, inserting the promoted
    /// separator and the new right sibling into the parent. The parent is
    /// never full here (it was split on the way down).
    fn split_child(parent: &mut BTreeNode, idx: usize, right_page: u32, dirty: &mut PrimLongSet) {
        assert!(!parent.is_full(), "splitting a child of a full parent");
        let non_unique_separators = !parent.unique;

        let child = &mut parent.children_mut()[idx];
        let child_page = child.page_id();
        let (right, sep_key, sep_value) = if child.is_leaf() {
            child.split_leaf(right_page)
        } else {
            child.split_inner(right_page)
        };

        parent.keys.insert(idx, sep_key);
        if non_unique_separators {
            parent.values.insert(idx, sep_value);
        }
        parent.children_mut().insert(idx + 1, right);

        dirty.add(parent.page_id() as i64);
        dirty.add(child_page as i64);
        dirty.add(right_page as i64);
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Removes the entry `(key, value)` and returns its value. Fails if the
    /// entry is absent; the tree is unchanged in that case.
    pub fn delete(&mut self, key: i64, value: i64) -> Result<i64> {
        let removed = if self.root.is_leaf() {
            Self::remove_from_leaf(&mut self.root, key, value, &mut self.dirty)?
        } else {
            let removed = Self::delete_rec(&mut self.root, key, value, &mut self.dirty)?;
            if self.root.num_keys() == 0 {
                // A merge cascade emptied the root; its single surviving
                // child becomes the new root and the height shrinks.
                debug_assert_eq!(self.root.children().len(), 1);
                let mut child = self.root.children_mut().remove(0);
                child.set_root(true);
                self.dirty.add(child.page_id() as i64);
                self.root = child;
            }
            removed
        };
        self.entry_count -= 1;
        Ok(removed)
    }

    fn remove_from_leaf(
        leaf: &mut BTreeNode,
        key: i64,
        value: i64,
        dirty: &mut PrimLongSet,
    ) -> Result<i64> {
        match leaf.binary_search(key, value) {
            Ok(pos) => {
                if leaf.unique && leaf.value_at(pos) != value {
                    bail!(
                        "entry ({}, {}) not found in index (key present with value {})",
                        key,
                        value,
                        leaf.value_at(pos)
                    );
                }
                let (_, removed) = leaf.remove_entry_at(pos);
                dirty.add(leaf.page_id() as i64);
                Ok(removed)
            }
            Err(_) => bail!("entry ({}, {}) not found in index", key, value),
        }
    }

    fn delete_rec(
        node: &mut BTreeNode,
        key: i64,
        value: i64,
        dirty: &mut PrimLongSet,
    ) -> Result<i64> {
        debug_assert!(!node.is_leaf());
        let idx = node.find_key_value_pos(key, value);

        let removed = if node.children()[idx].is_leaf() {
            Self::remove_from_leaf(&mut node.children_mut()[idx], key, value, dirty)?
        } else {
            Self::delete_rec(&mut node.children_mut()[idx], key, value, dirty)?
        };

        if node.children()[idx].is_underfull() {
            Self::rebalance_child(node, idx, dirty);
        }
        Ok(removed)
    }

    /// Repairs the underfull child at `idx`: borrow from a sibling with
    /// keys to spare, else merge with one.
    fn rebalance_child(parent: &mut BTreeNode, idx: usize, dirty: &mut PrimLongSet) {
        if idx > 0 && parent.children()[idx - 1].has_extra_keys() {
            Self::borrow_from_left(parent, idx, dirty);
        } else if idx + 1 < parent.children().len() && parent.children()[idx + 1].has_extra_keys()
        {
            Self::borrow_from_right(parent, idx, dirty);
        } else if idx > 0 {
            Self::merge_children(parent, idx - 1, dirty);
        } else {
            Self::merge_children(parent, idx, dirty);
        }
    }

    /// Moves one entry from the left sibling into the child at `idx`,
    /// rotating the separator through the parent.
    fn borrow_from_left(parent: &mut BTreeNode, idx: usize, dirty: &mut PrimLongSet) {
        let non_unique_separators = !parent.unique;
        let (left_half, right_half) = parent.children.split_at_mut(idx);
        let left = &mut left_half[idx - 1];
        let child = &mut right_half[0];

        if child.is_leaf() {
            let key = left.keys.pop().expect("borrowing from an empty sibling");
            let value = left.values.pop().expect("borrowing from an empty sibling");
            child.keys.insert(0, key);
            child.values.insert(0, value);
            // The separator mirrors the child's new first entry.
            parent.keys[idx - 1] = child.keys[0];
            if non_unique_separators {
                parent.values[idx - 1] = child.values[0];
            }
        } else {
            // The separator drops into the child; the donor's last key
            // takes its place in the parent.
            child.keys.insert(0, parent.keys[idx - 1]);
            if non_unique_separators {
                child.values.insert(0, parent.values[idx - 1]);
            }
            child.children.insert(0, left.children.pop().expect("inner sibling has no children"));
            parent.keys[idx - 1] = left.keys.pop().expect("borrowing from an empty sibling");
            if non_unique_separators {
                parent.values[idx - 1] = left.values.pop().expect("borrowing from an empty sibling");
            }
        }

        dirty.add(left.page_id() as i64);
        dirty.add(child.page_id() as i64);
        dirty.add(parent.page_id() as i64);
    }

    /// Mirror image of [`BTree::borrow_from_left`].
    fn borrow_from_right(parent: &mut BTreeNode, idx: usize, dirty: &mut PrimLongSet) {
        let non_unique_separators = !parent.unique;
        let (left_half, right_half) = parent.children.split_at_mut(idx + 1);
        let child = &mut left_half[idx];
        let right = &mut right_half[0];

        if child.is_leaf() {
            let key = right.keys.remove(0);
            let value = right.values.remove(0);
            child.keys.push(key);
            child.values.push(value);
            parent.keys[idx] = right.keys[0];
            if non_unique_separators {
                parent.values[idx] = right.values[0];
            }
        } else {
            child.keys.push(parent.keys[idx]);
            if non_unique_separators {
                child.values.push(parent.values[idx]);
            }
            child.children.push(right.children.remove(0));
            parent.keys[idx] = right.keys.remove(0);
            if non_unique_separators {
                parent.values[idx] = right.values.remove(0);
            }
        }

        dirty.add(child.page_id() as i64);
        dirty.add(right.page_id() as i64);
        dirty.add(parent.page_id() as i64);
    }

    /// Merges the child at `left_idx + 1` into the child at `left_idx`,
    /// removing the separator between them. The right node's page becomes
    /// unreferenced (page ids are never reused).
    fn merge_children(parent: &mut BTreeNode, left_idx: usize, dirty: &mut PrimLongSet) {
        let non_unique_separators = !parent.unique;
        let right = parent.children.remove(left_idx + 1);
        let sep_key = parent.keys.remove(left_idx);
        let sep_value = if non_unique_separators { parent.values.remove(left_idx) } else { 0 };

        let left = &mut parent.children[left_idx];
        if left.is_leaf() {
            // The separator duplicates the right node's first entry; it is
            // simply dropped.
            left.keys.extend(right.keys);
            left.values.extend(right.values);
        } else {
            left.keys.push(sep_key);
            if non_unique_separators {
                left.values.push(sep_value);
            }
            left.keys.extend(right.keys);
            if non_unique_separators {
                left.values.extend(right.values);
            }
            left.children.extend(right.children);
        }
        debug_assert!(left.num_keys() <= left.max_keys());

        dirty.add(left.page_id() as i64);
        dirty.add(parent.page_id() as i64);
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Visits every entry in (key, value) order.
    pub fn for_each_entry(&self, mut f: impl FnMut(i64, i64)) {
        Self::visit_entries(&self.root, &mut f);
    }

    fn visit_entries(node: &BTreeNode, f: &mut impl FnMut(i64, i64)) {
        if node.is_leaf() {
            for pos in 0..node.num_keys() {
                let (key, value) = node.entry_at(pos);
                f(key, value);
            }
            return;
        }
        // Inner separators carry no payload of their own; every entry
        // lives in a leaf.
        for child in node.children() {
            Self::visit_entries(child, f);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{check_invariants, SeqAllocator};
    use super::*;

    fn new_tree(order: u32, unique: bool) -> (SeqAllocator, BTree) {
        let mut alloc = SeqAllocator(0);
        let root_page = alloc.allocate_page().unwrap();
        let tree = BTree::new(order, unique, root_page).unwrap();
        (alloc, tree)
    }

    /// Deterministic xorshift; tests need reproducible "random" orders.
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
    fn rejects_odd_or_tiny_orders() {
        assert!(BTree::new(3, true, 0).is_err());
        assert!(BTree::new(5, true, 0).is_err());
        assert!(BTree::new(2, true, 0).is_err());
        assert!(BTree::new(4, true, 0).is_ok());
    }

    #[test]
    fn order_four_scenario_splits_exactly_on_overflow() {
        let (mut alloc, mut tree) = new_tree(4, true);

        // After each insert no node may exceed 3 keys and every structural
        // invariant must hold.
        for key in [10, 20, 5, 6, 12, 30, 7, 17] {
            assert!(tree.insert(&mut alloc, key, key * 100).unwrap());
            check_invariants(&tree);
        }

        assert_eq!(tree.len(), 8);
        assert_eq!(tree.height(), 2);
        for key in [10, 20, 5, 6, 12, 30, 7, 17] {
            assert_eq!(tree.get(key), Some(key * 100));
        }
    }

    #[test]
    fn first_split_happens_at_the_fourth_key() {
        let (mut alloc, mut tree) = new_tree(4, true);

        for key in [10, 20, 5] {
            tree.insert(&mut alloc, key, key).unwrap();
            assert_eq!(tree.height(), 1);
        }
        tree.insert(&mut alloc, 6, 6).unwrap();
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn insert_is_idempotent_for_exact_pairs() {
        let (mut alloc, mut tree) = new_tree(4, false);

        assert!(tree.insert(&mut alloc, 5, 10).unwrap());
        assert!(!tree.insert(&mut alloc, 5, 10).unwrap());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn unique_tree_rejects_duplicate_keys() {
        let (mut alloc, mut tree) = new_tree(4, true);

        tree.insert(&mut alloc, 5, 10).unwrap();
        let err = tree.insert(&mut alloc, 5, 20).unwrap_err();
        assert!(err.to_string().contains("duplicate key 5"));
        // The exact same pair stays an idempotent no-op.
        assert!(!tree.insert(&mut alloc, 5, 10).unwrap());
    }

    #[test]
    fn non_unique_tree_keeps_duplicate_keys_ordered_by_value() {
        let (mut alloc, mut tree) = new_tree(4, false);

        tree.insert(&mut alloc, 5, 20).unwrap();
        tree.insert(&mut alloc, 5, 10).unwrap();
        tree.insert(&mut alloc, 3, 1).unwrap();

        let mut entries = Vec::new();
        tree.for_each_entry(|k, v| entries.push((k, v)));
        assert_eq!(entries, vec![(3, 1), (5, 10), (5, 20)]);
        assert!(tree.contains(5, 10));
        assert!(tree.contains(5, 20));
        assert!(!tree.contains(5, 15));
    }

    #[test]
    fn delete_of_missing_entry_fails_and_leaves_tree_unchanged() {
        let (mut alloc, mut tree) = new_tree(4, false);

        tree.insert(&mut alloc, 1, 1).unwrap();
        let err = tree.delete(2, 2).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert_eq!(tree.len(), 1);
        check_invariants(&tree);
    }

    #[test]
    fn delete_returns_the_removed_value() {
        let (mut alloc, mut tree) = new_tree(4, true);

        tree.insert(&mut alloc, 7, 700).unwrap();
        assert_eq!(tree.delete(7, 700).unwrap(), 700);
        assert!(tree.is_empty());
    }

    #[test]
    fn random_inserts_preserve_ordering_and_balance() {
        let (mut alloc, mut tree) = new_tree(8, true);

        for key in shuffled(500, 0xDEADBEEF) {
            tree.insert(&mut alloc, key, key * 2).unwrap();
        }
        check_invariants(&tree);
        assert_eq!(tree.len(), 500);

        let mut expected = 0;
        tree.for_each_entry(|key, value| {
            assert_eq!(key, expected);
            assert_eq!(value, expected * 2);
            expected += 1;
        });
    }

    #[test]
    fn insert_then_delete_everything_leaves_an_empty_root_leaf() {
        let (mut alloc, mut tree) = new_tree(4, true);

        let keys = shuffled(300, 0x5EED);
        for &key in &keys {
            tree.insert(&mut alloc, key, key).unwrap();
        }
        check_invariants(&tree);

        for &key in &shuffled(300, 0xFACE) {
            assert_eq!(tree.delete(key, key).unwrap(), key);
            check_invariants(&tree);
        }

        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().num_keys(), 0);
    }

    #[test]
    fn interleaved_inserts_and_deletes_stay_consistent() {
        let (mut alloc, mut tree) = new_tree(6, false);
        let mut reference = std::collections::BTreeSet::<(i64, i64)>::new();

        let mut state = 0xA5A5_A5A5u64;
        for _ in 0..2000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let key = (state % 100) as i64;
            let value = ((state >> 32) % 8) as i64;
            if state % 3 == 0 && !reference.is_empty() {
                let target = reference.iter().next().copied().unwrap();
                reference.remove(&target);
                tree.delete(target.0, target.1).unwrap();
            } else if reference.insert((key, value)) {
                assert!(tree.insert(&mut alloc, key, value).unwrap());
            } else {
                assert!(!tree.insert(&mut alloc, key, value).unwrap());
            }
        }

        check_invariants(&tree);
        let mut entries = Vec::new();
        tree.for_each_entry(|k, v| entries.push((k, v)));
        assert_eq!(entries, reference.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn height_shrinks_when_the_root_collapses() {
        let (mut alloc, mut tree) = new_tree(4, true);

        for key in 0..20 {
            tree.insert(&mut alloc, key, key).unwrap();
        }
        let grown_height = tree.height();
        assert!(grown_height > 1);

        for key in 0..20 {
            tree.delete(key, key).unwrap();
            check_invariants(&tree);
        }
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn duplicate_heavy_tree_survives_structural_churn() {
        let (mut alloc, mut tree) = new_tree(4, false);

        // Many entries under few keys forces duplicates to span nodes, so
        // separators must disambiguate by value.
        for value in 0..100 {
            tree.insert(&mut alloc, 1, value).unwrap();
            tree.insert(&mut alloc, 2, value).unwrap();
        }
        check_invariants(&tree);

        for value in (0..100).step_by(2) {
            tree.delete(1, value).unwrap();
        }
        check_invariants(&tree);

        let mut key1 = Vec::new();
        tree.for_each_entry(|k, v| {
            if k == 1 {
                key1.push(v);
            }
        });
        assert_eq!(key1, (1..100).step_by(2).collect::<Vec<i64>>());
    }

    #[test]
    fn dirty_pages_accumulate_and_clear() {
        let (mut alloc, mut tree) = new_tree(4, true);
        assert!(tree.dirty_pages().contains(tree.root_page_id() as i64));

        tree.clear_dirty();
        assert!(tree.dirty_pages().is_empty());

        tree.insert(&mut alloc, 1, 1).unwrap();
        assert!(tree.dirty_pages().contains(tree.root_page_id() as i64));

        tree.clear_dirty();
        // A no-op insert dirties nothing.
        tree.insert(&mut alloc, 1, 1).unwrap();
        assert!(tree.dirty_pages().is_empty());
    }

    #[test]
    fn search_node_with_history_records_the_descent_path() {
        let (mut alloc, mut tree) = new_tree(4, true);
        for key in 0..30 {
            tree.insert(&mut alloc, key, key).unwrap();
        }

        let (ancestors, leaf) = tree.search_node_with_history(17, i64::MIN);
        assert!(leaf.is_leaf());
        assert_eq!(ancestors.len(), tree.height() - 1);
        assert!(std::ptr::eq(ancestors[0], tree.root()));
        // The nearest ancestor really is the leaf's parent.
        let parent = ancestors.last().unwrap();
        assert!(parent.position_of_child(leaf).is_some());
    }
}
