//! # Node Persistence
//!
//! This module serializes B+tree nodes to store pages and materializes
//! them back. One node occupies exactly one page.
//!
//! ## Node Page Layout
//!
//! ```text
//! Offset  Size           Field
//! ------  ----           -----
//! 0       1              flags (bit 0: leaf, bit 1: root)
//! 1       4              num_keys
//! 5       num_keys * 8   keys
//! then, for a leaf:
//!         num_keys * 8   values
//! or, for an inner node:
//!         num_keys * 8   separator values (non-unique trees only)
//!         (num_keys+1)*8 child page ids
//! ```
//!
//! All fields little-endian, written through the [`PageStore`] scalar and
//! array primitives. The largest order whose worst-case encoding fits one
//! page is computed by [`max_order`]; index creation validates against it.
//!
//! ## Write-Back
//!
//! [`write_back`] walks the tree and rewrites exactly the nodes whose page
//! ids are in the tree's dirty set, then rewrites the page-0 header
//! (root page, allocated page count, entry count) and clears the set.
//! Pages orphaned by merges or root collapse are left untouched; nothing
//! references them again.
//!
//! ## Load
//!
//! [`load_tree`] reads the header, then materializes the tree depth-first
//! from the root page. Child page ids are validated against the allocated
//! page count so a corrupt pointer fails with a descriptive error instead
//! of a wild read.

use eyre::{ensure, Result};
use zerocopy::IntoBytes;

use crate::config::NODE_HEADER_SIZE;
use crate::index::node::BTreeNode;
use crate::index::tree::BTree;
use crate::storage::{PageStore, StoreFileHeader};

const FLAG_LEAF: u8 = 0b01;
const FLAG_ROOT: u8 = 0b10;

/// Largest (even) order whose worst-case node encoding fits one page.
pub fn max_order(page_size: usize, unique: bool) -> u32 {
    let budget = page_size - NODE_HEADER_SIZE;
    // leaf: (order-1) keys + (order-1) values
    let leaf_max = budget / 16 + 1;
    // inner: (order-1) keys [+ (order-1) separator values] + order children
    let inner_max = if unique { (budget + 8) / 16 } else { (budget + 16) / 24 };
    let max = leaf_max.min(inner_max) as u32;
    max & !1
}

/// Writes a single node to its page.
pub fn write_node(store: &mut PageStore, node: &BTreeNode) -> Result<()> {
    store.seek(node.page_id(), 0)?;

    let mut flags = 0u8;
    if node.is_leaf() {
        flags |= FLAG_LEAF;
    }
    if node.is_root() {
        flags |= FLAG_ROOT;
    }
    store.write_u8(flags)?;
    store.write_u32(node.num_keys() as u32)?;
    store.write_i64_array(&node.keys)?;

    if node.is_leaf() {
        store.write_i64_array(&node.values)?;
    } else {
        if !node.unique {
            store.write_i64_array(&node.values)?;
        }
        let child_ids: Vec<i64> =
            node.children().iter().map(|child| child.page_id() as i64).collect();
        store.write_i64_array(&child_ids)?;
    }
    Ok(())
}

/// Reads the node on `page_id` and, recursively, the subtree below it.
pub fn read_node(store: &mut PageStore, page_id: u32, order: u32, unique: bool) -> Result<BTreeNode> {
    store.seek(page_id, 0)?;

    let flags = store.read_u8()?;
    let leaf = flags & FLAG_LEAF != 0;
    let root = flags & FLAG_ROOT != 0;

    let num_keys = store.read_u32()? as usize;
    ensure!(
        num_keys <= order as usize - 1,
        "corrupt node on page {}: {} keys exceeds order {}",
        page_id,
        num_keys,
        order
    );

    let mut keys = vec![0i64; num_keys];
    store.read_i64_into(&mut keys)?;

    if leaf {
        let mut values = vec![0i64; num_keys];
        store.read_i64_into(&mut values)?;
        return Ok(BTreeNode::from_parts(page_id, order, unique, true, root, keys, values, Vec::new()));
    }

    let mut values = Vec::new();
    if !unique {
        values = vec![0i64; num_keys];
        store.read_i64_into(&mut values)?;
    }

    let mut child_ids = vec![0i64; num_keys + 1];
    store.read_i64_into(&mut child_ids)?;

    let mut children = Vec::with_capacity(child_ids.len());
    for child_id in child_ids {
        ensure!(
            child_id > 0 && child_id < store.page_count() as i64,
            "corrupt child pointer {} on page {} (page_count={})",
            child_id,
            page_id,
            store.page_count()
        );
        children.push(read_node(store, child_id as u32, order, unique)?);
    }

    Ok(BTreeNode::from_parts(page_id, order, unique, false, root, keys, values, children))
}

/// Writes every dirty node, then the header, and clears the dirty set.
/// Durability still requires a [`PageStore::flush`].
pub fn write_back(
    store: &mut PageStore,
    tree: &mut BTree,
    header: &mut StoreFileHeader,
) -> Result<()> {
    write_dirty(store, tree.root(), tree)?;

    header.set_root_page(tree.root_page_id());
    header.set_page_count(store.page_count());
    header.set_entry_count(tree.len());
    store.seek(0, 0)?;
    store.write_bytes(header.as_bytes())?;

    tree.clear_dirty();
    Ok(())
}

fn write_dirty(store: &mut PageStore, node: &BTreeNode, tree: &BTree) -> Result<()> {
    if tree.dirty_pages().contains(node.page_id() as i64) {
        write_node(store, node)?;
    }
    for child in node.children() {
        write_dirty(store, child, tree)?;
    }
    Ok(())
}

/// Reads the store header from page 0.
pub fn read_header(store: &mut PageStore) -> Result<StoreFileHeader> {
    store.seek(0, 0)?;
    let mut buf = [0u8; crate::config::STORE_HEADER_SIZE];
    store.read_bytes(&mut buf)?;
    StoreFileHeader::from_bytes(&buf)
}

/// Materializes the tree described by `header`.
pub fn load_tree(store: &mut PageStore, header: &StoreFileHeader) -> Result<BTree> {
    let root = read_node(store, header.root_page(), header.order(), header.unique())?;
    ensure!(
        root.is_root(),
        "page {} is not flagged as a root node",
        header.root_page()
    );
    Ok(BTree::from_parts(root, header.order(), header.unique(), header.entry_count()))
}
