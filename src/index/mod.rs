//! # B+Tree Index Layer
//!
//! This module implements the paged B+tree index at the heart of the
//! engine: the structure that maps persistent-object identifiers and
//! indexed field values (as sortable 64-bit keys) to 64-bit payloads.
//!
//! ## Architecture Overview
//!
//! ```text
//! PagedIndex   facade: store file + tree + header, commit/close
//!     │
//! BTree        tree algorithm: insert, delete, rebalance, history descent
//!     │
//! BTreeNode    one tagged representation for leaves and inner nodes
//!     │
//! persist      node <-> page codec, dirty write-back, load
//! ```
//!
//! Range scans run through [`AscendingLeafIterator`] and
//! [`DescendingLeafIterator`], which re-derive each next leaf from the
//! recorded ancestor stack instead of caching leaf links.
//!
//! ## Duplicate Keys
//!
//! Each tree is created either unique or non-unique. Non-unique trees
//! order entries by the composite (key, value), so duplicate keys coexist
//! and scan back in value order - the shape a secondary field index needs.
//!
//! ## Durability Model
//!
//! Mutations touch only the in-memory tree and record dirty page ids.
//! [`PagedIndex::commit`] writes dirty nodes back through the page store
//! and flushes; nothing else syncs.

mod iter;
mod node;
mod paged;
mod persist;
mod tree;

pub use iter::{AscendingLeafIterator, DescendingLeafIterator};
pub use node::BTreeNode;
pub use paged::{IndexConfig, PagedIndex};
pub use persist::max_order;
pub use tree::{AncestorStack, BTree};
