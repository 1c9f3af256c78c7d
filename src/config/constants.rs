//! # OakDB Configuration Constants
//!
//! This module centralizes the layout and sizing constants shared by the
//! storage and index layers. Constants that depend on each other are
//! co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> STORE_HEADER_SIZE (64 bytes, page 0 only)
//!       │     The store header must fit in page 0 of the smallest
//!       │     supported page size.
//!       │
//!       └─> NODE_HEADER_SIZE (5 bytes per node page)
//!             Every node page starts with [flags:1][num_keys:4]; the
//!             remaining bytes hold keys, values and child pointers. The
//!             largest order that fits a page is derived from these two
//!             constants (see index::persist::max_order).
//!
//! MAX_TREE_DEPTH (16)
//!       │
//!       └─> Inline capacity of the ancestor stacks used by descent and
//!           range iteration. With MIN_ORDER = 4 a depth-16 tree already
//!           holds more than 2^16 entries; deeper trees spill the stack to
//!           the heap, they do not fail.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `STORE_HEADER_SIZE <= MIN_PAGE_SIZE` (the header must fit page 0)
//! 2. `MIN_ORDER` is even and >= 4 (split arithmetic; see index::node)

// ============================================================================
// PAGE LAYOUT CONSTANTS
// ============================================================================

/// Default size of each store page in bytes (4KB).
/// The page size is chosen per store at creation time and persisted in the
/// store header; this is only the default.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size a store may be created with.
pub const MIN_PAGE_SIZE: usize = 512;

/// Size of the store header at the start of page 0.
pub const STORE_HEADER_SIZE: usize = 64;

/// Size of the per-node header written at the start of every node page:
/// one flags byte plus a 4-byte entry count.
pub const NODE_HEADER_SIZE: usize = 5;

const _: () = assert!(
    STORE_HEADER_SIZE <= MIN_PAGE_SIZE,
    "store header must fit in page 0 of the smallest supported page size"
);

// ============================================================================
// TREE SHAPE CONSTANTS
// ============================================================================

/// Smallest supported tree order (maximum fan-out).
/// Orders must be even so that splitting a full node of `order - 1` keys
/// leaves both halves at or above the minimum occupancy.
pub const MIN_ORDER: u32 = 4;

/// Default tree order used when the caller does not pick one.
pub const DEFAULT_ORDER: u32 = 128;

/// Inline capacity of ancestor stacks (root-to-leaf paths).
pub const MAX_TREE_DEPTH: usize = 16;

const _: () = assert!(MIN_ORDER >= 4 && MIN_ORDER % 2 == 0, "MIN_ORDER must be even and >= 4");
const _: () = assert!(DEFAULT_ORDER % 2 == 0, "DEFAULT_ORDER must be even");

// ============================================================================
// FILE GROWTH
// ============================================================================

/// Number of pages a store file grows by when the allocator runs past the
/// mapped extent. Growing in chunks amortizes the remap cost.
pub const GROW_CHUNK_PAGES: u32 = 64;

/// Initial number of pages in a freshly created store file:
/// page 0 (header) plus the root leaf.
pub const INITIAL_PAGE_COUNT: u32 = 2;

// ============================================================================
// HASH SET CONFIGURATION
// ============================================================================

/// Default capacity of a [`crate::util::PrimLongSet`].
pub const PRIM_SET_DEFAULT_CAPACITY: usize = 64;

/// Largest power of two a PrimLongSet table may grow to.
pub const PRIM_SET_MAX_CAPACITY_POWER: u32 = 31;
