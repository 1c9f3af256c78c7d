//! # Paged Index Facade
//!
//! `PagedIndex` ties one [`BTree`] to one [`PageStore`]: it owns the store
//! file, the in-memory tree and the page-0 header, and exposes the
//! operations the rest of the engine consumes - insert, remove, range
//! scans, commit and close.
//!
//! ## Lifecycle
//!
//! ```text
//! create(path, config)   new file: header page + empty root leaf
//! open(path)             reads the header, restores the allocator,
//!                        materializes the tree
//! insert/remove/...      mutate the in-memory tree, tracking dirty pages
//! commit()               write back dirty nodes + header, then flush
//! close()                commit + deterministic unmap (consumes self)
//! ```
//!
//! Anything not committed is lost on crash; commit is the durability
//! boundary and the only fsync point.
//!
//! ## Configuration
//!
//! Page size, tree order and uniqueness mode are fixed at creation time
//! and persisted in the header. Reopening reads them back; they cannot be
//! changed afterwards.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use tracing::debug;

use crate::config::{DEFAULT_ORDER, DEFAULT_PAGE_SIZE, MIN_ORDER, STORE_HEADER_SIZE};
use crate::index::iter::{AscendingLeafIterator, DescendingLeafIterator};
use crate::index::persist;
use crate::index::tree::BTree;
use crate::storage::{PageStore, StoreFileHeader};

/// Creation-time configuration of an index: page size, order (fan-out)
/// and uniqueness mode. All fixed for the lifetime of the index.
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub page_size: usize,
    pub order: u32,
    pub unique: bool,
}

impl IndexConfig {
    /// A unique index (one value per key) with the default page size.
    pub fn unique(order: u32) -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE, order, unique: true }
    }

    /// A non-unique index (duplicate keys ordered by value) with the
    /// default page size.
    pub fn non_unique(order: u32) -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE, order, unique: false }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::non_unique(DEFAULT_ORDER)
    }
}

/// A single on-disk B+tree index mapping 64-bit keys to 64-bit values.
#[derive(Debug)]
pub struct PagedIndex {
    store: PageStore,
    tree: BTree,
    header: StoreFileHeader,
}

impl PagedIndex {
    /// Creates a new index file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        ensure!(
            config.order >= MIN_ORDER && config.order % 2 == 0,
            "index order must be even and at least {}, got {}",
            MIN_ORDER,
            config.order
        );
        let order_limit = persist::max_order(config.page_size, config.unique);
        ensure!(
            config.order <= order_limit,
            "order {} does not fit a {}-byte page (maximum {})",
            config.order,
            config.page_size,
            order_limit
        );

        let mut store = PageStore::create(&path, config.page_size)?;
        let header_page = store.allocate_page()?;
        debug_assert_eq!(header_page, 0);
        let root_page = store.allocate_page()?;

        let tree = BTree::new(config.order, config.unique, root_page)?;
        let header = StoreFileHeader::new(config.page_size as u32, config.order, config.unique);

        let mut index = Self { store, tree, header };
        index.commit()?;
        debug!(
            path = %path.as_ref().display(),
            order = config.order,
            unique = config.unique,
            "created index"
        );
        Ok(index)
    }

    /// Opens an existing index file, restoring the allocator and the tree
    /// from the persisted header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // The page size must be known before the store can be mapped, so
        // the header is read once straight off the file and once more,
        // authoritatively, through the mapped store.
        let prefix = read_header_prefix(path.as_ref())?;

        let mut store = PageStore::open(&path, prefix.page_size() as usize)?;
        store.set_page_count(prefix.page_count())?;

        let header = persist::read_header(&mut store)?;
        let tree = persist::load_tree(&mut store, &header)?;
        debug!(
            path = %path.as_ref().display(),
            entries = tree.len(),
            pages = store.page_count(),
            "opened index"
        );
        Ok(Self { store, tree, header })
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Inserts `(key, value)`. Returns `true` if the entry was added,
    /// `false` if it already existed. Fails on a duplicate key in unique
    /// mode.
    pub fn insert(&mut self, key: i64, value: i64) -> Result<bool> {
        self.tree.insert(&mut self.store, key, value)
    }

    /// Removes `(key, value)` and returns the stored value. Fails if the
    /// entry is absent.
    pub fn remove(&mut self, key: i64, value: i64) -> Result<i64> {
        self.tree.delete(key, value)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn contains(&self, key: i64, value: i64) -> bool {
        self.tree.contains(key, value)
    }

    /// Value stored under `key` in a unique index.
    pub fn get(&self, key: i64) -> Option<i64> {
        self.tree.get(key)
    }

    /// Ascending scan of keys in `[start, end]`. Hints the OS to fault the
    /// store in ahead of the scan.
    pub fn ascending_range(&self, start: i64, end: i64) -> AscendingLeafIterator<'_> {
        self.store.prefetch_pages(0, self.store.page_count());
        self.tree.ascending_range(start, end)
    }

    /// Descending scan of keys in `[start, end]`.
    pub fn descending_range(&self, start: i64, end: i64) -> DescendingLeafIterator<'_> {
        self.store.prefetch_pages(0, self.store.page_count());
        self.tree.descending_range(start, end)
    }

    pub fn len(&self) -> u64 {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn order(&self) -> u32 {
        self.tree.order()
    }

    pub fn unique(&self) -> bool {
        self.tree.unique()
    }

    // ------------------------------------------------------------------
    // Durability
    // ------------------------------------------------------------------

    /// Writes dirty nodes and the header back to their pages and flushes
    /// the store. The only durability boundary.
    pub fn commit(&mut self) -> Result<()> {
        persist::write_back(&mut self.store, &mut self.tree, &mut self.header)?;
        self.store.flush()
    }

    /// Commits and releases the store. Consuming `self` makes any use of a
    /// closed index a compile error.
    pub fn close(mut self) -> Result<()> {
        self.commit()?;
        self.store.close()
    }
}

/// Reads the store header straight off the file, before the page size is
/// known and the store can be mapped.
fn read_header_prefix(path: &Path) -> Result<StoreFileHeader> {
    let mut file = File::open(path)
        .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;
    let mut buf = [0u8; STORE_HEADER_SIZE];
    file.read_exact(&mut buf)
        .wrap_err_with(|| format!("failed to read header of '{}'", path.display()))?;
    StoreFileHeader::from_bytes(&buf)
}
