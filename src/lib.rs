//! # OakDB - Embedded Object Database Storage Engine
//!
//! OakDB is the on-disk storage engine of an embedded object database. It
//! maps persistent-object identifiers and indexed field values to 64-bit
//! payloads through paged B+tree indexes backed by memory-mapped files.
//!
//! ## Quick Start
//!
//! ```ignore
//! use oakdb::index::{IndexConfig, PagedIndex};
//!
//! let mut index = PagedIndex::create("users_name.idx", IndexConfig::non_unique(64))?;
//!
//! index.insert(key, oid)?;
//! index.commit()?;
//!
//! for (key, oid) in index.ascending_range(lo, hi) {
//!     // feed object reconstruction
//! }
//! ```
//!
//! ## Architecture
//!
//! OakDB uses a layered architecture:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Field Index Maintenance (fields)   │
//! ├─────────────────────────────────────┤
//! │  Sortable Key Encoding (encoding)    │
//! ├─────────────────────────────────────┤
//! │     B+Tree Index Layer (index)       │
//! ├─────────────────────────────────────┤
//! │  Paged Binary I/O (storage::store)   │
//! ├─────────────────────────────────────┤
//! │  Memory-Mapped Files (storage::mmap) │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! Each index lives in its own file of fixed-size pages:
//!
//! ```text
//! name.idx
//! ├── Page 0            # store header: root page, order, page count
//! └── Page 1..N         # one B+tree node per page
//! ```
//!
//! ## Concurrency Model
//!
//! The engine is single-writer and synchronous. All tree mutation and
//! iteration happen on the caller's thread; the tree performs no locking.
//! Range iterators borrow the tree, so structural mutation while an
//! iterator is live is rejected at compile time.
//!
//! ## Module Overview
//!
//! - [`storage`]: Memory-mapped page files and positioned binary I/O
//! - [`index`]: B+tree nodes, tree algorithm, range iterators, persistence
//! - [`encoding`]: Order-preserving 64-bit key encoding for field values
//! - [`fields`]: Indexed-field backup and index update path
//! - [`util`]: Primitive-long hash set used for dirty and backup tracking

#[macro_use]
mod macros;

pub mod config;
pub mod encoding;
pub mod fields;
pub mod index;
pub mod storage;
pub mod util;

pub use index::{IndexConfig, PagedIndex};
pub use storage::PageStore;
