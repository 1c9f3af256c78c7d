//! # Utility Data Structures
//!
//! Small allocation-conscious containers shared by the storage and index
//! layers.
//!
//! - [`PrimLongSet`]: open-chained hash set of primitive 64-bit keys, used
//!   for dirty-page tracking and indexed-field backup sets. Unlike
//!   `HashSet<i64>` it never boxes its keys behind a hasher abstraction and
//!   its chains survive rehashing without re-allocating entries.

mod prim_long_set;

pub use prim_long_set::PrimLongSet;
