//! # Sortable Key Encoding
//!
//! Conversion of indexed field values into 64-bit keys whose signed integer
//! order matches the natural order of the original values. Every B+tree in
//! the engine keys on `i64`, so anything an application indexes - integers,
//! floats, booleans, strings - must first pass through this module.
//!
//! See [`sortable`] for the per-type encodings and their ordering caveats.

pub mod sortable;

pub use sortable::{bool_to_sortable, double_to_sortable, float_to_sortable, string_to_sortable};
