//! # Storage Module
//!
//! This module provides the foundational storage layer for OakDB,
//! implementing memory-mapped page files and the positioned binary I/O the
//! index layer serializes its nodes through.
//!
//! ## Architecture Overview
//!
//! The storage layer is built around memory-mapped I/O. Instead of copying
//! data between kernel and user space, store files are mapped directly into
//! the process address space:
//!
//! - **Zero-copy access**: reads and writes address the mapped region
//! - **Minimal syscall overhead**: page faults handled transparently by the OS
//! - **One durability boundary**: `flush()` is the only msync point; no
//!   per-write fsync
//!
//! ## Layering
//!
//! ```text
//! PageStore   positioned cursor I/O: scalars, arrays, strings, allocation
//!     │
//! MmapStorage mapped region: page slices, grow/remap, sync, close
//! ```
//!
//! `PageStore` is deliberately unintelligent about tree structure: it
//! validates page-level bounds and nothing else. Node-boundary safety is
//! the index layer's responsibility.
//!
//! ## Safety Model
//!
//! A mapped region becomes invalid when the file is grown and remapped.
//! OakDB uses Rust's borrow checker for compile-time enforcement: `grow()`
//! takes `&mut self`, so no page reference can be live across a remap.
//! Closing a store consumes it, so use-after-close is a compile error, and
//! the mapping is dropped (unmapped) before the file handle - no garbage
//! collector has to be coaxed into releasing the region.
//!
//! ## Module Organization
//!
//! - `mmap`: Low-level memory-mapped storage (`MmapStorage`)
//! - `store`: Positioned binary I/O and page allocation (`PageStore`)
//! - `headers`: Page-0 store header (`StoreFileHeader`)

mod headers;
mod mmap;
mod store;

pub use headers::StoreFileHeader;
pub use mmap::MmapStorage;
pub use store::{PageAllocator, PageStore};
