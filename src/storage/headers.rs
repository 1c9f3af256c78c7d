//! # Store Header Definition
//!
//! This module provides the type-safe, zerocopy-based header struct written
//! at the start of page 0 of every index file. The header is what makes a
//! store self-describing: it persists the allocated page count (so the page
//! allocator can resume after reopen), the root page of the tree, and the
//! tree configuration fixed at creation time.
//!
//! ## Header Layout (64 bytes)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  ----------------------------------------
//! 0       8     magic        b"OakDBIdx"
//! 8       4     version      Format version
//! 12      4     page_size    Page size chosen at creation
//! 16      4     page_count   Allocated pages (allocator resume point)
//! 20      4     root_page    Page id of the tree root
//! 24      4     order        Tree order (maximum fan-out)
//! 28      4     flags        Bit 0: unique-keys mode
//! 32      8     entry_count  Number of (key, value) entries in the tree
//! 40      24    reserved     Zeroed, reserved for future use
//! ```
//!
//! ## Zerocopy Safety
//!
//! The struct derives `FromBytes`/`IntoBytes`/`Immutable`/`KnownLayout`/
//! `Unaligned`, so it can be read from and written to arbitrary page
//! offsets without copying or alignment concerns. All multi-byte fields
//! are little-endian.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::STORE_HEADER_SIZE;

pub const STORE_MAGIC: &[u8; 8] = b"OakDBIdx";

pub const CURRENT_VERSION: u32 = 1;

/// Flag bit: the tree enforces unique keys.
const FLAG_UNIQUE: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StoreFileHeader {
    magic: [u8; 8],
    version: U32,
    page_size: U32,
    page_count: U32,
    root_page: U32,
    order: U32,
    flags: U32,
    entry_count: U64,
    reserved: [u8; 24],
}

const _: () = assert!(std::mem::size_of::<StoreFileHeader>() == STORE_HEADER_SIZE);

impl StoreFileHeader {
    pub fn new(page_size: u32, order: u32, unique: bool) -> Self {
        Self {
            magic: *STORE_MAGIC,
            version: U32::new(CURRENT_VERSION),
            page_size: U32::new(page_size),
            page_count: U32::new(0),
            root_page: U32::new(0),
            order: U32::new(order),
            flags: U32::new(if unique { FLAG_UNIQUE } else { 0 }),
            entry_count: U64::new(0),
            reserved: [0u8; 24],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= STORE_HEADER_SIZE,
            "buffer too small for StoreFileHeader: {} < {}",
            bytes.len(),
            STORE_HEADER_SIZE
        );

        let header = Self::read_from_bytes(&bytes[..STORE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse StoreFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == STORE_MAGIC,
            "invalid magic bytes: not an OakDB index file"
        );

        ensure!(
            header.version.get() == CURRENT_VERSION,
            "unsupported store version: {} (expected {})",
            header.version.get(),
            CURRENT_VERSION
        );

        Ok(header)
    }

    zerocopy_accessors! {
        page_count: u32,
        root_page: u32,
        entry_count: u64,
    }

    pub fn version(&self) -> u32 {
        self.version.get()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    pub fn order(&self) -> u32 {
        self.order.get()
    }

    pub fn unique(&self) -> bool {
        self.flags.get() & FLAG_UNIQUE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut header = StoreFileHeader::new(4096, 64, true);
        header.set_page_count(17);
        header.set_root_page(3);
        header.set_entry_count(4242);

        let parsed = StoreFileHeader::from_bytes(header.as_bytes()).unwrap();

        assert_eq!(parsed.version(), CURRENT_VERSION);
        assert_eq!(parsed.page_size(), 4096);
        assert_eq!(parsed.page_count(), 17);
        assert_eq!(parsed.root_page(), 3);
        assert_eq!(parsed.order(), 64);
        assert!(parsed.unique());
        assert_eq!(parsed.entry_count(), 4242);
    }

    #[test]
    fn non_unique_flag_round_trips() {
        let header = StoreFileHeader::new(4096, 32, false);
        let parsed = StoreFileHeader::from_bytes(header.as_bytes()).unwrap();
        assert!(!parsed.unique());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = StoreFileHeader::new(4096, 64, false).as_bytes().to_vec();
        bytes[0] = b'X';

        assert!(StoreFileHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_short_buffer() {
        let header = StoreFileHeader::new(4096, 64, false);
        assert!(StoreFileHeader::from_bytes(&header.as_bytes()[..32]).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = StoreFileHeader::new(4096, 64, false).as_bytes().to_vec();
        bytes[8] = 99;

        assert!(StoreFileHeader::from_bytes(&bytes).is_err());
    }
}
