//! # Paged Binary I/O
//!
//! This module implements `PageStore`, the positioned binary I/O layer the
//! index serializes its nodes through. A store is a growable file of
//! fixed-size pages with a single read/write cursor:
//!
//! ```text
//! seek(page, offset)      position the cursor
//! read_i64() / write_i64() / ...   scalar primitives at the cursor
//! write_i64_array(&[..])  bulk primitives
//! allocate_page()         reserve the next page id
//! flush()                 the only durability boundary
//! close()                 flush + deterministic unmap (consumes the store)
//! ```
//!
//! ## Allocation Model
//!
//! Page ids form a monotonically growing space: `allocate_page` hands out
//! the next id and never reuses one. There is no free list; pages orphaned
//! by the index (merged-away nodes) simply stay unreferenced. The allocated
//! count is persisted in the store header by the index layer and restored
//! through [`PageStore::set_page_count`] on reopen.
//!
//! When allocation runs past the mapped extent the backing file grows by
//! [`GROW_CHUNK_PAGES`] pages at a time to amortize remap cost.
//!
//! ## Bounds Policy
//!
//! Every primitive advances the cursor by its exact encoded width - no
//! implicit padding - and is checked against the *allocated* extent, so a
//! read or write that runs past the last allocated page fails with a
//! descriptive error. Nothing above page granularity is validated here:
//! this layer is deliberately unintelligent about tree structure, and
//! node-boundary safety belongs to the index layer.
//!
//! All scalars are little-endian. Strings encode as `[len: u32][raw bytes]`.
//!
//! ## Closed Stores
//!
//! `close(self)` consumes the store, so any use after close is rejected at
//! compile time rather than surfacing as a runtime error class.

use std::path::Path;

use eyre::{bail, ensure, Result};
use tracing::debug;

use crate::config::{GROW_CHUNK_PAGES, INITIAL_PAGE_COUNT};
use crate::storage::MmapStorage;

/// Anything that can reserve fresh page ids. The B+tree allocates pages for
/// new nodes through this trait so the tree algorithm stays testable
/// without a backing file.
pub trait PageAllocator {
    fn allocate_page(&mut self) -> Result<u32>;
}

#[derive(Debug)]
pub struct PageStore {
    storage: MmapStorage,
    /// Number of allocated pages; the next page id to hand out.
    page_count: u32,
    /// Cursor as an absolute byte offset into the mapped region.
    pos: usize,
    write_ops: u64,
}

impl PageStore {
    /// Creates a new store file. No pages are allocated yet; the caller
    /// allocates page 0 for its header before anything else.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let storage = MmapStorage::create(path, page_size, INITIAL_PAGE_COUNT)?;
        Ok(Self { storage, page_count: 0, pos: 0, write_ops: 0 })
    }

    /// Opens an existing store file. Until [`PageStore::set_page_count`]
    /// restores the persisted allocator state, every page in the file
    /// counts as allocated.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let storage = MmapStorage::open(path, page_size)?;
        let page_count = storage.page_count();
        Ok(Self { storage, page_count, pos: 0, write_ops: 0 })
    }

    /// Reserves the next page id, growing the backing file when the id
    /// runs past the mapped extent. Exhaustion of the id space is fatal.
    pub fn allocate_page(&mut self) -> Result<u32> {
        if self.page_count == u32::MAX {
            bail!("page id space exhausted ({} pages allocated)", self.page_count);
        }
        let page_id = self.page_count;
        self.page_count += 1;

        if self.page_count > self.storage.page_count() {
            let target = self.storage.page_count().saturating_add(GROW_CHUNK_PAGES).max(self.page_count);
            debug!(pages = target, "growing store file");
            self.storage.grow(target)?;
        }

        Ok(page_id)
    }

    /// Positions the cursor at `offset` bytes into page `page_id`.
    pub fn seek(&mut self, page_id: u32, offset: usize) -> Result<()> {
        ensure!(
            page_id < self.page_count,
            "seek to unallocated page {} (page_count={})",
            page_id,
            self.page_count
        );
        ensure!(
            offset < self.storage.page_size(),
            "seek offset {} exceeds page size {}",
            offset,
            self.storage.page_size()
        );
        self.pos = page_id as usize * self.storage.page_size() + offset;
        Ok(())
    }

    fn extent(&self) -> usize {
        self.page_count as usize * self.storage.page_size()
    }

    fn read_slice(&mut self, len: usize) -> Result<&[u8]> {
        ensure!(
            self.pos + len <= self.extent(),
            "read of {} bytes at offset {} runs past the allocated extent {}",
            len,
            self.pos,
            self.extent()
        );
        let start = self.pos;
        self.pos += len;
        Ok(&self.storage.as_slice()[start..start + len])
    }

    fn write_slice(&mut self, len: usize) -> Result<&mut [u8]> {
        ensure!(
            self.pos + len <= self.extent(),
            "write of {} bytes at offset {} runs past the allocated extent {}",
            len,
            self.pos,
            self.extent()
        );
        let start = self.pos;
        self.pos += len;
        self.write_ops += 1;
        Ok(&mut self.storage.as_mut_slice()[start..start + len])
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_slice(N)?);
        Ok(buf)
    }

    // ------------------------------------------------------------------
    // Scalar primitives
    // ------------------------------------------------------------------

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_fixed()?))
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_slice(1)?[0] = value;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_slice(2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_slice(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_slice(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_slice(8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_slice(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_slice(8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bulk primitives
    // ------------------------------------------------------------------

    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        let slice = self.read_slice(out.len())?;
        out.copy_from_slice(slice);
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.write_slice(data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn read_i32_into(&mut self, out: &mut [i32]) -> Result<()> {
        let slice = self.read_slice(out.len() * 4)?;
        for (value, chunk) in out.iter_mut().zip(slice.chunks_exact(4)) {
            *value = i32::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(())
    }

    pub fn write_i32_array(&mut self, values: &[i32]) -> Result<()> {
        let slice = self.write_slice(values.len() * 4)?;
        for (chunk, value) in slice.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn read_i64_into(&mut self, out: &mut [i64]) -> Result<()> {
        let slice = self.read_slice(out.len() * 8)?;
        for (value, chunk) in out.iter_mut().zip(slice.chunks_exact(8)) {
            *value = i64::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(())
    }

    pub fn write_i64_array(&mut self, values: &[i64]) -> Result<()> {
        let slice = self.write_slice(values.len() * 8)?;
        for (chunk, value) in slice.chunks_exact_mut(8).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Reads a `[len: u32][raw bytes]` string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf).map_err(|e| eyre::eyre!("invalid UTF-8 in stored string: {}", e))
    }

    /// Writes a `[len: u32][raw bytes]` string.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_u32(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    /// Advances the cursor over `n` bytes without reading them.
    pub fn skip_read(&mut self, n: usize) -> Result<()> {
        self.read_slice(n)?;
        Ok(())
    }

    /// Zero-fills `n` bytes at the cursor.
    pub fn skip_write(&mut self, n: usize) -> Result<()> {
        let slice = self.write_slice(n)?;
        slice.fill(0);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    /// Page the cursor currently points into.
    pub fn current_page(&self) -> u32 {
        (self.pos / self.storage.page_size()) as u32
    }

    /// Byte offset of the cursor within its page.
    pub fn offset_in_page(&self) -> usize {
        self.pos % self.storage.page_size()
    }

    pub fn page_size(&self) -> usize {
        self.storage.page_size()
    }

    /// Number of allocated pages.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Restores the allocator state persisted in the store header.
    pub fn set_page_count(&mut self, page_count: u32) -> Result<()> {
        ensure!(
            page_count <= self.storage.page_count(),
            "persisted page count {} exceeds the file's {} pages",
            page_count,
            self.storage.page_count()
        );
        self.page_count = page_count;
        Ok(())
    }

    /// Number of write operations issued since the store was opened.
    pub fn write_count(&self) -> u64 {
        self.write_ops
    }

    /// Hints the OS to fault in a range of pages ahead of a scan.
    pub fn prefetch_pages(&self, start_page: u32, count: u32) {
        self.storage.prefetch_pages(start_page, count);
    }

    /// Forces all buffered pages to durable storage. Safe to call at any
    /// time; this is the only durability boundary.
    pub fn flush(&self) -> Result<()> {
        self.storage.sync()
    }

    /// Flushes and releases the store. Consuming `self` makes any further
    /// operation on a closed store a compile error.
    pub fn close(self) -> Result<()> {
        debug!(pages = self.page_count, writes = self.write_ops, "closing page store");
        self.storage.close()
    }
}

impl PageAllocator for PageStore {
    fn allocate_page(&mut self) -> Result<u32> {
        PageStore::allocate_page(self)
    }
}
