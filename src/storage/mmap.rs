//! # Memory-Mapped File Storage
//!
//! This module implements `MmapStorage`, the low-level building block for
//! memory-mapped store file access. It hands out page-sized slices of the
//! mapped region and knows how to grow, sync and tear the mapping down.
//!
//! ## Internal Component
//!
//! `MmapStorage` is used by `PageStore` to manage a single index file.
//! Users should not create `MmapStorage` instances directly; the
//! higher-level index API owns the file lifecycle.
//!
//! ## Safety Considerations
//!
//! Memory-mapped regions become invalid when remapped (during `grow()`).
//! The typical solutions involve runtime overhead - hazard pointers,
//! epoch-based reclamation, reference counting. OakDB instead leverages
//! Rust's borrow checker:
//!
//! ```text
//! page(&self) -> &[u8]              // Immutable borrow of self
//! page_mut(&mut self) -> &mut [u8]  // Mutable borrow of self
//! grow(&mut self)                   // Mutable borrow (exclusive)
//! ```
//!
//! Since `grow()` requires `&mut self`, the compiler ensures no page
//! references exist when the region is remapped.
//!
//! ## Teardown
//!
//! `close(self)` flushes and then drops the mapping before the file
//! handle. Dropping a `MmapMut` unmaps synchronously on every supported
//! platform, so release is deterministic; there is no bounded-wait
//! fallback path.
//!
//! ## File Format
//!
//! Store files are simply concatenated fixed-size pages:
//!
//! ```text
//! Offset 0:            Page 0
//! Offset page_size:    Page 1
//! Offset 2*page_size:  Page 2
//! ...
//! ```
//!
//! Page 0 contains the store header. The file size is always a multiple of
//! the page size, which is chosen at creation time and fixed thereafter.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

use crate::config::MIN_PAGE_SIZE;

#[derive(Debug)]
pub struct MmapStorage {
    file: File,
    mmap: MmapMut,
    page_size: usize,
    page_count: u32,
}

impl MmapStorage {
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            page_size >= MIN_PAGE_SIZE,
            "page size {} is below the supported minimum {}",
            page_size,
            MIN_PAGE_SIZE
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open store file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?;

        let file_size = metadata.len();

        ensure!(
            file_size > 0,
            "cannot open empty store file '{}'",
            path.display()
        );

        ensure!(
            file_size % page_size as u64 == 0,
            "store file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            page_size
        );

        let page_count = (file_size / page_size as u64) as u32;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally, leading to undefined behavior. This is safe
        // because:
        // 1. The file is opened with exclusive write access (read+write mode)
        // 2. Store files are not meant to be modified by external processes
        // 3. The mmap lifetime is tied to MmapStorage, preventing use-after-unmap
        // 4. All access goes through page()/page_mut() which bounds-check page_no
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self { file, mmap, page_size, page_count })
    }

    pub fn create<P: AsRef<Path>>(
        path: P,
        page_size: usize,
        initial_page_count: u32,
    ) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            page_size >= MIN_PAGE_SIZE,
            "page size {} is below the supported minimum {}",
            page_size,
            MIN_PAGE_SIZE
        );
        ensure!(
            initial_page_count > 0,
            "initial page count must be at least 1"
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create store file '{}'", path.display()))?;

        let file_size = initial_page_count as u64 * page_size as u64;

        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally. This is safe because:
        // 1. We just created this file with exclusive access (truncate=true)
        // 2. The file size is set to a valid multiple of page_size
        // 3. The mmap lifetime is tied to MmapStorage, preventing use-after-unmap
        // 4. All access goes through page()/page_mut() which bounds-check page_no
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self { file, mmap, page_size, page_count: initial_page_count })
    }

    pub fn page(&self, page_no: u32) -> Result<&[u8]> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );

        let offset = page_no as usize * self.page_size;
        Ok(&self.mmap[offset..offset + self.page_size])
    }

    pub fn page_mut(&mut self, page_no: u32) -> Result<&mut [u8]> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );

        let offset = page_no as usize * self.page_size;
        Ok(&mut self.mmap[offset..offset + self.page_size])
    }

    /// Flat view of the whole mapped region, for the cursor I/O layer.
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub fn grow(&mut self, new_page_count: u32) -> Result<()> {
        if new_page_count <= self.page_count {
            return Ok(());
        }

        self.mmap
            .flush()
            .wrap_err("failed to flush mmap before grow")?;

        let new_size = new_page_count as u64 * self.page_size as u64;

        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend file to {} bytes", new_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because the old mmap becomes
        // invalid. This is safe because:
        // 1. grow() requires &mut self, so no page references can exist
        // 2. We flushed the old mmap above, ensuring data is written to disk
        // 3. The file was extended to new_size before remapping
        // 4. The old mmap is dropped when we assign the new one
        self.mmap =
            unsafe { MmapMut::map_mut(&self.file).wrap_err("failed to remap file after grow")? };

        self.page_count = new_page_count;

        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to sync mmap to disk")
    }

    /// Flushes and releases the mapping, then the file handle. Dropping the
    /// map unmaps the region synchronously, so teardown is deterministic.
    pub fn close(self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to flush mmap on close")?;
        drop(self.mmap);
        drop(self.file);
        Ok(())
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn file_size(&self) -> u64 {
        self.page_count as u64 * self.page_size as u64
    }

    #[cfg_attr(not(unix), allow(unused_variables))]
    pub fn prefetch_pages(&self, start_page: u32, count: u32) {
        if start_page >= self.page_count {
            return;
        }

        #[cfg(unix)]
        {
            let end_page = (start_page + count).min(self.page_count);
            let start_offset = start_page as usize * self.page_size;
            let len = (end_page - start_page) as usize * self.page_size;

            // SAFETY: madvise with MADV_WILLNEED is a hint to the kernel. The
            // range is valid because:
            // 1. start_page was bounds-checked above
            // 2. end_page is clamped to self.page_count, so we never exceed
            //    the mmap bounds
            // 3. start_offset + len is at most page_count * page_size = file size
            unsafe {
                libc::madvise(
                    self.mmap.as_ptr().add(start_offset) as *mut libc::c_void,
                    len,
                    libc::MADV_WILLNEED,
                );
            }
        }
    }
}
