//! File-backed page store.
//!
//! Pages are fixed size, cached through an LRU, and carry a trailing CRC32
//! checksum that is verified when a page is faulted in from disk. The pager
//! keeps its state behind a mutex so concurrent readers holding the
//! database read lock can still fault pages into the cache; the mutex is
//! only ever held for the duration of one page operation.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{DbError, Result};

/// Size of every page in the database file.
pub const PAGE_SIZE: usize = 8192;
/// Trailing bytes of each page reserved for the CRC32 checksum.
pub const PAGE_CHECKSUM_SIZE: usize = 4;
/// Default number of cached pages.
pub const DEFAULT_CACHE_PAGES: usize = 1024;

/// Identifier of one page within the database file.
pub type PageId = u32;

#[derive(Debug)]
struct Page {
    data: Vec<u8>,
    dirty: bool,
}

impl Page {
    fn new() -> Self {
        Self {
            data: vec![0; PAGE_SIZE],
            dirty: false,
        }
    }
}

/// Tuning knobs for [`Pager::open`].
#[derive(Debug, Clone)]
pub struct PagerOptions {
    /// Number of pages held in the LRU cache.
    pub cache_pages: usize,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            cache_pages: DEFAULT_CACHE_PAGES,
        }
    }
}

struct PagerState {
    file: File,
    cache: LruCache<PageId, Page>,
    file_len: u64,
}

/// LRU-cached page store over one database file.
pub struct Pager {
    state: Mutex<PagerState>,
}

impl Pager {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &Path, options: PagerOptions) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(DbError::Corruption(
                "database file length is not page aligned".into(),
            ));
        }
        let cache_pages = NonZeroUsize::new(options.cache_pages)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CACHE_PAGES).expect("nonzero default"));
        Ok(Self {
            state: Mutex::new(PagerState {
                file,
                cache: LruCache::new(cache_pages),
                file_len,
            }),
        })
    }

    /// Number of pages currently in the file.
    pub fn page_count(&self) -> usize {
        let state = self.state.lock();
        (state.file_len / PAGE_SIZE as u64) as usize
    }

    /// Appends a zeroed page and returns its id.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.state.lock();
        let next_page_id = (state.file_len / PAGE_SIZE as u64) as PageId;
        let mut page = Page::new();
        page.dirty = true;
        state.file_len += PAGE_SIZE as u64;
        push_page(&mut state, next_page_id, page)?;
        Ok(next_page_id)
    }

    /// Runs `f` over an immutable view of the page payload (checksum
    /// region excluded).
    pub fn with_page<F, T>(&self, page_id: PageId, mut f: F) -> Result<T>
    where
        F: FnMut(&[u8]) -> Result<T>,
    {
        let mut state = self.state.lock();
        fetch_page(&mut state, page_id)?;
        let page = state.cache.get(&page_id).expect("page just fetched");
        f(&page.data[..PAGE_SIZE - PAGE_CHECKSUM_SIZE])
    }

    /// Runs `f` over a mutable view of the page payload and marks the page
    /// dirty.
    pub fn with_page_mut<F, T>(&self, page_id: PageId, mut f: F) -> Result<T>
    where
        F: FnMut(&mut [u8]) -> Result<T>,
    {
        let mut state = self.state.lock();
        fetch_page(&mut state, page_id)?;
        let page = state.cache.get_mut(&page_id).expect("page just fetched");
        let result = f(&mut page.data[..PAGE_SIZE - PAGE_CHECKSUM_SIZE])?;
        page.dirty = true;
        Ok(result)
    }

    /// Writes every dirty cached page back to disk and syncs the file.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        let dirty: Vec<PageId> = state
            .cache
            .iter()
            .filter_map(|(&id, page)| page.dirty.then_some(id))
            .collect();
        if dirty.is_empty() {
            return Ok(());
        }
        for page_id in dirty {
            let mut data = state
                .cache
                .peek(&page_id)
                .expect("dirty page present")
                .data
                .clone();
            stamp_checksum(&mut data);
            write_page_image(&mut state.file, page_id, &data)?;
            if let Some(page) = state.cache.get_mut(&page_id) {
                page.data = data;
                page.dirty = false;
            }
        }
        state.file.sync_data()?;
        Ok(())
    }
}

fn push_page(state: &mut PagerState, page_id: PageId, page: Page) -> Result<()> {
    if let Some((evicted_id, evicted)) = state.cache.push(page_id, page) {
        if evicted_id != page_id && evicted.dirty {
            let mut data = evicted.data;
            stamp_checksum(&mut data);
            write_page_image(&mut state.file, evicted_id, &data)?;
        }
    }
    Ok(())
}

fn fetch_page(state: &mut PagerState, page_id: PageId) -> Result<()> {
    if state.cache.contains(&page_id) {
        return Ok(());
    }
    let offset = page_offset(page_id)?;
    if offset >= state.file_len {
        return Err(DbError::Corruption(format!(
            "page {page_id} beyond end of file"
        )));
    }
    let mut page = Page::new();
    state.file.seek(SeekFrom::Start(offset))?;
    let bytes_read = state.file.read(&mut page.data)?;
    if bytes_read < PAGE_SIZE {
        page.data[bytes_read..].fill(0);
    }
    verify_checksum(page_id, &page.data)?;
    push_page(state, page_id, page)
}

fn page_offset(page_id: PageId) -> Result<u64> {
    u64::from(page_id)
        .checked_mul(PAGE_SIZE as u64)
        .ok_or_else(|| DbError::InvalidArgument("page offset overflow".into()))
}

fn write_page_image(file: &mut File, page_id: PageId, data: &[u8]) -> Result<()> {
    let offset = page_offset(page_id)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

fn stamp_checksum(data: &mut [u8]) {
    let payload_end = data.len() - PAGE_CHECKSUM_SIZE;
    let checksum = crc32fast::hash(&data[..payload_end]);
    data[payload_end..].copy_from_slice(&checksum.to_le_bytes());
}

fn verify_checksum(page_id: PageId, data: &[u8]) -> Result<()> {
    if data.iter().all(|&b| b == 0) {
        return Ok(());
    }
    let payload_end = data.len() - PAGE_CHECKSUM_SIZE;
    let stored = u32::from_le_bytes(
        data[payload_end..]
            .try_into()
            .expect("checksum region is 4 bytes"),
    );
    let computed = crc32fast::hash(&data[..payload_end]);
    if stored != computed {
        return Err(DbError::Corruption(format!(
            "checksum mismatch on page {page_id}"
        )));
    }
    Ok(())
}
