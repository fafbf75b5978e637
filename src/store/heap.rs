//! Record heap: allocate/free plus typed field access.

use rustc_hash::FxHashSet;

use crate::error::{DbError, Result};
use crate::pager::{PageId, Pager};
use crate::store::page::{self, RecordPage};
use crate::store::{RecordKind, RecordRef};

/// Heap of typed records over the pager.
///
/// Allocation prefers the most recently written page, then pages known to
/// hold freed slots of compatible size, then fully-freed pages from the
/// free-page list, and only then grows the file. Freed records may be
/// reused by later allocations; the generation stamps carried by
/// [`RecordRef`] make any read through a stale reference a detected
/// corruption rather than a silent misread.
pub struct RecordStore {
    pager: Pager,
    free_page_head: Option<PageId>,
    last_record_page: Option<PageId>,
    pages_with_free_slots: FxHashSet<PageId>,
}

impl RecordStore {
    /// Wraps a pager together with the allocator state persisted in the
    /// database header.
    pub fn new(
        pager: Pager,
        free_page_head: Option<PageId>,
        last_record_page: Option<PageId>,
    ) -> Self {
        Self {
            pager,
            free_page_head,
            last_record_page,
            pages_with_free_slots: FxHashSet::default(),
        }
    }

    /// Underlying pager.
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Head of the free-page list, for header persistence.
    pub fn free_page_head(&self) -> Option<PageId> {
        self.free_page_head
    }

    /// Most recently written record page, for header persistence.
    pub fn last_record_page(&self) -> Option<PageId> {
        self.last_record_page
    }

    /// Allocates a record of `size` payload bytes.
    pub fn allocate(&mut self, kind: RecordKind, size: usize) -> Result<RecordRef> {
        if size == 0 || size > page::MAX_RECORD_SIZE {
            return Err(DbError::InvalidArgument(format!(
                "record size {size} outside supported range"
            )));
        }

        if let Some(page_id) = self.last_record_page {
            if let Some(r) = self.try_alloc_in_page(page_id, kind, size)? {
                return Ok(r);
            }
        }

        let candidates: Vec<PageId> = self.pages_with_free_slots.iter().copied().collect();
        for page_id in candidates {
            if let Some(r) = self.try_alloc_in_page(page_id, kind, size)? {
                self.last_record_page = Some(page_id);
                return Ok(r);
            }
        }

        let page_id = match self.take_free_page()? {
            Some(page_id) => page_id,
            None => {
                let page_id = self.pager.allocate_page()?;
                if page_id == 0 {
                    // Page 0 is reserved for the database header.
                    self.pager.allocate_page()?
                } else {
                    page_id
                }
            }
        };
        let r = self
            .try_alloc_in_page(page_id, kind, size)?
            .ok_or_else(|| DbError::Corruption("fresh page cannot fit record".into()))?;
        self.last_record_page = Some(page_id);
        Ok(r)
    }

    fn try_alloc_in_page(
        &mut self,
        page_id: PageId,
        kind: RecordKind,
        size: usize,
    ) -> Result<Option<RecordRef>> {
        let outcome = self.pager.with_page_mut(page_id, |data| {
            let mut record_page = RecordPage::new(data);
            record_page.initialize();
            for slot in 0..page::slot_count(data) as usize {
                let mut record_page = RecordPage::new(data);
                if record_page.try_reuse(slot, kind, size)? {
                    let generation = page::slot_header(data, slot)?.generation;
                    let still_free = page::has_free_slots(data)?;
                    return Ok(Some((slot as u16, generation, still_free)));
                }
            }
            let mut record_page = RecordPage::new(data);
            if record_page.can_fit(size) {
                let slot = record_page.append(kind, size)?;
                let generation = page::slot_header(data, slot as usize)?.generation;
                let still_free = page::has_free_slots(data)?;
                return Ok(Some((slot, generation, still_free)));
            }
            Ok(None)
        })?;

        Ok(outcome.map(|(slot, generation, still_free)| {
            if still_free {
                self.pages_with_free_slots.insert(page_id);
            } else {
                self.pages_with_free_slots.remove(&page_id);
            }
            RecordRef::new(page_id, slot, generation)
        }))
    }

    fn take_free_page(&mut self) -> Result<Option<PageId>> {
        let Some(head) = self.free_page_head else {
            return Ok(None);
        };
        let next = self.pager.with_page_mut(head, |data| {
            let next = page::free_list_next(data);
            let mut record_page = RecordPage::new(data);
            record_page.set_free_list_next(0);
            record_page.initialize();
            Ok(next)
        })?;
        self.free_page_head = if next == 0 { None } else { Some(next) };
        Ok(Some(head))
    }

    /// Frees the record, bumping its slot generation. The caller must have
    /// already removed every reference to it from the graph.
    pub fn free(&mut self, r: RecordRef) -> Result<()> {
        let expected = r;
        let page_empty = self.pager.with_page_mut(r.page(), |data| {
            validate_slot(data, expected)?;
            let mut record_page = RecordPage::new(data);
            record_page.free_slot(expected.slot() as usize)
        })?;

        if page_empty {
            self.pages_with_free_slots.remove(&r.page());
            let head = self.free_page_head.unwrap_or(0);
            self.pager.with_page_mut(r.page(), |data| {
                let mut record_page = RecordPage::new(data);
                record_page.recycle();
                record_page.set_free_list_next(head);
                Ok(())
            })?;
            self.free_page_head = Some(r.page());
            if self.last_record_page == Some(r.page()) {
                self.last_record_page = None;
            }
        } else {
            self.pages_with_free_slots.insert(r.page());
        }
        Ok(())
    }

    /// Kind tag of a live record.
    pub fn kind_of(&self, r: RecordRef) -> Result<RecordKind> {
        self.pager.with_page(r.page(), |data| {
            validate_slot(data, r)?;
            Ok(page::slot_header(data, r.slot() as usize)?.kind)
        })
    }

    fn with_record<F, T>(&self, r: RecordRef, mut f: F) -> Result<T>
    where
        F: FnMut(&[u8]) -> Result<T>,
    {
        if r.is_null() {
            return Err(DbError::Corruption("null record reference".into()));
        }
        self.pager.with_page(r.page(), |data| {
            validate_slot(data, r)?;
            let range = page::payload_range(data, r.slot() as usize)?;
            f(&data[range])
        })
    }

    fn with_record_mut<F, T>(&mut self, r: RecordRef, mut f: F) -> Result<T>
    where
        F: FnMut(&mut [u8]) -> Result<T>,
    {
        if r.is_null() {
            return Err(DbError::Corruption("null record reference".into()));
        }
        self.pager.with_page_mut(r.page(), |data| {
            validate_slot(data, r)?;
            let range = page::payload_range(data, r.slot() as usize)?;
            f(&mut data[range])
        })
    }

    fn get_array<const N: usize>(&self, r: RecordRef, offset: usize) -> Result<[u8; N]> {
        self.with_record(r, |payload| {
            let slice = payload
                .get(offset..offset + N)
                .ok_or_else(|| field_overrun(offset, N, payload.len()))?;
            Ok(slice.try_into().expect("slice of exactly N bytes"))
        })
    }

    fn put_array<const N: usize>(&mut self, r: RecordRef, offset: usize, value: [u8; N]) -> Result<()> {
        self.with_record_mut(r, |payload| {
            let len = payload.len();
            let slice = payload
                .get_mut(offset..offset + N)
                .ok_or_else(|| field_overrun(offset, N, len))?;
            slice.copy_from_slice(&value);
            Ok(())
        })
    }

    /// Reads one byte at `offset`.
    pub fn get_u8(&self, r: RecordRef, offset: usize) -> Result<u8> {
        Ok(self.get_array::<1>(r, offset)?[0])
    }

    /// Writes one byte at `offset`.
    pub fn put_u8(&mut self, r: RecordRef, offset: usize, value: u8) -> Result<()> {
        self.put_array(r, offset, [value])
    }

    /// Reads a little-endian u16 at `offset`.
    pub fn get_u16(&self, r: RecordRef, offset: usize) -> Result<u16> {
        Ok(u16::from_le_bytes(self.get_array(r, offset)?))
    }

    /// Writes a little-endian u16 at `offset`.
    pub fn put_u16(&mut self, r: RecordRef, offset: usize, value: u16) -> Result<()> {
        self.put_array(r, offset, value.to_le_bytes())
    }

    /// Reads a 3-byte little-endian unsigned integer at `offset`.
    pub fn get_u24(&self, r: RecordRef, offset: usize) -> Result<u32> {
        let bytes = self.get_array::<3>(r, offset)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    /// Writes a 3-byte little-endian unsigned integer at `offset`.
    pub fn put_u24(&mut self, r: RecordRef, offset: usize, value: u32) -> Result<()> {
        if value >= 1 << 24 {
            return Err(DbError::InvalidArgument(format!(
                "value {value} exceeds 24-bit range"
            )));
        }
        let bytes = value.to_le_bytes();
        self.put_array(r, offset, [bytes[0], bytes[1], bytes[2]])
    }

    /// Reads a little-endian u32 at `offset`.
    pub fn get_u32(&self, r: RecordRef, offset: usize) -> Result<u32> {
        Ok(u32::from_le_bytes(self.get_array(r, offset)?))
    }

    /// Writes a little-endian u32 at `offset`.
    pub fn put_u32(&mut self, r: RecordRef, offset: usize, value: u32) -> Result<()> {
        self.put_array(r, offset, value.to_le_bytes())
    }

    /// Reads a little-endian u64 at `offset`.
    pub fn get_u64(&self, r: RecordRef, offset: usize) -> Result<u64> {
        Ok(u64::from_le_bytes(self.get_array(r, offset)?))
    }

    /// Writes a little-endian u64 at `offset`.
    pub fn put_u64(&mut self, r: RecordRef, offset: usize, value: u64) -> Result<()> {
        self.put_array(r, offset, value.to_le_bytes())
    }

    /// Reads a record reference at `offset`.
    pub fn get_ref(&self, r: RecordRef, offset: usize) -> Result<RecordRef> {
        Ok(RecordRef::from_u64(self.get_u64(r, offset)?))
    }

    /// Writes a record reference at `offset`.
    pub fn put_ref(&mut self, r: RecordRef, offset: usize, value: RecordRef) -> Result<()> {
        self.put_u64(r, offset, value.to_u64())
    }

    /// Stores a length-prefixed UTF-8 string as its own record.
    pub fn alloc_string(&mut self, s: &str) -> Result<RecordRef> {
        let bytes = s.as_bytes();
        if bytes.len() > u16::MAX as usize || 2 + bytes.len() > page::MAX_RECORD_SIZE {
            return Err(DbError::InvalidArgument(format!(
                "string of {} bytes too large for one record",
                bytes.len()
            )));
        }
        let r = self.allocate(RecordKind::String, 2 + bytes.len())?;
        self.with_record_mut(r, |payload| {
            payload[0..2].copy_from_slice(&(bytes.len() as u16).to_le_bytes());
            payload[2..2 + bytes.len()].copy_from_slice(bytes);
            Ok(())
        })?;
        Ok(r)
    }

    /// Reads back a string record.
    pub fn read_string(&self, r: RecordRef) -> Result<String> {
        self.with_record(r, |payload| {
            if payload.len() < 2 {
                return Err(DbError::Corruption("string record truncated".into()));
            }
            let len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
            let bytes = payload
                .get(2..2 + len)
                .ok_or_else(|| DbError::Corruption("string length past record extent".into()))?;
            String::from_utf8(bytes.to_vec())
                .map_err(|_| DbError::Corruption("string record is not UTF-8".into()))
        })
    }
}

fn validate_slot(data: &[u8], r: RecordRef) -> Result<()> {
    let header = page::slot_header(data, r.slot() as usize)?;
    if header.kind == RecordKind::Free {
        return Err(DbError::Corruption(format!(
            "reference to freed record at page {} slot {}",
            r.page(),
            r.slot()
        )));
    }
    if header.generation != r.generation() {
        return Err(DbError::Corruption(format!(
            "stale record reference at page {} slot {} (generation {} vs {})",
            r.page(),
            r.slot(),
            r.generation(),
            header.generation
        )));
    }
    Ok(())
}

fn field_overrun(offset: usize, len: usize, extent: usize) -> DbError {
    DbError::Corruption(format!(
        "field access [{offset}, {}) past record extent {extent}",
        offset + len
    ))
}
