//! Include-edge records.

use crate::error::{DbError, Result};
use crate::graph::FileRecord;
use crate::store::{RecordKind, RecordRef, RecordStore, NULL_REF};

const OFF_INCLUDER: usize = 0;
const OFF_INCLUDED: usize = 8;
const OFF_INCLUDES_PREV: usize = 16;
const OFF_INCLUDES_NEXT: usize = 24;
const OFF_INCLUDED_BY_PREV: usize = 32;
const OFF_INCLUDED_BY_NEXT: usize = 40;
const OFF_TOKEN_OFFSET: usize = 48;
const OFF_TOKEN_LENGTH: usize = 51;
const OFF_FLAGS: usize = 53;
const RECORD_SIZE: usize = 54;

const FLAG_SYSTEM: u8 = 0x01;

/// One `#include` relationship.
///
/// The edge is doubly linked into both the includer's "includes" chain and
/// the included file's "included-by" chain; [`IncludeRecord::detach`]
/// unlinks both sides before the record is freed, so a partially detached
/// edge is never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeRecord(RecordRef);

impl IncludeRecord {
    /// Wraps an existing include record, checking the record kind.
    pub fn from_ref(store: &RecordStore, r: RecordRef) -> Result<Self> {
        match store.kind_of(r)? {
            RecordKind::Include => Ok(Self(r)),
            other => Err(DbError::Corruption(format!(
                "expected include record, found {other:?}"
            ))),
        }
    }

    /// Creates an edge and links it onto the heads of both chains.
    pub(crate) fn create(
        store: &mut RecordStore,
        includer: FileRecord,
        included: FileRecord,
        token_offset: u32,
        token_length: u16,
        system: bool,
    ) -> Result<Self> {
        if token_offset >= 1 << 24 {
            return Err(DbError::InvalidArgument(format!(
                "include token offset {token_offset} exceeds the stored 24-bit range"
            )));
        }
        let r = store.allocate(RecordKind::Include, RECORD_SIZE)?;
        store.put_ref(r, OFF_INCLUDER, includer.record())?;
        store.put_ref(r, OFF_INCLUDED, included.record())?;
        store.put_u24(r, OFF_TOKEN_OFFSET, token_offset)?;
        store.put_u16(r, OFF_TOKEN_LENGTH, token_length)?;
        store.put_u8(r, OFF_FLAGS, if system { FLAG_SYSTEM } else { 0 })?;

        let includes_head = includer.first_include(store)?;
        store.put_ref(r, OFF_INCLUDES_NEXT, includes_head)?;
        if !includes_head.is_null() {
            store.put_ref(includes_head, OFF_INCLUDES_PREV, r)?;
        }
        includer.set_first_include(store, r)?;

        let included_by_head = included.first_included_by(store)?;
        store.put_ref(r, OFF_INCLUDED_BY_NEXT, included_by_head)?;
        if !included_by_head.is_null() {
            store.put_ref(included_by_head, OFF_INCLUDED_BY_PREV, r)?;
        }
        included.set_first_included_by(store, r)?;

        Ok(Self(r))
    }

    /// Underlying record reference.
    pub fn record(self) -> RecordRef {
        self.0
    }

    /// File doing the including.
    pub fn includer(self, store: &RecordStore) -> Result<FileRecord> {
        FileRecord::from_ref(store, store.get_ref(self.0, OFF_INCLUDER)?)
    }

    /// File being included.
    pub fn included(self, store: &RecordStore) -> Result<FileRecord> {
        FileRecord::from_ref(store, store.get_ref(self.0, OFF_INCLUDED)?)
    }

    /// Next edge in the includer's chain.
    pub fn includes_next(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_INCLUDES_NEXT)
    }

    /// Next edge in the included file's reverse chain.
    pub fn included_by_next(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_INCLUDED_BY_NEXT)
    }

    /// Byte offset of the include token text.
    pub fn token_offset(self, store: &RecordStore) -> Result<u32> {
        store.get_u24(self.0, OFF_TOKEN_OFFSET)
    }

    /// Byte length of the include token text.
    pub fn token_length(self, store: &RecordStore) -> Result<u16> {
        store.get_u16(self.0, OFF_TOKEN_LENGTH)
    }

    /// Whether the include was resolved via the system include path.
    pub fn is_system(self, store: &RecordStore) -> Result<bool> {
        Ok(store.get_u8(self.0, OFF_FLAGS)? & FLAG_SYSTEM != 0)
    }

    /// Unlinks the edge from both chains. The record itself is left for
    /// the caller to free.
    pub(crate) fn detach(self, store: &mut RecordStore) -> Result<()> {
        let includer = self.includer(store)?;
        let included = self.included(store)?;

        let prev = store.get_ref(self.0, OFF_INCLUDES_PREV)?;
        let next = store.get_ref(self.0, OFF_INCLUDES_NEXT)?;
        if prev.is_null() {
            includer.set_first_include(store, next)?;
        } else {
            store.put_ref(prev, OFF_INCLUDES_NEXT, next)?;
        }
        if !next.is_null() {
            store.put_ref(next, OFF_INCLUDES_PREV, prev)?;
        }

        let prev = store.get_ref(self.0, OFF_INCLUDED_BY_PREV)?;
        let next = store.get_ref(self.0, OFF_INCLUDED_BY_NEXT)?;
        if prev.is_null() {
            included.set_first_included_by(store, next)?;
        } else {
            store.put_ref(prev, OFF_INCLUDED_BY_NEXT, next)?;
        }
        if !next.is_null() {
            store.put_ref(next, OFF_INCLUDED_BY_PREV, prev)?;
        }

        store.put_ref(self.0, OFF_INCLUDES_PREV, NULL_REF)?;
        store.put_ref(self.0, OFF_INCLUDES_NEXT, NULL_REF)?;
        store.put_ref(self.0, OFF_INCLUDED_BY_PREV, NULL_REF)?;
        store.put_ref(self.0, OFF_INCLUDED_BY_NEXT, NULL_REF)
    }
}
