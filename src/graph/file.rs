//! File records.

use crate::error::{DbError, Result};
use crate::store::{RecordKind, RecordRef, RecordStore, NULL_REF};

const OFF_LOCATION: usize = 0;
const OFF_FIRST_OCC: usize = 8;
const OFF_FIRST_INCLUDE: usize = 16;
const OFF_FIRST_INCLUDED_BY: usize = 24;
const OFF_FIRST_MACRO: usize = 32;
const OFF_FINGERPRINT: usize = 40;
const RECORD_SIZE: usize = 48;

/// One indexed translation unit or header.
///
/// The record's identity is stable across re-indexing so that include
/// edges owned by other files keep pointing at it; only explicit removal
/// frees it, after both include chains are detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord(RecordRef);

impl FileRecord {
    /// Wraps an existing file record, checking the record kind.
    pub fn from_ref(store: &RecordStore, r: RecordRef) -> Result<Self> {
        match store.kind_of(r)? {
            RecordKind::File => Ok(Self(r)),
            other => Err(DbError::Corruption(format!(
                "expected file record, found {other:?}"
            ))),
        }
    }

    /// Creates an empty file record owning its location string.
    pub fn create(store: &mut RecordStore, location: &str) -> Result<Self> {
        let location_ref = store.alloc_string(location)?;
        let r = store.allocate(RecordKind::File, RECORD_SIZE)?;
        store.put_ref(r, OFF_LOCATION, location_ref)?;
        Ok(Self(r))
    }

    /// Underlying record reference.
    pub fn record(self) -> RecordRef {
        self.0
    }

    /// Reference to the location string record.
    pub fn location_ref(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_LOCATION)
    }

    /// Reads the location.
    pub fn location(self, store: &RecordStore) -> Result<String> {
        store.read_string(self.location_ref(store)?)
    }

    /// Head of the occurrence chain.
    pub fn first_occurrence(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_FIRST_OCC)
    }

    /// Replaces the occurrence chain head.
    pub fn set_first_occurrence(self, store: &mut RecordStore, head: RecordRef) -> Result<()> {
        store.put_ref(self.0, OFF_FIRST_OCC, head)
    }

    /// Head of the chain of edges where this file is the includer.
    pub fn first_include(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_FIRST_INCLUDE)
    }

    /// Replaces the includes chain head.
    pub fn set_first_include(self, store: &mut RecordStore, head: RecordRef) -> Result<()> {
        store.put_ref(self.0, OFF_FIRST_INCLUDE, head)
    }

    /// Head of the chain of edges where this file is the included one.
    pub fn first_included_by(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_FIRST_INCLUDED_BY)
    }

    /// Replaces the included-by chain head.
    pub fn set_first_included_by(self, store: &mut RecordStore, head: RecordRef) -> Result<()> {
        store.put_ref(self.0, OFF_FIRST_INCLUDED_BY, head)
    }

    /// Head of the macro chain (definition order).
    pub fn first_macro(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_FIRST_MACRO)
    }

    /// Replaces the macro chain head.
    pub fn set_first_macro(self, store: &mut RecordStore, head: RecordRef) -> Result<()> {
        store.put_ref(self.0, OFF_FIRST_MACRO, head)
    }

    /// Content fingerprint recorded at indexing time.
    pub fn fingerprint(self, store: &RecordStore) -> Result<u64> {
        store.get_u64(self.0, OFF_FINGERPRINT)
    }

    /// Updates the content fingerprint.
    pub fn set_fingerprint(self, store: &mut RecordStore, fingerprint: u64) -> Result<()> {
        store.put_u64(self.0, OFF_FINGERPRINT, fingerprint)
    }

    /// Resets every chain head after a teardown.
    pub(crate) fn clear_content(self, store: &mut RecordStore) -> Result<()> {
        store.put_ref(self.0, OFF_FIRST_OCC, NULL_REF)?;
        store.put_ref(self.0, OFF_FIRST_INCLUDE, NULL_REF)?;
        store.put_ref(self.0, OFF_FIRST_MACRO, NULL_REF)?;
        store.put_u64(self.0, OFF_FINGERPRINT, 0)
    }

    /// Frees the record and its location string. The caller must already
    /// have torn down both include chains and the occurrence and macro
    /// chains.
    pub(crate) fn free(self, store: &mut RecordStore) -> Result<()> {
        let location = self.location_ref(store)?;
        store.free(location)?;
        store.free(self.0)
    }
}
