//! Macro-definition records.

use crate::error::{DbError, Result};
use crate::graph::FileRecord;
use crate::store::{RecordKind, RecordRef, RecordStore, NULL_REF};

const OFF_FILE: usize = 0;
const OFF_NEXT: usize = 8;
const OFF_NAME: usize = 16;
const OFF_PARAMS: usize = 24;
const OFF_EXPANSION: usize = 32;
const RECORD_SIZE: usize = 40;

/// One macro definition inside a file.
///
/// The per-file chain preserves definition order, so redefinitions of the
/// same name show up as distinct entries in the order the preprocessor saw
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroRecord(RecordRef);

impl MacroRecord {
    /// Wraps an existing macro record, checking the record kind.
    pub fn from_ref(store: &RecordStore, r: RecordRef) -> Result<Self> {
        match store.kind_of(r)? {
            RecordKind::Macro => Ok(Self(r)),
            other => Err(DbError::Corruption(format!(
                "expected macro record, found {other:?}"
            ))),
        }
    }

    /// Creates an unlinked macro record owning its strings. The caller
    /// appends it to the file chain to preserve definition order.
    pub(crate) fn create(
        store: &mut RecordStore,
        file: FileRecord,
        name: &str,
        parameters: Option<&str>,
        expansion: &str,
    ) -> Result<Self> {
        let name_ref = store.alloc_string(name)?;
        let params_ref = match parameters {
            Some(parameters) => store.alloc_string(parameters)?,
            None => NULL_REF,
        };
        let expansion_ref = store.alloc_string(expansion)?;
        let r = store.allocate(RecordKind::Macro, RECORD_SIZE)?;
        store.put_ref(r, OFF_FILE, file.record())?;
        store.put_ref(r, OFF_NAME, name_ref)?;
        store.put_ref(r, OFF_PARAMS, params_ref)?;
        store.put_ref(r, OFF_EXPANSION, expansion_ref)?;
        Ok(Self(r))
    }

    /// Underlying record reference.
    pub fn record(self) -> RecordRef {
        self.0
    }

    /// Next macro in the file's definition-order chain.
    pub fn next(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_NEXT)
    }

    /// Links the following macro.
    pub(crate) fn set_next(self, store: &mut RecordStore, next: RecordRef) -> Result<()> {
        store.put_ref(self.0, OFF_NEXT, next)
    }

    /// Macro name.
    pub fn name(self, store: &RecordStore) -> Result<String> {
        store.read_string(store.get_ref(self.0, OFF_NAME)?)
    }

    /// Parameter list text, `None` for object-like macros.
    pub fn parameters(self, store: &RecordStore) -> Result<Option<String>> {
        let params = store.get_ref(self.0, OFF_PARAMS)?;
        if params.is_null() {
            Ok(None)
        } else {
            Ok(Some(store.read_string(params)?))
        }
    }

    /// Expansion text.
    pub fn expansion(self, store: &RecordStore) -> Result<String> {
        store.read_string(store.get_ref(self.0, OFF_EXPANSION)?)
    }

    /// Frees the record and the strings it owns.
    pub(crate) fn free(self, store: &mut RecordStore) -> Result<()> {
        let name = store.get_ref(self.0, OFF_NAME)?;
        let params = store.get_ref(self.0, OFF_PARAMS)?;
        let expansion = store.get_ref(self.0, OFF_EXPANSION)?;
        store.free(name)?;
        if !params.is_null() {
            store.free(params)?;
        }
        store.free(expansion)?;
        store.free(self.0)
    }
}
