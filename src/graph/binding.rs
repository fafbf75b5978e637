//! Binding records.

use crate::error::{DbError, Result};
use crate::facts::Role;
use crate::graph::BindingKind;
use crate::linkage::Language;
use crate::store::{RecordKind, RecordRef, RecordStore};

const OFF_NAME: usize = 0;
const OFF_PARENT: usize = 8;
const OFF_FIRST_DECL: usize = 16;
const OFF_FIRST_DEF: usize = 24;
const OFF_FIRST_REF: usize = 32;
const OFF_TYPE: usize = 40;
const OFF_LOCAL_FILE: usize = 48;
const OFF_CHILD_COUNT: usize = 56;
const OFF_DETAIL: usize = 60;
const OFF_KIND: usize = 62;
const OFF_FLAGS: usize = 63;
const OFF_LANGUAGE: usize = 64;
const RECORD_SIZE: usize = 65;

/// Binding has internal linkage.
pub const FLAG_FILE_LOCAL: u8 = 0x01;
/// The detail word carries a parameter count.
pub const FLAG_HAS_PARAMS: u8 = 0x02;

/// One logical symbol.
///
/// The kind, name, scope, and file-local marker are fixed at creation;
/// only the occurrence chain heads, the child count, and the refinable
/// detail word mutate afterwards, so a binding's position in the ordered
/// index never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingRecord(RecordRef);

impl BindingRecord {
    /// Wraps an existing binding record, checking the record kind.
    pub fn from_ref(store: &RecordStore, r: RecordRef) -> Result<Self> {
        match store.kind_of(r)? {
            RecordKind::Binding => Ok(Self(r)),
            RecordKind::TypeNode => Err(DbError::Unsupported(
                "structural type nodes carry no binding data",
            )),
            other => Err(DbError::Corruption(format!(
                "expected binding record, found {other:?}"
            ))),
        }
    }

    /// Creates a binding. `name` must be a string record owned by this
    /// binding; `local_file` is null for external linkage.
    pub fn create(
        store: &mut RecordStore,
        name: RecordRef,
        parent: RecordRef,
        kind: BindingKind,
        language: Language,
        local_file: RecordRef,
    ) -> Result<Self> {
        let r = store.allocate(RecordKind::Binding, RECORD_SIZE)?;
        store.put_ref(r, OFF_NAME, name)?;
        store.put_ref(r, OFF_PARENT, parent)?;
        store.put_ref(r, OFF_LOCAL_FILE, local_file)?;
        store.put_u8(r, OFF_KIND, kind.to_byte())?;
        let flags = if local_file.is_null() {
            0
        } else {
            FLAG_FILE_LOCAL
        };
        store.put_u8(r, OFF_FLAGS, flags)?;
        store.put_u8(r, OFF_LANGUAGE, language.to_byte())?;
        Ok(Self(r))
    }

    /// Underlying record reference.
    pub fn record(self) -> RecordRef {
        self.0
    }

    /// Reference to the name string record.
    pub fn name_ref(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_NAME)
    }

    /// Reads the name.
    pub fn name(self, store: &RecordStore) -> Result<String> {
        store.read_string(self.name_ref(store)?)
    }

    /// Parent scope binding (null at global scope).
    pub fn parent(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_PARENT)
    }

    /// Kind tag.
    pub fn kind(self, store: &RecordStore) -> Result<BindingKind> {
        BindingKind::from_byte(store.get_u8(self.0, OFF_KIND)?)
    }

    /// Language partition.
    pub fn language(self, store: &RecordStore) -> Result<Language> {
        Language::from_byte(store.get_u8(self.0, OFF_LANGUAGE)?)
    }

    /// Whether the binding has internal linkage.
    pub fn is_file_local(self, store: &RecordStore) -> Result<bool> {
        Ok(store.get_u8(self.0, OFF_FLAGS)? & FLAG_FILE_LOCAL != 0)
    }

    /// Defining file for file-local bindings, null otherwise. Orders
    /// same-named file-local bindings apart from each other.
    pub fn local_file(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_LOCAL_FILE)
    }

    /// Head of the occurrence chain for `role`.
    pub fn first_occurrence(self, store: &RecordStore, role: Role) -> Result<RecordRef> {
        store.get_ref(self.0, role_offset(role))
    }

    /// Replaces the occurrence chain head for `role`.
    pub fn set_first_occurrence(
        self,
        store: &mut RecordStore,
        role: Role,
        head: RecordRef,
    ) -> Result<()> {
        store.put_ref(self.0, role_offset(role), head)
    }

    /// Structural type of the binding, null when unknown.
    pub fn type_node(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_TYPE)
    }

    /// Attaches a structural type.
    pub fn set_type_node(self, store: &mut RecordStore, node: RecordRef) -> Result<()> {
        store.put_ref(self.0, OFF_TYPE, node)
    }

    /// Number of bindings whose parent scope is this binding.
    pub fn child_count(self, store: &RecordStore) -> Result<u32> {
        store.get_u32(self.0, OFF_CHILD_COUNT)
    }

    /// Notes a new child scope.
    pub fn add_child(self, store: &mut RecordStore) -> Result<()> {
        let count = self.child_count(store)?;
        store.put_u32(self.0, OFF_CHILD_COUNT, count + 1)
    }

    /// Notes a reclaimed child scope.
    pub fn remove_child(self, store: &mut RecordStore) -> Result<()> {
        let count = self.child_count(store)?;
        if count == 0 {
            return Err(DbError::Corruption(
                "binding child count underflow".into(),
            ));
        }
        store.put_u32(self.0, OFF_CHILD_COUNT, count - 1)
    }

    /// Parameter count, when the resolver has reported one.
    pub fn param_count(self, store: &RecordStore) -> Result<Option<u16>> {
        if store.get_u8(self.0, OFF_FLAGS)? & FLAG_HAS_PARAMS != 0 {
            Ok(Some(store.get_u16(self.0, OFF_DETAIL)?))
        } else {
            Ok(None)
        }
    }

    /// Refines the parameter count in place. Identity and tree position
    /// are unaffected.
    pub fn refine_param_count(self, store: &mut RecordStore, count: u16) -> Result<()> {
        store.put_u16(self.0, OFF_DETAIL, count)?;
        let flags = store.get_u8(self.0, OFF_FLAGS)?;
        store.put_u8(self.0, OFF_FLAGS, flags | FLAG_HAS_PARAMS)
    }

    /// True when every occurrence chain is empty and no child scope is
    /// anchored here: the binding is eligible for reclamation.
    pub fn is_orphaned(self, store: &RecordStore) -> Result<bool> {
        Ok(self.first_occurrence(store, Role::Declaration)?.is_null()
            && self.first_occurrence(store, Role::Definition)?.is_null()
            && self.first_occurrence(store, Role::Reference)?.is_null()
            && self.child_count(store)? == 0)
    }

    /// Snapshot for query results.
    pub fn to_info(self, store: &RecordStore) -> Result<super::BindingInfo> {
        let qualified = self.qualified_name(store)?;
        let name = qualified.last().cloned().unwrap_or_default();
        Ok(super::BindingInfo {
            handle: self.0,
            name,
            qualified,
            kind: self.kind(store)?,
            file_local: self.is_file_local(store)?,
            language: self.language(store)?,
            param_count: self.param_count(store)?,
        })
    }

    /// Qualified name segments, outermost first.
    pub fn qualified_name(self, store: &RecordStore) -> Result<Vec<String>> {
        let mut segments = Vec::new();
        let mut current = self.0;
        while !current.is_null() {
            let binding = BindingRecord(current);
            segments.push(binding.name(store)?);
            current = binding.parent(store)?;
        }
        segments.reverse();
        Ok(segments)
    }
}

fn role_offset(role: Role) -> usize {
    match role {
        Role::Declaration => OFF_FIRST_DECL,
        Role::Definition => OFF_FIRST_DEF,
        Role::Reference => OFF_FIRST_REF,
    }
}

/// Frees a binding record together with the strings and type nodes it
/// owns. The caller must already have removed it from the ordered index
/// and emptied its occurrence chains.
pub(crate) fn free_binding(store: &mut RecordStore, binding: BindingRecord) -> Result<()> {
    let name = binding.name_ref(store)?;
    let type_node = binding.type_node(store)?;
    if !type_node.is_null() {
        super::types::free_type(store, type_node)?;
    }
    store.free(name)?;
    store.free(binding.record())
}
