//! Occurrence records.

use crate::error::{DbError, Result};
use crate::facts::Role;
use crate::graph::{BindingRecord, FileRecord};
use crate::store::{RecordKind, RecordRef, RecordStore, NULL_REF};

const OFF_BINDING: usize = 0;
const OFF_FILE: usize = 8;
const OFF_BINDING_PREV: usize = 16;
const OFF_BINDING_NEXT: usize = 24;
const OFF_FILE_NEXT: usize = 32;
const OFF_ENCLOSING: usize = 40;
const OFF_NODE_OFFSET: usize = 48;
const OFF_NODE_LENGTH: usize = 51;
const OFF_FLAGS: usize = 53;
const RECORD_SIZE: usize = 54;

const ROLE_MASK: u8 = 0b0000_0011;
const FLAG_READ: u8 = 0x04;
const FLAG_WRITE: u8 = 0x08;
const FLAG_INHERITANCE: u8 = 0x10;
const FLAG_POLYMORPHIC: u8 = 0x20;

/// Extra attributes of one appearance beyond its role.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OccurrenceFlags {
    pub reads: bool,
    pub writes: bool,
    pub inheritance_spec: bool,
    pub polymorphic_call: bool,
}

/// One syntactic appearance of a binding in a file.
///
/// Lives on exactly two chains: the owning binding's chain for its role
/// (doubly linked, since single occurrences are unlinked when a file is
/// torn down) and the owning file's chain (singly linked, torn down
/// wholesale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceRecord(RecordRef);

impl OccurrenceRecord {
    /// Wraps an existing occurrence record, checking the record kind.
    pub fn from_ref(store: &RecordStore, r: RecordRef) -> Result<Self> {
        match store.kind_of(r)? {
            RecordKind::Occurrence => Ok(Self(r)),
            other => Err(DbError::Corruption(format!(
                "expected occurrence record, found {other:?}"
            ))),
        }
    }

    /// Creates an occurrence and links it onto the head of the binding's
    /// role chain and the head of the file's occurrence chain.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        store: &mut RecordStore,
        binding: BindingRecord,
        file: FileRecord,
        role: Role,
        offset: u32,
        length: u16,
        flags: OccurrenceFlags,
        enclosing_definition: RecordRef,
    ) -> Result<Self> {
        if offset >= 1 << 24 {
            return Err(DbError::InvalidArgument(format!(
                "occurrence offset {offset} exceeds the stored 24-bit range"
            )));
        }
        let r = store.allocate(RecordKind::Occurrence, RECORD_SIZE)?;
        store.put_ref(r, OFF_BINDING, binding.record())?;
        store.put_ref(r, OFF_FILE, file.record())?;
        store.put_ref(r, OFF_ENCLOSING, enclosing_definition)?;
        store.put_u24(r, OFF_NODE_OFFSET, offset)?;
        store.put_u16(r, OFF_NODE_LENGTH, length)?;
        store.put_u8(r, OFF_FLAGS, encode_flags(role, flags))?;

        // Binding role chain, at the head.
        let old_head = binding.first_occurrence(store, role)?;
        store.put_ref(r, OFF_BINDING_NEXT, old_head)?;
        if !old_head.is_null() {
            store.put_ref(old_head, OFF_BINDING_PREV, r)?;
        }
        binding.set_first_occurrence(store, role, r)?;

        // File chain, at the head.
        let file_head = file.first_occurrence(store)?;
        store.put_ref(r, OFF_FILE_NEXT, file_head)?;
        file.set_first_occurrence(store, r)?;

        Ok(Self(r))
    }

    /// Underlying record reference.
    pub fn record(self) -> RecordRef {
        self.0
    }

    /// Owning binding.
    pub fn binding(self, store: &RecordStore) -> Result<BindingRecord> {
        BindingRecord::from_ref(store, store.get_ref(self.0, OFF_BINDING)?)
    }

    /// Owning file record reference.
    pub fn file(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_FILE)
    }

    /// Next occurrence in the owning file's chain.
    pub fn file_next(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_FILE_NEXT)
    }

    /// Next occurrence in the binding's role chain.
    pub fn binding_next(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_BINDING_NEXT)
    }

    /// Role of this appearance.
    pub fn role(self, store: &RecordStore) -> Result<Role> {
        decode_role(store.get_u8(self.0, OFF_FLAGS)?)
    }

    /// Byte offset of the name token.
    pub fn offset(self, store: &RecordStore) -> Result<u32> {
        store.get_u24(self.0, OFF_NODE_OFFSET)
    }

    /// Byte length of the name token.
    pub fn length(self, store: &RecordStore) -> Result<u16> {
        store.get_u16(self.0, OFF_NODE_LENGTH)
    }

    /// Enclosing definition occurrence for appearances nested in a
    /// function body, null otherwise.
    pub fn enclosing_definition(self, store: &RecordStore) -> Result<RecordRef> {
        store.get_ref(self.0, OFF_ENCLOSING)
    }

    /// Whether the value is read here.
    pub fn reads(self, store: &RecordStore) -> Result<bool> {
        Ok(store.get_u8(self.0, OFF_FLAGS)? & FLAG_READ != 0)
    }

    /// Whether the value is written here.
    pub fn writes(self, store: &RecordStore) -> Result<bool> {
        Ok(store.get_u8(self.0, OFF_FLAGS)? & FLAG_WRITE != 0)
    }

    /// Whether this appearance is a base-class specifier.
    pub fn is_inheritance_spec(self, store: &RecordStore) -> Result<bool> {
        Ok(store.get_u8(self.0, OFF_FLAGS)? & FLAG_INHERITANCE != 0)
    }

    /// Whether this appearance may be a polymorphic method call.
    pub fn is_polymorphic_call(self, store: &RecordStore) -> Result<bool> {
        Ok(store.get_u8(self.0, OFF_FLAGS)? & FLAG_POLYMORPHIC != 0)
    }

    /// Unlinks this occurrence from its binding's role chain. The file
    /// chain is left alone (it is torn down wholesale) and the record is
    /// not freed; returns the owning binding so the caller can check it
    /// for orphanhood after the free.
    pub(crate) fn unlink_from_binding(self, store: &mut RecordStore) -> Result<BindingRecord> {
        let binding = self.binding(store)?;
        let role = self.role(store)?;
        let prev = store.get_ref(self.0, OFF_BINDING_PREV)?;
        let next = store.get_ref(self.0, OFF_BINDING_NEXT)?;

        if prev.is_null() {
            binding.set_first_occurrence(store, role, next)?;
        } else {
            store.put_ref(prev, OFF_BINDING_NEXT, next)?;
        }
        if !next.is_null() {
            store.put_ref(next, OFF_BINDING_PREV, prev)?;
        }
        store.put_ref(self.0, OFF_BINDING_PREV, NULL_REF)?;
        store.put_ref(self.0, OFF_BINDING_NEXT, NULL_REF)?;
        Ok(binding)
    }
}

fn encode_flags(role: Role, flags: OccurrenceFlags) -> u8 {
    let mut byte = match role {
        Role::Declaration => 0,
        Role::Definition => 1,
        Role::Reference => 2,
    };
    if flags.reads {
        byte |= FLAG_READ;
    }
    if flags.writes {
        byte |= FLAG_WRITE;
    }
    if flags.inheritance_spec {
        byte |= FLAG_INHERITANCE;
    }
    if flags.polymorphic_call {
        byte |= FLAG_POLYMORPHIC;
    }
    byte
}

fn decode_role(byte: u8) -> Result<Role> {
    match byte & ROLE_MASK {
        0 => Ok(Role::Declaration),
        1 => Ok(Role::Definition),
        2 => Ok(Role::Reference),
        other => Err(DbError::Corruption(format!(
            "unknown occurrence role bits {other}"
        ))),
    }
}
