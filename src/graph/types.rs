//! Structural type nodes.
//!
//! Unnamed derived types (pointers, arrays, cv-qualified forms) are stored
//! as small chained records and compared structurally, never nominally.
//! They are synthetic: operations that only make sense on real bindings
//! (occurrence chains, scope walks) are rejected as unsupported rather
//! than being confused with a data error.

use crate::error::{DbError, Result};
use crate::facts::TypeSpec;
use crate::store::{RecordKind, RecordRef, RecordStore};

const OFF_TARGET: usize = 0;
const OFF_KIND: usize = 8;
const OFF_FLAGS: usize = 9;
const RECORD_SIZE: usize = 10;

const KIND_NAMED: u8 = 0;
const KIND_POINTER: u8 = 1;
const KIND_ARRAY: u8 = 2;
const KIND_QUALIFIED: u8 = 3;

const FLAG_CONST: u8 = 0x01;
const FLAG_VOLATILE: u8 = 0x02;

/// One structural type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeNode(RecordRef);

impl TypeNode {
    /// Wraps an existing type node, checking the record kind.
    pub fn from_ref(store: &RecordStore, r: RecordRef) -> Result<Self> {
        match store.kind_of(r)? {
            RecordKind::TypeNode => Ok(Self(r)),
            other => Err(DbError::Corruption(format!(
                "expected type node, found {other:?}"
            ))),
        }
    }

    /// Underlying record reference.
    pub fn record(self) -> RecordRef {
        self.0
    }

    /// Renders the type the way a declaration would spell it, innermost
    /// name first.
    pub fn describe(self, store: &RecordStore) -> Result<String> {
        let kind = store.get_u8(self.0, OFF_KIND)?;
        let flags = store.get_u8(self.0, OFF_FLAGS)?;
        let target = store.get_ref(self.0, OFF_TARGET)?;
        match kind {
            KIND_NAMED => store.read_string(target),
            KIND_POINTER => Ok(format!("{}*", TypeNode::from_ref(store, target)?.describe(store)?)),
            KIND_ARRAY => Ok(format!("{}[]", TypeNode::from_ref(store, target)?.describe(store)?)),
            KIND_QUALIFIED => {
                let mut out = String::new();
                if flags & FLAG_CONST != 0 {
                    out.push_str("const ");
                }
                if flags & FLAG_VOLATILE != 0 {
                    out.push_str("volatile ");
                }
                out.push_str(&TypeNode::from_ref(store, target)?.describe(store)?);
                Ok(out)
            }
            other => Err(DbError::Corruption(format!(
                "unknown type node kind {other}"
            ))),
        }
    }
}

/// Materializes a resolver-provided type description as stored nodes.
pub(crate) fn create_type(store: &mut RecordStore, spec: &TypeSpec) -> Result<RecordRef> {
    let (kind, flags, target) = match spec {
        TypeSpec::Named(name) => (KIND_NAMED, 0, store.alloc_string(name)?),
        TypeSpec::Pointer(inner) => (KIND_POINTER, 0, create_type(store, inner)?),
        TypeSpec::Array(inner) => (KIND_ARRAY, 0, create_type(store, inner)?),
        TypeSpec::Qualified {
            is_const,
            is_volatile,
            inner,
        } => {
            let mut flags = 0;
            if *is_const {
                flags |= FLAG_CONST;
            }
            if *is_volatile {
                flags |= FLAG_VOLATILE;
            }
            (KIND_QUALIFIED, flags, create_type(store, inner)?)
        }
    };
    let r = store.allocate(RecordKind::TypeNode, RECORD_SIZE)?;
    store.put_ref(r, OFF_TARGET, target)?;
    store.put_u8(r, OFF_KIND, kind)?;
    store.put_u8(r, OFF_FLAGS, flags)?;
    Ok(r)
}

/// Frees a type node chain, including owned name strings.
pub(crate) fn free_type(store: &mut RecordStore, r: RecordRef) -> Result<()> {
    if r.is_null() {
        return Ok(());
    }
    let kind = store.get_u8(r, OFF_KIND)?;
    let target = store.get_ref(r, OFF_TARGET)?;
    match kind {
        KIND_NAMED => store.free(target)?,
        _ => free_type(store, target)?,
    }
    store.free(r)
}

/// Structural equality of two type node chains.
pub(crate) fn types_equal(store: &RecordStore, a: RecordRef, b: RecordRef) -> Result<bool> {
    if a == b {
        return Ok(true);
    }
    if a.is_null() || b.is_null() {
        return Ok(false);
    }
    let kind_a = store.get_u8(a, OFF_KIND)?;
    let kind_b = store.get_u8(b, OFF_KIND)?;
    if kind_a != kind_b || store.get_u8(a, OFF_FLAGS)? != store.get_u8(b, OFF_FLAGS)? {
        return Ok(false);
    }
    let target_a = store.get_ref(a, OFF_TARGET)?;
    let target_b = store.get_ref(b, OFF_TARGET)?;
    if kind_a == KIND_NAMED {
        Ok(store.read_string(target_a)? == store.read_string(target_b)?)
    } else {
        types_equal(store, target_a, target_b)
    }
}
