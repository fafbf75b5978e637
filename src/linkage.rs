//! Language partitions and binding identity.
//!
//! Each linkage owns one ordered index over every binding of its language.
//! Binding identity is the qualified name walked outward from the
//! innermost segment: at each level the segment name is compared (case
//! sensitivity comes from the database configuration), then the file-local
//! marker (file-local bindings order strictly apart from same-named
//! external ones, and apart from each other by their defining file), then
//! the walk recurses to the parent scope; the kind tag is the final
//! tie-break. The same rules drive lookups, so a binding always lands at
//! one reproducible tree position.

use std::cmp::Ordering;

use serde::Serialize;
use smallvec::SmallVec;

use crate::btree::{BTree, RecordComparator, SearchKey};
use crate::error::{DbError, Result};
use crate::facts::ScopeSegment;
use crate::graph::{BindingKind, BindingRecord, FileRecord};
use crate::store::{RecordRef, RecordStore, NULL_REF};

/// Source language a binding belongs to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Language {
    /// C bindings.
    C = 0,
    /// C++ bindings.
    Cpp = 1,
}

/// Both language partitions, in storage order.
pub const LANGUAGES: [Language; 2] = [Language::C, Language::Cpp];

impl Language {
    /// Decodes a stored language byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::C),
            1 => Ok(Self::Cpp),
            other => Err(DbError::Corruption(format!(
                "unknown language byte {other}"
            ))),
        }
    }

    /// Encodes the language byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Index into per-language storage arrays.
    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

/// Compares two name segments under the configured case rule. Folded
/// comparison groups case variants together; an exact comparison breaks
/// the tie so the order stays strict.
pub fn compare_names(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    if case_sensitive {
        return a.cmp(b);
    }
    let folded = a
        .bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()));
    if folded != Ordering::Equal {
        folded
    } else {
        a.cmp(b)
    }
}

/// Name for an anonymous type, synthesized once from the introducing
/// position and stored as the binding's name ever after.
pub(crate) fn anonymous_name(location: &str, offset: u32) -> String {
    format!("{{unnamed}}@{location}:{offset}")
}

/// Orders binding records by qualified name.
#[derive(Debug, Clone, Copy)]
pub struct BindingComparator {
    /// Whether segment names compare case-sensitively.
    pub case_sensitive: bool,
}

impl RecordComparator for BindingComparator {
    fn compare(&self, store: &RecordStore, a: RecordRef, b: RecordRef) -> Result<Ordering> {
        let kind_a = BindingRecord::from_ref(store, a)?.kind(store)?;
        let kind_b = BindingRecord::from_ref(store, b)?.kind(store)?;
        let mut a = a;
        let mut b = b;
        loop {
            let rec_a = BindingRecord::from_ref(store, a)?;
            let rec_b = BindingRecord::from_ref(store, b)?;
            let by_name = compare_names(
                &rec_a.name(store)?,
                &rec_b.name(store)?,
                self.case_sensitive,
            );
            if by_name != Ordering::Equal {
                return Ok(by_name);
            }
            let by_local = rec_a
                .local_file(store)?
                .to_u64()
                .cmp(&rec_b.local_file(store)?.to_u64());
            if by_local != Ordering::Equal {
                return Ok(by_local);
            }
            a = rec_a.parent(store)?;
            b = rec_b.parent(store)?;
            match (a.is_null(), b.is_null()) {
                (true, true) => break,
                (true, false) => return Ok(Ordering::Less),
                (false, true) => return Ok(Ordering::Greater),
                (false, false) => {}
            }
        }
        Ok(kind_a.to_byte().cmp(&kind_b.to_byte()))
    }
}

/// One level of a lookup key: segment name plus the file-local marker.
pub(crate) type KeySegment<'a> = (&'a str, RecordRef);

/// Exact lookup key mirroring [`BindingComparator`]. Segments are stored
/// innermost first.
pub(crate) struct BindingKey<'a> {
    pub segments: SmallVec<[KeySegment<'a>; 8]>,
    pub kind: BindingKind,
    pub case_sensitive: bool,
}

impl SearchKey for BindingKey<'_> {
    fn compare_to_record(&self, store: &RecordStore, record: RecordRef) -> Result<Ordering> {
        let record_kind = BindingRecord::from_ref(store, record)?.kind(store)?;
        let mut rec = record;
        for &(name, local) in &self.segments {
            if rec.is_null() {
                // Key is deeper than the record's scope chain.
                return Ok(Ordering::Greater);
            }
            let binding = BindingRecord::from_ref(store, rec)?;
            let by_name = compare_names(name, &binding.name(store)?, self.case_sensitive);
            if by_name != Ordering::Equal {
                return Ok(by_name);
            }
            let by_local = local.to_u64().cmp(&binding.local_file(store)?.to_u64());
            if by_local != Ordering::Equal {
                return Ok(by_local);
            }
            rec = binding.parent(store)?;
        }
        if !rec.is_null() {
            // The record's scope chain is deeper than the key.
            return Ok(Ordering::Less);
        }
        Ok(self.kind.to_byte().cmp(&record_kind.to_byte()))
    }
}

/// The per-language partition: one ordered index plus the binding
/// construction rules.
#[derive(Debug, Clone, Copy)]
pub struct Linkage {
    language: Language,
    index: BTree,
}

impl Linkage {
    /// Wraps a persisted index root.
    pub fn new(language: Language, root: RecordRef) -> Self {
        Self {
            language,
            index: BTree::new(root),
        }
    }

    /// Language of this partition.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Current index root for header persistence.
    pub fn root(&self) -> RecordRef {
        self.index.root()
    }

    /// The ordered index over this linkage's bindings.
    pub fn index(&self) -> &BTree {
        &self.index
    }

    /// Finds the binding for a resolved (scope chain, name, kind) triple
    /// or creates it, creating missing scope parents along the way.
    /// Returns the binding and whether it was newly created.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn find_or_create(
        &mut self,
        store: &mut RecordStore,
        scope: &[ScopeSegment],
        name: &str,
        kind: BindingKind,
        file_local: bool,
        current_file: FileRecord,
        case_sensitive: bool,
    ) -> Result<(BindingRecord, bool)> {
        // (name, local marker) per level, outermost first.
        let mut chain: SmallVec<[KeySegment<'_>; 8]> = SmallVec::new();
        let mut parent = NULL_REF;
        for segment in scope {
            let local = if segment.file_local {
                current_file.record()
            } else {
                NULL_REF
            };
            chain.push((segment.name.as_str(), local));
            let (binding, _) = self.find_or_create_one(
                store,
                &chain,
                segment.kind,
                parent,
                local,
                case_sensitive,
            )?;
            parent = binding.record();
        }

        let local = if file_local {
            current_file.record()
        } else {
            NULL_REF
        };
        chain.push((name, local));
        self.find_or_create_one(store, &chain, kind, parent, local, case_sensitive)
    }

    fn find_or_create_one(
        &mut self,
        store: &mut RecordStore,
        chain: &[KeySegment<'_>],
        kind: BindingKind,
        parent: RecordRef,
        local_file: RecordRef,
        case_sensitive: bool,
    ) -> Result<(BindingRecord, bool)> {
        let key = BindingKey {
            segments: chain.iter().rev().copied().collect(),
            kind,
            case_sensitive,
        };
        if let Some(existing) = self.index.find_first(store, &key)? {
            return Ok((BindingRecord::from_ref(store, existing)?, false));
        }

        let (name, _) = chain.last().expect("chain never empty");
        let name_ref = store.alloc_string(name)?;
        let binding =
            BindingRecord::create(store, name_ref, parent, kind, self.language, local_file)?;
        self.index
            .insert(store, binding.record(), &BindingComparator { case_sensitive })?;
        if !parent.is_null() {
            BindingRecord::from_ref(store, parent)?.add_child(store)?;
        }
        Ok((binding, true))
    }

    /// Removes a binding from the index (orphan reclamation).
    pub(crate) fn remove(
        &mut self,
        store: &mut RecordStore,
        binding: BindingRecord,
        case_sensitive: bool,
    ) -> Result<bool> {
        self.index
            .remove(store, binding.record(), &BindingComparator { case_sensitive })
    }
}
