//! The binding graph: fixed-layout records for bindings, occurrences,
//! files, include edges, macros, and structural types, linked into
//! intrusive chains.
//!
//! Every chain mutation goes through an accessor on the record wrappers so
//! no partially-linked state is observable outside the mutating call; the
//! deletion ordering (unlink everything, then free) is what keeps stale
//! references impossible in a healthy database.

mod binding;
mod file;
mod include;
mod macros;
mod occurrence;
mod types;

pub use binding::BindingRecord;
pub use file::FileRecord;
pub use include::IncludeRecord;
pub use macros::MacroRecord;
pub use occurrence::OccurrenceRecord;
pub use types::TypeNode;

pub(crate) use binding::free_binding;
pub(crate) use occurrence::OccurrenceFlags;
pub(crate) use types::{create_type, free_type, types_equal};

use serde::Serialize;

use crate::error::{DbError, Result};
use crate::facts::Role;
use crate::linkage::Language;
use crate::store::RecordRef;

/// Kind tag of a binding. Fixed at creation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum BindingKind {
    /// A variable with static or automatic storage.
    Variable = 0,
    /// A free function.
    Function = 1,
    /// A struct type.
    Struct = 2,
    /// A union type.
    Union = 3,
    /// A class type.
    Class = 4,
    /// An enumeration type.
    Enum = 5,
    /// An enumerator inside an enum.
    Enumerator = 6,
    /// A typedef.
    Typedef = 7,
    /// A namespace.
    Namespace = 8,
    /// A data member.
    Field = 9,
    /// A member function.
    Method = 10,
    /// A function parameter.
    Parameter = 11,
}

impl BindingKind {
    /// Decodes a stored kind tag.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0 => Self::Variable,
            1 => Self::Function,
            2 => Self::Struct,
            3 => Self::Union,
            4 => Self::Class,
            5 => Self::Enum,
            6 => Self::Enumerator,
            7 => Self::Typedef,
            8 => Self::Namespace,
            9 => Self::Field,
            10 => Self::Method,
            11 => Self::Parameter,
            other => {
                return Err(DbError::Corruption(format!(
                    "unknown binding kind tag {other}"
                )))
            }
        })
    }

    /// Encodes the kind tag.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Snapshot of one binding for query results.
#[derive(Debug, Clone, Serialize)]
pub struct BindingInfo {
    /// Handle usable for follow-up queries (e.g. occurrence listing).
    #[serde(skip)]
    pub handle: RecordRef,
    /// Innermost name.
    pub name: String,
    /// Qualified name segments, outermost first.
    pub qualified: Vec<String>,
    /// Kind tag.
    pub kind: BindingKind,
    /// Whether the binding has internal linkage.
    pub file_local: bool,
    /// Language partition the binding belongs to.
    pub language: Language,
    /// Parameter count, when known.
    pub param_count: Option<u16>,
}

/// Snapshot of one occurrence for query results.
#[derive(Debug, Clone, Serialize)]
pub struct OccurrenceInfo {
    /// Handle of the occurrence record.
    #[serde(skip)]
    pub handle: RecordRef,
    /// Location of the owning file.
    pub file: String,
    /// Byte offset of the name token.
    pub offset: u32,
    /// Byte length of the name token.
    pub length: u16,
    /// Role of the appearance.
    #[serde(skip)]
    pub role: Role,
    /// Value read at this appearance.
    pub reads: bool,
    /// Value written at this appearance.
    pub writes: bool,
    /// Appearance is a base-class specifier.
    pub inheritance_spec: bool,
    /// Appearance may be a polymorphic call.
    pub polymorphic_call: bool,
    /// Whether the appearance is nested in a function definition.
    pub has_enclosing_definition: bool,
}

/// Snapshot of one indexed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    /// Handle of the file record.
    #[serde(skip)]
    pub handle: RecordRef,
    /// Workspace-relative location.
    pub location: String,
    /// Content fingerprint recorded at indexing time.
    pub fingerprint: u64,
}

/// Snapshot of one include edge.
#[derive(Debug, Clone, Serialize)]
pub struct IncludeInfo {
    /// Location of the including file.
    pub includer: String,
    /// Location of the included file.
    pub included: String,
    /// Byte offset of the include token text.
    pub token_offset: u32,
    /// Byte length of the include token text.
    pub token_length: u16,
    /// Whether the include was resolved via the system include path.
    pub system: bool,
}

/// Snapshot of one macro definition.
#[derive(Debug, Clone, Serialize)]
pub struct MacroInfo {
    /// Macro name.
    pub name: String,
    /// Parameter list text, `None` for object-like macros.
    pub parameters: Option<String>,
    /// Expansion text.
    pub expansion: String,
}
