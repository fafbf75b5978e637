//! Input model: the facts an external parser emits per translation unit.
//!
//! The database never parses source itself; it consumes one [`FileFacts`]
//! per file from the resolver and turns it into bindings, occurrences,
//! include edges, and macro entries.

use xxhash_rust::xxh64::xxh64;

use crate::graph::BindingKind;
use crate::linkage::Language;

/// Syntactic role of one symbol appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A declaration that is not a definition.
    Declaration,
    /// A defining occurrence.
    Definition,
    /// A plain reference.
    Reference,
}

/// Bit mask selecting any combination of occurrence roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMask(u8);

impl RoleMask {
    /// Declarations only.
    pub const DECLARATIONS: RoleMask = RoleMask(0b001);
    /// Definitions only.
    pub const DEFINITIONS: RoleMask = RoleMask(0b010);
    /// References only.
    pub const REFERENCES: RoleMask = RoleMask(0b100);
    /// Every role.
    pub const ALL: RoleMask = RoleMask(0b111);

    /// Combines two masks.
    pub fn union(self, other: RoleMask) -> RoleMask {
        RoleMask(self.0 | other.0)
    }

    /// Whether the mask selects `role`.
    pub fn selects(self, role: Role) -> bool {
        let bit = match role {
            Role::Declaration => 0b001,
            Role::Definition => 0b010,
            Role::Reference => 0b100,
        };
        self.0 & bit != 0
    }
}

/// One segment of an enclosing scope chain, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSegment {
    /// Segment name (e.g. a namespace or class name).
    pub name: String,
    /// What kind of scope the segment is.
    pub kind: BindingKind,
    /// Whether the scope has internal linkage (e.g. an anonymous
    /// namespace).
    pub file_local: bool,
}

impl ScopeSegment {
    /// Namespace segment shorthand.
    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BindingKind::Namespace,
            file_local: false,
        }
    }

    /// Class segment shorthand.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BindingKind::Class,
            file_local: false,
        }
    }
}

/// Description of a binding's type, built structurally by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// A named leaf type (e.g. `int`, `ns::T`).
    Named(String),
    /// Pointer to an underlying type.
    Pointer(Box<TypeSpec>),
    /// Array of an underlying type.
    Array(Box<TypeSpec>),
    /// Const/volatile qualification of an underlying type.
    Qualified {
        /// `const` qualifier present.
        is_const: bool,
        /// `volatile` qualifier present.
        is_volatile: bool,
        /// The qualified type.
        inner: Box<TypeSpec>,
    },
}

/// One symbol appearance reported by the resolver.
#[derive(Debug, Clone)]
pub struct SymbolFact {
    /// Symbol name; empty for an anonymous type introduced via typedef.
    pub name: String,
    /// Kind of the binding this appearance resolves to.
    pub kind: BindingKind,
    /// Role of this appearance.
    pub role: Role,
    /// Byte offset of the name token within the file.
    pub offset: u32,
    /// Byte length of the name token.
    pub length: u16,
    /// Enclosing scope chain, outermost first.
    pub scope: Vec<ScopeSegment>,
    /// Whether the binding has internal linkage.
    pub file_local: bool,
    /// Value is read at this appearance.
    pub reads: bool,
    /// Value is written at this appearance.
    pub writes: bool,
    /// Appearance is a base-class specifier.
    pub inheritance_spec: bool,
    /// Appearance may be a polymorphic method call.
    pub polymorphic_call: bool,
    /// Index (into the fact list) of the enclosing definition fact for
    /// appearances nested inside a function body.
    pub enclosing_definition: Option<usize>,
    /// Parameter count, once the resolver knows it.
    pub param_count: Option<u16>,
    /// Structural type of the binding, when the resolver provides one.
    pub type_spec: Option<TypeSpec>,
}

impl SymbolFact {
    /// A fact with everything optional defaulted.
    pub fn new(name: impl Into<String>, kind: BindingKind, role: Role, offset: u32) -> Self {
        let name = name.into();
        Self {
            length: name.len() as u16,
            name,
            kind,
            role,
            offset,
            scope: Vec::new(),
            file_local: false,
            reads: false,
            writes: false,
            inheritance_spec: false,
            polymorphic_call: false,
            enclosing_definition: None,
            param_count: None,
            type_spec: None,
        }
    }

    /// Sets the enclosing scope chain (outermost first).
    pub fn in_scope(mut self, scope: Vec<ScopeSegment>) -> Self {
        self.scope = scope;
        self
    }

    /// Marks the binding file-local.
    pub fn file_local(mut self) -> Self {
        self.file_local = true;
        self
    }
}

/// One `#include` reported by the resolver.
#[derive(Debug, Clone)]
pub struct IncludeFact {
    /// Resolved location of the included file.
    pub location: String,
    /// Byte offset of the include token text.
    pub token_offset: u32,
    /// Byte length of the include token text.
    pub token_length: u16,
    /// Whether the include was resolved via the system include path.
    pub system: bool,
}

/// One macro definition reported by the preprocessor, in definition order.
#[derive(Debug, Clone)]
pub struct MacroFact {
    /// Macro name.
    pub name: String,
    /// Parameter list text for function-like macros, `None` for
    /// object-like ones.
    pub parameters: Option<String>,
    /// Expansion text.
    pub expansion: String,
}

/// Everything the resolver produced for one translation unit.
#[derive(Debug, Clone)]
pub struct FileFacts {
    /// Workspace-relative location of the file.
    pub location: String,
    /// Language the file was parsed under.
    pub language: Language,
    /// Fingerprint of the file content at parse time.
    pub fingerprint: u64,
    /// Ordered symbol appearances.
    pub symbols: Vec<SymbolFact>,
    /// Include relationships.
    pub includes: Vec<IncludeFact>,
    /// Macro definitions, in definition order.
    pub macros: Vec<MacroFact>,
}

impl FileFacts {
    /// Empty fact set for a file.
    pub fn new(location: impl Into<String>, language: Language) -> Self {
        Self {
            location: location.into(),
            language,
            fingerprint: 0,
            symbols: Vec::new(),
            includes: Vec::new(),
            macros: Vec::new(),
        }
    }

    /// Computes the content fingerprint the database stores per file.
    pub fn fingerprint_of(content: &[u8]) -> u64 {
        xxh64(content, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_mask_selects_unions() {
        let mask = RoleMask::DECLARATIONS.union(RoleMask::REFERENCES);
        assert!(mask.selects(Role::Declaration));
        assert!(!mask.selects(Role::Definition));
        assert!(mask.selects(Role::Reference));
        assert!(RoleMask::ALL.selects(Role::Definition));
    }

    #[test]
    fn fingerprints_differ_per_content() {
        let a = FileFacts::fingerprint_of(b"int x;");
        let b = FileFacts::fingerprint_of(b"int y;");
        assert_ne!(a, b);
        assert_eq!(a, FileFacts::fingerprint_of(b"int x;"));
    }
}
