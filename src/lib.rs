//! Persistent, incrementally updatable symbol database for C/C++ corpora.
//!
//! One database file per project holds every binding (logical symbol), every
//! occurrence of that binding, the include graph between files, and macro
//! definitions, all queryable by name pattern without re-parsing. A single
//! background writer applies per-translation-unit facts produced by an
//! external parser while any number of reader threads run lookups and
//! pattern searches against the same structure.

#![warn(missing_docs)]

pub mod btree;
pub mod db;
pub mod diag;
pub mod error;
pub mod facts;
pub mod graph;
pub mod linkage;
pub mod pager;
pub mod query;
pub mod store;

pub use db::{DbConfig, DbStats, Reader, SymbolDb, WriteRequest};
pub use diag::{CountingSink, DiagnosticSink, TracingSink};
pub use error::{DbError, Result};
pub use facts::{
    FileFacts, IncludeFact, MacroFact, Role, RoleMask, ScopeSegment, SymbolFact, TypeSpec,
};
pub use graph::{BindingInfo, BindingKind, FileInfo, IncludeInfo, MacroInfo, OccurrenceInfo};
pub use linkage::Language;
pub use query::{CancelToken, CaseMode, NamePattern, SearchOptions};
pub use store::RecordRef;
