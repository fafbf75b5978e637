//! Pattern search over a linkage's ordered index.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::btree::IndexVisitor;
use crate::diag::DiagnosticSink;
use crate::error::{DbError, Result};
use crate::graph::{BindingInfo, BindingKind, BindingRecord};
use crate::linkage::{Language, Linkage};
use crate::query::pattern::{prefix_compare, NamePattern};
use crate::store::{RecordRef, RecordStore};

/// Candidates examined between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 64;

/// Cooperative cancellation signal for long-running queries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::SeqCst)
    }
}

/// Filters and controls for a binding search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict to one language partition (both when `None`).
    pub language: Option<Language>,
    /// Restrict to these binding kinds (all when `None`).
    pub kinds: Option<Vec<BindingKind>>,
    /// Treat the innermost pattern segment as a prefix.
    pub prefix: bool,
    /// Drop file-local bindings from the results.
    pub exclude_file_local: bool,
    /// Stop after this many results.
    pub limit: Option<usize>,
    /// Cooperative cancellation signal.
    pub cancel: Option<CancelToken>,
}

/// Runs `pattern` over one linkage's index, appending matches to
/// `results`. Faults local to one candidate are reported to the sink and
/// contribute nothing; cancellation surfaces as [`DbError::Interrupted`].
pub(crate) fn search_linkage(
    store: &RecordStore,
    linkage: &Linkage,
    pattern: &NamePattern,
    options: &SearchOptions,
    index_case_sensitive: bool,
    sink: &dyn DiagnosticSink,
    results: &mut Vec<BindingInfo>,
) -> Result<()> {
    let mut visitor = PatternVisitor {
        pattern,
        options,
        index_case_sensitive,
        sink,
        results,
        examined: 0,
    };
    linkage.index().visit(store, &mut visitor)
}

struct PatternVisitor<'a> {
    pattern: &'a NamePattern,
    options: &'a SearchOptions,
    index_case_sensitive: bool,
    sink: &'a dyn DiagnosticSink,
    results: &'a mut Vec<BindingInfo>,
    examined: usize,
}

impl PatternVisitor<'_> {
    /// Narrowing by literal prefix is only sound when it agrees with the
    /// persisted tree order: a case-folded index clusters all case
    /// variants together, while a case-sensitive index can only be
    /// narrowed by a case-sensitive pattern.
    fn can_narrow(&self) -> bool {
        !self.pattern.literal_prefix().is_empty()
            && (!self.index_case_sensitive || self.pattern.case_sensitive())
    }

    fn candidate(&self, store: &RecordStore, record: RecordRef) -> Result<Option<BindingInfo>> {
        let binding = BindingRecord::from_ref(store, record)?;
        let info = binding.to_info(store)?;
        if !self.pattern.matches_name(&info.name) {
            return Ok(None);
        }
        let scope = &info.qualified[..info.qualified.len().saturating_sub(1)];
        if !self.pattern.matches_scope(scope) {
            return Ok(None);
        }
        if let Some(kinds) = &self.options.kinds {
            if !kinds.contains(&info.kind) {
                return Ok(None);
            }
        }
        if self.options.exclude_file_local && info.file_local {
            return Ok(None);
        }
        Ok(Some(info))
    }
}

impl IndexVisitor for PatternVisitor<'_> {
    fn compare(&self, store: &RecordStore, record: RecordRef) -> Result<Ordering> {
        if !self.can_narrow() {
            return Ok(Ordering::Equal);
        }
        let name = match BindingRecord::from_ref(store, record)
            .and_then(|binding| binding.name(store))
        {
            Ok(name) => name,
            Err(error) => {
                // A malformed entry must not abort the query; keep it in
                // range and let the visit step skip it.
                self.sink.report("pattern search ordering", &error);
                return Ok(Ordering::Equal);
            }
        };
        Ok(prefix_compare(
            &name,
            self.pattern.literal_prefix(),
            self.index_case_sensitive,
        ))
    }

    fn visit(&mut self, store: &RecordStore, record: RecordRef) -> Result<bool> {
        self.examined += 1;
        if self.examined % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(token) = &self.options.cancel {
                if token.is_cancelled() {
                    return Err(DbError::Interrupted);
                }
            }
        }
        match self.candidate(store, record) {
            Ok(Some(info)) => {
                self.results.push(info);
                if let Some(limit) = self.options.limit {
                    if self.results.len() >= limit {
                        return Ok(false);
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                self.sink.report("pattern search candidate", &error);
            }
        }
        Ok(true)
    }
}
