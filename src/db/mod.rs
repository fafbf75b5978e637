//! The index manager: database lifecycle, the reader/writer lock
//! contract, and the background writer.
//!
//! One [`SymbolDb`] owns one database file. Foreground threads take the
//! shared read lock through [`SymbolDb::read`] and run queries against the
//! returned [`Reader`]; the guard releases on every exit path. A single
//! background worker drains submitted [`WriteRequest`]s, holding the
//! exclusive lock only for one file's transaction at a time.

mod core;
mod header;
mod writer;

pub use self::core::{DbCore, DbStats};
pub use writer::WriteRequest;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::diag::{DiagnosticSink, TracingSink};
use crate::error::Result;
use crate::facts::{FileFacts, RoleMask};
use crate::graph::{BindingInfo, FileInfo, IncludeInfo, MacroInfo, OccurrenceInfo};
use crate::pager::DEFAULT_CACHE_PAGES;
use crate::query::{NamePattern, SearchOptions};
use writer::{spawn_writer, WriteQueue};

/// Configuration passed into [`SymbolDb::open`]. There is no hidden
/// global state: the comparator case rule, cache sizing, and the
/// diagnostic sink all travel through here.
#[derive(Clone)]
pub struct DbConfig {
    /// Whether binding names compare case-sensitively. Participates in
    /// the persisted tree order, so it must match the value the database
    /// was created with.
    pub case_sensitive: bool,
    /// Page-cache capacity, in pages.
    pub cache_pages: usize,
    /// Where recovered indexing and query faults are reported.
    pub sink: Arc<dyn DiagnosticSink>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            cache_pages: DEFAULT_CACHE_PAGES,
            sink: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("case_sensitive", &self.case_sensitive)
            .field("cache_pages", &self.cache_pages)
            .finish()
    }
}

/// One project's symbol database.
pub struct SymbolDb {
    core: Arc<RwLock<DbCore>>,
    queue: Arc<WriteQueue>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for SymbolDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolDb").finish_non_exhaustive()
    }
}

impl SymbolDb {
    /// Opens (or creates) the database at `path` and starts the writer.
    pub fn open(path: impl AsRef<Path>, config: DbConfig) -> Result<Self> {
        let core = Arc::new(RwLock::new(DbCore::open(path.as_ref(), config)?));
        let queue = Arc::new(WriteQueue::new());
        let worker = spawn_writer(Arc::clone(&core), Arc::clone(&queue));
        Ok(Self {
            core,
            queue,
            worker: Some(worker),
        })
    }

    /// Acquires the shared read lock. Queries run against the returned
    /// guard; record handles inside the results stay valid for as long as
    /// the guard is held.
    pub fn read(&self) -> Reader<'_> {
        Reader {
            core: self.core.read(),
        }
    }

    /// Bounded-wait variant of [`SymbolDb::read`]. A timeout is a definite
    /// `None`, not an error.
    pub fn try_read_for(&self, timeout: Duration) -> Option<Reader<'_>> {
        self.core
            .try_read_for(timeout)
            .map(|core| Reader { core })
    }

    /// Queues one write request for the background writer.
    pub fn submit(&self, request: WriteRequest) {
        self.queue.submit(request);
    }

    /// Queues a file's facts for indexing.
    pub fn index_file(&self, facts: FileFacts) {
        self.submit(WriteRequest::IndexFile(facts));
    }

    /// Queues a file removal.
    pub fn remove_file(&self, location: impl Into<String>) {
        self.submit(WriteRequest::RemoveFile(location.into()));
    }

    /// Drops queued requests that have not started; returns how many.
    pub fn cancel_pending(&self) -> usize {
        self.queue.cancel_pending()
    }

    /// Blocks until the indexing backlog drains or `timeout` elapses.
    /// Returns whether the backlog drained.
    pub fn join(&self, timeout: Duration) -> bool {
        self.queue.join(timeout)
    }

    /// Persists the header and flushes dirty pages.
    pub fn flush(&self) -> Result<()> {
        self.core.write().flush()
    }
}

impl Drop for SymbolDb {
    fn drop(&mut self) {
        self.queue.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let _ = self.core.write().flush();
    }
}

/// Shared read access to the database. All query entry points live here;
/// dropping the guard releases the read lock on every exit path.
pub struct Reader<'a> {
    core: RwLockReadGuard<'a, DbCore>,
}

impl Reader<'_> {
    /// Pattern search across the database.
    pub fn find_bindings(
        &self,
        pattern: &NamePattern,
        options: &SearchOptions,
    ) -> Result<Vec<BindingInfo>> {
        self.core.find_bindings(pattern, options)
    }

    /// Occurrences of a binding, filtered by role mask.
    pub fn occurrences(
        &self,
        binding: &BindingInfo,
        mask: RoleMask,
    ) -> Result<Vec<OccurrenceInfo>> {
        self.core.occurrences(binding.handle, mask)
    }

    /// Looks up an indexed file by location.
    pub fn file(&self, location: &str) -> Result<Option<FileInfo>> {
        self.core.get_file(location)
    }

    /// Every indexed file, in location order.
    pub fn files(&self) -> Result<Vec<FileInfo>> {
        self.core.files()
    }

    /// Include edges where `file` is the includer.
    pub fn includes(&self, file: &FileInfo) -> Result<Vec<IncludeInfo>> {
        self.core.includes(file.handle)
    }

    /// Include edges where `file` is the included one.
    pub fn included_by(&self, file: &FileInfo) -> Result<Vec<IncludeInfo>> {
        self.core.included_by(file.handle)
    }

    /// Macros defined in `file`, in definition order.
    pub fn macros(&self, file: &FileInfo) -> Result<Vec<MacroInfo>> {
        self.core.macros(file.handle)
    }

    /// Whether `location` is missing or stale relative to `fingerprint`.
    pub fn needs_reindex(&self, location: &str, fingerprint: u64) -> Result<bool> {
        self.core.needs_reindex(location, fingerprint)
    }

    /// Aggregate counts.
    pub fn stats(&self) -> Result<DbStats> {
        self.core.stats()
    }
}
