//! The database core: record store, linkages, file index, and every
//! read/write operation. Exclusivity is enforced one level up: readers
//! hold the shared lock, the writer holds the exclusive lock for one
//! file's transaction at a time.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::btree::{BTree, IndexVisitor, RecordComparator, SearchKey};
use crate::db::header::HeaderState;
use crate::db::DbConfig;
use crate::diag::DiagnosticSink;
use crate::error::{DbError, Result};
use crate::facts::{FileFacts, Role, RoleMask};
use crate::graph::{
    create_type, free_binding, free_type, types_equal, BindingInfo, BindingRecord, FileInfo,
    FileRecord, IncludeInfo, IncludeRecord, MacroInfo, MacroRecord, OccurrenceFlags,
    OccurrenceInfo, OccurrenceRecord,
};
use crate::linkage::{anonymous_name, Language, Linkage, LANGUAGES};
use crate::pager::{Pager, PagerOptions};
use crate::query::{search_linkage, NamePattern, SearchOptions};
use crate::store::{RecordRef, RecordStore, NULL_REF};

/// Aggregate counts over the whole database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DbStats {
    /// Indexed files.
    pub files: usize,
    /// Live bindings across both linkages.
    pub bindings: usize,
    /// Occurrences across all files.
    pub occurrences: usize,
    /// Include edges.
    pub includes: usize,
    /// Macro definitions.
    pub macros: usize,
    /// Pages in the database file.
    pub pages: usize,
    /// Whether structural corruption was detected; the database needs a
    /// full rebuild.
    pub needs_rebuild: bool,
}

/// Orders file records by location.
struct FileComparator;

impl RecordComparator for FileComparator {
    fn compare(&self, store: &RecordStore, a: RecordRef, b: RecordRef) -> Result<Ordering> {
        let loc_a = FileRecord::from_ref(store, a)?.location(store)?;
        let loc_b = FileRecord::from_ref(store, b)?.location(store)?;
        Ok(loc_a.cmp(&loc_b))
    }
}

/// Looks up a file record by location.
struct FileLocationKey<'a>(&'a str);

impl SearchKey for FileLocationKey<'_> {
    fn compare_to_record(&self, store: &RecordStore, record: RecordRef) -> Result<Ordering> {
        let location = FileRecord::from_ref(store, record)?.location(store)?;
        Ok(self.0.cmp(location.as_str()))
    }
}

/// Counts every record in an index.
struct CountAll(usize);

impl IndexVisitor for CountAll {
    fn compare(&self, _store: &RecordStore, _record: RecordRef) -> Result<Ordering> {
        Ok(Ordering::Equal)
    }

    fn visit(&mut self, _store: &RecordStore, _record: RecordRef) -> Result<bool> {
        self.0 += 1;
        Ok(true)
    }
}

/// Collects every file record.
struct CollectFiles(Vec<RecordRef>);

impl IndexVisitor for CollectFiles {
    fn compare(&self, _store: &RecordStore, _record: RecordRef) -> Result<Ordering> {
        Ok(Ordering::Equal)
    }

    fn visit(&mut self, _store: &RecordStore, record: RecordRef) -> Result<bool> {
        self.0.push(record);
        Ok(true)
    }
}

/// All state reachable from the header, plus the open pager.
pub struct DbCore {
    path: PathBuf,
    store: RecordStore,
    linkages: [Linkage; 2],
    file_index: BTree,
    config: DbConfig,
    tainted: bool,
}

impl DbCore {
    /// Opens or creates the database file.
    pub fn open(path: &Path, config: DbConfig) -> Result<Self> {
        let pager = Pager::open(
            path,
            PagerOptions {
                cache_pages: config.cache_pages,
            },
        )?;
        if pager.page_count() == 0 {
            pager.allocate_page()?;
        }
        let header = pager.with_page(0, |data| HeaderState::read(data))?;
        let header = match header {
            Some(header) => {
                if header.case_sensitive != config.case_sensitive {
                    return Err(DbError::Corruption(
                        "comparator configuration differs from the one the database \
                         was built with, full rebuild required"
                            .into(),
                    ));
                }
                header
            }
            None => {
                let header = HeaderState::new(config.case_sensitive);
                pager.with_page_mut(0, |data| header.write(data))?;
                header
            }
        };

        let store = RecordStore::new(pager, header.free_page_head, header.last_record_page);
        Ok(Self {
            path: path.to_path_buf(),
            store,
            linkages: [
                Linkage::new(Language::C, header.linkage_roots[0]),
                Linkage::new(Language::Cpp, header.linkage_roots[1]),
            ],
            file_index: BTree::new(header.file_index_root),
            config,
            tainted: false,
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.config.sink)
    }

    pub(crate) fn mark_tainted(&mut self) {
        self.tainted = true;
    }

    /// Persists the header and writes every dirty page back.
    pub fn flush(&mut self) -> Result<()> {
        let header = HeaderState {
            case_sensitive: self.config.case_sensitive,
            linkage_roots: [self.linkages[0].root(), self.linkages[1].root()],
            file_index_root: self.file_index.root(),
            free_page_head: self.store.free_page_head(),
            last_record_page: self.store.last_record_page(),
        };
        self.store
            .pager()
            .with_page_mut(0, |data| header.write(data))?;
        self.store.pager().flush()
    }

    // ---- read operations -------------------------------------------------

    fn find_file(&self, location: &str) -> Result<Option<FileRecord>> {
        match self
            .file_index
            .find_first(&self.store, &FileLocationKey(location))?
        {
            Some(r) => Ok(Some(FileRecord::from_ref(&self.store, r)?)),
            None => Ok(None),
        }
    }

    /// Looks up one indexed file by location.
    pub fn get_file(&self, location: &str) -> Result<Option<FileInfo>> {
        match self.find_file(location)? {
            Some(file) => Ok(Some(self.file_info(file)?)),
            None => Ok(None),
        }
    }

    fn file_info(&self, file: FileRecord) -> Result<FileInfo> {
        Ok(FileInfo {
            handle: file.record(),
            location: file.location(&self.store)?,
            fingerprint: file.fingerprint(&self.store)?,
        })
    }

    /// Whether a file is missing or was indexed from different content.
    pub fn needs_reindex(&self, location: &str, fingerprint: u64) -> Result<bool> {
        match self.find_file(location)? {
            Some(file) => Ok(file.fingerprint(&self.store)? != fingerprint),
            None => Ok(true),
        }
    }

    /// Include edges where the file is the includer.
    pub fn includes(&self, file: RecordRef) -> Result<Vec<IncludeInfo>> {
        let file = FileRecord::from_ref(&self.store, file)?;
        let mut edges = Vec::new();
        let mut edge_ref = file.first_include(&self.store)?;
        while !edge_ref.is_null() {
            let edge = IncludeRecord::from_ref(&self.store, edge_ref)?;
            edges.push(self.include_info(edge)?);
            edge_ref = edge.includes_next(&self.store)?;
        }
        Ok(edges)
    }

    /// Include edges where the file is the included one.
    pub fn included_by(&self, file: RecordRef) -> Result<Vec<IncludeInfo>> {
        let file = FileRecord::from_ref(&self.store, file)?;
        let mut edges = Vec::new();
        let mut edge_ref = file.first_included_by(&self.store)?;
        while !edge_ref.is_null() {
            let edge = IncludeRecord::from_ref(&self.store, edge_ref)?;
            edges.push(self.include_info(edge)?);
            edge_ref = edge.included_by_next(&self.store)?;
        }
        Ok(edges)
    }

    fn include_info(&self, edge: IncludeRecord) -> Result<IncludeInfo> {
        Ok(IncludeInfo {
            includer: edge.includer(&self.store)?.location(&self.store)?,
            included: edge.included(&self.store)?.location(&self.store)?,
            token_offset: edge.token_offset(&self.store)?,
            token_length: edge.token_length(&self.store)?,
            system: edge.is_system(&self.store)?,
        })
    }

    /// Macro definitions of a file, in definition order.
    pub fn macros(&self, file: RecordRef) -> Result<Vec<MacroInfo>> {
        let file = FileRecord::from_ref(&self.store, file)?;
        let mut macros = Vec::new();
        let mut macro_ref = file.first_macro(&self.store)?;
        while !macro_ref.is_null() {
            let record = MacroRecord::from_ref(&self.store, macro_ref)?;
            macros.push(MacroInfo {
                name: record.name(&self.store)?,
                parameters: record.parameters(&self.store)?,
                expansion: record.expansion(&self.store)?,
            });
            macro_ref = record.next(&self.store)?;
        }
        Ok(macros)
    }

    /// Occurrences of a binding for the selected roles.
    pub fn occurrences(&self, binding: RecordRef, mask: RoleMask) -> Result<Vec<OccurrenceInfo>> {
        let binding = BindingRecord::from_ref(&self.store, binding)?;
        let mut occurrences = Vec::new();
        for role in [Role::Declaration, Role::Definition, Role::Reference] {
            if !mask.selects(role) {
                continue;
            }
            let mut occ_ref = binding.first_occurrence(&self.store, role)?;
            while !occ_ref.is_null() {
                let occ = OccurrenceRecord::from_ref(&self.store, occ_ref)?;
                occurrences.push(self.occurrence_info(occ, role)?);
                occ_ref = occ.binding_next(&self.store)?;
            }
        }
        Ok(occurrences)
    }

    fn occurrence_info(&self, occ: OccurrenceRecord, role: Role) -> Result<OccurrenceInfo> {
        let file = FileRecord::from_ref(&self.store, occ.file(&self.store)?)?;
        Ok(OccurrenceInfo {
            handle: occ.record(),
            file: file.location(&self.store)?,
            offset: occ.offset(&self.store)?,
            length: occ.length(&self.store)?,
            role,
            reads: occ.reads(&self.store)?,
            writes: occ.writes(&self.store)?,
            inheritance_spec: occ.is_inheritance_spec(&self.store)?,
            polymorphic_call: occ.is_polymorphic_call(&self.store)?,
            has_enclosing_definition: !occ.enclosing_definition(&self.store)?.is_null(),
        })
    }

    /// Pattern search across the selected linkages.
    pub fn find_bindings(
        &self,
        pattern: &NamePattern,
        options: &SearchOptions,
    ) -> Result<Vec<BindingInfo>> {
        if let Some(token) = &options.cancel {
            if token.is_cancelled() {
                return Err(DbError::Interrupted);
            }
        }
        let pattern = if options.prefix {
            pattern.clone().prefix()
        } else {
            pattern.clone()
        };
        let mut results = Vec::new();
        for language in LANGUAGES {
            if options.language.is_some_and(|wanted| wanted != language) {
                continue;
            }
            search_linkage(
                &self.store,
                &self.linkages[language.slot()],
                &pattern,
                options,
                self.config.case_sensitive,
                self.config.sink.as_ref(),
                &mut results,
            )?;
        }
        Ok(results)
    }

    /// Every indexed file, in location order.
    pub fn files(&self) -> Result<Vec<FileInfo>> {
        let mut collect = CollectFiles(Vec::new());
        self.file_index.visit(&self.store, &mut collect)?;
        collect
            .0
            .into_iter()
            .map(|r| self.file_info(FileRecord::from_ref(&self.store, r)?))
            .collect()
    }

    /// Aggregate counts, walking every index and chain.
    pub fn stats(&self) -> Result<DbStats> {
        let mut stats = DbStats {
            pages: self.store.pager().page_count(),
            needs_rebuild: self.tainted,
            ..DbStats::default()
        };
        for linkage in &self.linkages {
            let mut count = CountAll(0);
            linkage.index().visit(&self.store, &mut count)?;
            stats.bindings += count.0;
        }
        let mut files = CollectFiles(Vec::new());
        self.file_index.visit(&self.store, &mut files)?;
        stats.files = files.0.len();
        for file_ref in files.0 {
            let file = FileRecord::from_ref(&self.store, file_ref)?;
            let mut occ_ref = file.first_occurrence(&self.store)?;
            while !occ_ref.is_null() {
                stats.occurrences += 1;
                occ_ref = OccurrenceRecord::from_ref(&self.store, occ_ref)?
                    .file_next(&self.store)?;
            }
            let mut edge_ref = file.first_include(&self.store)?;
            while !edge_ref.is_null() {
                stats.includes += 1;
                edge_ref = IncludeRecord::from_ref(&self.store, edge_ref)?
                    .includes_next(&self.store)?;
            }
            let mut macro_ref = file.first_macro(&self.store)?;
            while !macro_ref.is_null() {
                stats.macros += 1;
                macro_ref = MacroRecord::from_ref(&self.store, macro_ref)?.next(&self.store)?;
            }
        }
        Ok(stats)
    }

    // ---- write operations ------------------------------------------------

    /// Applies one translation unit's facts: tears down the file's stale
    /// content, then records the new occurrences, includes, and macros.
    /// Runs under the exclusive write lock.
    pub fn apply_file_facts(&mut self, facts: &FileFacts) -> Result<()> {
        let file = match self.find_file(&facts.location)? {
            Some(file) => {
                self.teardown_content(file, false)?;
                file
            }
            None => self.create_file(&facts.location)?,
        };
        file.set_fingerprint(&mut self.store, facts.fingerprint)?;

        let mut created: Vec<Option<OccurrenceRecord>> = Vec::with_capacity(facts.symbols.len());
        for index in 0..facts.symbols.len() {
            match self.apply_symbol_fact(file, facts, index, &created) {
                Ok(occ) => created.push(Some(occ)),
                Err(error) if !error.is_fatal() => {
                    self.config.sink.report("symbol fact", &error);
                    created.push(None);
                }
                Err(error) => return Err(error),
            }
        }

        for fact in &facts.includes {
            let result = self.apply_include_fact(file, fact);
            if let Err(error) = result {
                if error.is_fatal() {
                    return Err(error);
                }
                self.config.sink.report("include fact", &error);
            }
        }

        let mut tail: Option<MacroRecord> = None;
        for fact in &facts.macros {
            let record = match MacroRecord::create(
                &mut self.store,
                file,
                &fact.name,
                fact.parameters.as_deref(),
                &fact.expansion,
            ) {
                Ok(record) => record,
                Err(error) if !error.is_fatal() => {
                    self.config.sink.report("macro fact", &error);
                    continue;
                }
                Err(error) => return Err(error),
            };
            match tail {
                None => file.set_first_macro(&mut self.store, record.record())?,
                Some(tail) => tail.set_next(&mut self.store, record.record())?,
            }
            tail = Some(record);
        }

        debug!(
            location = facts.location.as_str(),
            symbols = facts.symbols.len(),
            includes = facts.includes.len(),
            macros = facts.macros.len(),
            "indexed file"
        );
        Ok(())
    }

    fn create_file(&mut self, location: &str) -> Result<FileRecord> {
        let file = FileRecord::create(&mut self.store, location)?;
        self.file_index
            .insert(&mut self.store, file.record(), &FileComparator)?;
        Ok(file)
    }

    fn apply_symbol_fact(
        &mut self,
        file: FileRecord,
        facts: &FileFacts,
        index: usize,
        created: &[Option<OccurrenceRecord>],
    ) -> Result<OccurrenceRecord> {
        let fact = &facts.symbols[index];
        // Range check before any graph mutation.
        if fact.offset >= 1 << 24 {
            return Err(DbError::InvalidArgument(format!(
                "occurrence offset {} exceeds the stored 24-bit range",
                fact.offset
            )));
        }
        let synthesized;
        let name = if fact.name.is_empty() {
            synthesized = anonymous_name(&facts.location, fact.offset);
            synthesized.as_str()
        } else {
            fact.name.as_str()
        };

        let case_sensitive = self.config.case_sensitive;
        let (binding, _created_new) = self.linkages[facts.language.slot()].find_or_create(
            &mut self.store,
            &fact.scope,
            name,
            fact.kind,
            fact.file_local,
            file,
            case_sensitive,
        )?;

        let result = self.attach_occurrence(binding, file, facts, index, created);
        if let Err(error) = &result {
            if !error.is_fatal() {
                // A rejected fact must not leave a freshly created binding
                // with no occurrences in the index.
                self.reclaim_if_orphaned(binding)?;
            }
        }
        result
    }

    fn attach_occurrence(
        &mut self,
        binding: BindingRecord,
        file: FileRecord,
        facts: &FileFacts,
        index: usize,
        created: &[Option<OccurrenceRecord>],
    ) -> Result<OccurrenceRecord> {
        let fact = &facts.symbols[index];
        if let Some(count) = fact.param_count {
            if binding.param_count(&self.store)?.is_none() {
                binding.refine_param_count(&mut self.store, count)?;
            }
        }
        if let Some(spec) = &fact.type_spec {
            let candidate = create_type(&mut self.store, spec)?;
            let existing = binding.type_node(&self.store)?;
            if existing.is_null() {
                binding.set_type_node(&mut self.store, candidate)?;
            } else if types_equal(&self.store, existing, candidate)? {
                free_type(&mut self.store, candidate)?;
            } else {
                // Refined structural information replaces the old chain;
                // the binding's identity and tree position are untouched.
                free_type(&mut self.store, existing)?;
                binding.set_type_node(&mut self.store, candidate)?;
            }
        }

        let enclosing = match fact.enclosing_definition {
            Some(enclosing_index) => match created.get(enclosing_index).copied().flatten() {
                Some(occ) if occ.role(&self.store)? == Role::Definition => occ.record(),
                _ => {
                    self.config.sink.report(
                        "enclosing definition",
                        &DbError::InvalidArgument(format!(
                            "fact {index} names fact {enclosing_index} as its enclosing \
                             definition, which is not an earlier definition"
                        )),
                    );
                    NULL_REF
                }
            },
            None => NULL_REF,
        };

        OccurrenceRecord::create(
            &mut self.store,
            binding,
            file,
            fact.role,
            fact.offset,
            fact.length,
            OccurrenceFlags {
                reads: fact.reads,
                writes: fact.writes,
                inheritance_spec: fact.inheritance_spec,
                polymorphic_call: fact.polymorphic_call,
            },
            enclosing,
        )
    }

    fn apply_include_fact(
        &mut self,
        file: FileRecord,
        fact: &crate::facts::IncludeFact,
    ) -> Result<()> {
        let included = match self.find_file(&fact.location)? {
            Some(existing) => existing,
            None => self.create_file(&fact.location)?,
        };
        IncludeRecord::create(
            &mut self.store,
            file,
            included,
            fact.token_offset,
            fact.token_length,
            fact.system,
        )?;
        Ok(())
    }

    /// Removes a file and everything it owns, detaching both sides of the
    /// include graph. Returns whether the file existed.
    pub fn remove_file(&mut self, location: &str) -> Result<bool> {
        let Some(file) = self.find_file(location)? else {
            return Ok(false);
        };
        self.teardown_content(file, true)?;
        if !self
            .file_index
            .remove(&mut self.store, file.record(), &FileComparator)?
        {
            return Err(DbError::Corruption(
                "file record missing from file index".into(),
            ));
        }
        file.free(&mut self.store)?;
        debug!(location, "removed file");
        Ok(true)
    }

    /// Tears down a file's occurrences, forward include edges, and macros;
    /// with `detach_included_by` also the reverse include chain (file
    /// removal). Bindings orphaned by the teardown are reclaimed before
    /// this returns, so readers never see a half-updated file.
    fn teardown_content(&mut self, file: FileRecord, detach_included_by: bool) -> Result<()> {
        let mut occ_ref = file.first_occurrence(&self.store)?;
        while !occ_ref.is_null() {
            let occ = OccurrenceRecord::from_ref(&self.store, occ_ref)?;
            let next = occ.file_next(&self.store)?;
            let binding = occ.unlink_from_binding(&mut self.store)?;
            self.store.free(occ.record())?;
            self.reclaim_if_orphaned(binding)?;
            occ_ref = next;
        }

        let mut edge_ref = file.first_include(&self.store)?;
        while !edge_ref.is_null() {
            let edge = IncludeRecord::from_ref(&self.store, edge_ref)?;
            let next = edge.includes_next(&self.store)?;
            edge.detach(&mut self.store)?;
            self.store.free(edge.record())?;
            edge_ref = next;
        }

        if detach_included_by {
            let mut edge_ref = file.first_included_by(&self.store)?;
            while !edge_ref.is_null() {
                let edge = IncludeRecord::from_ref(&self.store, edge_ref)?;
                let next = edge.included_by_next(&self.store)?;
                edge.detach(&mut self.store)?;
                self.store.free(edge.record())?;
                edge_ref = next;
            }
        }

        let mut macro_ref = file.first_macro(&self.store)?;
        while !macro_ref.is_null() {
            let record = MacroRecord::from_ref(&self.store, macro_ref)?;
            let next = record.next(&self.store)?;
            record.free(&mut self.store)?;
            macro_ref = next;
        }

        file.clear_content(&mut self.store)
    }

    /// Reclaims a binding whose occurrence chains emptied, cascading to
    /// parents that anchored nothing else.
    fn reclaim_if_orphaned(&mut self, binding: BindingRecord) -> Result<()> {
        let case_sensitive = self.config.case_sensitive;
        let mut current = Some(binding);
        while let Some(b) = current {
            if !b.is_orphaned(&self.store)? {
                break;
            }
            let parent_ref = b.parent(&self.store)?;
            let language = b.language(&self.store)?;
            let removed =
                self.linkages[language.slot()].remove(&mut self.store, b, case_sensitive)?;
            if !removed {
                return Err(DbError::Corruption(
                    "orphaned binding missing from its linkage index".into(),
                ));
            }
            free_binding(&mut self.store, b)?;
            current = if parent_ref.is_null() {
                None
            } else {
                let parent = BindingRecord::from_ref(&self.store, parent_ref)?;
                parent.remove_child(&mut self.store)?;
                Some(parent)
            };
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &RecordStore {
        &self.store
    }
}
