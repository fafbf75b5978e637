#![allow(missing_docs)]

use std::fs;
use std::time::Duration;

use symdex::{
    BindingKind, CaseMode, DbConfig, DbError, FileFacts, IncludeFact, Language, MacroFact,
    NamePattern, Role, RoleMask, ScopeSegment, SearchOptions, SymbolDb, SymbolFact,
};
use tempfile::tempdir;

const JOIN: Duration = Duration::from_secs(10);

fn populate(db: &SymbolDb) {
    let mut facts = FileFacts::new("core/engine.cpp", Language::Cpp);
    facts.fingerprint = FileFacts::fingerprint_of(b"class Engine { ... };");
    facts.symbols.push(
        SymbolFact::new("Engine", BindingKind::Class, Role::Definition, 0)
            .in_scope(vec![ScopeSegment::namespace("core")]),
    );
    facts.symbols.push(
        SymbolFact::new("start", BindingKind::Method, Role::Definition, 40).in_scope(vec![
            ScopeSegment::namespace("core"),
            ScopeSegment::class("Engine"),
        ]),
    );
    facts.includes.push(IncludeFact {
        location: "core/engine.h".into(),
        token_offset: 4,
        token_length: 15,
        system: false,
    });
    facts.macros.push(MacroFact {
        name: "CORE_API".into(),
        parameters: None,
        expansion: "__attribute__((visibility(\"default\")))".into(),
    });
    db.index_file(facts);
    assert!(db.join(JOIN));
}

fn assert_populated(db: &SymbolDb) {
    let reader = db.read();
    let stats = reader.stats().expect("stats");
    assert_eq!(stats.files, 2, "engine.cpp plus the header record");
    assert_eq!(stats.occurrences, 2);
    assert_eq!(stats.includes, 1);
    assert_eq!(stats.macros, 1);

    let pattern = NamePattern::compile("core::Engine", CaseMode::Sensitive);
    let hits = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len(), 1);
    let occurrences = reader
        .occurrences(&hits[0], RoleMask::DEFINITIONS)
        .expect("occ");
    assert_eq!(occurrences.len(), 1);
    assert_eq!(occurrences[0].file, "core/engine.cpp");

    let method = NamePattern::compile("core::Engine::start", CaseMode::Sensitive);
    assert_eq!(
        reader
            .find_bindings(&method, &SearchOptions::default())
            .expect("search")
            .len(),
        1
    );
}

#[test]
fn reopen_preserves_everything() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("project.db");

    {
        let db = SymbolDb::open(&path, DbConfig::default()).expect("open");
        populate(&db);
        assert_populated(&db);
    }

    let db = SymbolDb::open(&path, DbConfig::default()).expect("reopen");
    assert_populated(&db);
}

#[test]
fn renaming_the_database_file_preserves_contents() {
    let dir = tempdir().expect("tempdir");
    let original = dir.path().join("before.db");
    let moved = dir.path().join("elsewhere").join("after.db");

    {
        let db = SymbolDb::open(&original, DbConfig::default()).expect("open");
        populate(&db);
    }

    fs::create_dir_all(moved.parent().expect("parent")).expect("mkdir");
    fs::rename(&original, &moved).expect("rename");

    let db = SymbolDb::open(&moved, DbConfig::default()).expect("open moved");
    assert_populated(&db);
}

#[test]
fn fresh_database_at_a_reused_path_sees_nothing_stale() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("reused.db");

    {
        let db = SymbolDb::open(&path, DbConfig::default()).expect("open");
        populate(&db);
    }
    fs::remove_file(&path).expect("delete project");

    let db = SymbolDb::open(&path, DbConfig::default()).expect("fresh open");
    let reader = db.read();
    let stats = reader.stats().expect("stats");
    assert_eq!(stats.files, 0);
    assert_eq!(stats.bindings, 0);
    let pattern = NamePattern::compile("core::Engine", CaseMode::Sensitive);
    assert!(reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search")
        .is_empty());
}

#[test]
fn comparator_config_mismatch_is_refused() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("case.db");

    {
        let db = SymbolDb::open(&path, DbConfig::default()).expect("open");
        populate(&db);
    }

    let insensitive = DbConfig {
        case_sensitive: false,
        ..DbConfig::default()
    };
    let err = SymbolDb::open(&path, insensitive).expect_err("must refuse");
    assert!(matches!(err, DbError::Corruption(_)));
}

#[test]
fn fingerprints_drive_reindex_decisions() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("fp.db");
    let db = SymbolDb::open(&path, DbConfig::default()).expect("open");
    populate(&db);

    let reader = db.read();
    let fingerprint = FileFacts::fingerprint_of(b"class Engine { ... };");
    assert!(!reader
        .needs_reindex("core/engine.cpp", fingerprint)
        .expect("fresh content"));
    assert!(reader
        .needs_reindex("core/engine.cpp", FileFacts::fingerprint_of(b"changed"))
        .expect("changed content"));
    assert!(reader
        .needs_reindex("core/missing.cpp", fingerprint)
        .expect("unknown file"));
}
