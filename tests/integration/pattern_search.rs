#![allow(missing_docs)]

use std::time::Duration;

use symdex::{
    BindingKind, CancelToken, CaseMode, DbConfig, FileFacts, Language, NamePattern, Role,
    ScopeSegment, SearchOptions, SymbolDb, SymbolFact,
};
use tempfile::tempdir;

const JOIN: Duration = Duration::from_secs(10);

fn seeded_db(path: &std::path::Path) -> SymbolDb {
    let db = SymbolDb::open(path, DbConfig::default()).expect("open");

    let mut facts = FileFacts::new("src/api.cpp", Language::Cpp);
    let ns = vec![ScopeSegment::namespace("ns")];
    facts.symbols.push(
        SymbolFact::new("Foo", BindingKind::Class, Role::Definition, 0).in_scope(ns.clone()),
    );
    facts.symbols.push(
        SymbolFact::new("FooBar", BindingKind::Class, Role::Definition, 50).in_scope(ns.clone()),
    );
    facts.symbols.push(
        SymbolFact::new("Foo", BindingKind::Class, Role::Definition, 90)
            .in_scope(vec![ScopeSegment::namespace("other")]),
    );
    facts.symbols.push(SymbolFact::new(
        "foo",
        BindingKind::Function,
        Role::Definition,
        120,
    ));
    facts.symbols.push(
        SymbolFact::new("static_helper", BindingKind::Function, Role::Definition, 150)
            .file_local(),
    );
    db.index_file(facts);
    assert!(db.join(JOIN));
    db
}

#[test]
fn prefix_applies_to_innermost_segment_only() {
    let dir = tempdir().expect("tempdir");
    let db = seeded_db(&dir.path().join("q.db"));
    let reader = db.read();

    // Prefix applies to the innermost segment; `ns` must match exactly.
    let pattern = NamePattern::compile("ns::Foo", CaseMode::Sensitive);
    let options = SearchOptions {
        prefix: true,
        ..SearchOptions::default()
    };
    let hits = reader.find_bindings(&pattern, &options).expect("search");
    let names: Vec<&str> = hits.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(hits.len(), 2, "ns::Foo and ns::FooBar, not other::Foo");
    assert!(names.contains(&"Foo"));
    assert!(names.contains(&"FooBar"));
    assert!(hits.iter().all(|b| b.qualified.first().map(String::as_str) == Some("ns")));
}

#[test]
fn exact_search_distinguishes_case_and_scope() {
    let dir = tempdir().expect("tempdir");
    let db = seeded_db(&dir.path().join("e.db"));
    let reader = db.read();

    let pattern = NamePattern::compile("foo", CaseMode::Sensitive);
    let hits = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, BindingKind::Function);
    assert!(hits[0].qualified.len() == 1, "global scope");

    let insensitive = NamePattern::compile("foo", CaseMode::Insensitive);
    let hits = reader
        .find_bindings(&insensitive, &SearchOptions::default())
        .expect("search");
    // foo, ns::Foo, other::Foo all match by name under folding.
    assert_eq!(hits.len(), 3);
}

#[test]
fn glob_patterns_narrow_by_literal_prefix() {
    let dir = tempdir().expect("tempdir");
    let db = seeded_db(&dir.path().join("g.db"));
    let reader = db.read();

    let pattern = NamePattern::compile("ns::Foo*r", CaseMode::Sensitive);
    let hits = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "FooBar");
}

#[test]
fn kind_and_file_local_filters_apply() {
    let dir = tempdir().expect("tempdir");
    let db = seeded_db(&dir.path().join("f.db"));
    let reader = db.read();

    let pattern = NamePattern::compile("*", CaseMode::Sensitive);
    let classes_only = SearchOptions {
        kinds: Some(vec![BindingKind::Class]),
        ..SearchOptions::default()
    };
    let hits = reader.find_bindings(&pattern, &classes_only).expect("search");
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|b| b.kind == BindingKind::Class));

    let no_locals = SearchOptions {
        exclude_file_local: true,
        ..SearchOptions::default()
    };
    let hits = reader.find_bindings(&pattern, &no_locals).expect("search");
    assert!(
        hits.iter().all(|b| !b.file_local),
        "file-local helper filtered out"
    );

    let with_locals = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len() + 1, with_locals.len());
}

#[test]
fn search_limit_stops_early() {
    let dir = tempdir().expect("tempdir");
    let db = seeded_db(&dir.path().join("l.db"));
    let reader = db.read();

    let pattern = NamePattern::compile("*", CaseMode::Sensitive);
    let options = SearchOptions {
        limit: Some(2),
        ..SearchOptions::default()
    };
    let hits = reader.find_bindings(&pattern, &options).expect("search");
    assert_eq!(hits.len(), 2);
}

#[test]
fn cancelled_search_reports_interrupted() {
    let dir = tempdir().expect("tempdir");
    let db = seeded_db(&dir.path().join("c.db"));
    let reader = db.read();

    let token = CancelToken::new();
    token.cancel();
    let pattern = NamePattern::compile("*", CaseMode::Sensitive);
    let options = SearchOptions {
        cancel: Some(token),
        ..SearchOptions::default()
    };
    let err = reader
        .find_bindings(&pattern, &options)
        .expect_err("cancelled");
    assert!(matches!(err, symdex::DbError::Interrupted));
}

#[test]
fn language_filter_separates_linkages() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("lang.db"), DbConfig::default()).expect("open");

    let mut c_facts = FileFacts::new("a.c", Language::C);
    c_facts.symbols.push(SymbolFact::new(
        "init",
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    db.index_file(c_facts);

    let mut cpp_facts = FileFacts::new("a.cpp", Language::Cpp);
    cpp_facts.symbols.push(SymbolFact::new(
        "init",
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    db.index_file(cpp_facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let pattern = NamePattern::compile("init", CaseMode::Sensitive);
    let both = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(both.len(), 2, "one binding per linkage");

    let c_only = SearchOptions {
        language: Some(Language::C),
        ..SearchOptions::default()
    };
    let hits = reader.find_bindings(&pattern, &c_only).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].language, Language::C);
}
