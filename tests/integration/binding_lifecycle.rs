#![allow(missing_docs)]

use std::time::Duration;

use symdex::{
    BindingKind, CaseMode, DbConfig, FileFacts, Language, NamePattern, Role, RoleMask,
    ScopeSegment, SearchOptions, SymbolDb, SymbolFact,
};
use tempfile::tempdir;

const JOIN: Duration = Duration::from_secs(10);

fn open_db(path: &std::path::Path) -> SymbolDb {
    SymbolDb::open(path, DbConfig::default()).expect("open database")
}

fn find_one(db: &SymbolDb, pattern: &str) -> symdex::BindingInfo {
    let reader = db.read();
    let pattern = NamePattern::compile(pattern, CaseMode::Sensitive);
    let mut hits = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len(), 1, "expected exactly one hit");
    hits.remove(0)
}

#[test]
fn occurrence_counts_follow_roles() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("counts.db"));

    let mut facts = FileFacts::new("src/widget.cpp", Language::Cpp);
    let scope = vec![ScopeSegment::namespace("ns")];
    facts.symbols.push(
        SymbolFact::new("render", BindingKind::Function, Role::Definition, 100)
            .in_scope(scope.clone()),
    );
    for offset in [10u32, 20, 30] {
        facts.symbols.push(
            SymbolFact::new("render", BindingKind::Function, Role::Declaration, offset)
                .in_scope(scope.clone()),
        );
    }
    for offset in [200u32, 210] {
        facts.symbols.push(
            SymbolFact::new("render", BindingKind::Function, Role::Reference, offset)
                .in_scope(scope.clone()),
        );
    }
    db.index_file(facts);
    assert!(db.join(JOIN), "indexing settles");

    let binding = find_one(&db, "ns::render");
    let reader = db.read();
    let declarations = reader
        .occurrences(&binding, RoleMask::DECLARATIONS)
        .expect("declarations");
    let definitions = reader
        .occurrences(&binding, RoleMask::DEFINITIONS)
        .expect("definitions");
    let references = reader
        .occurrences(&binding, RoleMask::REFERENCES)
        .expect("references");
    let all = reader.occurrences(&binding, RoleMask::ALL).expect("all");

    assert_eq!(declarations.len(), 3);
    assert_eq!(definitions.len(), 1);
    assert_eq!(references.len(), 2);
    assert_eq!(all.len(), 6);
    assert!(declarations.iter().all(|o| o.role == Role::Declaration));
}

#[test]
fn reindex_reclaims_orphaned_bindings() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("orphans.db"));

    let mut facts = FileFacts::new("main.c", Language::C);
    facts.symbols.push(SymbolFact::new(
        "keep_me",
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    facts.symbols.push(SymbolFact::new(
        "drop_me",
        BindingKind::Function,
        Role::Definition,
        50,
    ));
    db.index_file(facts);
    assert!(db.join(JOIN));

    {
        let reader = db.read();
        let pattern = NamePattern::compile("drop_me", CaseMode::Sensitive);
        assert_eq!(
            reader
                .find_bindings(&pattern, &SearchOptions::default())
                .expect("search")
                .len(),
            1
        );
    }

    // Re-index the file without the second function.
    let mut facts = FileFacts::new("main.c", Language::C);
    facts.symbols.push(SymbolFact::new(
        "keep_me",
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let dropped = NamePattern::compile("drop_me", CaseMode::Sensitive);
    assert!(
        reader
            .find_bindings(&dropped, &SearchOptions::default())
            .expect("search")
            .is_empty(),
        "binding with no occurrences left is reclaimed"
    );
    let kept = NamePattern::compile("keep_me", CaseMode::Sensitive);
    assert_eq!(
        reader
            .find_bindings(&kept, &SearchOptions::default())
            .expect("search")
            .len(),
        1
    );
}

#[test]
fn binding_survives_while_another_file_references_it() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("shared.db"));

    let mut definer = FileFacts::new("lib.c", Language::C);
    definer.symbols.push(SymbolFact::new(
        "shared_fn",
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    db.index_file(definer);

    let mut user = FileFacts::new("use.c", Language::C);
    user.symbols.push(SymbolFact::new(
        "shared_fn",
        BindingKind::Function,
        Role::Reference,
        40,
    ));
    db.index_file(user);
    assert!(db.join(JOIN));

    db.remove_file("lib.c");
    assert!(db.join(JOIN));
    {
        let reader = db.read();
        let pattern = NamePattern::compile("shared_fn", CaseMode::Sensitive);
        let hits = reader
            .find_bindings(&pattern, &SearchOptions::default())
            .expect("search");
        assert_eq!(hits.len(), 1, "reference in use.c keeps the binding alive");
        let occurrences = reader.occurrences(&hits[0], RoleMask::ALL).expect("occ");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].file, "use.c");
    }

    db.remove_file("use.c");
    assert!(db.join(JOIN));
    let reader = db.read();
    let pattern = NamePattern::compile("shared_fn", CaseMode::Sensitive);
    assert!(
        reader
            .find_bindings(&pattern, &SearchOptions::default())
            .expect("search")
            .is_empty(),
        "last occurrence gone, binding reclaimed"
    );
}

#[test]
fn scope_parents_are_reclaimed_with_their_last_child() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("scopes.db"));

    let mut facts = FileFacts::new("a.cpp", Language::Cpp);
    facts.symbols.push(
        SymbolFact::new("only", BindingKind::Function, Role::Definition, 0)
            .in_scope(vec![ScopeSegment::namespace("lonely")]),
    );
    db.index_file(facts);
    assert!(db.join(JOIN));

    db.remove_file("a.cpp");
    assert!(db.join(JOIN));

    let reader = db.read();
    let stats = reader.stats().expect("stats");
    assert_eq!(
        stats.bindings, 0,
        "namespace scope dies with its only child"
    );
}

#[test]
fn param_count_is_refined_in_place() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("refine.db"));

    let mut facts = FileFacts::new("api.h", Language::Cpp);
    facts.symbols.push(SymbolFact::new(
        "connect",
        BindingKind::Function,
        Role::Declaration,
        0,
    ));
    let mut with_params = SymbolFact::new("connect", BindingKind::Function, Role::Definition, 80);
    with_params.param_count = Some(3);
    facts.symbols.push(with_params);
    db.index_file(facts);
    assert!(db.join(JOIN));

    let binding = find_one(&db, "connect");
    assert_eq!(
        binding.param_count,
        Some(3),
        "later occurrence refined the binding in place"
    );
    let reader = db.read();
    assert_eq!(
        reader
            .occurrences(&binding, RoleMask::ALL)
            .expect("occ")
            .len(),
        2,
        "both occurrences landed on one binding"
    );
}

#[test]
fn nested_occurrences_link_their_enclosing_definition() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("nested.db"));

    let mut facts = FileFacts::new("impl.cpp", Language::Cpp);
    facts.symbols.push(SymbolFact::new(
        "process",
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    let mut local = SymbolFact::new("buffer", BindingKind::Variable, Role::Declaration, 30);
    local.enclosing_definition = Some(0);
    facts.symbols.push(local);
    db.index_file(facts);
    assert!(db.join(JOIN));

    let binding = find_one(&db, "buffer");
    let reader = db.read();
    let occurrences = reader
        .occurrences(&binding, RoleMask::DECLARATIONS)
        .expect("occ");
    assert_eq!(occurrences.len(), 1);
    assert!(
        occurrences[0].has_enclosing_definition,
        "local declaration points back at the enclosing function definition"
    );
}

#[test]
fn anonymous_types_get_a_stable_synthesized_name() {
    let dir = tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("anon.db"));

    let mut facts = FileFacts::new("types.h", Language::C);
    facts.symbols.push(SymbolFact::new(
        "",
        BindingKind::Struct,
        Role::Definition,
        12,
    ));
    facts.symbols.push(SymbolFact::new(
        "point_t",
        BindingKind::Typedef,
        Role::Definition,
        40,
    ));
    db.index_file(facts.clone());
    assert!(db.join(JOIN));

    let reader = db.read();
    let pattern = NamePattern::compile("{unnamed}*", CaseMode::Sensitive);
    let hits = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, BindingKind::Struct);
    let first_name = hits[0].name.clone();
    drop(reader);

    // Re-indexing the same content resolves to the same synthesized name.
    db.index_file(facts);
    assert!(db.join(JOIN));
    let reader = db.read();
    let hits = reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, first_name);
}
