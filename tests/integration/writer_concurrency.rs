#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use symdex::{
    BindingKind, CaseMode, DbConfig, FileFacts, Language, NamePattern, Role, SearchOptions,
    SymbolDb, SymbolFact,
};
use tempfile::tempdir;

const JOIN: Duration = Duration::from_secs(10);

fn single_symbol_facts(location: &str, symbol: &str) -> FileFacts {
    let mut facts = FileFacts::new(location, Language::Cpp);
    facts.symbols.push(SymbolFact::new(
        symbol,
        BindingKind::Function,
        Role::Definition,
        0,
    ));
    facts
}

fn names(db_reader: &symdex::Reader<'_>) -> Vec<String> {
    let pattern = NamePattern::compile("*", CaseMode::Sensitive);
    db_reader
        .find_bindings(&pattern, &SearchOptions::default())
        .expect("search")
        .into_iter()
        .map(|b| b.name)
        .collect()
}

#[test]
fn join_on_idle_database_returns_immediately() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("idle.db"), DbConfig::default()).expect("open");
    assert!(db.join(Duration::from_millis(0)));
}

#[test]
fn reader_sees_old_state_throughout_a_reindex() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("iso.db"), DbConfig::default()).expect("open");

    db.index_file(single_symbol_facts("m.cpp", "alpha"));
    assert!(db.join(JOIN));

    let reader = db.read();
    assert_eq!(names(&reader), vec!["alpha".to_string()]);

    // Queue a replacement while the read lock is held; the writer must
    // wait, so the old state stays fully visible to this reader.
    let mut replacement = single_symbol_facts("m.cpp", "beta");
    replacement.symbols.push(SymbolFact::new(
        "gamma",
        BindingKind::Function,
        Role::Definition,
        50,
    ));
    db.index_file(replacement);
    thread::sleep(Duration::from_millis(100));

    let seen = names(&reader);
    assert_eq!(seen, vec!["alpha".to_string()], "pre-update state intact");
    drop(reader);

    assert!(db.join(JOIN), "writer finishes once readers release");
    let reader = db.read();
    let mut seen = names(&reader);
    seen.sort();
    assert_eq!(
        seen,
        vec!["beta".to_string(), "gamma".to_string()],
        "post-update state complete, with no mix of old and new"
    );
}

#[test]
fn join_reports_timeout_then_success() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("join.db"), DbConfig::default()).expect("open");

    let reader = db.read();
    db.index_file(single_symbol_facts("slow.cpp", "blocked"));
    assert!(
        !db.join(Duration::from_millis(50)),
        "backlog cannot drain while a reader blocks the writer"
    );
    drop(reader);
    assert!(db.join(JOIN), "backlog drains after the reader releases");
}

#[test]
fn cancel_pending_drops_only_unstarted_requests() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("cancel.db"), DbConfig::default()).expect("open");

    let reader = db.read();
    db.index_file(single_symbol_facts("first.cpp", "first"));
    // Give the worker time to dequeue the first request and block on the
    // write lock.
    thread::sleep(Duration::from_millis(100));
    db.index_file(single_symbol_facts("second.cpp", "second"));
    db.index_file(single_symbol_facts("third.cpp", "third"));

    let dropped = db.cancel_pending();
    assert_eq!(dropped, 2, "the in-flight request is not cancellable");
    drop(reader);
    assert!(db.join(JOIN));

    let reader = db.read();
    assert!(reader.file("first.cpp").expect("lookup").is_some());
    assert!(reader.file("second.cpp").expect("lookup").is_none());
    assert!(reader.file("third.cpp").expect("lookup").is_none());
}

#[test]
fn try_read_for_times_out_cleanly() {
    let dir = tempdir().expect("tempdir");
    let db = Arc::new(
        SymbolDb::open(dir.path().join("try.db"), DbConfig::default()).expect("open"),
    );

    // Saturate the writer with a request that blocks behind this reader,
    // so its exclusive lock attempt queues.
    let reader = db.read();
    db.index_file(single_symbol_facts("x.cpp", "x"));
    thread::sleep(Duration::from_millis(100));

    // A second reader queued behind a waiting writer must still get a
    // definite timeout answer, not an error.
    let db_clone = Arc::clone(&db);
    let handle = thread::spawn(move || {
        db_clone
            .try_read_for(Duration::from_millis(50))
            .map(|guard| drop(guard))
            .is_some()
    });
    let _ = handle.join().expect("thread");

    drop(reader);
    assert!(db.join(JOIN));
    assert!(
        db.try_read_for(Duration::from_millis(500)).is_some(),
        "read lock available once the writer is done"
    );
}

#[test]
fn searches_stay_consistent_under_concurrent_indexing() {
    let dir = tempdir().expect("tempdir");
    let db = Arc::new(
        SymbolDb::open(dir.path().join("stress.db"), DbConfig::default()).expect("open"),
    );

    let mut readers = Vec::new();
    for _ in 0..4 {
        let db = Arc::clone(&db);
        readers.push(thread::spawn(move || {
            let pattern = NamePattern::compile("fn_*", CaseMode::Sensitive);
            for _ in 0..50 {
                let reader = db.read();
                let hits = reader
                    .find_bindings(&pattern, &SearchOptions::default())
                    .expect("search never fails mid-update");
                // Every hit is fully linked: occurrence listing works.
                for hit in &hits {
                    reader
                        .occurrences(hit, symdex::RoleMask::ALL)
                        .expect("occurrences of a visible binding resolve");
                }
            }
        }));
    }

    for i in 0..30 {
        db.index_file(single_symbol_facts(
            &format!("gen/file_{i}.cpp"),
            &format!("fn_{i}"),
        ));
    }
    for handle in readers {
        handle.join().expect("reader thread");
    }
    assert!(db.join(JOIN));

    let reader = db.read();
    let stats = reader.stats().expect("stats");
    assert_eq!(stats.files, 30);
    assert_eq!(stats.bindings, 30);
    assert_eq!(stats.occurrences, 30);
}
