#![allow(missing_docs)]

use std::time::Duration;

use symdex::{DbConfig, FileFacts, IncludeFact, Language, SymbolDb};
use tempfile::tempdir;

const JOIN: Duration = Duration::from_secs(10);

fn include(location: &str, token_offset: u32, system: bool) -> IncludeFact {
    IncludeFact {
        location: location.into(),
        token_offset,
        token_length: location.len() as u16 + 2,
        system,
    }
}

#[test]
fn include_edges_round_trip_both_directions() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("inc.db"), DbConfig::default()).expect("open");

    let mut facts = FileFacts::new("app/main.cpp", Language::Cpp);
    facts.includes.push(include("app/config.h", 10, false));
    facts.includes.push(include("vector", 40, true));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let main = reader
        .file("app/main.cpp")
        .expect("lookup")
        .expect("main indexed");
    let includes = reader.includes(&main).expect("includes");
    assert_eq!(includes.len(), 2);

    let config = includes
        .iter()
        .find(|edge| edge.included == "app/config.h")
        .expect("config edge");
    assert!(!config.system);
    assert_eq!(config.token_offset, 10);
    assert_eq!(config.token_length, "app/config.h".len() as u16 + 2);

    let vector = includes
        .iter()
        .find(|edge| edge.included == "vector")
        .expect("vector edge");
    assert!(vector.system);

    // The included files exist as records and know their includer.
    let header = reader
        .file("app/config.h")
        .expect("lookup")
        .expect("header record created");
    let included_by = reader.included_by(&header).expect("included_by");
    assert_eq!(included_by.len(), 1);
    assert_eq!(included_by[0].includer, "app/main.cpp");
}

#[test]
fn removing_the_includer_detaches_both_sides() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("rm.db"), DbConfig::default()).expect("open");

    let mut a = FileFacts::new("a.c", Language::C);
    a.includes.push(include("b.h", 0, false));
    db.index_file(a);

    let b = FileFacts::new("b.h", Language::C);
    db.index_file(b);
    assert!(db.join(JOIN));

    db.remove_file("a.c");
    assert!(db.join(JOIN));

    let reader = db.read();
    assert!(reader.file("a.c").expect("lookup").is_none());
    let b = reader.file("b.h").expect("lookup").expect("b survives");
    assert!(
        reader.included_by(&b).expect("included_by").is_empty(),
        "reverse edge went away with the includer"
    );
}

#[test]
fn reindexing_the_includer_replaces_its_edges() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("re.db"), DbConfig::default()).expect("open");

    let mut a = FileFacts::new("a.cpp", Language::Cpp);
    a.includes.push(include("old.h", 0, false));
    db.index_file(a);
    assert!(db.join(JOIN));

    let mut a = FileFacts::new("a.cpp", Language::Cpp);
    a.includes.push(include("new.h", 0, false));
    db.index_file(a);
    assert!(db.join(JOIN));

    let reader = db.read();
    let a = reader.file("a.cpp").expect("lookup").expect("a indexed");
    let includes = reader.includes(&a).expect("includes");
    assert_eq!(includes.len(), 1);
    assert_eq!(includes[0].included, "new.h");

    let old = reader.file("old.h").expect("lookup").expect("record kept");
    assert!(
        reader.included_by(&old).expect("included_by").is_empty(),
        "stale edge detached from the old header"
    );
    let new = reader.file("new.h").expect("lookup").expect("record made");
    assert_eq!(reader.included_by(&new).expect("included_by").len(), 1);
}

#[test]
fn repeated_includes_keep_one_edge_each() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("dup.db"), DbConfig::default()).expect("open");

    let mut facts = FileFacts::new("main.c", Language::C);
    facts.includes.push(include("util.h", 0, false));
    facts.includes.push(include("util.h", 100, false));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let main = reader.file("main.c").expect("lookup").expect("indexed");
    let includes = reader.includes(&main).expect("includes");
    assert_eq!(includes.len(), 2, "one edge per include directive");
    let util = reader.file("util.h").expect("lookup").expect("created");
    assert_eq!(reader.included_by(&util).expect("included_by").len(), 2);
}

#[test]
fn removing_the_included_file_detaches_the_forward_edge() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("rmtarget.db"), DbConfig::default()).expect("open");

    let mut a = FileFacts::new("a.c", Language::C);
    a.includes.push(include("gone.h", 0, false));
    db.index_file(a);
    assert!(db.join(JOIN));

    db.remove_file("gone.h");
    assert!(db.join(JOIN));

    let reader = db.read();
    let a = reader.file("a.c").expect("lookup").expect("a stays");
    assert!(
        reader.includes(&a).expect("includes").is_empty(),
        "forward edge went away with the included file"
    );
    assert!(reader.file("gone.h").expect("lookup").is_none());
}
