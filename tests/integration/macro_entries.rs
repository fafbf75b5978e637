#![allow(missing_docs)]

use std::time::Duration;

use symdex::{DbConfig, FileFacts, Language, MacroFact, SymbolDb};
use tempfile::tempdir;

const JOIN: Duration = Duration::from_secs(10);

fn object_macro(name: &str, expansion: &str) -> MacroFact {
    MacroFact {
        name: name.into(),
        parameters: None,
        expansion: expansion.into(),
    }
}

#[test]
fn redefinition_yields_two_entries_in_definition_order() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("macros.db"), DbConfig::default()).expect("open");

    // #define X 1 / #undef X / #define X 2
    let mut facts = FileFacts::new("flags.h", Language::C);
    facts.macros.push(object_macro("X", "1"));
    facts.macros.push(object_macro("X", "2"));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let file = reader.file("flags.h").expect("lookup").expect("indexed");
    let macros = reader.macros(&file).expect("macros");
    let entries: Vec<_> = macros.iter().filter(|m| m.name == "X").collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].expansion, "1");
    assert_eq!(entries[1].expansion, "2");
}

#[test]
fn function_like_macros_keep_their_parameter_list() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("fn.db"), DbConfig::default()).expect("open");

    let mut facts = FileFacts::new("util.h", Language::C);
    facts.macros.push(MacroFact {
        name: "MIN".into(),
        parameters: Some("a, b".into()),
        expansion: "((a) < (b) ? (a) : (b))".into(),
    });
    facts.macros.push(object_macro("VERSION", "0x0103"));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let file = reader.file("util.h").expect("lookup").expect("indexed");
    let macros = reader.macros(&file).expect("macros");
    assert_eq!(macros.len(), 2);
    assert_eq!(macros[0].name, "MIN");
    assert_eq!(macros[0].parameters.as_deref(), Some("a, b"));
    assert_eq!(macros[1].name, "VERSION");
    assert_eq!(macros[1].parameters, None);
}

#[test]
fn reindex_replaces_the_macro_table() {
    let dir = tempdir().expect("tempdir");
    let db = SymbolDb::open(dir.path().join("re.db"), DbConfig::default()).expect("open");

    let mut facts = FileFacts::new("config.h", Language::C);
    facts.macros.push(object_macro("DEBUG", "1"));
    facts.macros.push(object_macro("TRACE", "1"));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let mut facts = FileFacts::new("config.h", Language::C);
    facts.macros.push(object_macro("DEBUG", "0"));
    db.index_file(facts);
    assert!(db.join(JOIN));

    let reader = db.read();
    let file = reader.file("config.h").expect("lookup").expect("indexed");
    let macros = reader.macros(&file).expect("macros");
    assert_eq!(macros.len(), 1);
    assert_eq!(macros[0].name, "DEBUG");
    assert_eq!(macros[0].expansion, "0");
}
