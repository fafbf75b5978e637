//! Operator tool: open a symbol database read-only and dump its contents
//! as JSON.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use symdex::{CaseMode, DbConfig, NamePattern, SearchOptions, SymbolDb};

#[derive(Debug, Parser)]
#[command(name = "symdex-inspect", about = "Inspect a symdex database")]
struct Args {
    /// Path to the database file.
    path: PathBuf,

    /// List every indexed file.
    #[arg(long)]
    files: bool,

    /// Dump bindings matching a name pattern (e.g. `ns::Foo*`).
    #[arg(long)]
    pattern: Option<String>,

    /// Match the pattern as a prefix of the innermost name.
    #[arg(long)]
    prefix: bool,

    /// Open a database built with case-insensitive name ordering.
    #[arg(long, env = "SYMDEX_CASE_INSENSITIVE")]
    case_insensitive: bool,
}

fn main() -> symdex::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = DbConfig {
        case_sensitive: !args.case_insensitive,
        ..DbConfig::default()
    };
    let db = SymbolDb::open(&args.path, config)?;
    let reader = db.read();

    let stats = reader.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats).expect("stats serialize"));

    if args.files {
        let files = reader.files()?;
        println!("{}", serde_json::to_string_pretty(&files).expect("files serialize"));
    }

    if let Some(text) = &args.pattern {
        let case = if args.case_insensitive {
            CaseMode::Insensitive
        } else {
            CaseMode::Sensitive
        };
        let pattern = NamePattern::compile(text, case);
        let options = SearchOptions {
            prefix: args.prefix,
            ..SearchOptions::default()
        };
        let bindings = reader.find_bindings(&pattern, &options)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&bindings).expect("bindings serialize")
        );
    }

    Ok(())
}
