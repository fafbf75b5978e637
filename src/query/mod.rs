//! Pattern compilation and prefix-driven search.

mod pattern;
mod search;

pub use pattern::{CaseMode, MatchMode, NamePattern};
pub use search::{CancelToken, SearchOptions};

pub(crate) use search::search_linkage;
