//! Pluggable diagnostic channel.
//!
//! Indexing-time faults and per-candidate query faults are recovered
//! locally: the offending entry contributes nothing and processing moves
//! on. The report of what was skipped goes through a [`DiagnosticSink`] so
//! embedders can route it wherever they like; the default sink forwards to
//! `tracing`.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::DbError;

/// Receives reports about faults that were swallowed instead of propagated.
pub trait DiagnosticSink: Send + Sync {
    /// Called once per swallowed fault with a short context description.
    fn report(&self, context: &str, error: &DbError);
}

/// Default sink: forwards every report to `tracing` at WARN.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, context: &str, error: &DbError) {
        tracing::warn!(context, %error, "recovered from indexing fault");
    }
}

/// Test sink that counts reports.
#[derive(Debug, Default)]
pub struct CountingSink {
    count: AtomicUsize,
}

impl CountingSink {
    /// Creates a sink with a zero count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of faults reported so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl DiagnosticSink for CountingSink {
    fn report(&self, context: &str, error: &DbError) {
        tracing::debug!(context, %error, "counted diagnostic");
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
