//! The background writer: one dedicated worker per database draining a
//! request queue, taking the exclusive write lock for exactly one file's
//! transaction at a time so readers starve for at most one file.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info};

use crate::db::core::DbCore;
use crate::facts::FileFacts;

/// One unit of indexing work.
#[derive(Debug, Clone)]
pub enum WriteRequest {
    /// Index (or re-index) a file from its facts.
    IndexFile(FileFacts),
    /// Remove a file and everything it owns.
    RemoveFile(String),
}

#[derive(Default)]
struct QueueState {
    requests: VecDeque<WriteRequest>,
    /// Queued plus in-flight requests.
    pending: usize,
    shutdown: bool,
}

/// Request queue shared between the facade and the worker.
pub(crate) struct WriteQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl WriteQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn submit(&self, request: WriteRequest) {
        let mut state = self.state.lock();
        state.requests.push_back(request);
        state.pending += 1;
        self.changed.notify_all();
    }

    /// Drops every request that has not started yet. Returns how many were
    /// dropped.
    pub(crate) fn cancel_pending(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.requests.len();
        state.requests.clear();
        state.pending -= dropped;
        self.changed.notify_all();
        dropped
    }

    pub(crate) fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.changed.notify_all();
    }

    /// Blocks for the next request; `None` once shut down and drained.
    fn next(&self) -> Option<WriteRequest> {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = state.requests.pop_front() {
                return Some(request);
            }
            if state.shutdown {
                return None;
            }
            self.changed.wait(&mut state);
        }
    }

    fn request_done(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        self.changed.notify_all();
    }

    /// Blocks until the backlog drains or the timeout elapses. Always
    /// returns a definite answer.
    pub(crate) fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let result = self.changed.wait_for(&mut state, deadline - now);
            if result.timed_out() && state.pending > 0 {
                return false;
            }
        }
        true
    }
}

/// Spawns the indexing worker.
pub(crate) fn spawn_writer(
    core: Arc<RwLock<DbCore>>,
    queue: Arc<WriteQueue>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("symdex-writer".into())
        .spawn(move || run(core, queue))
        .expect("spawn writer thread")
}

fn run(core: Arc<RwLock<DbCore>>, queue: Arc<WriteQueue>) {
    info!("writer started");
    while let Some(request) = queue.next() {
        let result = {
            // Exclusive lock spans exactly one file's transaction.
            let mut core = core.write();
            let result = match &request {
                WriteRequest::IndexFile(facts) => core.apply_file_facts(facts),
                WriteRequest::RemoveFile(location) => {
                    core.remove_file(location).map(|_| ())
                }
            };
            result.and_then(|()| core.flush())
        };
        if let Err(fault) = result {
            if fault.is_fatal() {
                error!(%fault, "structural corruption, database needs a rebuild");
                core.write().mark_tainted();
            } else {
                let sink = core.read().sink();
                sink.report("write request", &fault);
            }
        }
        queue.request_done();
    }
    debug!("writer stopped");
}
