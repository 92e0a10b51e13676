//! Acquisition-Order Observation Log
//!
//! When `LOCKSMITH_OBSERVE_FILE` names a writable path, every new
//! held-while-acquiring edge is appended to that file as one JSON object
//! per line, for offline analysis of a program's real lock ordering.
//! Events are written as they occur — there is no convenient
//! finalization point before a program exits, so nothing is buffered
//! beyond the line being built.
//!
//! With the variable unset this module costs one atomic load per
//! acquisition batch.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use locksmith_core::LockId;

/// One observed event, serialized as a JSON line.
#[derive(Debug, Serialize)]
enum Action {
    /// A lock was acquired while another was held.
    Edge {
        /// Id of the lock that was already held.
        from: usize,
        /// Id of the lock being acquired.
        to: usize,
    },
}

/// A log sink for observed lock activity.
struct ObservationLog {
    file: File,
    /// Line buffer, retained for allocation reuse.
    buffer: Vec<u8>,
}

impl ObservationLog {
    fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            file: File::create(path)?,
            buffer: Vec::new(),
        })
    }

    fn write_action(&mut self, action: &Action) {
        self.buffer.clear();
        if serde_json::to_writer(&mut self.buffer, action).is_err() {
            return;
        }
        self.buffer.push(b'\n');
        // An observation log that cannot be written is silently dropped;
        // it must never take the host program down.
        let _ = self.file.write_all(&self.buffer);
    }
}

static OBSERVER: Lazy<Option<Mutex<ObservationLog>>> = Lazy::new(|| {
    let path = std::env::var("LOCKSMITH_OBSERVE_FILE").ok()?;
    match ObservationLog::create(&path) {
        Ok(log) => Some(Mutex::new(log)),
        Err(err) => {
            eprintln!("locksmith: unable to open observation log '{path}': {err}");
            None
        }
    }
});

/// Record freshly added order-graph edges, if observation is enabled.
pub(crate) fn record_edges(edges: &[(LockId, LockId)]) {
    if edges.is_empty() {
        return;
    }
    if let Some(observer) = OBSERVER.as_ref() {
        let mut log = observer.lock();
        for &(from, to) in edges {
            log.write_action(&Action::Edge {
                from: from.as_usize(),
                to: to.as_usize(),
            });
        }
    }
}
