//! Hook Layer
//!
//! The contract the interposer (and the library-native lock types) call
//! around every primitive operation:
//!
//! ```text
//! wrapper ──► prelock ──► real acquire ──► postlock
//!         └─► preunlock ─► real release ─► postunlock
//! ```
//!
//! `prelock` runs the admission check against the calling thread's held
//! set and reports any inversion; it never blocks the acquisition.
//! `postlock` commits the new edges and pushes the lock onto the held
//! sequence, but only when the real acquisition succeeded. `preunlock`
//! verifies ownership without removing anything, so a failed underlying
//! unlock leaves the held set intact; `postunlock` does the removal.
//!
//! No internal lock is held across the real primitive call, and the
//! registry lock is never held while the thread table or the callback
//! cell is taken.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use tracing::trace;

use locksmith_core::{DiagCode, Errno, ErrorCallback, LockId, LockKind, ThreadKey};

use crate::domain::{LockRegistry, LockSnapshot, ThreadLedger, ThreadTable, TrackError};
use crate::observe;
use crate::sink::ErrorSink;

/// Keys start at 1 so 0 can serve as an "unowned" sentinel elsewhere.
static THREAD_SEQ: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static LEDGER: RefCell<Option<LedgerHandle>> = const { RefCell::new(None) };
}

/// Owns a thread's ledger and tears it down when the thread exits.
struct LedgerHandle {
    ledger: ThreadLedger,
}

impl Drop for LedgerHandle {
    fn drop(&mut self) {
        Tracker::global().thread_teardown(&mut self.ledger);
    }
}

/// The process-wide lock tracker: registry, thread table, and sink.
pub struct Tracker {
    registry: LockRegistry,
    threads: ThreadTable,
    sink: ErrorSink,
}

static TRACKER: Lazy<Tracker> = Lazy::new(|| Tracker {
    registry: LockRegistry::new(),
    threads: ThreadTable::new(),
    sink: ErrorSink::new(),
});

impl Tracker {
    /// The process-wide tracker instance.
    pub fn global() -> &'static Tracker {
        &TRACKER
    }

    /// Run `f` on the calling thread's ledger, creating and registering
    /// it on first contact.
    fn with_ledger<R>(&self, f: impl FnOnce(&mut ThreadLedger) -> R) -> R {
        LEDGER.with(|cell| {
            let mut slot = cell.borrow_mut();
            let handle = slot.get_or_insert_with(|| {
                let key = ThreadKey::new(THREAD_SEQ.fetch_add(1, Ordering::Relaxed));
                self.threads.register(key);
                LedgerHandle {
                    ledger: ThreadLedger::new(key),
                }
            });
            f(&mut handle.ledger)
        })
    }

    /// The calling thread's key, assigning one on first contact.
    pub fn current_thread(&self) -> ThreadKey {
        self.with_ledger(|ledger| ledger.key())
    }

    /// Attach a diagnostic name to the calling thread.
    pub fn set_thread_name(&self, name: &str) {
        let key = self.current_thread();
        self.threads.set_name(key, name);
    }

    /// Install or clear the error callback.
    pub fn set_error_cb(&self, cb: Option<ErrorCallback>) {
        self.sink.set_callback(cb);
    }

    /// Pre-acquisition hook.
    ///
    /// Ensures a registry record for `id`, then checks whether acquiring
    /// it would close a cycle against anything the calling thread holds.
    /// Each reversed pair is reported through the sink. Always returns 0:
    /// the diagnostic never aborts the real acquisition, and the only
    /// unreportable failure (allocation) aborts the process outright.
    pub fn prelock(&self, id: LockId, kind: LockKind) -> Errno {
        let (key, held) = self.with_ledger(|ledger| (ledger.key(), ledger.held_snapshot()));
        let inversions = self.registry.admit(id, kind, &held);
        for inv in inversions {
            self.sink.report(
                DiagCode::Inversion,
                &format!(
                    "potential deadlock: thread {} is acquiring {} while holding {}, \
                     but the process has already acquired {} while holding {}",
                    self.threads.label(key),
                    inv.acquiring_label,
                    inv.held_label,
                    inv.held_label,
                    inv.acquiring_label,
                ),
            );
        }
        0
    }

    /// Post-acquisition hook.
    ///
    /// With `real_code == 0`, commits an edge from every currently held
    /// lock to `id` and appends `id` to the held sequence. Any other
    /// code (a trylock that lost the race, a timedlock that expired, an
    /// error-checking rejection) leaves both the graph and the held set
    /// untouched.
    pub fn postlock(&self, id: LockId, kind: LockKind, real_code: Errno) {
        if real_code != 0 {
            return;
        }
        let held = self.with_ledger(|ledger| ledger.held_snapshot());
        let fresh = self.registry.commit_acquire(id, kind, &held);
        observe::record_edges(&fresh);
        self.with_ledger(|ledger| ledger.push(id, kind));
        trace!(target: "locksmith", %id, %kind, depth = held.len() + 1, "acquired");
    }

    /// Pre-release hook.
    ///
    /// Verifies the calling thread holds `id`. If it does not, reports
    /// unlock-of-unowned and returns `EPERM`; the wrapper still calls
    /// the real unlock so behavior matches the underlying library.
    /// Nothing is removed here.
    pub fn preunlock(&self, id: LockId) -> Errno {
        let (key, holds) = self.with_ledger(|ledger| (ledger.key(), ledger.contains(id)));
        if !holds {
            self.sink.report(
                DiagCode::NotOwnedUnlock,
                &format!(
                    "thread {} is unlocking {} which it does not hold",
                    self.threads.label(key),
                    self.registry.label_of(id),
                ),
            );
            return libc::EPERM;
        }
        0
    }

    /// Post-release hook: remove `id` from the held sequence.
    ///
    /// Called only when the real unlock succeeded. A remove of something
    /// never held is a no-op here; `preunlock` already reported it.
    pub fn postunlock(&self, id: LockId) {
        let removed = self.with_ledger(|ledger| ledger.pop(id));
        if removed.is_ok() {
            self.registry.commit_release(id);
            trace!(target: "locksmith", %id, "released");
        }
    }

    /// Create-on-first-use registration. Success whether or not the id
    /// was already live.
    pub fn optional_init(&self, id: LockId, kind: LockKind) -> Errno {
        self.registry.optional_init(id, kind);
        0
    }

    /// Explicit registration on behalf of an init call.
    ///
    /// Double-init is reported but does not fail the init: the existing
    /// record (and its accumulated edges) is kept.
    pub fn explicit_init(&self, id: LockId, kind: LockKind, name: Option<&str>) -> Errno {
        match self.registry.explicit_init(id, kind, name) {
            Ok(()) => 0,
            Err(err @ TrackError::DoubleInit { .. }) => {
                self.sink.report(
                    err.diag_code(),
                    &format!(
                        "{} has already been initialized",
                        self.registry.label_of(id)
                    ),
                );
                0
            }
            Err(_) => 0,
        }
    }

    /// Remove the record for `id`.
    ///
    /// Destroy of an id the registry never saw is reported (callers
    /// filtering on `ENOENT` can see it) but returns success — a
    /// statically initialized lock that saw no interaction has nothing
    /// to remove. Destroy while held is reported and returns `EBUSY`;
    /// the record stays.
    pub fn destroy(&self, id: LockId) -> Errno {
        match self.registry.destroy(id) {
            Ok(()) => 0,
            Err(err @ TrackError::NotFound { .. }) => {
                self.sink.report(
                    err.diag_code(),
                    &format!("destroy of unknown lock {id}"),
                );
                0
            }
            Err(err @ TrackError::InUse { .. }) => {
                self.sink
                    .report(err.diag_code(), &format!("destroy of held {}", self.registry.label_of(id)));
                libc::EBUSY
            }
            Err(_) => 0,
        }
    }

    /// Silently drop the record for `id` if it exists and is unheld.
    /// Used when a library-native lock is dropped without an explicit
    /// destroy.
    pub fn forget(&self, id: LockId) {
        self.registry.forget(id);
    }

    /// Owned snapshot of a lock's record, if live.
    pub fn lookup(&self, id: LockId) -> Option<LockSnapshot> {
        self.registry.lookup(id)
    }

    /// The calling thread's held sequence, acquisition order. Diagnostic.
    pub fn held(&self) -> Vec<LockId> {
        self.with_ledger(|ledger| ledger.held_snapshot().into_vec())
    }

    /// Teardown for an exiting thread: report anything still held, then
    /// release it and unregister the thread.
    ///
    /// Must not touch thread-local storage — it runs inside the TLS
    /// destructor.
    fn thread_teardown(&self, ledger: &mut ThreadLedger) {
        let key = ledger.key();
        let leaked = ledger.drain();
        if !leaked.is_empty() {
            let labels: Vec<String> = leaked
                .iter()
                .map(|&id| self.registry.label_of(id))
                .collect();
            self.sink.report(
                DiagCode::ThreadExitWithHeld,
                &format!(
                    "thread {} exited while holding: {}",
                    self.threads.label(key),
                    labels.join(", "),
                ),
            );
            for id in leaked {
                self.registry.commit_release(id);
            }
        }
        self.threads.unregister(key);
    }
}
