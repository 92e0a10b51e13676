//! Per-Thread Held State
//!
//! Each thread owns an ordered ledger of the locks it currently holds,
//! most-recently-acquired last. The ledger is only ever touched by its
//! owning thread, so it needs no lock; the hook layer keeps it in
//! thread-local storage.
//!
//! The process-wide thread table exists only for discovery: registration
//! on a thread's first tracked operation, teardown when the thread exits,
//! and name lookup for diagnostics. Steady-state operations never touch
//! it, so a sharded map is plenty.

use dashmap::DashMap;
use smallvec::SmallVec;

use locksmith_core::{LockId, LockKind, ThreadKey};

use super::types::{HeldEntry, TrackError};

/// Ordered sequence of locks a thread currently holds.
#[derive(Debug)]
pub struct ThreadLedger {
    key: ThreadKey,
    held: SmallVec<[HeldEntry; 8]>,
}

impl ThreadLedger {
    /// Create an empty ledger for a thread.
    pub fn new(key: ThreadKey) -> Self {
        Self {
            key,
            held: SmallVec::new(),
        }
    }

    /// The owning thread's key.
    pub fn key(&self) -> ThreadKey {
        self.key
    }

    /// Append a newly acquired lock.
    ///
    /// A lock appears at most once in the sequence. Error-checking
    /// primitives reject self-reentry before the tracker gets this far,
    /// but a recursive mutex that was not eligible for promotion can
    /// legitimately re-enter: that bumps the entry's depth instead of
    /// duplicating it.
    pub fn push(&mut self, lock: LockId, kind: LockKind) {
        if let Some(entry) = self.held.iter_mut().find(|e| e.lock == lock) {
            entry.depth += 1;
            return;
        }
        self.held.push(HeldEntry::new(lock, kind));
    }

    /// Release one level of a held lock, removing the entry when its
    /// depth reaches zero.
    ///
    /// Unlock order does not have to mirror acquisition order, so this
    /// searches the whole sequence, newest first.
    pub fn pop(&mut self, lock: LockId) -> Result<(), TrackError> {
        match self.held.iter().rposition(|e| e.lock == lock) {
            Some(pos) => {
                self.held[pos].depth -= 1;
                if self.held[pos].depth == 0 {
                    self.held.remove(pos);
                }
                Ok(())
            }
            None => Err(TrackError::NotHeld { id: lock }),
        }
    }

    /// Is the lock anywhere in the held sequence?
    pub fn contains(&self, lock: LockId) -> bool {
        self.held.iter().any(|e| e.lock == lock)
    }

    /// Ids of the held locks, in acquisition order.
    pub fn held_snapshot(&self) -> SmallVec<[LockId; 8]> {
        self.held.iter().map(|e| e.lock).collect()
    }

    /// The most recently acquired lock, if any.
    pub fn top(&self) -> Option<LockId> {
        self.held.last().map(|e| e.lock)
    }

    /// Number of locks currently held.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Whether the thread holds nothing.
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Drop every entry, returning what was held. Used at thread
    /// teardown to report leaks.
    pub fn drain(&mut self) -> SmallVec<[LockId; 8]> {
        self.held.drain(..).map(|e| e.lock).collect()
    }
}

/// Metadata kept per discovered thread.
#[derive(Debug, Default, Clone)]
pub struct ThreadMeta {
    /// Optional diagnostic name.
    pub name: Option<String>,
}

/// Process-wide map of discovered threads.
///
/// Touched on thread registration, naming, and teardown only.
pub struct ThreadTable {
    threads: DashMap<ThreadKey, ThreadMeta>,
}

impl ThreadTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            threads: DashMap::new(),
        }
    }

    /// Record a thread's first tracked operation.
    pub fn register(&self, key: ThreadKey) {
        self.threads.entry(key).or_default();
    }

    /// Remove a thread at teardown.
    pub fn unregister(&self, key: ThreadKey) {
        self.threads.remove(&key);
    }

    /// Attach a diagnostic name to a thread.
    pub fn set_name(&self, key: ThreadKey, name: &str) {
        self.threads.entry(key).or_default().name = Some(name.to_owned());
    }

    /// Diagnostic label: `t3 (worker)` when named, `t3` otherwise.
    pub fn label(&self, key: ThreadKey) -> String {
        match self.threads.get(&key).and_then(|m| m.name.clone()) {
            Some(name) => format!("{key} ({name})"),
            None => key.to_string(),
        }
    }

    /// Number of live registered threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Whether no threads are registered.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> LockId {
        LockId::new(n)
    }

    #[test]
    fn test_push_pop_order() {
        let mut ledger = ThreadLedger::new(ThreadKey::new(1));
        ledger.push(id(1), LockKind::Mutex);
        ledger.push(id(2), LockKind::Mutex);

        assert_eq!(ledger.top(), Some(id(2)));
        assert_eq!(ledger.held_snapshot().as_slice(), &[id(1), id(2)]);

        // Out-of-order release is allowed.
        ledger.pop(id(1)).unwrap();
        assert_eq!(ledger.held_snapshot().as_slice(), &[id(2)]);

        ledger.pop(id(2)).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_pop_not_held() {
        let mut ledger = ThreadLedger::new(ThreadKey::new(1));
        assert_eq!(
            ledger.pop(id(3)).unwrap_err(),
            TrackError::NotHeld { id: id(3) }
        );
    }

    #[test]
    fn test_reentry_counts_depth() {
        let mut ledger = ThreadLedger::new(ThreadKey::new(1));
        ledger.push(id(1), LockKind::Mutex);
        ledger.push(id(1), LockKind::Mutex);

        // One entry, depth two.
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.held_snapshot().as_slice(), &[id(1)]);

        ledger.pop(id(1)).unwrap();
        assert!(ledger.contains(id(1)));
        ledger.pop(id(1)).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_drain_reports_leaks() {
        let mut ledger = ThreadLedger::new(ThreadKey::new(1));
        ledger.push(id(1), LockKind::Mutex);
        ledger.push(id(2), LockKind::Spin);

        let leaked = ledger.drain();
        assert_eq!(leaked.as_slice(), &[id(1), id(2)]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_thread_table_labels() {
        let table = ThreadTable::new();
        let key = ThreadKey::new(7);
        table.register(key);
        assert_eq!(table.label(key), "t7");

        table.set_name(key, "worker");
        assert_eq!(table.label(key), "t7 (worker)");

        table.unregister(key);
        assert!(table.is_empty());
    }
}
