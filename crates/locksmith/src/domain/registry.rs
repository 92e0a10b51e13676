//! Lock Registry
//!
//! Process-wide table mapping opaque lock ids to [`LockRecord`]s. A
//! single `parking_lot::Mutex` guards the table and every record's
//! before-set; all operations are short and CPU-only, and the lock is
//! never held across a real lock acquisition.
//!
//! Locks reach the registry two ways: an explicit init call, or
//! create-on-first-use (`optional_init`) for statically initialized locks
//! that never announce themselves.

use std::collections::HashMap;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

use locksmith_core::{LockId, LockKind};

use super::graph;
use super::types::{InitOutcome, LockRecord, TrackError};

/// An inversion found by the admission check: acquiring `acquiring`
/// while holding `held` would reverse an order the process has already
/// established.
#[derive(Debug, Clone)]
pub struct Inversion {
    /// The lock the caller already holds.
    pub held: LockId,
    /// Diagnostic label of the held lock.
    pub held_label: String,
    /// The lock being acquired.
    pub acquiring: LockId,
    /// Diagnostic label of the lock being acquired.
    pub acquiring_label: String,
}

/// Owned copy of a record's state, for callers outside the registry lock.
#[derive(Debug, Clone)]
pub struct LockSnapshot {
    /// The lock's id.
    pub id: LockId,
    /// Sleep or spin.
    pub kind: LockKind,
    /// Caller-supplied name, if any.
    pub name: Option<String>,
    /// When the lock was first observed.
    pub created_at: SystemTime,
    /// Successful acquisitions so far.
    pub nlock: u64,
    /// Threads currently holding the lock.
    pub holders: u32,
    /// Incoming order-graph edges, sorted for stable comparisons.
    pub before: Vec<LockId>,
}

/// The process-wide lock table.
pub struct LockRegistry {
    table: Mutex<HashMap<LockId, LockRecord>>,
}

impl LockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure a record exists for `id`, creating one with an empty
    /// before-set if needed. Both outcomes are success; wrappers that
    /// cannot tell whether a static initializer was used call this on
    /// every operation.
    pub fn optional_init(&self, id: LockId, kind: LockKind) -> InitOutcome {
        let mut table = self.table.lock();
        if table.contains_key(&id) {
            return InitOutcome::AlreadyPresent;
        }
        debug!(target: "locksmith", %id, %kind, "registering lock");
        table.insert(id, LockRecord::new(id, kind, None));
        InitOutcome::Created
    }

    /// Register `id` on behalf of an explicit init call. Fails with
    /// `DoubleInit` when a live record already exists; the existing
    /// record is kept untouched in that case.
    pub fn explicit_init(
        &self,
        id: LockId,
        kind: LockKind,
        name: Option<&str>,
    ) -> Result<(), TrackError> {
        let mut table = self.table.lock();
        if table.contains_key(&id) {
            return Err(TrackError::DoubleInit { id });
        }
        debug!(target: "locksmith", %id, %kind, lock_name = name, "registering lock");
        table.insert(id, LockRecord::new(id, kind, name.map(str::to_owned)));
        Ok(())
    }

    /// Remove the record for `id`.
    ///
    /// Fails with `NotFound` when the id was never observed (benign for
    /// statically initialized locks that saw no interaction) and with
    /// `InUse` when some thread still holds the lock; an in-use record is
    /// not removed.
    pub fn destroy(&self, id: LockId) -> Result<(), TrackError> {
        let mut table = self.table.lock();
        match table.get(&id) {
            None => Err(TrackError::NotFound { id }),
            Some(rec) if rec.holders > 0 => Err(TrackError::InUse {
                id,
                holders: rec.holders,
            }),
            Some(_) => {
                debug!(target: "locksmith", %id, "destroying lock");
                table.remove(&id);
                Ok(())
            }
        }
    }

    /// Remove the record for `id` if it exists and is unheld, silently.
    ///
    /// Used when a library-native lock goes out of scope without an
    /// explicit destroy; absence and in-use are both left alone.
    pub fn forget(&self, id: LockId) {
        let mut table = self.table.lock();
        if table.get(&id).is_some_and(|rec| rec.holders == 0) {
            table.remove(&id);
        }
    }

    /// Owned snapshot of the record for `id`, if live.
    pub fn lookup(&self, id: LockId) -> Option<LockSnapshot> {
        let table = self.table.lock();
        table.get(&id).map(|rec| {
            let mut before: Vec<LockId> = rec.before.iter().copied().collect();
            before.sort_unstable();
            LockSnapshot {
                id: rec.id,
                kind: rec.kind,
                name: rec.name.clone(),
                created_at: rec.created_at,
                nlock: rec.nlock,
                holders: rec.holders,
                before,
            }
        })
    }

    /// Diagnostic label for `id`, whether or not it is registered.
    pub fn label_of(&self, id: LockId) -> String {
        let table = self.table.lock();
        match table.get(&id) {
            Some(rec) => rec.label(),
            None => format!("lock {id}"),
        }
    }

    /// Admission check for acquiring `id` while holding `held`.
    ///
    /// Ensures a record exists, then returns one [`Inversion`] per held
    /// lock that the acquisition would reverse. The caller reports them;
    /// nothing here blocks the real acquisition.
    pub fn admit(&self, id: LockId, kind: LockKind, held: &[LockId]) -> Vec<Inversion> {
        let mut table = self.table.lock();
        if !table.contains_key(&id) {
            debug!(target: "locksmith", %id, %kind, "registering lock");
            table.insert(id, LockRecord::new(id, kind, None));
        }

        let acquiring_label = table.get(&id).expect("record ensured above").label();
        graph::closing_edges(&table, id, held)
            .into_iter()
            .map(|held_id| Inversion {
                held: held_id,
                held_label: table
                    .get(&held_id)
                    .map_or_else(|| format!("lock {held_id}"), LockRecord::label),
                acquiring: id,
                acquiring_label: acquiring_label.clone(),
            })
            .collect()
    }

    /// Record a successful acquisition of `id` with `held` locks already
    /// held: bump the counters and add an edge `X -> id` for every held
    /// `X`. Returns the edges that were new, as `(from, to)` pairs.
    pub fn commit_acquire(
        &self,
        id: LockId,
        kind: LockKind,
        held: &[LockId],
    ) -> Vec<(LockId, LockId)> {
        let mut table = self.table.lock();
        // A trylock that raced a destroy can land here without a record.
        table
            .entry(id)
            .or_insert_with(|| LockRecord::new(id, kind, None));

        let fresh = graph::add_edges(&mut table, id, held);
        let rec = table.get_mut(&id).expect("record inserted above");
        rec.nlock += 1;
        rec.holders += 1;
        fresh.into_iter().map(|from| (from, id)).collect()
    }

    /// Record a release of `id`.
    pub fn commit_release(&self, id: LockId) {
        let mut table = self.table.lock();
        if let Some(rec) = table.get_mut(&id) {
            rec.holders = rec.holders.saturating_sub(1);
        }
    }

    /// Number of live records. Diagnostic only.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
