//! Core Types for Lock Tracking

use std::collections::HashSet;
use std::time::SystemTime;

use locksmith_core::{DiagCode, LockId, LockKind};

/// One record per distinct lock the process has observed.
///
/// The `before` set holds the incoming edges of the order graph: every id
/// in it was held by some thread at the moment this lock was acquired.
/// Edges are never removed, so a reported inversion leaves permanent
/// evidence.
#[derive(Debug, Clone)]
pub struct LockRecord {
    /// Opaque address token identifying the lock.
    pub id: LockId,
    /// Sleep or spin; only affects diagnostic text.
    pub kind: LockKind,
    /// Optional caller-supplied name, used in diagnostics when present.
    pub name: Option<String>,
    /// Wall-clock timestamp of first observation.
    pub created_at: SystemTime,
    /// Ids ever held at the moment this lock was acquired.
    pub before: HashSet<LockId>,
    /// Number of successful acquisitions so far.
    pub nlock: u64,
    /// Number of threads currently holding the lock.
    pub holders: u32,
}

impl LockRecord {
    /// Create a fresh record with an empty before-set.
    pub fn new(id: LockId, kind: LockKind, name: Option<String>) -> Self {
        Self {
            id,
            kind,
            name,
            created_at: SystemTime::now(),
            before: HashSet::new(),
            nlock: 0,
            holders: 0,
        }
    }

    /// Human-readable label for diagnostics: the name when one was given,
    /// the hex id otherwise.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} \"{}\" ({})", self.kind, name, self.id),
            None => format!("{} {}", self.kind, self.id),
        }
    }
}

/// Element of a thread's held sequence.
#[derive(Debug, Clone)]
pub struct HeldEntry {
    /// The held lock.
    pub lock: LockId,
    /// Sleep or spin, carried for diagnostic text.
    pub kind: LockKind,
    /// Re-entry count. 1 for everything except a recursive mutex seen
    /// through the interposer.
    pub depth: u32,
    /// Wall-clock acquisition timestamp.
    pub acquired_at: SystemTime,
}

impl HeldEntry {
    /// Record an acquisition happening now.
    pub fn new(lock: LockId, kind: LockKind) -> Self {
        Self {
            lock,
            kind,
            depth: 1,
            acquired_at: SystemTime::now(),
        }
    }
}

/// Recoverable registry and held-set failures.
///
/// These are surfaced to callers of the registry operations; the hook
/// layer decides which of them become diagnostics and which are benign.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    /// No live record for the id.
    #[error("lock {id} is not registered")]
    NotFound {
        /// The id that was looked up.
        id: LockId,
    },

    /// Destroy attempted while threads still hold the lock.
    #[error("lock {id} is still held by {holders} thread(s)")]
    InUse {
        /// The lock being destroyed.
        id: LockId,
        /// How many threads hold it.
        holders: u32,
    },

    /// Explicit init of an id that is already live.
    #[error("lock {id} initialized twice")]
    DoubleInit {
        /// The id that was re-initialized.
        id: LockId,
    },

    /// The calling thread does not hold the lock.
    #[error("lock {id} is not held by this thread")]
    NotHeld {
        /// The lock that was not held.
        id: LockId,
    },
}

impl TrackError {
    /// The diagnostic code this failure maps to when reported.
    pub fn diag_code(&self) -> DiagCode {
        match self {
            Self::NotFound { .. } => DiagCode::DestroyUnknown,
            Self::InUse { .. } => DiagCode::DestroyInUse,
            Self::DoubleInit { .. } => DiagCode::DoubleInit,
            Self::NotHeld { .. } => DiagCode::NotOwnedUnlock,
        }
    }
}

/// Outcome of `optional_init`: both cases are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A record was created for the id.
    Created,
    /// A live record already existed; the registry is unchanged.
    AlreadyPresent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_label_unnamed() {
        let rec = LockRecord::new(LockId::new(0xbeef), LockKind::Mutex, None);
        assert_eq!(rec.label(), "mutex 0xbeef");
    }

    #[test]
    fn test_record_label_named() {
        let rec = LockRecord::new(
            LockId::new(0x10),
            LockKind::Spin,
            Some("cache".to_string()),
        );
        assert_eq!(rec.label(), "spinlock \"cache\" (0x10)");
    }

    #[test]
    fn test_track_error_diag_codes() {
        let id = LockId::new(1);
        assert_eq!(
            TrackError::NotFound { id }.diag_code(),
            DiagCode::DestroyUnknown
        );
        assert_eq!(
            TrackError::InUse { id, holders: 2 }.diag_code(),
            DiagCode::DestroyInUse
        );
        assert_eq!(
            TrackError::DoubleInit { id }.diag_code(),
            DiagCode::DoubleInit
        );
        assert_eq!(
            TrackError::NotHeld { id }.diag_code(),
            DiagCode::NotOwnedUnlock
        );
    }

    #[test]
    fn test_held_entry_depth_is_one() {
        let entry = HeldEntry::new(LockId::new(4), LockKind::Mutex);
        assert_eq!(entry.depth, 1);
    }
}
