//! Order Graph & Cycle Detection
//!
//! The order graph is distributed over the registry: each
//! [`LockRecord`]'s `before` set holds the record's incoming edges. An
//! edge `A -> B` exists iff at some prior moment `A` was held by some
//! thread while `B` was acquired. Edges are only ever added.
//!
//! # Admission
//!
//! Acquiring `L` while holding `H = {X1, X2, ...}` will add edges
//! `Xi -> L`. That closes a cycle exactly when a path `L -> ... -> Xi`
//! already exists. [`closing_edges`] finds every such `Xi` so the caller
//! can report one inversion per reversed pair. The check never blocks the
//! acquisition; policy is observe-and-warn.
//!
//! Reachability is a depth-first walk over the before-sets, starting from
//! the path target and climbing incoming edges until the path source is
//! found or the ancestor set is exhausted. Cost is linear in the size of
//! the transitive closure.

use std::collections::{HashMap, HashSet};

use locksmith_core::LockId;

use super::types::LockRecord;

/// Does a path `src -> ... -> dst` exist in the graph?
///
/// Walks `dst`'s ancestors through the before-sets; `src` is an ancestor
/// of `dst` exactly when the forward path exists. A lock is not its own
/// ancestor unless it sits on a real cycle, so `src == dst` is answered
/// by the same walk rather than special-cased.
pub(crate) fn path_exists(
    records: &HashMap<LockId, LockRecord>,
    src: LockId,
    dst: LockId,
) -> bool {
    let mut visited: HashSet<LockId> = HashSet::new();
    let mut stack: Vec<LockId> = match records.get(&dst) {
        Some(rec) => rec.before.iter().copied().collect(),
        None => return false,
    };

    while let Some(node) = stack.pop() {
        if node == src {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(rec) = records.get(&node) {
            stack.extend(rec.before.iter().copied());
        }
    }
    false
}

/// Which held locks would be reversed by acquiring `acquiring`?
///
/// Returns every `X` in `held` with an existing path
/// `acquiring -> ... -> X`. The caller already holding `acquiring`
/// itself is the self-deadlock case, handled by the error-checking
/// primitive underneath, so it is skipped here.
pub(crate) fn closing_edges(
    records: &HashMap<LockId, LockRecord>,
    acquiring: LockId,
    held: &[LockId],
) -> Vec<LockId> {
    held.iter()
        .copied()
        .filter(|&x| x != acquiring && path_exists(records, acquiring, x))
        .collect()
}

/// Record the edges `from -> to` for every `from` in `held`.
///
/// Duplicate edges collapse; self-edges are never stored. Returns the
/// edges that were actually new, for the observation log.
pub(crate) fn add_edges(
    records: &mut HashMap<LockId, LockRecord>,
    to: LockId,
    held: &[LockId],
) -> Vec<LockId> {
    let mut fresh = Vec::new();
    if let Some(rec) = records.get_mut(&to) {
        for &from in held {
            if from != to && rec.before.insert(from) {
                fresh.push(from);
            }
        }
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use locksmith_core::LockKind;

    fn table(n: usize) -> HashMap<LockId, LockRecord> {
        (1..=n)
            .map(|i| {
                let id = LockId::new(i);
                (id, LockRecord::new(id, LockKind::Mutex, None))
            })
            .collect()
    }

    fn edge(records: &mut HashMap<LockId, LockRecord>, from: usize, to: usize) {
        add_edges(records, LockId::new(to), &[LockId::new(from)]);
    }

    #[test]
    fn test_direct_edge_reachability() {
        let mut t = table(2);
        edge(&mut t, 1, 2);

        assert!(path_exists(&t, LockId::new(1), LockId::new(2)));
        assert!(!path_exists(&t, LockId::new(2), LockId::new(1)));
    }

    #[test]
    fn test_transitive_reachability() {
        let mut t = table(4);
        edge(&mut t, 1, 2);
        edge(&mut t, 2, 3);
        edge(&mut t, 3, 4);

        assert!(path_exists(&t, LockId::new(1), LockId::new(4)));
        assert!(!path_exists(&t, LockId::new(4), LockId::new(1)));
    }

    #[test]
    fn test_self_path_requires_real_cycle() {
        let mut t = table(2);
        edge(&mut t, 1, 2);
        assert!(!path_exists(&t, LockId::new(1), LockId::new(1)));

        // Close the loop; now the lock is its own ancestor.
        edge(&mut t, 2, 1);
        assert!(path_exists(&t, LockId::new(1), LockId::new(1)));
    }

    #[test]
    fn test_unknown_target_is_unreachable() {
        let t = table(1);
        assert!(!path_exists(&t, LockId::new(1), LockId::new(99)));
    }

    #[test]
    fn test_closing_edges_ab_ba() {
        let mut t = table(2);
        // Some thread acquired 2 while holding 1.
        edge(&mut t, 1, 2);

        // Another thread holds 2 and is about to acquire 1.
        let closing = closing_edges(&t, LockId::new(1), &[LockId::new(2)]);
        assert_eq!(closing, vec![LockId::new(2)]);
    }

    #[test]
    fn test_closing_edges_clean_order() {
        let mut t = table(2);
        edge(&mut t, 1, 2);

        // Same order as before: nothing closes.
        let closing = closing_edges(&t, LockId::new(2), &[LockId::new(1)]);
        assert!(closing.is_empty());
    }

    #[test]
    fn test_closing_edges_skips_self() {
        let mut t = table(2);
        edge(&mut t, 1, 2);
        edge(&mut t, 2, 1);

        // Holding the lock being acquired is the error-checking mutex's
        // problem, not the graph's.
        let closing = closing_edges(&t, LockId::new(1), &[LockId::new(1)]);
        assert!(closing.is_empty());
    }

    #[test]
    fn test_three_lock_cycle() {
        let mut t = table(3);
        edge(&mut t, 1, 2);
        edge(&mut t, 2, 3);

        // Holding 3, acquiring 1: 1 -> 2 -> 3 already exists.
        let closing = closing_edges(&t, LockId::new(1), &[LockId::new(3)]);
        assert_eq!(closing, vec![LockId::new(3)]);
    }

    #[test]
    fn test_add_edges_dedup_and_self_skip() {
        let mut t = table(3);
        let to = LockId::new(3);

        let fresh = add_edges(&mut t, to, &[LockId::new(1), LockId::new(2)]);
        assert_eq!(fresh.len(), 2);

        // Re-adding the same pair is a no-op.
        let fresh = add_edges(&mut t, to, &[LockId::new(1)]);
        assert!(fresh.is_empty());

        // Self-edges never land.
        let fresh = add_edges(&mut t, to, &[to]);
        assert!(fresh.is_empty());
        assert!(!t[&to].before.contains(&to));
    }
}
