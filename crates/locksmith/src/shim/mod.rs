//! Pthread Interposition Layer
//!
//! Exports wrappers with the host ABI signatures for the pthread mutex
//! and spinlock calls. Built as part of a `cdylib` and loaded ahead of
//! the thread library (`LD_PRELOAD=liblocksmith.so ./program`), the
//! wrappers observe every acquisition, then forward to the real entry
//! points resolved from the next object in the lookup chain.
//!
//! The "next symbol" lookup in [`resolve`] is the single
//! platform-specific seam. Everything else routes through the same
//! [`Tracker`](crate::tracker::Tracker) hooks the library-native API
//! uses.
//!
//! The tracker's own synchronization is `parking_lot` throughout, which
//! never calls into the pthread entry points wrapped here, so a wrapper
//! cannot reenter itself through the tracker.
//!
//! Condition variables, read-write locks, and barriers are not wrapped;
//! their ordering semantics are unsupported rather than guessed at.

#![cfg(all(feature = "interpose", unix))]

pub(crate) mod resolve;
mod wrappers;
