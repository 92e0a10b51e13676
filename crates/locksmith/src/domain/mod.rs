//! Domain Layer — The Tracking Engine
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Domain Layer                         │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  Registry Module                Thread Module            │
//! │  ├─ LockRegistry                ├─ ThreadLedger (TLS)    │
//! │  ├─ LockRecord + before-set     └─ ThreadTable (DashMap) │
//! │  └─ admission / commit ops                               │
//! │                                                          │
//! │  Graph Module (inside the registry lock)                 │
//! │  ├─ path_exists: DFS over before-sets                    │
//! │  └─ closing_edges / add_edges                            │
//! │                                                          │
//! │  Upgrade Module                                          │
//! │  └─ mutex type promotion policy (interposer path)        │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry owns every [`LockRecord`] and the order graph embedded in
//! their before-sets, all behind one `parking_lot::Mutex`. Thread held
//! state lives outside that lock entirely — each thread's ledger is
//! thread-local and lock-free to its owner. The hook layer in
//! [`crate::tracker`] is the only coordinator between the two.

pub mod graph;
pub mod registry;
pub mod thread;
pub mod types;

#[cfg(unix)]
pub mod upgrade;

// Re-exports
pub use registry::{Inversion, LockRegistry, LockSnapshot};
pub use thread::{ThreadLedger, ThreadMeta, ThreadTable};
pub use types::{HeldEntry, InitOutcome, LockRecord, TrackError};
