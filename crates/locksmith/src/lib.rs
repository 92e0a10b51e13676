//! # Locksmith
//!
//! Runtime lock-ordering checker for native-threads programs. Locksmith
//! watches every lock acquisition and builds a per-process directed
//! graph whose nodes are locks and whose edges record the
//! held-while-acquiring relation. An acquisition that would close a
//! cycle in that graph is diagnosed as a potential deadlock (an AB-BA
//! inversion) *before* the real acquisition — which still proceeds, so
//! program semantics never change. Where the requested mutex type
//! permits, mutexes are upgraded to error-checking so self-deadlock and
//! unlock-of-unowned surface as error codes instead of hangs.
//!
//! # Two Ways In
//!
//! - **Interposition** (feature `interpose`, unix): build as a `cdylib`
//!   and preload it; the exported pthread wrappers route every mutex and
//!   spinlock call through the tracker.
//! - **Library-native locks** ([`sync::Mutex`], [`sync::SpinLock`]):
//!   tracked, error-checking lock types for host code and tests, no
//!   loader tricks required.
//!
//! # Example
//!
//! ```rust
//! use locksmith::sync::Mutex;
//!
//! fn diag(code: i32, msg: &str) {
//!     eprintln!("locksmith diagnostic {code}: {msg}");
//! }
//!
//! static A: Mutex = Mutex::new();
//! static B: Mutex = Mutex::new();
//!
//! locksmith::set_error_cb(Some(diag));
//!
//! // Establish the order A -> B.
//! A.lock().unwrap();
//! B.lock().unwrap();
//! B.unlock().unwrap();
//! A.unlock().unwrap();
//!
//! // Acquiring A while holding B now reports EDEADLK through `diag`
//! // (and still succeeds).
//! B.lock().unwrap();
//! A.lock().unwrap();
//! A.unlock().unwrap();
//! B.unlock().unwrap();
//! ```
//!
//! # Environment
//!
//! - `LOCKSMITH_LOG`: default diagnostic target when no callback is
//!   installed — `stderr` (default), `stdout`, or `file://<path>`.
//! - `LOCKSMITH_OBSERVE_FILE`: append every new ordering edge to the
//!   named file as JSON lines, for offline analysis.
//!
//! # Scope
//!
//! Condition variables, read-write locks, barriers, and thread
//! cancellation are out of scope. The graph never forgets an edge, so a
//! transient inversion leaves permanent evidence.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
mod observe;
pub mod sink;
pub mod sync;
pub mod tracker;

#[cfg(all(feature = "interpose", unix))]
pub mod shim;

// Re-export the shared foundation types at the crate root.
pub use locksmith_core::{DiagCode, Errno, ErrorCallback, LockId, LockKind, ThreadKey};

pub use domain::LockSnapshot;
pub use tracker::Tracker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install or clear the process-wide error callback. Thread-safe.
///
/// The callback receives the canonical errno value for the condition
/// (EDEADLK for inversions, EPERM for unlock-of-unowned, ...) and a
/// bounded message. It may run while tracker-internal locks are held,
/// so it must not call back into Locksmith.
pub fn set_error_cb(cb: Option<ErrorCallback>) {
    Tracker::global().set_error_cb(cb);
}

/// Attach a diagnostic name to the calling thread.
pub fn set_thread_name(name: &str) {
    Tracker::global().set_thread_name(name);
}

/// The packed API version: major in the upper 16 bits, minor in the
/// lower 16.
pub fn version() -> u32 {
    locksmith_core::API_VERSION
}

/// The API version as a `major.minor` string.
pub fn version_string() -> String {
    locksmith_core::version_string(version())
}
