//! Mutex Type Upgrade Policy
//!
//! Error-checking mutexes turn self-deadlock into `EDEADLK` and
//! unlock-of-unowned into `EPERM`, which is exactly the signal the
//! tracker wants from the primitive underneath. Before a mutex is
//! initialized through the interposer, its requested type is promoted to
//! error-checking whenever the requested contract allows it.
//!
//! Compatible types are the ones that promise neither recursion nor any
//! behavior error-checking would break: `NORMAL`, `DEFAULT`, and (where
//! the platform has it) `ADAPTIVE`. The historical `TIMED` and `FAST`
//! names are aliases of `NORMAL`/`DEFAULT` on the platforms that still
//! spell them, so they are covered by the same comparison. Recursive and
//! already-error-checking types pass through untouched.

#![cfg(unix)]

use libc::c_int;

/// The type synthesized when the caller supplies no attribute set.
pub const SYNTHESIZED_TYPE: c_int = libc::PTHREAD_MUTEX_ERRORCHECK;

/// Can a mutex of the requested type be promoted to error-checking
/// without changing any promised behavior?
pub fn is_compatible(ty: c_int) -> bool {
    if ty == libc::PTHREAD_MUTEX_RECURSIVE || ty == libc::PTHREAD_MUTEX_ERRORCHECK {
        return false;
    }
    if ty == libc::PTHREAD_MUTEX_NORMAL || ty == libc::PTHREAD_MUTEX_DEFAULT {
        return true;
    }
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    if ty == libc::PTHREAD_MUTEX_ADAPTIVE_NP {
        return true;
    }
    false
}

/// The type to actually initialize the mutex with.
pub fn promote_type(ty: c_int) -> c_int {
    if is_compatible(ty) {
        libc::PTHREAD_MUTEX_ERRORCHECK
    } else {
        ty
    }
}
