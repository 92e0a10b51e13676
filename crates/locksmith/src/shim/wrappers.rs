//! Interposed pthread Entry Points
//!
//! One wrapper per primitive call, each following the same shape: hook,
//! real call, hook. The wrapper's return value is always the real
//! primitive's return value — the tracker is transparent to the caller.

use libc::{c_int, pthread_mutex_t, pthread_mutexattr_t};

use locksmith_core::{LockId, LockKind};

use crate::domain::upgrade;
use crate::tracker::Tracker;

use super::resolve::LazyFn;

// ============================================================================
// MUTEX OPERATIONS
// ============================================================================

type MutexInitFn =
    unsafe extern "C" fn(*mut pthread_mutex_t, *const pthread_mutexattr_t) -> c_int;
static REAL_MUTEX_INIT: LazyFn<MutexInitFn> = LazyFn::new();

/// Intercepts `pthread_mutex_init`, promoting the mutex type to
/// error-checking where the requested type allows it.
///
/// # Safety
///
/// `mutex` and `attr` must satisfy `pthread_mutex_init`'s contract.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_init(
    mutex: *mut pthread_mutex_t,
    attr: *const pthread_mutexattr_t,
) -> c_int {
    let real = REAL_MUTEX_INIT.get(b"pthread_mutex_init\0");
    if mutex.is_null() {
        return libc::EINVAL;
    }

    let code = if attr.is_null() {
        // No attribute set supplied: synthesize an error-checking one.
        let mut synth: pthread_mutexattr_t = std::mem::zeroed();
        libc::pthread_mutexattr_init(&mut synth);
        libc::pthread_mutexattr_settype(&mut synth, upgrade::SYNTHESIZED_TYPE);
        let code = real(mutex, &synth);
        libc::pthread_mutexattr_destroy(&mut synth);
        code
    } else {
        let mut ty: c_int = 0;
        libc::pthread_mutexattr_gettype(attr, &mut ty);
        let promoted = upgrade::promote_type(ty);
        if promoted == ty {
            real(mutex, attr)
        } else {
            // Attribute sets are plain storage: copy, retype, init.
            let mut upgraded = *attr;
            libc::pthread_mutexattr_settype(&mut upgraded, promoted);
            real(mutex, &upgraded)
        }
    };

    if code == 0 {
        Tracker::global().explicit_init(LockId::new(mutex as usize), LockKind::Mutex, None);
    }
    code
}

type MutexDestroyFn = unsafe extern "C" fn(*mut pthread_mutex_t) -> c_int;
static REAL_MUTEX_DESTROY: LazyFn<MutexDestroyFn> = LazyFn::new();

/// Intercepts `pthread_mutex_destroy`.
///
/// Destroy-while-held and destroy-of-unknown are reported through the
/// error callback; the real destroy runs either way and its code is
/// returned.
///
/// # Safety
///
/// `mutex` must satisfy `pthread_mutex_destroy`'s contract.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_destroy(mutex: *mut pthread_mutex_t) -> c_int {
    let real = REAL_MUTEX_DESTROY.get(b"pthread_mutex_destroy\0");
    Tracker::global().destroy(LockId::new(mutex as usize));
    real(mutex)
}

type MutexLockFn = unsafe extern "C" fn(*mut pthread_mutex_t) -> c_int;
static REAL_MUTEX_LOCK: LazyFn<MutexLockFn> = LazyFn::new();

/// Intercepts `pthread_mutex_lock`.
///
/// # Safety
///
/// `mutex` must be a valid, initialized mutex.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut pthread_mutex_t) -> c_int {
    let real = REAL_MUTEX_LOCK.get(b"pthread_mutex_lock\0");
    let id = LockId::new(mutex as usize);
    let tracker = Tracker::global();

    tracker.prelock(id, LockKind::Mutex);
    let code = real(mutex);
    tracker.postlock(id, LockKind::Mutex, code);
    code
}

type MutexTrylockFn = unsafe extern "C" fn(*mut pthread_mutex_t) -> c_int;
static REAL_MUTEX_TRYLOCK: LazyFn<MutexTrylockFn> = LazyFn::new();

/// Intercepts `pthread_mutex_trylock`. A `EBUSY` return adds no edges
/// and touches no held state.
///
/// # Safety
///
/// `mutex` must be a valid, initialized mutex.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_trylock(mutex: *mut pthread_mutex_t) -> c_int {
    let real = REAL_MUTEX_TRYLOCK.get(b"pthread_mutex_trylock\0");
    let id = LockId::new(mutex as usize);
    let tracker = Tracker::global();

    tracker.prelock(id, LockKind::Mutex);
    let code = real(mutex);
    tracker.postlock(id, LockKind::Mutex, code);
    code
}

#[cfg(target_os = "linux")]
type MutexTimedlockFn =
    unsafe extern "C" fn(*mut pthread_mutex_t, *const libc::timespec) -> c_int;
#[cfg(target_os = "linux")]
static REAL_MUTEX_TIMEDLOCK: LazyFn<MutexTimedlockFn> = LazyFn::new();

/// Intercepts `pthread_mutex_timedlock`. A timeout adds no edges.
///
/// # Safety
///
/// `mutex` and `abstime` must satisfy `pthread_mutex_timedlock`'s
/// contract.
#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_timedlock(
    mutex: *mut pthread_mutex_t,
    abstime: *const libc::timespec,
) -> c_int {
    let real = REAL_MUTEX_TIMEDLOCK.get(b"pthread_mutex_timedlock\0");
    let id = LockId::new(mutex as usize);
    let tracker = Tracker::global();

    tracker.prelock(id, LockKind::Mutex);
    let code = real(mutex, abstime);
    tracker.postlock(id, LockKind::Mutex, code);
    code
}

type MutexUnlockFn = unsafe extern "C" fn(*mut pthread_mutex_t) -> c_int;
static REAL_MUTEX_UNLOCK: LazyFn<MutexUnlockFn> = LazyFn::new();

/// Intercepts `pthread_mutex_unlock`.
///
/// Unlock-of-unowned is reported, but the real unlock still runs and
/// its code (EPERM for an error-checking mutex) is what the caller
/// sees. The held set only changes when the real unlock succeeds.
///
/// # Safety
///
/// `mutex` must be a valid, initialized mutex.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut pthread_mutex_t) -> c_int {
    let real = REAL_MUTEX_UNLOCK.get(b"pthread_mutex_unlock\0");
    let id = LockId::new(mutex as usize);
    let tracker = Tracker::global();

    tracker.preunlock(id);
    let code = real(mutex);
    if code == 0 {
        tracker.postunlock(id);
    }
    code
}

// ============================================================================
// SPINLOCK OPERATIONS (Linux only)
// ============================================================================

#[cfg(target_os = "linux")]
mod spin {
    use libc::{c_int, pthread_spinlock_t};

    use locksmith_core::{LockId, LockKind};

    use crate::shim::resolve::LazyFn;
    use crate::tracker::Tracker;

    type SpinInitFn = unsafe extern "C" fn(*mut pthread_spinlock_t, c_int) -> c_int;
    static REAL_SPIN_INIT: LazyFn<SpinInitFn> = LazyFn::new();

    /// Intercepts `pthread_spin_init`.
    ///
    /// # Safety
    ///
    /// `lock` must satisfy `pthread_spin_init`'s contract.
    #[no_mangle]
    pub unsafe extern "C" fn pthread_spin_init(
        lock: *mut pthread_spinlock_t,
        pshared: c_int,
    ) -> c_int {
        let real = REAL_SPIN_INIT.get(b"pthread_spin_init\0");
        let code = real(lock, pshared);
        if code == 0 {
            Tracker::global().explicit_init(LockId::new(lock as usize), LockKind::Spin, None);
        }
        code
    }

    type SpinDestroyFn = unsafe extern "C" fn(*mut pthread_spinlock_t) -> c_int;
    static REAL_SPIN_DESTROY: LazyFn<SpinDestroyFn> = LazyFn::new();

    /// Intercepts `pthread_spin_destroy`.
    ///
    /// # Safety
    ///
    /// `lock` must satisfy `pthread_spin_destroy`'s contract.
    #[no_mangle]
    pub unsafe extern "C" fn pthread_spin_destroy(lock: *mut pthread_spinlock_t) -> c_int {
        let real = REAL_SPIN_DESTROY.get(b"pthread_spin_destroy\0");
        Tracker::global().destroy(LockId::new(lock as usize));
        real(lock)
    }

    type SpinLockFn = unsafe extern "C" fn(*mut pthread_spinlock_t) -> c_int;
    static REAL_SPIN_LOCK: LazyFn<SpinLockFn> = LazyFn::new();

    /// Intercepts `pthread_spin_lock`.
    ///
    /// # Safety
    ///
    /// `lock` must be a valid, initialized spinlock.
    #[no_mangle]
    pub unsafe extern "C" fn pthread_spin_lock(lock: *mut pthread_spinlock_t) -> c_int {
        let real = REAL_SPIN_LOCK.get(b"pthread_spin_lock\0");
        let id = LockId::new(lock as usize);
        let tracker = Tracker::global();

        tracker.prelock(id, LockKind::Spin);
        let code = real(lock);
        tracker.postlock(id, LockKind::Spin, code);
        code
    }

    type SpinTrylockFn = unsafe extern "C" fn(*mut pthread_spinlock_t) -> c_int;
    static REAL_SPIN_TRYLOCK: LazyFn<SpinTrylockFn> = LazyFn::new();

    /// Intercepts `pthread_spin_trylock`.
    ///
    /// # Safety
    ///
    /// `lock` must be a valid, initialized spinlock.
    #[no_mangle]
    pub unsafe extern "C" fn pthread_spin_trylock(lock: *mut pthread_spinlock_t) -> c_int {
        let real = REAL_SPIN_TRYLOCK.get(b"pthread_spin_trylock\0");
        let id = LockId::new(lock as usize);
        let tracker = Tracker::global();

        tracker.prelock(id, LockKind::Spin);
        let code = real(lock);
        tracker.postlock(id, LockKind::Spin, code);
        code
    }

    type SpinUnlockFn = unsafe extern "C" fn(*mut pthread_spinlock_t) -> c_int;
    static REAL_SPIN_UNLOCK: LazyFn<SpinUnlockFn> = LazyFn::new();

    /// Intercepts `pthread_spin_unlock`.
    ///
    /// # Safety
    ///
    /// `lock` must be a valid spinlock held by the calling thread.
    #[no_mangle]
    pub unsafe extern "C" fn pthread_spin_unlock(lock: *mut pthread_spinlock_t) -> c_int {
        let real = REAL_SPIN_UNLOCK.get(b"pthread_spin_unlock\0");
        let id = LockId::new(lock as usize);
        let tracker = Tracker::global();

        tracker.preunlock(id);
        let code = real(lock);
        if code == 0 {
            tracker.postunlock(id);
        }
        code
    }
}
