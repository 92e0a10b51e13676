//! Library-Native Lock Types
//!
//! Tracked locks usable without the interposer: a sleeping [`Mutex`] and
//! a busy-waiting [`SpinLock`], both C-style (explicit `lock`/`unlock`
//! returning errno-style results rather than guards). Host code and the
//! test suite drive the tracker through these.
//!
//! Both types are error-checking: locking a lock you already hold
//! returns `EDEADLK` instead of deadlocking, and unlocking a lock you do
//! not hold returns `EPERM`. `new()` is `const`, so a `static` lock
//! needs no explicit init call — the registry picks it up on first use.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::lock_api::{RawMutex as RawMutexApi, RawMutexTimed as _};

use locksmith_core::{Errno, LockId, LockKind};

use crate::tracker::Tracker;

/// Owner sentinel: no thread. Thread keys start at 1.
const UNOWNED: u64 = 0;

/// A tracked, error-checking sleeping lock.
///
/// # Example
///
/// ```rust
/// use locksmith::sync::Mutex;
///
/// static LOCK: Mutex = Mutex::new();
///
/// LOCK.lock().unwrap();
/// assert_eq!(LOCK.lock().unwrap_err(), libc::EDEADLK); // self-deadlock
/// LOCK.unlock().unwrap();
/// ```
pub struct Mutex {
    raw: parking_lot::RawMutex,
    owner: AtomicU64,
}

impl Mutex {
    /// A new, unlocked mutex. Usable as a static initializer; the
    /// registry registers it on first use.
    pub const fn new() -> Self {
        Self {
            raw: <parking_lot::RawMutex as RawMutexApi>::INIT,
            owner: AtomicU64::new(UNOWNED),
        }
    }

    /// Static initializer constant, for declaration-site init.
    #[allow(clippy::declare_interior_mutable_const)]
    pub const INIT: Mutex = Mutex::new();

    /// The opaque id this lock is tracked under.
    pub fn id(&self) -> LockId {
        LockId::of(self)
    }

    /// Explicitly register the lock. Double-init is reported through the
    /// error callback but does not fail.
    pub fn init(&self) -> Result<(), Errno> {
        code_to_result(Tracker::global().explicit_init(self.id(), LockKind::Mutex, None))
    }

    /// Explicitly register the lock under a diagnostic name.
    pub fn init_named(&self, name: &str) -> Result<(), Errno> {
        code_to_result(Tracker::global().explicit_init(self.id(), LockKind::Mutex, Some(name)))
    }

    /// Remove the lock from the registry.
    ///
    /// Returns `EBUSY` (and leaves the record) while any thread holds
    /// the lock. Destroying a never-used statically initialized lock is
    /// benign.
    pub fn destroy(&self) -> Result<(), Errno> {
        code_to_result(Tracker::global().destroy(self.id()))
    }

    /// Acquire the lock, blocking until available.
    ///
    /// Returns `EDEADLK` if the calling thread already holds it.
    pub fn lock(&self) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.prelock(id, LockKind::Mutex);
        if self.owner.load(Ordering::Acquire) == me {
            tracker.postlock(id, LockKind::Mutex, libc::EDEADLK);
            return Err(libc::EDEADLK);
        }
        self.raw.lock();
        self.owner.store(me, Ordering::Release);
        tracker.postlock(id, LockKind::Mutex, 0);
        Ok(())
    }

    /// Acquire the lock without blocking. Returns `EBUSY` when someone
    /// (including the caller) holds it.
    pub fn try_lock(&self) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.prelock(id, LockKind::Mutex);
        if self.raw.try_lock() {
            self.owner.store(me, Ordering::Release);
            tracker.postlock(id, LockKind::Mutex, 0);
            Ok(())
        } else {
            tracker.postlock(id, LockKind::Mutex, libc::EBUSY);
            Err(libc::EBUSY)
        }
    }

    /// Acquire the lock, giving up after `timeout`. Returns `ETIMEDOUT`
    /// on expiry, `EDEADLK` if the calling thread already holds it.
    pub fn lock_timeout(&self, timeout: Duration) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.prelock(id, LockKind::Mutex);
        if self.owner.load(Ordering::Acquire) == me {
            tracker.postlock(id, LockKind::Mutex, libc::EDEADLK);
            return Err(libc::EDEADLK);
        }
        if self.raw.try_lock_for(timeout) {
            self.owner.store(me, Ordering::Release);
            tracker.postlock(id, LockKind::Mutex, 0);
            Ok(())
        } else {
            tracker.postlock(id, LockKind::Mutex, libc::ETIMEDOUT);
            Err(libc::ETIMEDOUT)
        }
    }

    /// Release the lock. Returns `EPERM` (after the not-owned
    /// diagnostic) when the calling thread does not hold it.
    pub fn unlock(&self) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.preunlock(id);
        if self.owner.load(Ordering::Acquire) != me {
            return Err(libc::EPERM);
        }
        // Clear ownership before the raw release: the next owner may
        // store its key the instant the raw lock is free.
        self.owner.store(UNOWNED, Ordering::Release);
        // The owner check above proves the current thread holds `raw`.
        unsafe { self.raw.unlock() };
        tracker.postunlock(id);
        Ok(())
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        Tracker::global().forget(self.id());
    }
}

/// A tracked, error-checking busy-waiting lock.
///
/// Same contract as [`Mutex`], but contention spins instead of
/// sleeping. Unlike a raw pthread spinlock, self-lock returns `EDEADLK`
/// instead of spinning forever.
pub struct SpinLock {
    locked: AtomicBool,
    owner: AtomicU64,
}

impl SpinLock {
    /// A new, unlocked spinlock. Usable as a static initializer.
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            owner: AtomicU64::new(UNOWNED),
        }
    }

    /// Static initializer constant, for declaration-site init.
    #[allow(clippy::declare_interior_mutable_const)]
    pub const INIT: SpinLock = SpinLock::new();

    /// The opaque id this lock is tracked under.
    pub fn id(&self) -> LockId {
        LockId::of(self)
    }

    /// Explicitly register the lock. The `process_shared` flag is
    /// accepted for signature parity and ignored: the registry is
    /// per-process, so cross-process tracking is out of scope.
    pub fn init(&self, _process_shared: bool) -> Result<(), Errno> {
        code_to_result(Tracker::global().explicit_init(self.id(), LockKind::Spin, None))
    }

    /// Explicitly register the lock under a diagnostic name.
    pub fn init_named(&self, name: &str) -> Result<(), Errno> {
        code_to_result(Tracker::global().explicit_init(self.id(), LockKind::Spin, Some(name)))
    }

    /// Remove the lock from the registry; `EBUSY` while held.
    pub fn destroy(&self) -> Result<(), Errno> {
        code_to_result(Tracker::global().destroy(self.id()))
    }

    /// Acquire the lock, spinning until available. Returns `EDEADLK` if
    /// the calling thread already holds it.
    pub fn lock(&self) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.prelock(id, LockKind::Spin);
        if self.owner.load(Ordering::Acquire) == me {
            tracker.postlock(id, LockKind::Spin, libc::EDEADLK);
            return Err(libc::EDEADLK);
        }
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
        self.owner.store(me, Ordering::Release);
        tracker.postlock(id, LockKind::Spin, 0);
        Ok(())
    }

    /// Acquire the lock without spinning. Returns `EBUSY` when held.
    pub fn try_lock(&self) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.prelock(id, LockKind::Spin);
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.owner.store(me, Ordering::Release);
            tracker.postlock(id, LockKind::Spin, 0);
            Ok(())
        } else {
            tracker.postlock(id, LockKind::Spin, libc::EBUSY);
            Err(libc::EBUSY)
        }
    }

    /// Release the lock. Returns `EPERM` (after the not-owned
    /// diagnostic) when the calling thread does not hold it.
    pub fn unlock(&self) -> Result<(), Errno> {
        let tracker = Tracker::global();
        let id = self.id();
        let me = tracker.current_thread().as_u64();

        tracker.preunlock(id);
        if self.owner.load(Ordering::Acquire) != me {
            return Err(libc::EPERM);
        }
        self.owner.store(UNOWNED, Ordering::Release);
        self.locked.store(false, Ordering::Release);
        tracker.postunlock(id);
        Ok(())
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SpinLock {
    fn drop(&mut self) {
        Tracker::global().forget(self.id());
    }
}

fn code_to_result(code: Errno) -> Result<(), Errno> {
    if code == 0 {
        Ok(())
    } else {
        Err(code)
    }
}
