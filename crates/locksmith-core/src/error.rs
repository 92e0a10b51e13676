//! # Diagnostic Codes & errno Mapping
//!
//! Every condition Locksmith can report is identified by a [`DiagCode`].
//! Callers filter diagnostics by the canonical errno value each code maps
//! to, so the mapping here is part of the public contract: EDEADLK means
//! inversion, EPERM means unlock-of-unowned, and so on.
//!
//! The wrapper return values are a separate channel — they always carry
//! whatever the underlying primitive returned, never these codes.

use std::fmt;

/// The errno-style integer handed to the error callback.
pub type Errno = i32;

/// Diagnostic codes for conditions the tracker can report.
///
/// Recoverable codes are surfaced through the error callback and the
/// program keeps running; fatal codes abort the process, since continuing
/// would silently disable tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagCode {
    /// A prospective acquisition would close a cycle in the order graph.
    Inversion,
    /// Unlock called for a lock the calling thread does not hold.
    NotOwnedUnlock,
    /// Explicit init of an id that is already live.
    DoubleInit,
    /// Destroy while some thread still holds the lock.
    DestroyInUse,
    /// Destroy of an id the registry has never seen.
    DestroyUnknown,
    /// A thread exited while still holding tracked locks.
    ThreadExitWithHeld,
    /// Caller handed us an argument the tracker cannot use.
    BadArgument,
    /// Allocation failure inside the tracker. Fatal.
    AllocFailed,
    /// The real thread-library entry points could not be resolved. Fatal.
    LoaderFailed,
}

impl DiagCode {
    /// The canonical errno value for this code.
    pub fn errno(self) -> Errno {
        match self {
            Self::Inversion => libc::EDEADLK,
            Self::NotOwnedUnlock => libc::EPERM,
            Self::DoubleInit => libc::EINVAL,
            Self::DestroyInUse => libc::EBUSY,
            Self::DestroyUnknown => libc::ENOENT,
            Self::ThreadExitWithHeld => libc::EBUSY,
            Self::BadArgument => libc::EINVAL,
            Self::AllocFailed => libc::ENOMEM,
            Self::LoaderFailed => libc::EIO,
        }
    }

    /// The symbolic name of the errno value, for diagnostic text.
    pub fn errno_name(self) -> &'static str {
        match self {
            Self::Inversion => "EDEADLK",
            Self::NotOwnedUnlock => "EPERM",
            Self::DoubleInit | Self::BadArgument => "EINVAL",
            Self::DestroyInUse | Self::ThreadExitWithHeld => "EBUSY",
            Self::DestroyUnknown => "ENOENT",
            Self::AllocFailed => "ENOMEM",
            Self::LoaderFailed => "EIO",
        }
    }

    /// Short human-readable description.
    pub fn message(self) -> &'static str {
        match self {
            Self::Inversion => "lock inversion / potential deadlock",
            Self::NotOwnedUnlock => "unlock of a lock not held by this thread",
            Self::DoubleInit => "lock initialized twice",
            Self::DestroyInUse => "destroy of a lock that is still held",
            Self::DestroyUnknown => "destroy of an unknown lock",
            Self::ThreadExitWithHeld => "thread exited while holding locks",
            Self::BadArgument => "bad argument",
            Self::AllocFailed => "out of memory in the tracker",
            Self::LoaderFailed => "unable to resolve real thread primitives",
        }
    }

    /// Whether this condition aborts the process.
    ///
    /// A tracker that cannot allocate or cannot reach the real primitives
    /// cannot keep its promises, so those two conditions are not
    /// survivable.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::AllocFailed | Self::LoaderFailed)
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.errno_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_contract() {
        assert_eq!(DiagCode::Inversion.errno(), libc::EDEADLK);
        assert_eq!(DiagCode::NotOwnedUnlock.errno(), libc::EPERM);
        assert_eq!(DiagCode::DoubleInit.errno(), libc::EINVAL);
        assert_eq!(DiagCode::DestroyInUse.errno(), libc::EBUSY);
        assert_eq!(DiagCode::DestroyUnknown.errno(), libc::ENOENT);
        assert_eq!(DiagCode::AllocFailed.errno(), libc::ENOMEM);
    }

    #[test]
    fn fatal_codes() {
        assert!(DiagCode::AllocFailed.is_fatal());
        assert!(DiagCode::LoaderFailed.is_fatal());
        assert!(!DiagCode::Inversion.is_fatal());
        assert!(!DiagCode::DestroyInUse.is_fatal());
    }

    #[test]
    fn messages_non_empty() {
        for code in [
            DiagCode::Inversion,
            DiagCode::NotOwnedUnlock,
            DiagCode::DoubleInit,
            DiagCode::DestroyInUse,
            DiagCode::DestroyUnknown,
            DiagCode::ThreadExitWithHeld,
            DiagCode::BadArgument,
            DiagCode::AllocFailed,
            DiagCode::LoaderFailed,
        ] {
            assert!(!code.message().is_empty());
            assert!(!code.errno_name().is_empty());
        }
    }

    #[test]
    fn display_includes_errno_name() {
        let text = DiagCode::Inversion.to_string();
        assert!(text.contains("EDEADLK"));
    }
}
