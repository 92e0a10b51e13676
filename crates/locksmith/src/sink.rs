//! Error Reporting
//!
//! Recoverable diagnostics go through a process-wide callback; when none
//! is installed, a default sink writes one line per diagnostic to a
//! target chosen by the `LOCKSMITH_LOG` environment variable:
//!
//! - `stderr` (the default)
//! - `stdout`
//! - `file://<path>` — append to the named file; falls back to stderr
//!   with a one-line notice when the file cannot be opened
//!
//! The callback pointer is guarded by its own lock, a leaf in the
//! tracker's internal ordering. The lock is not held while the callback
//! runs, but a callback may still be invoked while the registry lock is
//! held, so callbacks must not reenter Locksmith.

use std::fs::{File, OpenOptions};
use std::io::Write;

use parking_lot::Mutex;
use tracing::warn;

use locksmith_core::sink::clamp_message;
use locksmith_core::{DiagCode, ErrorCallback};

enum Target {
    Uninit,
    Stderr,
    Stdout,
    File(File),
}

/// The process-wide diagnostic sink.
pub struct ErrorSink {
    cb: Mutex<Option<ErrorCallback>>,
    target: Mutex<Target>,
}

impl ErrorSink {
    /// Create a sink with no callback and an unresolved default target.
    pub fn new() -> Self {
        Self {
            cb: Mutex::new(None),
            target: Mutex::new(Target::Uninit),
        }
    }

    /// Install or clear the error callback. Thread-safe.
    pub fn set_callback(&self, cb: Option<ErrorCallback>) {
        *self.cb.lock() = cb;
    }

    /// Report one diagnostic.
    ///
    /// The message is clamped to the contract's bound, mirrored as a
    /// `tracing` warning, and delivered to the installed callback or the
    /// default target. The callback lock is released before the callback
    /// itself runs.
    pub fn report(&self, code: DiagCode, msg: &str) {
        let msg = clamp_message(msg);
        warn!(target: "locksmith", code = code.errno_name(), "{msg}");

        let cb = *self.cb.lock();
        match cb {
            Some(cb) => cb(code.errno(), msg),
            None => self.write_default(code, msg),
        }
    }

    fn write_default(&self, code: DiagCode, msg: &str) {
        let mut target = self.target.lock();
        if matches!(*target, Target::Uninit) {
            *target = target_from_env();
        }
        let line = format!("LOCKSMITH {}: {msg}", code.errno_name());
        // A sink that cannot write has nowhere to complain to.
        let _ = match &mut *target {
            Target::Stderr | Target::Uninit => writeln!(std::io::stderr(), "{line}"),
            Target::Stdout => writeln!(std::io::stdout(), "{line}"),
            Target::File(f) => writeln!(f, "{line}"),
        };
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

fn target_from_env() -> Target {
    let Ok(spec) = std::env::var("LOCKSMITH_LOG") else {
        return Target::Stderr;
    };
    match spec.as_str() {
        "" | "stderr" => Target::Stderr,
        "stdout" => Target::Stdout,
        other => match other.strip_prefix("file://") {
            Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => Target::File(f),
                Err(err) => {
                    eprintln!(
                        "locksmith: unable to open '{path}': {err}; redirecting output to stderr"
                    );
                    Target::Stderr
                }
            },
            None => {
                eprintln!(
                    "locksmith: unable to understand log target '{other}'; \
                     redirecting output to stderr"
                );
                Target::Stderr
            }
        },
    }
}

/// Print a fatal condition and abort the process.
///
/// Used for the conditions [`DiagCode::is_fatal`] names: continuing
/// would silently disable tracking, which is worse than dying loudly.
pub fn fatal(code: DiagCode, msg: &str) -> ! {
    eprintln!("LOCKSMITH FATAL {}: {}", code.errno_name(), clamp_message(msg));
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    static RECORDED: StdMutex<Vec<(i32, String)>> = StdMutex::new(Vec::new());

    fn recording_cb(code: i32, msg: &str) {
        RECORDED.lock().unwrap().push((code, msg.to_string()));
    }

    #[test]
    fn test_callback_receives_errno_and_message() {
        let sink = ErrorSink::new();
        sink.set_callback(Some(recording_cb));
        sink.report(DiagCode::Inversion, "reversed order");

        // The recorder is shared across parallel tests; match by content.
        let recorded = RECORDED.lock().unwrap();
        assert!(recorded
            .iter()
            .any(|(code, msg)| *code == libc::EDEADLK && msg == "reversed order"));
    }

    #[test]
    fn test_callback_can_be_cleared() {
        let sink = ErrorSink::new();
        sink.set_callback(Some(recording_cb));
        sink.set_callback(None);
        // Falls through to the default target; just must not panic.
        sink.report(DiagCode::DoubleInit, "cleared");
    }

    #[test]
    fn test_long_messages_are_clamped() {
        let sink = ErrorSink::new();
        sink.set_callback(Some(recording_cb));
        let long = "y".repeat(2 * locksmith_core::MAX_DIAG_LEN);
        sink.report(DiagCode::DestroyInUse, &long);

        let recorded = RECORDED.lock().unwrap();
        let clamped = recorded
            .iter()
            .find(|(_, msg)| msg.starts_with('y'))
            .expect("clamped message recorded");
        assert_eq!(clamped.1.len(), locksmith_core::MAX_DIAG_LEN);
    }
}
