//! Error-Sink Contract
//!
//! The tracker reports recoverable conditions through a process-wide
//! callback. This module defines the callback's shape; the store that
//! holds the installed callback lives in the engine crate.
//!
//! # Reentrancy
//!
//! The callback may run while the tracker's internal registry lock is
//! held, so a callback must not call back into Locksmith — not even
//! `set_error_cb`. Taking an untracked lock or writing to a stream is
//! fine.

use crate::error::Errno;

/// An installed error-reporting callback.
///
/// Receives the canonical errno value for the condition (see
/// [`DiagCode::errno`](crate::error::DiagCode::errno)) and a bounded,
/// formatted message.
pub type ErrorCallback = fn(code: Errno, msg: &str);

/// Upper bound on the length of a formatted diagnostic message, in bytes.
///
/// Messages longer than this are truncated at a character boundary before
/// the callback is invoked.
pub const MAX_DIAG_LEN: usize = 512;

/// Truncate a diagnostic message to [`MAX_DIAG_LEN`] bytes, respecting
/// UTF-8 boundaries.
pub fn clamp_message(msg: &str) -> &str {
    if msg.len() <= MAX_DIAG_LEN {
        return msg;
    }
    let mut end = MAX_DIAG_LEN;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    &msg[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through() {
        assert_eq!(clamp_message("hello"), "hello");
    }

    #[test]
    fn long_messages_truncate() {
        let long = "x".repeat(MAX_DIAG_LEN + 100);
        assert_eq!(clamp_message(&long).len(), MAX_DIAG_LEN);
    }

    #[test]
    fn truncation_respects_utf8() {
        // Fill right up to the boundary, then place a multi-byte char
        // straddling it.
        let mut s = "a".repeat(MAX_DIAG_LEN - 1);
        s.push('é'); // 2 bytes, crosses MAX_DIAG_LEN
        s.push_str("tail");
        let clamped = clamp_message(&s);
        assert!(clamped.len() <= MAX_DIAG_LEN);
        assert!(clamped.is_char_boundary(clamped.len()));
    }
}
