//! Stream fault classification.
//!
//! Faults raised after streaming begins fall into a small set of known
//! transient classes (the renderer was aborted, the peer went away) that are
//! routine under load and must not page anyone. Everything else is an
//! application error and surfaces at normal severity.

use thiserror::Error;

/// Coded render fault classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// The renderer was aborted explicitly.
    Aborted,
    /// The abort-delay timer elapsed before the render completed.
    Timeout,
    /// The transport closed before the render completed.
    Cancel,
    /// The destination stream closed early; the renderer skipped the rest.
    Skip,
    /// Unrecognized fault - surfaced to the host error channel.
    Unknown,
}

impl StreamErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Aborted => "aborted",
            Self::Timeout => "timeout",
            Self::Cancel => "cancel",
            Self::Skip => "skip",
            Self::Unknown => "unknown",
        }
    }

    /// Transient faults are logged at reduced severity and never fatal to
    /// the process.
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A classified render fault.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StreamFault {
    pub kind: StreamErrorKind,
    pub message: String,
}

impl StreamFault {
    pub fn new(kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Renderer abort message with no reason attached.
const ABORTED_MESSAGE: &str = "The render was aborted by the server without a reason.";
/// Renderer noticed the destination went away mid-stream.
const CLOSED_EARLY_MESSAGE: &str = "The destination stream closed early.";

/// Classify a raw renderer fault message.
pub fn classify_fault(raw: &str) -> StreamFault {
    let message = raw.trim().trim_start_matches("Error: ");
    let message = if message.is_empty() { "Unknown." } else { message };

    let kind = match message {
        ABORTED_MESSAGE => StreamErrorKind::Aborted,
        CLOSED_EARLY_MESSAGE => StreamErrorKind::Skip,
        _ => StreamErrorKind::Unknown,
    };

    StreamFault::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_transient_messages() {
        let fault = classify_fault("The render was aborted by the server without a reason.");
        assert_eq!(fault.kind, StreamErrorKind::Aborted);
        assert!(fault.kind.is_transient());

        let fault = classify_fault("Error: The destination stream closed early.");
        assert_eq!(fault.kind, StreamErrorKind::Skip);
    }

    #[test]
    fn test_unknown_faults_keep_their_message() {
        let fault = classify_fault("loader blew up: database unreachable");
        assert_eq!(fault.kind, StreamErrorKind::Unknown);
        assert!(!fault.kind.is_transient());
        assert_eq!(fault.message, "loader blew up: database unreachable");
    }

    #[test]
    fn test_empty_message_defaults() {
        let fault = classify_fault("");
        assert_eq!(fault.kind, StreamErrorKind::Unknown);
        assert_eq!(fault.message, "Unknown.");
    }
}
