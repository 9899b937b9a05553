//! Process-wide message queue (§4.6). This is the domain's ambient logging layer: every
//! user-visible condition is surfaced here before a fallible API returns, and callers can filter
//! or pop messages by severity.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use i24::U24;

/// Severity levels, ordered least to most severe per §4.6 (`NEVER` sorts lowest so that it can
/// serve as "never queue/print").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Never,
    Debug,
    Update,
    Note,
    Hint,
    Warning,
    Sorry,
    Failure,
    Fatal,
    Abort,
    All,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Never => "NEVER",
            Self::Debug => "DEBUG",
            Self::Update => "UPDATE",
            Self::Note => "NOTE",
            Self::Hint => "HINT",
            Self::Warning => "WARNING",
            Self::Sorry => "SORRY",
            Self::Failure => "FAILURE",
            Self::Fatal => "FATAL",
            Self::Abort => "ABORT",
            Self::All => "ALL",
        };
        f.write_str(s)
    }
}

/// A queued message. `code` is the opaque 24-bit error code the spec describes (§6); `U24` is
/// used verbatim for it since this is the literal "opaque 24-bit integer" contract.
#[derive(Debug, Clone)]
pub struct Message {
    pub code: U24,
    pub severity: Severity,
    pub priority: i32,
    pub os_errno: i32,
    pub text: String,
    pub drive_global_index: i32,
    /// Wall-clock time the message was submitted, the way the teacher's own CLI timestamps its
    /// session log (`chrono::Local::now()`); not part of spec.md's message fields, but every
    /// ambient logging layer in the corpus stamps its entries.
    pub timestamp: DateTime<Local>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.timestamp.format("%H:%M:%S%.3f"), self.severity, self.text)
    }
}

/// A drive-less sentinel for messages not associated with any particular drive.
pub const NO_DRIVE: i32 = -1;

/// The process-wide messenger. In this crate it lives inside [`crate::library::Library`] rather
/// than as a bare global, per the Design Notes' "explicitly-initialized Library context".
pub struct MessageQueue {
    queue: VecDeque<Message>,
    queue_min_severity: Severity,
    print_min_severity: Severity,
    print_prefix: String,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            queue_min_severity: Severity::Never,
            print_min_severity: Severity::Fatal,
            print_prefix: String::from("libburn"),
        }
    }

    pub fn set_severities(&mut self, queue_min: Severity, print_min: Severity) {
        self.queue_min_severity = queue_min;
        self.print_min_severity = print_min;
    }

    pub fn set_print_prefix(&mut self, prefix: impl Into<String>) {
        self.print_prefix = prefix.into();
    }

    /// Submits a message. Below `queue_min_severity` it is discarded entirely; at or above
    /// `print_min_severity` it is additionally printed to stderr.
    pub fn submit(
        &mut self,
        code: U24,
        severity: Severity,
        priority: i32,
        os_errno: i32,
        text: impl Into<String>,
        drive_global_index: i32,
    ) {
        let text = text.into();

        if severity >= self.print_min_severity {
            eprintln!("{}: [{}] {}", self.print_prefix, severity, text);
        }

        if severity < self.queue_min_severity {
            return;
        }

        self.queue.push_back(Message {
            code,
            severity,
            priority,
            os_errno,
            text,
            drive_global_index,
        });
    }

    /// Pops the oldest queued message at or above `min_sev`, discarding (not returning) anything
    /// older and less severe that it steps over.
    pub fn obtain(&mut self, min_sev: Severity) -> Option<Message> {
        while let Some(front) = self.queue.front() {
            if front.severity >= min_sev {
                return self.queue.pop_front();
            }
            self.queue.pop_front();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(v: u32) -> U24 {
        U24::try_from(v).unwrap()
    }

    #[test]
    fn below_queue_threshold_is_discarded() {
        let mut q = MessageQueue::new();
        q.set_severities(Severity::Warning, Severity::Abort);
        q.submit(code(1), Severity::Note, 0, 0, "ignored", NO_DRIVE);
        assert!(q.is_empty());
    }

    #[test]
    fn at_or_above_threshold_is_queued() {
        let mut q = MessageQueue::new();
        q.set_severities(Severity::Note, Severity::Abort);
        q.submit(code(1), Severity::Warning, 0, 0, "kept", NO_DRIVE);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn obtain_skips_and_discards_lower_severity() {
        let mut q = MessageQueue::new();
        q.set_severities(Severity::Debug, Severity::Abort);
        q.submit(code(1), Severity::Note, 0, 0, "low", NO_DRIVE);
        q.submit(code(2), Severity::Fatal, 0, 0, "high", NO_DRIVE);

        let msg = q.obtain(Severity::Fatal).unwrap();
        assert_eq!(msg.text, "high");
        assert!(q.is_empty());
    }

    #[test]
    fn severity_ordering_matches_spec() {
        assert!(Severity::Never < Severity::Debug);
        assert!(Severity::Fatal < Severity::Abort);
        assert!(Severity::Abort < Severity::All);
    }
}
