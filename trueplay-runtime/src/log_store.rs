//! Ordered log of a script run

use chrono::Utc;
use std::cell::RefCell;
use std::rc::Rc;
use trueplay_types::{LogEntry, LogStatus};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LogEntry>,
    /// Never reset, so ids stay unique across clears
    seq: u64,
}

/// Append-only list of [`LogEntry`] values.
///
/// Cloning yields another handle to the same list; the runner, its console
/// sink and the `addLog` binding all write through such handles.
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    inner: Rc<RefCell<Inner>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry stamped with the current time
    pub fn append(&self, message: impl Into<String>, status: LogStatus) -> LogEntry {
        let message = message.into();
        let message = message.strip_prefix('\n').map(str::to_string).unwrap_or(message);
        let timestamp = Utc::now().timestamp_millis();

        let mut inner = self.inner.borrow_mut();
        inner.seq += 1;
        let entry = LogEntry::new(format!("{}-{}", timestamp, inner.seq), message, timestamp, status);
        inner.entries.push(entry.clone());
        entry
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.borrow().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_response(&self) -> bool {
        self.inner.borrow().entries.iter().any(LogEntry::is_response)
    }

    /// Whether an ERROR entry already mentions `text`
    pub fn error_mentions(&self, text: &str) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|entry| entry.is_error() && entry.message.contains(text))
    }
}
