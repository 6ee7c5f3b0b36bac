use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Kind of a terminal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Info,
    Command,
    Response,
    Error,
    Status,
}

/// One immutable line of the operator terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalEntry {
    pub id: Uuid,
    pub at: DateTime<Local>,
    pub text: String,
    pub kind: EntryKind,
}

impl TerminalEntry {
    pub fn new(kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Local::now(),
            text: text.into(),
            kind,
        }
    }

    /// Render as `[HH:MM:SS] KIND text`
    pub fn render(&self) -> String {
        format!("[{}] {:<8} {}", self.at.format("%H:%M:%S"), self.kind, self.text)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Info => f.pad("INFO"),
            EntryKind::Command => f.pad("COMMAND"),
            EntryKind::Response => f.pad("RESPONSE"),
            EntryKind::Error => f.pad("ERROR"),
            EntryKind::Status => f.pad("STATUS"),
        }
    }
}

#[derive(Debug)]
struct TerminalBuffer {
    entries: VecDeque<TerminalEntry>,
    capacity: usize,
}

/// Bounded, ordered store of terminal entries.
///
/// Cloning yields another handle onto the same buffer. Readers get
/// owned snapshots, so a display layer never observes a half-applied
/// insertion.
#[derive(Debug, Clone)]
pub struct TerminalLog {
    inner: Arc<RwLock<TerminalBuffer>>,
}

impl TerminalLog {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(TerminalBuffer {
                entries: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Append an entry, evicting the oldest ones past capacity
    pub async fn push(&self, kind: EntryKind, text: impl Into<String>) -> TerminalEntry {
        let entry = TerminalEntry::new(kind, text);
        let mut buffer = self.inner.write().await;
        buffer.entries.push_back(entry.clone());
        while buffer.entries.len() > buffer.capacity {
            buffer.entries.pop_front();
        }
        debug!("terminal {}: {}", entry.kind, entry.text);
        entry
    }

    pub async fn info(&self, text: impl Into<String>) -> TerminalEntry {
        self.push(EntryKind::Info, text).await
    }

    pub async fn error(&self, text: impl Into<String>) -> TerminalEntry {
        self.push(EntryKind::Error, text).await
    }

    pub async fn snapshot(&self) -> Vec<TerminalEntry> {
        let buffer = self.inner.read().await;
        buffer.entries.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn capacity(&self) -> usize {
        self.inner.read().await.capacity
    }

    /// Entries appended after the one with `id`, or everything if `id` was evicted
    pub async fn entries_after(&self, id: Option<Uuid>) -> Vec<TerminalEntry> {
        let buffer = self.inner.read().await;
        let start = id
            .and_then(|id| buffer.entries.iter().position(|e| e.id == id))
            .map(|pos| pos + 1)
            .unwrap_or(0);
        buffer.entries.iter().skip(start).cloned().collect()
    }

    /// Drop every entry and leave a single note saying so
    pub async fn clear(&self) {
        {
            let mut buffer = self.inner.write().await;
            buffer.entries.clear();
        }
        self.info("Terminal cleared").await;
    }

    /// Plain-text rendering, one line per entry
    pub async fn export_text(&self) -> String {
        let buffer = self.inner.read().await;
        let mut out = String::new();
        for entry in &buffer.entries {
            out.push_str(&entry.render());
            out.push('\n');
        }
        out
    }
}

impl Default for TerminalLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_push_and_snapshot_order() {
        let log = TerminalLog::new(10);
        log.info("first").await;
        log.push(EntryKind::Command, "> STATUS").await;
        log.push(EntryKind::Response, "OK").await;

        let entries = log.snapshot().await;
        let texts: Vec<_> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "> STATUS", "OK"]);
        assert_eq!(entries[1].kind, EntryKind::Command);
    }

    #[tokio::test]
    async fn test_eviction_keeps_newest() {
        let log = TerminalLog::new(3);
        for i in 0..5 {
            log.info(format!("line {}", i)).await;
        }

        let texts: Vec<_> = log.snapshot().await.into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
    }

    #[tokio::test]
    async fn test_clear_leaves_note() {
        let log = TerminalLog::new(10);
        log.info("a").await;
        log.error("b").await;
        log.clear().await;

        let entries = log.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Terminal cleared");
        assert_eq!(entries[0].kind, EntryKind::Info);
    }

    #[tokio::test]
    async fn test_entries_after() {
        let log = TerminalLog::new(10);
        let first = log.info("a").await;
        log.info("b").await;
        log.info("c").await;

        let tail: Vec<_> = log.entries_after(Some(first.id)).await.into_iter().map(|e| e.text).collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert_eq!(log.entries_after(None).await.len(), 3);
    }

    #[tokio::test]
    async fn test_export_text() {
        let log = TerminalLog::new(10);
        log.push(EntryKind::Command, "> AT+PING").await;
        log.push(EntryKind::Response, "PONG").await;

        let text = log.export_text().await;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("COMMAND"));
        assert!(lines[0].ends_with("> AT+PING"));
        assert!(lines[1].starts_with('['));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_fifo_eviction(count in 0usize..2500) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let log = TerminalLog::default();
                for i in 0..count {
                    log.push(EntryKind::Response, i.to_string()).await;
                }
                let entries = log.snapshot().await;
                prop_assert!(entries.len() <= 1000);
                let expected: Vec<String> = (count.saturating_sub(1000)..count).map(|i| i.to_string()).collect();
                let actual: Vec<String> = entries.into_iter().map(|e| e.text).collect();
                prop_assert_eq!(actual, expected);
                Ok(())
            })?;
        }
    }
}
