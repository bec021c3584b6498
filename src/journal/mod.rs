//! Per-request processing journal.
//!
//! Every lifecycle transition of every pipeline component is recorded as a
//! structured [`JournalEntry`] tagged with the request id, then fanned out to the
//! attached sinks.
//!
//! ```text
//!   Pipeline::process(attributes)
//!           │
//!     Journal::record(entry)
//!           │
//!      ┌────┴─────┐
//!      ▼          ▼
//!  MemorySink  TracingSink
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for JournalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalLevel::Trace => write!(f, "TRACE"),
            JournalLevel::Debug => write!(f, "DEBUG"),
            JournalLevel::Info => write!(f, "INFO"),
            JournalLevel::Warn => write!(f, "WARN"),
            JournalLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Lifecycle transitions the pipeline records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    RequestStarted,
    Init,
    BeforeProcessing,
    AfterProcessing,
    Flush,
    RequestFinished,
    RequestFailed,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::RequestStarted => "request_started",
            LifecycleEvent::Init => "init",
            LifecycleEvent::BeforeProcessing => "before_processing",
            LifecycleEvent::AfterProcessing => "after_processing",
            LifecycleEvent::Flush => "flush",
            LifecycleEvent::RequestFinished => "request_finished",
            LifecycleEvent::RequestFailed => "request_failed",
        }
    }
}

/// One structured journal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub level: JournalLevel,
    /// Component name, or `pipeline` for request-level events.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<LifecycleEvent>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl JournalEntry {
    pub fn new(level: JournalLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            request_id: None,
            event: None,
            message: message.into(),
            payload: None,
        }
    }

    /// Entry for a lifecycle transition of `source` within a request.
    pub fn lifecycle(request_id: Uuid, source: impl Into<String>, event: LifecycleEvent) -> Self {
        let level = match event {
            LifecycleEvent::RequestFailed => JournalLevel::Warn,
            _ => JournalLevel::Debug,
        };
        let mut entry = Self::new(level, source, event.as_str());
        entry.request_id = Some(request_id);
        entry.event = Some(event);
        entry
    }

    pub fn with_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Single-line rendering.
    pub fn format_line(&self) -> String {
        let ts = self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let request = self
            .request_id
            .map(|id| format!(" [{id}]"))
            .unwrap_or_default();
        format!("{ts} {} {}{} {}", self.level, self.source, request, self.message)
    }
}

/// Destination for journal entries. Shared between requests, so `Send + Sync`.
pub trait JournalSink: Send + Sync {
    fn write(&self, entry: &JournalEntry);

    fn flush(&self) {}
}

/// Fan-out of journal entries to sinks, with a minimum level.
pub struct Journal {
    sinks: Vec<Arc<dyn JournalSink>>,
    min_level: JournalLevel,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            min_level: JournalLevel::Trace,
        }
    }

    pub fn with_level(mut self, level: JournalLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn JournalSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn JournalSink>) {
        self.sinks.push(sink);
    }

    pub fn record(&self, entry: &JournalEntry) {
        if entry.level < self.min_level {
            return;
        }
        for sink in &self.sinks {
            sink.write(entry);
        }
    }

    pub fn lifecycle(&self, request_id: Uuid, source: &str, event: LifecycleEvent) {
        self.record(&JournalEntry::lifecycle(request_id, source, event));
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Built-in Sinks ────────────────────────────────────────────────────────

/// Keeps entries in memory for inspection.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    /// Entries recorded for one request, in order.
    pub fn for_request(&self, request_id: Uuid) -> Vec<JournalEntry> {
        self.lock()
            .iter()
            .filter(|e| e.request_id == Some(request_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JournalSink for MemorySink {
    fn write(&self, entry: &JournalEntry) {
        self.lock().push(entry.clone());
    }
}

/// Forwards entries to `tracing` at the matching level.
pub struct TracingSink;

impl JournalSink for TracingSink {
    fn write(&self, entry: &JournalEntry) {
        let request_id = entry.request_id.map(|id| id.to_string()).unwrap_or_default();
        let source = entry.source.as_str();
        let message = entry.message.as_str();
        match entry.level {
            JournalLevel::Trace => tracing::trace!(source, request_id = %request_id, "{message}"),
            JournalLevel::Debug => tracing::debug!(source, request_id = %request_id, "{message}"),
            JournalLevel::Info => tracing::info!(source, request_id = %request_id, "{message}"),
            JournalLevel::Warn => tracing::warn!(source, request_id = %request_id, "{message}"),
            JournalLevel::Error => tracing::error!(source, request_id = %request_id, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifecycle_entry_carries_request_and_event() {
        let id = Uuid::new_v4();
        let entry = JournalEntry::lifecycle(id, "tokenizer", LifecycleEvent::Init);
        assert_eq!(entry.request_id, Some(id));
        assert_eq!(entry.event, Some(LifecycleEvent::Init));
        assert_eq!(entry.message, "init");
        assert_eq!(entry.level, JournalLevel::Debug);
    }

    #[test]
    fn failures_are_warnings() {
        let entry =
            JournalEntry::lifecycle(Uuid::new_v4(), "pipeline", LifecycleEvent::RequestFailed);
        assert_eq!(entry.level, JournalLevel::Warn);
    }

    #[test]
    fn format_line_includes_request() {
        let id = Uuid::new_v4();
        let entry = JournalEntry::new(JournalLevel::Info, "lingo", "12 clusters").with_request(id);
        let line = entry.format_line();
        assert!(line.contains("INFO"));
        assert!(line.contains("lingo"));
        assert!(line.contains(&id.to_string()));
    }

    #[test]
    fn entry_serializes() {
        let entry = JournalEntry::lifecycle(Uuid::new_v4(), "source", LifecycleEvent::Flush)
            .with_payload(json!({"documents": 4}));
        let text = serde_json::to_string(&entry).unwrap();
        assert!(text.contains("\"event\":\"flush\""));
        let back: JournalEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(back.payload.unwrap()["documents"], 4);
        assert_eq!(back.event, Some(LifecycleEvent::Flush));
    }

    #[test]
    fn journal_filters_by_level() {
        let sink = Arc::new(MemorySink::new());
        let journal = Journal::new()
            .with_level(JournalLevel::Info)
            .with_sink(sink.clone());

        journal.lifecycle(Uuid::new_v4(), "tokenizer", LifecycleEvent::Init);
        journal.record(&JournalEntry::new(JournalLevel::Warn, "lingo", "no labels"));

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].message, "no labels");
    }

    #[test]
    fn memory_sink_groups_by_request() {
        let sink = Arc::new(MemorySink::new());
        let journal = Journal::new().with_sink(sink.clone());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        journal.lifecycle(a, "pipeline", LifecycleEvent::RequestStarted);
        journal.lifecycle(b, "pipeline", LifecycleEvent::RequestStarted);
        journal.lifecycle(a, "pipeline", LifecycleEvent::RequestFinished);

        let entries = sink.for_request(a);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event, Some(LifecycleEvent::RequestFinished));
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn journal_fans_out_to_every_sink() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let mut journal = Journal::new();
        journal.add_sink(first.clone());
        journal.add_sink(second.clone());
        journal.add_sink(Arc::new(TracingSink));
        assert_eq!(journal.sink_count(), 3);

        journal.record(&JournalEntry::new(JournalLevel::Info, "pipeline", "ready"));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
