//! Execution trace recording and rendering.
//!
//! The recorder assigns each entry an opaque sequential id; parent linkage is
//! by id, so duplicate step names cannot corrupt the tree.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

/// Opaque handle to a trace entry.
pub type TraceId = u64;

/// Maximum tree depth rendered before a malformed parent link is assumed.
const MAX_RENDER_DEPTH: usize = 64;

/// Node kind of a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Step,
    Sequence,
    Parallel,
    Conditional,
    Retry,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraceKind::Step => "step",
            TraceKind::Sequence => "sequence",
            TraceKind::Parallel => "parallel",
            TraceKind::Conditional => "conditional",
            TraceKind::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Running,
    Success,
    Failed,
}

impl TraceStatus {
    fn glyph(&self) -> &'static str {
        match self {
            TraceStatus::Running => "⏳",
            TraceStatus::Success => "✓",
            TraceStatus::Failed => "✗",
        }
    }
}

/// One recorded execution node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub id: TraceId,
    pub name: String,
    pub kind: TraceKind,
    pub status: TraceStatus,
    pub parent: Option<TraceId>,
    /// Wall-clock start, epoch milliseconds.
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Status of a single retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryAttemptStatus {
    Success,
    Retrying,
    Failed,
    Error,
}

/// Record of one attempt inside a retry node, attached to its trace meta.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAttemptRecord {
    pub attempt: u32,
    pub status: RetryAttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time_seconds: Option<f64>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Append-only trace store. Usually accessed through [`TraceHandle`].
#[derive(Debug, Default)]
pub struct TraceRecorder {
    entries: Vec<TraceEntry>,
    next_id: TraceId,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new entry in `running` state and return its id.
    pub fn open(&mut self, name: &str, kind: TraceKind, parent: Option<TraceId>) -> TraceId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(TraceEntry {
            id,
            name: name.to_string(),
            kind,
            status: TraceStatus::Running,
            parent,
            started_at: chrono::Utc::now().timestamp_millis(),
            ended_at: None,
            duration_ms: 0,
            meta: None,
        });
        id
    }

    /// Close an entry with a terminal status, stamping duration.
    pub fn close(&mut self, id: TraceId, status: TraceStatus, meta: Option<Value>) {
        let now = chrono::Utc::now().timestamp_millis();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.status = status;
            entry.ended_at = Some(now);
            entry.duration_ms = now.saturating_sub(entry.started_at).max(0) as u64;
            if let Some(meta) = meta {
                entry.meta = Some(meta);
            }
        }
    }

    pub fn snapshot(&self) -> Vec<TraceEntry> {
        self.entries.clone()
    }

    /// Flow duration as seen by the trace: latest end minus earliest start.
    pub fn total_duration_ms(&self) -> u64 {
        let first = self.entries.iter().map(|e| e.started_at).min();
        let last = self.entries.iter().filter_map(|e| e.ended_at).max();
        match (first, last) {
            (Some(first), Some(last)) => last.saturating_sub(first).max(0) as u64,
            _ => 0,
        }
    }
}

/// Render entries as an indented tree.
pub fn render(entries: &[TraceEntry], total_duration_ms: u64) -> String {
    let mut lines = vec!["--- Step Execution Map ---".to_string()];
    render_level(entries, None, 0, &mut lines);
    lines.push(String::new());
    lines.push(format!("Total flow duration: {}ms", total_duration_ms));
    lines.push("-------------------------------".to_string());
    lines.join("\n")
}

fn render_level(entries: &[TraceEntry], parent: Option<TraceId>, depth: usize, lines: &mut Vec<String>) {
    if depth > MAX_RENDER_DEPTH {
        lines.push("  ... (trace tree too deep, truncated)".to_string());
        return;
    }
    for entry in entries.iter().filter(|e| e.parent == parent) {
        let indent = "  ".repeat(depth);
        let line = match entry.kind {
            TraceKind::Parallel => format!("{}|| parallel ({}ms)", indent, entry.duration_ms),
            TraceKind::Sequence => format!("{}>> sequence ({}ms)", indent, entry.duration_ms),
            TraceKind::Conditional => format!("{}?? conditional ({}ms)", indent, entry.duration_ms),
            TraceKind::Step | TraceKind::Retry => format!(
                "{}{} [{}] ({}) ({}ms)",
                indent,
                entry.name,
                entry.kind,
                entry.status.glyph(),
                entry.duration_ms
            ),
        };
        lines.push(line);
        render_level(entries, Some(entry.id), depth + 1, lines);
    }
}

/// Cloneable, lock-internal handle to a shared [`TraceRecorder`].
///
/// Parallel branches append to the same recorder concurrently.
#[derive(Debug, Clone, Default)]
pub struct TraceHandle(Arc<Mutex<TraceRecorder>>);

impl TraceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, name: &str, kind: TraceKind, parent: Option<TraceId>) -> TraceId {
        self.lock().open(name, kind, parent)
    }

    pub fn close(&self, id: TraceId, status: TraceStatus) {
        self.lock().close(id, status, None);
    }

    pub fn close_with_meta(&self, id: TraceId, status: TraceStatus, meta: Value) {
        self.lock().close(id, status, Some(meta));
    }

    pub fn snapshot(&self) -> Vec<TraceEntry> {
        self.lock().snapshot()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.lock().total_duration_ms()
    }

    pub fn render(&self) -> String {
        let recorder = self.lock();
        render(&recorder.entries, recorder.total_duration_ms())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TraceRecorder> {
        // A poisoned lock only means another branch panicked mid-append;
        // the entries themselves stay usable.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}
