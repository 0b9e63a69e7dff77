use crate::error::Result;
use crate::io::atomic_write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// How many tail entries a coalescing lookup will scan before giving up.
/// Keeps `record` O(1)-ish on large logs.
const COALESCE_SCAN: usize = 32;

// ---------------------------------------------------------------------------
// EntryKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    GateOpened,
    GateClosed,
    TokenDetected,
    TokenRegistered,
    TokenUnregistered,
    Error,
    Info,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::GateOpened => "gate_opened",
            EntryKind::GateClosed => "gate_closed",
            EntryKind::TokenDetected => "token_detected",
            EntryKind::TokenRegistered => "token_registered",
            EntryKind::TokenUnregistered => "token_unregistered",
            EntryKind::Error => "error",
            EntryKind::Info => "info",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = crate::error::WardenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "gate_opened" => Ok(EntryKind::GateOpened),
            "gate_closed" => Ok(EntryKind::GateClosed),
            "token_detected" => Ok(EntryKind::TokenDetected),
            "token_registered" => Ok(EntryKind::TokenRegistered),
            "token_unregistered" => Ok(EntryKind::TokenUnregistered),
            "error" => Ok(EntryKind::Error),
            "info" => Ok(EntryKind::Info),
            _ => Err(crate::error::WardenError::InvalidConfig(format!(
                "unknown activity kind: {s}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActivityEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
    /// Coalescing key. Detection entries carry the token id so repeated
    /// sightings fold together; transition entries carry a unique key so
    /// they never do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
    /// How many times this entry was updated in place.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub updates: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

// ---------------------------------------------------------------------------
// RecordingMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordingMode {
    /// Every `record` call appends a new entry.
    Append,
    /// A `record` whose correlation key matches an entry newer than
    /// `window` updates that entry in place instead of appending.
    Coalesce { window: Duration },
}

// ---------------------------------------------------------------------------
// ActivityLog
// ---------------------------------------------------------------------------

/// Bounded, optionally file-backed event sink.
///
/// The orchestrator writes entries and never reads them back; the CLI and
/// dashboard read them most-recent-first. File persistence is best-effort:
/// a failed write is logged and the in-memory log stays authoritative.
pub struct ActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
    path: Option<PathBuf>,
    max_entries: usize,
    mode: RecordingMode,
}

impl ActivityLog {
    /// A log that lives only in memory. Used by tests and by one-shot CLI
    /// commands that don't want to touch the activity file.
    pub fn in_memory(max_entries: usize, mode: RecordingMode) -> Self {
        ActivityLog {
            entries: Mutex::new(Vec::new()),
            path: None,
            max_entries,
            mode,
        }
    }

    /// Open (or create) a file-backed log, loading any existing entries and
    /// keeping only the `max_entries` most recent.
    pub fn open(path: PathBuf, max_entries: usize, mode: RecordingMode) -> Result<Self> {
        let mut entries: Vec<ActivityEntry> = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "unreadable activity log, starting fresh");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        if entries.len() > max_entries {
            entries.drain(..entries.len() - max_entries);
        }
        Ok(ActivityLog {
            entries: Mutex::new(entries),
            path: Some(path),
            max_entries,
            mode,
        })
    }

    pub fn record(
        &self,
        kind: EntryKind,
        message: impl Into<String>,
        details: BTreeMap<String, Value>,
        correlation: Option<String>,
    ) {
        let now = Utc::now();
        let message = message.into();
        let mut entries = self.lock();

        if let RecordingMode::Coalesce { window } = self.mode {
            if let Some(key) = correlation.as_deref() {
                if let Some(existing) = Self::recent_match(&mut entries, key, now, window) {
                    existing.timestamp = now;
                    existing.message = message;
                    existing.details = details;
                    existing.updates += 1;
                    self.persist(&entries);
                    return;
                }
            }
        }

        entries.push(ActivityEntry {
            timestamp: now,
            kind,
            message,
            details,
            correlation,
            updates: 0,
        });
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        self.persist(&entries);
    }

    /// Entries most-recent-first, optionally filtered by kind and limited.
    pub fn entries(&self, limit: Option<usize>, kind: Option<EntryKind>) -> Vec<ActivityEntry> {
        let entries = self.lock();
        let iter = entries
            .iter()
            .rev()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .cloned();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.persist(&entries);
    }

    fn recent_match<'a>(
        entries: &'a mut [ActivityEntry],
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Option<&'a mut ActivityEntry> {
        let len = entries.len();
        entries
            .iter_mut()
            .rev()
            .take(COALESCE_SCAN.min(len))
            .find(|e| {
                e.correlation.as_deref() == Some(key)
                    && now
                        .signed_duration_since(e.timestamp)
                        .to_std()
                        .is_ok_and(|age| age <= window)
            })
    }

    fn persist(&self, entries: &[ActivityEntry]) {
        let Some(path) = &self.path else {
            return;
        };
        match serde_json::to_vec_pretty(entries) {
            Ok(data) => {
                if let Err(e) = atomic_write(path, &data) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write activity log");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize activity log"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ActivityEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Signal quality
// ---------------------------------------------------------------------------

/// Human-readable bucket for an RSSI reading, used in detection details.
pub fn signal_quality(rssi: i16) -> &'static str {
    if rssi >= -60 {
        "excellent"
    } else if rssi >= -70 {
        "good"
    } else if rssi >= -80 {
        "fair"
    } else if rssi >= -90 {
        "weak"
    } else {
        "very weak"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
