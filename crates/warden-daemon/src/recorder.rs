use std::collections::BTreeMap;

use serde_json::Value;
use warden_core::activity::{ActivityLog, EntryKind};

/// Outward event sink. The orchestrator writes entries and never reads
/// them back, so the trait is fire-and-forget.
pub trait Recorder: Send + Sync {
    fn record(
        &self,
        kind: EntryKind,
        message: &str,
        details: BTreeMap<String, Value>,
        correlation: Option<String>,
    );
}

impl Recorder for ActivityLog {
    fn record(
        &self,
        kind: EntryKind,
        message: &str,
        details: BTreeMap<String, Value>,
        correlation: Option<String>,
    ) {
        ActivityLog::record(self, kind, message, details, correlation);
    }
}
