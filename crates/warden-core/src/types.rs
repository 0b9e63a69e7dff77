use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// GateState
// ---------------------------------------------------------------------------

/// Position of the gate as tracked by the orchestrator.
///
/// `Opening` and `Closing` are transient markers covering an in-flight
/// actuator call; they resolve to `Open`/`Closed` on success and fall back
/// to `Unknown` on failure. `Unknown` is the boot state until the first
/// status probe answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Closed,
    Opening,
    Open,
    Closing,
    Unknown,
}

impl GateState {
    pub fn as_str(self) -> &'static str {
        match self {
            GateState::Closed => "closed",
            GateState::Opening => "opening",
            GateState::Open => "open",
            GateState::Closing => "closing",
            GateState::Unknown => "unknown",
        }
    }

    /// True while an actuator call is in flight for this state.
    pub fn is_transient(self) -> bool {
        matches!(self, GateState::Opening | GateState::Closing)
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TriggerReason
// ---------------------------------------------------------------------------

/// Why a gate command was issued. Rendered into activity entries and
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    Manual,
    Token(String),
    AutoClose,
    External(String),
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Manual => f.write_str("manual"),
            TriggerReason::Token(name) => write!(f, "token:{name}"),
            TriggerReason::AutoClose => f.write_str("auto-close"),
            TriggerReason::External(source) => write!(f, "external:{source}"),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectionEvent
// ---------------------------------------------------------------------------

/// A single token sighting reported by a detection source.
///
/// Ephemeral: consumed once by the orchestrator, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    /// Token identifier as reported by the source (matched case-insensitively).
    pub token_id: String,
    /// Which source produced the sighting (e.g. "ble", "bcg04").
    pub source_id: String,
    /// Signal strength in dBm, when the source measures it.
    pub rssi: Option<i16>,
    /// Estimated distance in meters, when the source estimates it.
    pub distance_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn new(token_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        DetectionEvent {
            token_id: token_id.into(),
            source_id: source_id.into(),
            rssi: None,
            distance_m: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_signal(mut self, rssi: i16, distance_m: Option<f64>) -> Self {
        self.rssi = Some(rssi);
        self.distance_m = distance_m;
        self
    }
}

// ---------------------------------------------------------------------------
// TokenInfo
// ---------------------------------------------------------------------------

/// Registry view of a registered token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    pub name: String,
    /// Paused tokens (`active == false`) are observed and logged but never
    /// actuate the gate.
    pub active: bool,
}

// ---------------------------------------------------------------------------
// GateSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the orchestrator state for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct GateSnapshot {
    pub state: GateState,
    pub session_active: bool,
    /// Seconds until the debounce session expires, when one is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_open_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
