use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// DevicePosition
// ---------------------------------------------------------------------------

/// Gate position as reported by the director's item variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePosition {
    Open,
    Closed,
    Unknown,
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DevicePosition::Open => "open",
            DevicePosition::Closed => "closed",
            DevicePosition::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Director wire types
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/items/<id>/commands`.
#[derive(Debug, Serialize)]
pub struct CommandRequest {
    #[serde(rename = "async")]
    pub run_async: bool,
    pub command: String,
    #[serde(rename = "tParams")]
    pub params: BTreeMap<String, Value>,
}

impl CommandRequest {
    pub fn run_scenario(scenario: u32) -> Self {
        let mut params = BTreeMap::new();
        params.insert("Scenario".to_string(), Value::from(scenario));
        CommandRequest {
            run_async: false,
            command: "Run Scenario".to_string(),
            params,
        }
    }

    pub fn send_push(title: &str, message: &str) -> Self {
        let mut params = BTreeMap::new();
        params.insert("Title".to_string(), Value::from(title));
        params.insert("Message".to_string(), Value::from(message));
        CommandRequest {
            run_async: true,
            command: "Send Push Notification".to_string(),
            params,
        }
    }
}

/// Response of `GET /api/v1/items/<id>` — only the fields the client reads.
#[derive(Debug, Deserialize)]
pub struct ItemInfo {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
}

impl ItemInfo {
    /// Derive the gate position from the `IsOpen` item variable. Anything
    /// the driver doesn't export stays `Unknown`.
    pub fn position(&self) -> DevicePosition {
        match self.variables.get("IsOpen").and_then(Value::as_bool) {
            Some(true) => DevicePosition::Open,
            Some(false) => DevicePosition::Closed,
            None => DevicePosition::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Cloud auth wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AccountTokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AccountTokenResponse {
    pub account_token: String,
}

#[derive(Debug, Deserialize)]
pub struct DirectorTokenResponse {
    pub token: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
