use crate::error::Result;
use crate::io::atomic_write;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Connection settings for the Control4 controller that physically operates
/// the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Director host (LAN IP or hostname of the controller).
    #[serde(default)]
    pub host: String,
    /// Control4 account username. May be absent in token-only mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Control4 account password. May be absent in token-only mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_device_id")]
    pub gate_device_id: u32,
    #[serde(default = "default_open_scenario")]
    pub open_scenario: u32,
    #[serde(default = "default_close_scenario")]
    pub close_scenario: u32,
    #[serde(default = "default_notification_agent")]
    pub notification_agent_id: u32,
}

fn default_device_id() -> u32 {
    348
}

fn default_open_scenario() -> u32 {
    21
}

fn default_close_scenario() -> u32 {
    22
}

fn default_notification_agent() -> u32 {
    7
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: None,
            password: None,
            gate_device_id: default_device_id(),
            open_scenario: default_open_scenario(),
            close_scenario: default_close_scenario(),
            notification_agent_id: default_notification_agent(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

/// Timing knobs for the orchestrator.
///
/// `auto_close_timeout_secs` must be strictly less than
/// `session_timeout_secs` so the gate fully closes before the debounce
/// session would permit a reopen; `validate()` rejects configs that break
/// this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_auto_close")]
    pub auto_close_timeout_secs: u64,
    #[serde(default = "default_session")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_status_poll")]
    pub status_poll_interval_secs: u64,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Upper bound on any single actuator/status call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_auto_close() -> u64 {
    120
}

fn default_session() -> u64 {
    180
}

fn default_status_poll() -> u64 {
    30
}

fn default_scan_interval() -> u64 {
    5
}

fn default_call_timeout() -> u64 {
    10
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auto_close_timeout_secs: default_auto_close(),
            session_timeout_secs: default_session(),
            status_poll_interval_secs: default_status_poll(),
            scan_interval_secs: default_scan_interval(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl GateConfig {
    pub fn auto_close_timeout(&self) -> Duration {
        Duration::from_secs(self.auto_close_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokensConfig {
    #[serde(default)]
    pub registered: Vec<TokenEntry>,
}

// ---------------------------------------------------------------------------
// ActivityConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// When true, repeated entries sharing a correlation key update the
    /// prior entry in place instead of appending.
    #[serde(default)]
    pub coalesce: bool,
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window_secs: u64,
}

fn default_max_entries() -> usize {
    1000
}

fn default_coalesce_window() -> u64 {
    60
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            coalesce: false,
            coalesce_window_secs: default_coalesce_window(),
        }
    }
}

impl ActivityConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_secs(self.coalesce_window_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            controller: ControllerConfig::default(),
            gate: GateConfig::default(),
            tokens: TokensConfig::default(),
            activity: ActivityConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // The gate must be fully closed again before a fresh session would
        // permit a reopen.
        if self.gate.auto_close_timeout_secs >= self.gate.session_timeout_secs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "gate.auto_close_timeout_secs ({}) must be less than \
                     gate.session_timeout_secs ({})",
                    self.gate.auto_close_timeout_secs, self.gate.session_timeout_secs
                ),
            });
        }

        if self.gate.call_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "gate.call_timeout_secs must be non-zero".to_string(),
            });
        }

        if self.gate.scan_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "gate.scan_interval_secs must be non-zero".to_string(),
            });
        }

        if self.controller.host.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "controller.host is empty — gate commands will fail".to_string(),
            });
        }

        if self.controller.username.is_none() && self.controller.password.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no controller credentials configured — auth refresh will \
                          rely on a cached director token"
                    .to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for token in &self.tokens.registered {
            if !seen.insert(token.id.to_ascii_lowercase()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("duplicate token id: {}", token.id),
                });
            }
        }

        warnings
    }

    /// True when validation produced no error-level findings.
    pub fn is_valid(&self) -> bool {
        !self
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
