pub mod activity;
pub mod config;
pub mod gate;
pub mod init;
pub mod refresh;
pub mod run;
pub mod token;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use control4_client::{client::DEFAULT_AUTH_BASE, Control4Client, Control4Config, CredentialStore};
use warden_core::activity::{ActivityLog, RecordingMode};
use warden_core::config::{Config, WarnLevel};
use warden_core::paths;
use warden_core::tokens::TokenRegistry;
use warden_daemon::{Orchestrator, Recorder, StaticRegistry};

pub(crate) fn resolve(config_override: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config_override {
        Some(p) => Ok(p.to_path_buf()),
        None => paths::resolve_config().context("no configuration found (run 'gatewarden init')"),
    }
}

pub(crate) fn load(config_override: Option<&Path>) -> anyhow::Result<(Config, PathBuf)> {
    let path = resolve(config_override)?;
    let config =
        Config::load(&path).with_context(|| format!("failed to load {}", path.display()))?;
    Ok((config, path))
}

/// Reject configs with error-level validation findings before they reach
/// the gateway. Warnings are left for the caller to surface.
pub(crate) fn ensure_valid(config: &Config) -> anyhow::Result<()> {
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("invalid configuration: {}", errors.join("; "))
    }
}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}

fn director_base(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

pub(crate) fn build_client(config: &Config, config_path: &Path) -> anyhow::Result<Control4Client> {
    let store = CredentialStore::new(paths::credentials_dir(config_path));
    let c4 = Control4Config {
        director_base: director_base(&config.controller.host),
        auth_base: DEFAULT_AUTH_BASE.to_string(),
        username: config.controller.username.clone(),
        password: config.controller.password.clone(),
        gate_device_id: config.controller.gate_device_id,
        open_scenario: config.controller.open_scenario,
        close_scenario: config.controller.close_scenario,
        notification_agent_id: config.controller.notification_agent_id,
        accept_invalid_certs: true,
        call_timeout: config.gate.call_timeout(),
    };
    Control4Client::new(c4, Some(store)).context("failed to build controller client")
}

pub(crate) fn open_log(config: &Config, config_path: &Path) -> anyhow::Result<ActivityLog> {
    let mode = if config.activity.coalesce {
        RecordingMode::Coalesce {
            window: config.activity.coalesce_window(),
        }
    } else {
        RecordingMode::Append
    };
    ActivityLog::open(
        paths::activity_path(config_path),
        config.activity.max_entries,
        mode,
    )
    .context("failed to open activity log")
}

pub(crate) fn build_orchestrator(
    config: &Config,
    config_path: &Path,
) -> anyhow::Result<Orchestrator<Control4Client>> {
    let client = build_client(config, config_path)?;
    let registry = StaticRegistry::new(TokenRegistry::new(config.tokens.registered.clone()));
    let log = open_log(config, config_path)?;
    Ok(Orchestrator::new(
        client,
        Arc::new(registry),
        Arc::new(log) as Arc<dyn Recorder>,
        config.gate.clone(),
    ))
}
