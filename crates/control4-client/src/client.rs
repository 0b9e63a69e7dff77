use std::sync::RwLock;
use std::time::Duration;

use crate::auth::AccountAuth;
use crate::credentials::CredentialStore;
use crate::types::{CommandRequest, DevicePosition, ItemInfo};
use crate::{Control4Error, Result};

/// Cloud endpoint used for the two-step authentication flow.
pub const DEFAULT_AUTH_BASE: &str = "https://apis.control4.com";

// ─── Control4Config ───────────────────────────────────────────────────────

/// Connection settings for [`Control4Client`].
#[derive(Debug, Clone)]
pub struct Control4Config {
    /// Director base URL, e.g. `https://192.168.1.50`.
    pub director_base: String,
    /// Cloud auth base URL. Overridable for tests.
    pub auth_base: String,
    /// Account credentials. Absent in token-only mode, in which case
    /// `refresh_auth` fails and the cached director token is all there is.
    pub username: Option<String>,
    pub password: Option<String>,
    pub gate_device_id: u32,
    pub open_scenario: u32,
    pub close_scenario: u32,
    pub notification_agent_id: u32,
    /// Directors ship self-signed certificates on the LAN.
    pub accept_invalid_certs: bool,
    pub call_timeout: Duration,
}

impl Control4Config {
    pub fn new(director_base: impl Into<String>) -> Self {
        Control4Config {
            director_base: director_base.into(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            username: None,
            password: None,
            gate_device_id: 348,
            open_scenario: 21,
            close_scenario: 22,
            notification_agent_id: 7,
            accept_invalid_certs: true,
            call_timeout: Duration::from_secs(10),
        }
    }
}

// ─── Control4Client ───────────────────────────────────────────────────────

/// Async driver for the director's REST surface.
///
/// Every call runs on the cached director bearer token. A missing or
/// rejected bearer surfaces as [`Control4Error::AuthExpired`]; the caller's
/// actuation wrapper decides whether to `refresh_auth` and retry. The
/// client itself never loops.
pub struct Control4Client {
    http: reqwest::Client,
    config: Control4Config,
    bearer: RwLock<Option<String>>,
    store: Option<CredentialStore>,
}

impl Control4Client {
    /// Build a client, preloading any director token the credential store
    /// has cached from a previous refresh.
    pub fn new(config: Control4Config, store: Option<CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.call_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| Control4Error::Network(e.to_string()))?;
        let bearer = store.as_ref().and_then(CredentialStore::load);
        if bearer.is_some() {
            tracing::debug!("loaded cached director token");
        }
        Ok(Control4Client {
            http,
            config,
            bearer: RwLock::new(bearer),
            store,
        })
    }

    /// Run the open scenario against the gate device.
    pub async fn open_gate(&self) -> Result<()> {
        tracing::info!(scenario = self.config.open_scenario, "opening gate");
        self.send_command(
            self.config.gate_device_id,
            &CommandRequest::run_scenario(self.config.open_scenario),
        )
        .await
    }

    /// Run the close scenario against the gate device.
    pub async fn close_gate(&self) -> Result<()> {
        tracing::info!(scenario = self.config.close_scenario, "closing gate");
        self.send_command(
            self.config.gate_device_id,
            &CommandRequest::run_scenario(self.config.close_scenario),
        )
        .await
    }

    /// Read the gate device's reported position.
    pub async fn gate_status(&self) -> Result<DevicePosition> {
        let bearer = self.bearer()?;
        let url = format!(
            "{}/api/v1/items/{}",
            self.config.director_base, self.config.gate_device_id
        );
        let resp = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(Control4Error::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Control4Error::from_status(status.as_u16(), message));
        }

        let info: ItemInfo = resp
            .json()
            .await
            .map_err(|e| Control4Error::Protocol(e.to_string()))?;
        Ok(info.position())
    }

    /// Send a push notification through the notification agent.
    pub async fn send_notification(&self, title: &str, message: &str) -> Result<()> {
        tracing::debug!(title, "sending notification");
        self.send_command(
            self.config.notification_agent_id,
            &CommandRequest::send_push(title, message),
        )
        .await
    }

    /// Re-run the cloud authentication flow and replace the cached director
    /// token. The refreshed token is persisted through the credential store
    /// (best-effort: a failed write is logged, the in-memory token still
    /// takes effect).
    pub async fn refresh_auth(&self) -> Result<()> {
        let (username, password) = match (&self.config.username, &self.config.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => {
                return Err(Control4Error::AuthRefresh(
                    "no account credentials configured (token-only mode)".to_string(),
                ))
            }
        };

        let auth = AccountAuth::new(&self.http, &self.config.auth_base);
        let token = auth.director_token(&username, &password).await?;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&token) {
                tracing::warn!(error = %e, "failed to persist refreshed director token");
            }
        }
        *self.bearer.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        tracing::info!("director token refreshed");
        Ok(())
    }

    /// True when a director token is cached (from disk or a refresh).
    pub fn has_token(&self) -> bool {
        self.bearer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    async fn send_command(&self, item: u32, request: &CommandRequest) -> Result<()> {
        let bearer = self.bearer()?;
        let url = format!("{}/api/v1/items/{item}/commands", self.config.director_base);
        let resp = self
            .http
            .post(url)
            .bearer_auth(bearer)
            .json(request)
            .send()
            .await
            .map_err(Control4Error::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Control4Error::from_status(status.as_u16(), message));
        }
        Ok(())
    }

    fn bearer(&self) -> Result<String> {
        self.bearer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(Control4Error::AuthExpired)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config(server: &mockito::ServerGuard) -> Control4Config {
        Control4Config {
            auth_base: server.url(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            accept_invalid_certs: false,
            ..Control4Config::new(server.url())
        }
    }

    fn client_with_token(server: &mockito::ServerGuard) -> Control4Client {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials"));
        store.save("dir-tok").unwrap();
        Control4Client::new(test_config(server), Some(store)).unwrap()
    }

    #[tokio::test]
    async fn open_gate_runs_open_scenario() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/items/348/commands")
            .match_header("authorization", "Bearer dir-tok")
            .match_body(Matcher::PartialJson(json!({
                "command": "Run Scenario",
                "tParams": {"Scenario": 21}
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = client_with_token(&server);
        client.open_gate().await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn close_gate_runs_close_scenario() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/items/348/commands")
            .match_body(Matcher::PartialJson(json!({"tParams": {"Scenario": 22}})))
            .with_status(200)
            .create_async()
            .await;

        let client = client_with_token(&server);
        client.close_gate().await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_surfaces_as_auth_expired() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/items/348/commands")
            .with_status(401)
            .create_async()
            .await;

        let client = client_with_token(&server);
        let err = client.open_gate().await.unwrap_err();
        assert!(matches!(err, Control4Error::AuthExpired));
    }

    #[tokio::test]
    async fn server_error_surfaces_as_device() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/items/348/commands")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = client_with_token(&server);
        match client.open_gate().await.unwrap_err() {
            Control4Error::Device { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Device, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let server = mockito::Server::new_async().await;
        let client = Control4Client::new(test_config(&server), None).unwrap();
        let err = client.open_gate().await.unwrap_err();
        assert!(matches!(err, Control4Error::AuthExpired));
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn gate_status_parses_position() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/items/348")
            .with_status(200)
            .with_body(json!({"id": 348, "variables": {"IsOpen": true}}).to_string())
            .create_async()
            .await;

        let client = client_with_token(&server);
        assert_eq!(client.gate_status().await.unwrap(), DevicePosition::Open);
    }

    #[tokio::test]
    async fn refresh_auth_replaces_token_and_persists() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/authentication/v1/rest")
            .with_status(200)
            .with_body(json!({"account_token": "acct-2"}).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/authentication/v1/director")
            .with_status(200)
            .with_body(json!({"token": "dir-fresh"}).to_string())
            .create_async()
            .await;
        let open = server
            .mock("POST", "/api/v1/items/348/commands")
            .match_header("authorization", "Bearer dir-fresh")
            .with_status(200)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials"));
        let client = Control4Client::new(test_config(&server), Some(store)).unwrap();

        client.refresh_auth().await.unwrap();
        client.open_gate().await.unwrap();
        open.assert_async().await;

        let store = CredentialStore::new(dir.path().join("credentials"));
        assert_eq!(store.load(), Some("dir-fresh".to_string()));
    }

    #[tokio::test]
    async fn refresh_auth_without_credentials_fails() {
        let server = mockito::Server::new_async().await;
        let mut config = test_config(&server);
        config.username = None;
        config.password = None;
        let client = Control4Client::new(config, None).unwrap();
        let err = client.refresh_auth().await.unwrap_err();
        assert!(matches!(err, Control4Error::AuthRefresh(_)));
    }

    #[tokio::test]
    async fn notification_goes_to_agent_item() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/items/7/commands")
            .match_body(Matcher::PartialJson(json!({
                "command": "Send Push Notification",
                "tParams": {"Title": "Gate Opened"}
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = client_with_token(&server);
        client
            .send_notification("Gate Opened", "Gate opened: manual")
            .await
            .unwrap();
        m.assert_async().await;
    }
}
