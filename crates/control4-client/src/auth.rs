use crate::types::{AccountTokenRequest, AccountTokenResponse, DirectorTokenResponse};
use crate::{Control4Error, Result};

// ─── AccountAuth ──────────────────────────────────────────────────────────

/// The two-step cloud authentication flow: account credentials buy an
/// account token, the account token buys a director bearer token.
///
/// Used only by `Control4Client::refresh_auth`; normal director calls run
/// on the cached bearer.
pub(crate) struct AccountAuth<'a> {
    http: &'a reqwest::Client,
    base: &'a str,
}

impl<'a> AccountAuth<'a> {
    pub(crate) fn new(http: &'a reqwest::Client, base: &'a str) -> Self {
        AccountAuth { http, base }
    }

    pub(crate) async fn director_token(&self, username: &str, password: &str) -> Result<String> {
        let account_token = self.account_token(username, password).await?;

        let resp = self
            .http
            .post(format!("{}/authentication/v1/director", self.base))
            .bearer_auth(&account_token)
            .send()
            .await
            .map_err(Control4Error::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Control4Error::AuthRefresh(format!(
                "director token request failed with HTTP {}",
                status.as_u16()
            )));
        }

        let body: DirectorTokenResponse = resp
            .json()
            .await
            .map_err(|e| Control4Error::Protocol(e.to_string()))?;
        Ok(body.token)
    }

    async fn account_token(&self, username: &str, password: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/authentication/v1/rest", self.base))
            .json(&AccountTokenRequest { username, password })
            .send()
            .await
            .map_err(Control4Error::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Control4Error::AuthRefresh(format!(
                "account credentials rejected with HTTP {}",
                status.as_u16()
            )));
        }

        let body: AccountTokenResponse = resp
            .json()
            .await
            .map_err(|e| Control4Error::Protocol(e.to_string()))?;
        Ok(body.account_token)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
