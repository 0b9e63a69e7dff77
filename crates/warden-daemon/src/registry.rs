use std::sync::RwLock;

use thiserror::Error;
use warden_core::tokens::TokenRegistry;
use warden_core::TokenInfo;

#[derive(Debug, Error)]
#[error("registry unavailable: {0}")]
pub struct RegistryError(pub String);

/// Token lookup used by the detection coordinator.
///
/// A lookup error is not fatal: the orchestrator degrades to treating the
/// token as unregistered rather than blocking detection handling.
pub trait Registry: Send + Sync {
    fn lookup(&self, token_id: &str) -> Result<Option<TokenInfo>, RegistryError>;
}

/// Registry over the token list loaded from the config file.
///
/// "Static" because daemon runs pick up token changes on restart; the CLI
/// mutates the config file, not the running daemon.
pub struct StaticRegistry {
    tokens: RwLock<TokenRegistry>,
}

impl StaticRegistry {
    pub fn new(tokens: TokenRegistry) -> Self {
        StaticRegistry {
            tokens: RwLock::new(tokens),
        }
    }
}

impl Registry for StaticRegistry {
    fn lookup(&self, token_id: &str) -> Result<Option<TokenInfo>, RegistryError> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.lookup(token_id))
    }
}
