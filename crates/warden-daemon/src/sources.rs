use async_trait::async_trait;
use thiserror::Error;
use warden_core::DetectionEvent;

#[derive(Debug, Error)]
#[error("detection source error: {0}")]
pub struct SourceError(pub String);

/// A producer of token sightings: the local BLE scanner, an external
/// gateway relay, or anything else that can say "token X is nearby".
///
/// Sources are responsible for de-duplicating repeated reports of the same
/// token within one scan burst; the orchestrator only debounces across
/// time via the session window.
#[async_trait]
pub trait DetectionSource: Send + Sync {
    /// Stable identifier, carried into detection events and activity
    /// entries (e.g. "ble", "bcg04").
    fn id(&self) -> &str;

    /// Run one scan and return the tokens sighted during it.
    async fn poll_once(&self) -> Result<Vec<DetectionEvent>, SourceError>;
}
