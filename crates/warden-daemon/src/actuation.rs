use std::time::Duration;

use async_trait::async_trait;
use control4_client::{Control4Client, Control4Error, DevicePosition};
use thiserror::Error;
use warden_core::GateState;

// ---------------------------------------------------------------------------
// ActuationError
// ---------------------------------------------------------------------------

/// Failure of a gateway call, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActuationError {
    /// Authentication could not be (re-)established. The wrapper has
    /// already spent its single refresh+retry by the time this surfaces.
    #[error("gateway authentication expired and could not be refreshed")]
    AuthExpired,

    #[error("gateway network error: {0}")]
    Network(String),

    #[error("gateway device error: {0}")]
    Device(String),

    #[error("gateway call timed out")]
    Timeout,
}

impl From<Control4Error> for ActuationError {
    fn from(err: Control4Error) -> Self {
        match err {
            Control4Error::AuthExpired | Control4Error::AuthRefresh(_) => {
                ActuationError::AuthExpired
            }
            Control4Error::Network(msg) => ActuationError::Network(msg),
            Control4Error::Timeout => ActuationError::Timeout,
            Control4Error::Device { status, message } => {
                ActuationError::Device(format!("HTTP {status}: {message}"))
            }
            Control4Error::Protocol(msg) => ActuationError::Device(msg),
            Control4Error::Io(e) => ActuationError::Network(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// The remote system that physically operates the gate.
///
/// Implementations must not retry internally; the single refresh+retry on
/// [`ActuationError::AuthExpired`] belongs to [`AuthRetry`].
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn open(&self) -> Result<(), ActuationError>;
    async fn close(&self) -> Result<(), ActuationError>;
    /// Reported gate position: `Open`, `Closed`, or `Unknown` when the
    /// device doesn't say.
    async fn status(&self) -> Result<GateState, ActuationError>;
    /// Re-establish credentials and persist them for later runs.
    async fn refresh_auth(&self) -> Result<(), ActuationError>;
    /// Best-effort push notification.
    async fn notify(&self, title: &str, message: &str) -> Result<(), ActuationError>;
}

#[async_trait]
impl<T: Actuator + ?Sized> Actuator for std::sync::Arc<T> {
    async fn open(&self) -> Result<(), ActuationError> {
        (**self).open().await
    }

    async fn close(&self) -> Result<(), ActuationError> {
        (**self).close().await
    }

    async fn status(&self) -> Result<GateState, ActuationError> {
        (**self).status().await
    }

    async fn refresh_auth(&self) -> Result<(), ActuationError> {
        (**self).refresh_auth().await
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), ActuationError> {
        (**self).notify(title, message).await
    }
}

#[async_trait]
impl Actuator for Control4Client {
    async fn open(&self) -> Result<(), ActuationError> {
        self.open_gate().await.map_err(Into::into)
    }

    async fn close(&self) -> Result<(), ActuationError> {
        self.close_gate().await.map_err(Into::into)
    }

    async fn status(&self) -> Result<GateState, ActuationError> {
        let position = self.gate_status().await.map_err(ActuationError::from)?;
        Ok(match position {
            DevicePosition::Open => GateState::Open,
            DevicePosition::Closed => GateState::Closed,
            DevicePosition::Unknown => GateState::Unknown,
        })
    }

    async fn refresh_auth(&self) -> Result<(), ActuationError> {
        Control4Client::refresh_auth(self).await.map_err(Into::into)
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), ActuationError> {
        self.send_notification(title, message)
            .await
            .map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// AuthRetry
// ---------------------------------------------------------------------------

enum Op<'a> {
    Open,
    Close,
    Status,
    Notify { title: &'a str, message: &'a str },
}

impl Op<'_> {
    fn name(&self) -> &'static str {
        match self {
            Op::Open => "open",
            Op::Close => "close",
            Op::Status => "status",
            Op::Notify { .. } => "notify",
        }
    }
}

enum OpOutput {
    Done,
    Position(GateState),
}

/// Wraps every gateway call with a bounded timeout and the single
/// refresh+retry allowed on an expired credential.
///
/// The bound is strict: one refresh, one retry, per call. A permanently
/// broken credential therefore costs each call two attempts, never a loop.
/// Non-auth failures are returned as-is without a retry.
pub struct AuthRetry<A> {
    inner: A,
    call_timeout: Duration,
}

impl<A: Actuator> AuthRetry<A> {
    pub fn new(inner: A, call_timeout: Duration) -> Self {
        AuthRetry {
            inner,
            call_timeout,
        }
    }

    pub async fn open(&self) -> Result<(), ActuationError> {
        self.call(&Op::Open).await.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), ActuationError> {
        self.call(&Op::Close).await.map(|_| ())
    }

    pub async fn status(&self) -> Result<GateState, ActuationError> {
        match self.call(&Op::Status).await? {
            OpOutput::Position(state) => Ok(state),
            OpOutput::Done => Ok(GateState::Unknown),
        }
    }

    pub async fn notify(&self, title: &str, message: &str) -> Result<(), ActuationError> {
        self.call(&Op::Notify { title, message }).await.map(|_| ())
    }

    async fn call(&self, op: &Op<'_>) -> Result<OpOutput, ActuationError> {
        match self.attempt(op).await {
            Err(ActuationError::AuthExpired) => {
                tracing::info!(op = op.name(), "credential expired, refreshing");
                match tokio::time::timeout(self.call_timeout, self.inner.refresh_auth()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(op = op.name(), error = %e, "auth refresh failed");
                        return Err(ActuationError::AuthExpired);
                    }
                    Err(_) => {
                        tracing::warn!(op = op.name(), "auth refresh timed out");
                        return Err(ActuationError::AuthExpired);
                    }
                }
                self.attempt(op).await
            }
            other => other,
        }
    }

    async fn attempt(&self, op: &Op<'_>) -> Result<OpOutput, ActuationError> {
        let fut = async {
            match op {
                Op::Open => self.inner.open().await.map(|_| OpOutput::Done),
                Op::Close => self.inner.close().await.map(|_| OpOutput::Done),
                Op::Status => self.inner.status().await.map(OpOutput::Position),
                Op::Notify { title, message } => {
                    self.inner.notify(title, message).await.map(|_| OpOutput::Done)
                }
            }
        };
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ActuationError::Timeout),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
