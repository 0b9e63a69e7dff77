use thiserror::Error;

#[derive(Debug, Error)]
pub enum Control4Error {
    /// The director rejected the bearer token (or none is cached yet).
    /// Callers may refresh once via `refresh_auth` and retry.
    #[error("director authentication expired or missing")]
    AuthExpired,

    /// The cloud authentication flow itself failed; retrying the original
    /// call is pointless until credentials are fixed.
    #[error("auth refresh failed: {0}")]
    AuthRefresh(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("device error (HTTP {status}): {message}")]
    Device { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Control4Error {
    /// Classify a transport-level failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Control4Error::Timeout
        } else {
            Control4Error::Network(err.to_string())
        }
    }

    /// Classify a non-success HTTP status from the director.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Control4Error::AuthExpired,
            _ => Control4Error::Device { status, message },
        }
    }
}
