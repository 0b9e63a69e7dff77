//! `control4-client` — HTTP driver for the Control4 controller that
//! physically operates the gate.
//!
//! The gate itself is wired to a relay behind a Control4 director; opening
//! and closing are director *scenarios* run against the gate device, status
//! is read from the device's item variables, and push notifications go
//! through a notification agent. Director calls authenticate with a bearer
//! token that expires; refreshing it requires the two-step cloud flow
//! (account credentials → account token → director token).
//!
//! # Architecture
//!
//! ```text
//! Control4Config
//!     │
//!     ▼
//! Control4Client   ← POST /api/v1/items/<gate>/commands  (Run Scenario)
//!     │              GET  /api/v1/items/<gate>           (status)
//!     │              errors classified: AuthExpired / Network / Device / Timeout
//!     ▼
//! AccountAuth      ← cloud authentication path, used only by refresh_auth()
//!     │
//!     ▼
//! CredentialStore  ← persists the refreshed director token on disk so
//!                    later runs can start in token-only mode
//! ```
//!
//! The client never retries on its own: retry policy (one refresh + one
//! retry on `AuthExpired`) belongs to the caller's actuation wrapper.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod types;

pub use client::{Control4Client, Control4Config};
pub use credentials::CredentialStore;
pub use error::Control4Error;
pub use types::DevicePosition;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, Control4Error>;
