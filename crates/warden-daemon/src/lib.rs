//! `warden-daemon` — the gate orchestrator.
//!
//! Several independent tasks (detection-source scan loops, the status
//! poller, the auto-close timer, manual command handlers) converge on one
//! shared gate state. The orchestrator serializes them: every decision
//! (read state → decide → mark the transient `Opening`/`Closing` value) is
//! a single mutex acquisition with no await point inside, and the actuator
//! network call runs outside the lock with the transient state already
//! visible, so concurrent callers observe it and no-op instead of
//! double-actuating.
//!
//! # Architecture
//!
//! ```text
//! DetectionSource ─┐
//! status poller  ──┤                         ┌─► Registry  (token lookup)
//! auto-close     ──┼─► Orchestrator ─────────┼─► Recorder  (activity log)
//! manual command ──┘     │ Mutex<CoreState>  └─► AuthRetry ─► Actuator
//!                        │  gate state                         (Control4)
//!                        │  session window
//!                        └  auto-close deadline
//! ```
//!
//! The session window debounces re-actuation while a token stays in range;
//! it is deliberately **not** cleared on close — clearing it would let a
//! still-present token reopen the gate immediately after every close.

pub mod actuation;
pub mod orchestrator;
pub mod recorder;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod sources;

pub use actuation::{Actuator, ActuationError, AuthRetry};
pub use orchestrator::Orchestrator;
pub use recorder::Recorder;
pub use registry::{Registry, RegistryError, StaticRegistry};
pub use runtime::Daemon;
pub use sources::{DetectionSource, SourceError};
