use std::time::Duration;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionWindow
// ---------------------------------------------------------------------------

/// Debounce marker for token-triggered opens.
///
/// Set when an open begins and expired purely by elapsed time. Closing the
/// gate must never clear it: a token still in range would otherwise trigger
/// an immediate reopen after every close. The accepted tradeoff is that a
/// legitimate reopen can lag an explicit close by up to the session timeout.
#[derive(Debug, Default)]
pub struct SessionWindow {
    started: Option<Instant>,
}

impl SessionWindow {
    pub fn new() -> Self {
        SessionWindow { started: None }
    }

    /// Start (or restart) the window at now. Called before the open call is
    /// issued so a near-simultaneous second detection already sees it.
    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn is_active(&self, timeout: Duration) -> bool {
        self.started
            .map(|s| s.elapsed() < timeout)
            .unwrap_or(false)
    }

    /// Time left in the window, `None` when no window is active.
    pub fn remaining(&self, timeout: Duration) -> Option<Duration> {
        let started = self.started?;
        timeout.checked_sub(started.elapsed()).filter(|d| !d.is_zero())
    }
}

// ---------------------------------------------------------------------------
// AutoCloseDeadline
// ---------------------------------------------------------------------------

/// When the gate should close itself. Armed on every successful open,
/// cleared on every resolved close.
#[derive(Debug, Default)]
pub struct AutoCloseDeadline {
    deadline: Option<Instant>,
}

impl AutoCloseDeadline {
    pub fn new() -> Self {
        AutoCloseDeadline { deadline: None }
    }

    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn is_due(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
