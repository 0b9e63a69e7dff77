use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use warden_core::activity::{signal_quality, EntryKind};
use warden_core::config::GateConfig;
use warden_core::{DetectionEvent, GateSnapshot, GateState, TokenInfo, TriggerReason};

use crate::actuation::{ActuationError, Actuator, AuthRetry};
use crate::recorder::Recorder;
use crate::registry::Registry;
use crate::session::{AutoCloseDeadline, SessionWindow};

// ---------------------------------------------------------------------------
// CoreState
// ---------------------------------------------------------------------------

/// The one shared mutable state. Only ever touched under the orchestrator's
/// mutex, and never across an await point.
struct CoreState {
    gate: GateState,
    session: SessionWindow,
    auto_close: AutoCloseDeadline,
    last_open_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Serializes detections, manual commands, the status poller, and the
/// auto-close timer against the shared gate state.
///
/// Locking discipline: each decision (read state → decide → mark the
/// transient `Opening`/`Closing` value) is one lock acquisition; the
/// actuator call runs outside the lock so concurrent callers see the
/// transient state and no-op. An in-flight call is not cancellable — a
/// later caller simply observes `Opening`/`Closing`.
pub struct Orchestrator<A> {
    gateway: AuthRetry<A>,
    registry: Arc<dyn Registry>,
    recorder: Arc<dyn Recorder>,
    timing: GateConfig,
    state: Mutex<CoreState>,
}

impl<A: Actuator> Orchestrator<A> {
    pub fn new(
        actuator: A,
        registry: Arc<dyn Registry>,
        recorder: Arc<dyn Recorder>,
        timing: GateConfig,
    ) -> Self {
        let call_timeout = timing.call_timeout();
        Orchestrator {
            gateway: AuthRetry::new(actuator, call_timeout),
            registry,
            recorder,
            timing,
            state: Mutex::new(CoreState {
                gate: GateState::Unknown,
                session: SessionWindow::new(),
                auto_close: AutoCloseDeadline::new(),
                last_open_time: None,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Detection coordinator
    // -----------------------------------------------------------------------

    /// Entry point for every detection source.
    pub async fn on_detection(&self, event: DetectionEvent) {
        let token = match self.registry.lookup(&event.token_id) {
            Ok(token) => token,
            Err(e) => {
                // Degraded mode: an unreachable registry must not block the
                // coordinator, so the token is handled as unregistered.
                tracing::warn!(error = %e, "registry lookup failed, treating token as unregistered");
                None
            }
        };

        self.record_detection(&event, token.as_ref());

        let Some(token) = token else {
            tracing::info!(
                token = %event.token_id,
                source = %event.source_id,
                "unregistered token observed"
            );
            return;
        };
        if !token.active {
            tracing::info!(token = %token.name, "token is paused, not opening gate");
            return;
        }

        // One atomic decision: gate state check, session check, session
        // begin, transient mark. A concurrent detection that loses this
        // race sees `Opening` (or the fresh session) and no-ops.
        {
            let mut st = self.lock_state();
            match st.gate {
                GateState::Open | GateState::Opening | GateState::Closing => {
                    tracing::debug!(state = %st.gate, "gate busy, ignoring detection");
                    return;
                }
                GateState::Closed | GateState::Unknown => {}
            }
            if st.session.is_active(self.timing.session_timeout()) {
                tracing::debug!(token = %token.name, "active session, detection debounced");
                return;
            }
            // The session starts before the open call is issued so that a
            // near-simultaneous detection cannot also pass the check above.
            st.session.begin();
            st.gate = GateState::Opening;
        }

        let reason = TriggerReason::Token(token.name.clone());
        if let Err(e) = self.drive_open(reason).await {
            tracing::warn!(error = %e, "token-triggered open failed");
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub async fn manual_open(&self) -> Result<(), ActuationError> {
        self.open_gate(TriggerReason::Manual).await
    }

    pub async fn manual_close(&self) -> Result<(), ActuationError> {
        self.close_gate(TriggerReason::Manual).await
    }

    /// Issue an open command. No-op (and `Ok`) unless the gate is
    /// `Closed` or `Unknown`.
    pub async fn open_gate(&self, reason: TriggerReason) -> Result<(), ActuationError> {
        {
            let mut st = self.lock_state();
            match st.gate {
                GateState::Open | GateState::Opening | GateState::Closing => {
                    tracing::debug!(state = %st.gate, reason = %reason, "open ignored");
                    return Ok(());
                }
                GateState::Closed | GateState::Unknown => st.gate = GateState::Opening,
            }
        }
        self.drive_open(reason).await
    }

    /// Issue a close command. No-op (and `Ok`) unless the gate is `Open`
    /// or `Unknown`. Used identically by manual close and auto-close.
    pub async fn close_gate(&self, reason: TriggerReason) -> Result<(), ActuationError> {
        {
            let mut st = self.lock_state();
            match st.gate {
                GateState::Open | GateState::Unknown => st.gate = GateState::Closing,
                other => {
                    tracing::debug!(state = %other, reason = %reason, "close ignored");
                    return Ok(());
                }
            }
        }

        tracing::info!(reason = %reason, "closing gate");
        match self.gateway.close().await {
            Ok(()) => {
                {
                    let mut st = self.lock_state();
                    st.gate = GateState::Closed;
                    st.auto_close.clear();
                    st.last_open_time = None;
                    // The session window stays. Clearing it here would let a
                    // token still in range reopen the gate immediately.
                }
                self.record_transition(EntryKind::GateClosed, "Gate closed", &reason);
                self.notify("Gate Closed", &format!("Gate closed: {reason}"))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.lock_state().gate = GateState::Unknown;
                self.record_failure("close", &reason, &e);
                Err(e)
            }
        }
    }

    /// Second half of an open: the decision has been made and `Opening` is
    /// already visible; drive the gateway and resolve the transient state.
    async fn drive_open(&self, reason: TriggerReason) -> Result<(), ActuationError> {
        tracing::info!(reason = %reason, "opening gate");
        match self.gateway.open().await {
            Ok(()) => {
                {
                    let mut st = self.lock_state();
                    st.gate = GateState::Open;
                    st.last_open_time = Some(Utc::now());
                    st.auto_close.arm(self.timing.auto_close_timeout());
                }
                self.record_transition(EntryKind::GateOpened, "Gate opened", &reason);
                self.notify("Gate Opened", &format!("Gate opened: {reason}"))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.lock_state().gate = GateState::Unknown;
                self.record_failure("open", &reason, &e);
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Status reconciliation & auto-close
    // -----------------------------------------------------------------------

    /// Probe the gateway and reconcile externally-caused state changes.
    ///
    /// A failed probe (or a device that doesn't report a position) never
    /// overwrites known state, and an in-flight transition is left alone.
    /// Reconciling away from `Unknown` is silent; an observed Open↔Closed
    /// flip records a transition entry with reason `external:status-poll`.
    pub async fn reconcile_status(&self) {
        let observed = match self.gateway.status().await {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(error = %e, "status probe failed");
                return;
            }
        };
        if observed == GateState::Unknown {
            return;
        }

        let flipped_from = {
            let mut st = self.lock_state();
            if st.gate.is_transient() || st.gate == observed {
                None
            } else {
                let from = st.gate;
                st.gate = observed;
                if observed == GateState::Closed {
                    st.auto_close.clear();
                    st.last_open_time = None;
                }
                // An externally opened gate is not armed for auto-close:
                // the deadline only covers opens this process issued.
                (from != GateState::Unknown).then_some(from)
            }
        };

        if let Some(from) = flipped_from {
            tracing::info!(from = %from, to = %observed, "state reconciled from status probe");
            let reason = TriggerReason::External("status-poll".to_string());
            let (kind, verb) = if observed == GateState::Open {
                (EntryKind::GateOpened, "Gate opened")
            } else {
                (EntryKind::GateClosed, "Gate closed")
            };
            self.record_transition(kind, verb, &reason);
        } else {
            tracing::debug!(state = %observed, "status probe agrees");
        }
    }

    /// Close the gate if the auto-close deadline has passed. Runs through
    /// the same command path as a manual close.
    pub async fn auto_close_if_due(&self) {
        let due = {
            let st = self.lock_state();
            st.gate == GateState::Open && st.auto_close.is_due()
        };
        if !due {
            return;
        }
        tracing::info!("auto-close deadline reached");
        if let Err(e) = self.close_gate(TriggerReason::AutoClose).await {
            tracing::warn!(error = %e, "auto-close failed");
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> GateSnapshot {
        let st = self.lock_state();
        let timeout = self.timing.session_timeout();
        GateSnapshot {
            state: st.gate,
            session_active: st.session.is_active(timeout),
            session_remaining_secs: st.session.remaining(timeout).map(|d| d.as_secs()),
            last_open_time: st.last_open_time,
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    fn record_detection(&self, event: &DetectionEvent, token: Option<&TokenInfo>) {
        let mut details = BTreeMap::new();
        details.insert("token_id".to_string(), json!(event.token_id));
        details.insert("source".to_string(), json!(event.source_id));
        if let Some(rssi) = event.rssi {
            details.insert("rssi".to_string(), json!(rssi));
            details.insert("signal_quality".to_string(), json!(signal_quality(rssi)));
        }
        if let Some(distance) = event.distance_m.filter(|d| *d > 0.0) {
            details.insert("distance_m".to_string(), json!(distance));
        }

        let message = match token {
            Some(t) if t.active => format!("Token detected: {}", t.name),
            Some(t) => {
                details.insert("paused".to_string(), json!(true));
                format!("Token detected (paused): {}", t.name)
            }
            None => {
                details.insert("registered".to_string(), json!(false));
                format!("Unregistered token observed: {}", event.token_id)
            }
        };

        // Stable key: repeated sightings of the same token coalesce when
        // the recorder runs in coalescing mode.
        self.recorder.record(
            EntryKind::TokenDetected,
            &message,
            details,
            Some(event.token_id.to_ascii_lowercase()),
        );
    }

    fn record_transition(&self, kind: EntryKind, verb: &str, reason: &TriggerReason) {
        let mut details = BTreeMap::new();
        details.insert("reason".to_string(), json!(reason.to_string()));
        // Unique key: transition entries must never coalesce.
        self.recorder.record(
            kind,
            &format!("{verb}: {reason}"),
            details,
            Some(Uuid::new_v4().to_string()),
        );
    }

    fn record_failure(&self, op: &str, reason: &TriggerReason, error: &ActuationError) {
        let mut details = BTreeMap::new();
        details.insert("reason".to_string(), json!(reason.to_string()));
        details.insert("error".to_string(), json!(error.to_string()));
        self.recorder.record(
            EntryKind::Error,
            &format!("Failed to {op} gate: {error}"),
            details,
            Some(Uuid::new_v4().to_string()),
        );
    }

    async fn notify(&self, title: &str, message: &str) {
        if let Err(e) = self.gateway.notify(title, message).await {
            tracing::debug!(error = %e, "notification failed");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryError, StaticRegistry};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::advance;
    use warden_core::activity::{ActivityLog, RecordingMode};
    use warden_core::tokens::TokenRegistry;

    // ─── Mocks ────────────────────────────────────────────────────────────

    struct MockGateway {
        open_results: Mutex<VecDeque<Result<(), ActuationError>>>,
        close_results: Mutex<VecDeque<Result<(), ActuationError>>>,
        status_result: Mutex<Result<GateState, ActuationError>>,
        open_calls: AtomicU32,
        close_calls: AtomicU32,
        refresh_calls: AtomicU32,
        open_delay: Option<Duration>,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            MockGateway {
                open_results: Mutex::new(VecDeque::new()),
                close_results: Mutex::new(VecDeque::new()),
                status_result: Mutex::new(Ok(GateState::Unknown)),
                open_calls: AtomicU32::new(0),
                close_calls: AtomicU32::new(0),
                refresh_calls: AtomicU32::new(0),
                open_delay: None,
            }
        }
    }

    impl MockGateway {
        fn script_open(&self, results: Vec<Result<(), ActuationError>>) {
            *self.open_results.lock().unwrap() = results.into();
        }

        fn set_status(&self, result: Result<GateState, ActuationError>) {
            *self.status_result.lock().unwrap() = result;
        }

        fn opens(&self) -> u32 {
            self.open_calls.load(Ordering::SeqCst)
        }

        fn closes(&self) -> u32 {
            self.close_calls.load(Ordering::SeqCst)
        }

        fn refreshes(&self) -> u32 {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Actuator for MockGateway {
        async fn open(&self) -> Result<(), ActuationError> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.open_delay {
                tokio::time::sleep(delay).await;
            }
            self.open_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn close(&self) -> Result<(), ActuationError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.close_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn status(&self) -> Result<GateState, ActuationError> {
            self.status_result.lock().unwrap().clone()
        }

        async fn refresh_auth(&self) -> Result<(), ActuationError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn notify(&self, _title: &str, _message: &str) -> Result<(), ActuationError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct VecRecorder {
        entries: Mutex<Vec<(EntryKind, String, Option<String>)>>,
    }

    impl Recorder for VecRecorder {
        fn record(
            &self,
            kind: EntryKind,
            message: &str,
            _details: BTreeMap<String, serde_json::Value>,
            correlation: Option<String>,
        ) {
            self.entries
                .lock()
                .unwrap()
                .push((kind, message.to_string(), correlation));
        }
    }

    impl VecRecorder {
        fn count(&self, kind: EntryKind) -> usize {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _, _)| *k == kind)
                .count()
        }

        fn messages(&self, kind: EntryKind) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _, _)| *k == kind)
                .map(|(_, m, _)| m.clone())
                .collect()
        }
    }

    struct FailingRegistry;

    impl Registry for FailingRegistry {
        fn lookup(&self, _token_id: &str) -> Result<Option<TokenInfo>, RegistryError> {
            Err(RegistryError("store offline".to_string()))
        }
    }

    // ─── Rig ──────────────────────────────────────────────────────────────

    const TOKEN_A: &str = "aa:bb:cc:dd:ee:01";
    const TOKEN_B: &str = "aa:bb:cc:dd:ee:02";
    const PAUSED: &str = "aa:bb:cc:dd:ee:03";

    fn timings() -> GateConfig {
        GateConfig {
            auto_close_timeout_secs: 120,
            session_timeout_secs: 180,
            status_poll_interval_secs: 30,
            scan_interval_secs: 5,
            call_timeout_secs: 10,
        }
    }

    struct Rig {
        orchestrator: Orchestrator<Arc<MockGateway>>,
        gateway: Arc<MockGateway>,
        recorder: Arc<VecRecorder>,
    }

    fn rig() -> Rig {
        rig_with(MockGateway::default())
    }

    fn rig_with(gateway: MockGateway) -> Rig {
        let mut tokens = TokenRegistry::default();
        tokens.register(TOKEN_A, "Alex").unwrap();
        tokens.register(TOKEN_B, "Yuval").unwrap();
        tokens.register(PAUSED, "Guest").unwrap();
        tokens.set_active(PAUSED, false).unwrap();

        let gateway = Arc::new(gateway);
        let recorder = Arc::new(VecRecorder::default());
        let orchestrator = Orchestrator::new(
            Arc::clone(&gateway),
            Arc::new(StaticRegistry::new(tokens)),
            recorder.clone() as Arc<dyn Recorder>,
            timings(),
        );
        Rig {
            orchestrator,
            gateway,
            recorder,
        }
    }

    impl Rig {
        /// Settle the boot state to `Closed` via a status probe, the same
        /// way the daemon does at startup.
        async fn start_closed(&self) {
            self.gateway.set_status(Ok(GateState::Closed));
            self.orchestrator.reconcile_status().await;
            assert_eq!(self.orchestrator.snapshot().state, GateState::Closed);
        }

        async fn detect(&self, token_id: &str) {
            self.orchestrator
                .on_detection(DetectionEvent::new(token_id, "ble"))
                .await;
        }
    }

    // ─── Detection flow ───────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn first_detection_opens_then_session_debounces() {
        let rig = rig();
        rig.start_closed().await;

        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);

        // Repeated sightings inside the session window are no-ops, even
        // after the gate has been closed again.
        for _ in 0..5 {
            advance(Duration::from_secs(10)).await;
            rig.detect(TOKEN_A).await;
        }
        assert_eq!(rig.gateway.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_token_never_actuates() {
        let rig = rig();
        rig.start_closed().await;

        for _ in 0..3 {
            rig.detect(PAUSED).await;
            advance(Duration::from_secs(200)).await;
        }

        assert_eq!(rig.gateway.opens(), 0);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Closed);
        let messages = rig.recorder.messages(EntryKind::TokenDetected);
        assert!(messages.iter().all(|m| m.contains("paused")));
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_token_is_observed_only() {
        let rig = rig();
        rig.start_closed().await;

        rig.detect("ff:ff:ff:ff:ff:ff").await;

        assert_eq!(rig.gateway.opens(), 0);
        assert_eq!(rig.recorder.count(EntryKind::TokenDetected), 1);
        assert!(rig.recorder.messages(EntryKind::TokenDetected)[0].contains("Unregistered"));
    }

    #[tokio::test(start_paused = true)]
    async fn registry_failure_degrades_to_unregistered() {
        let gateway = Arc::new(MockGateway::default());
        let recorder = Arc::new(VecRecorder::default());
        let orchestrator = Orchestrator::new(
            Arc::clone(&gateway),
            Arc::new(FailingRegistry),
            recorder.clone() as Arc<dyn Recorder>,
            timings(),
        );

        orchestrator
            .on_detection(DetectionEvent::new(TOKEN_A, "ble"))
            .await;

        assert_eq!(gateway.opens(), 0);
        assert_eq!(recorder.count(EntryKind::TokenDetected), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_reopen_after_manual_close_until_session_expires() {
        let rig = rig();
        rig.start_closed().await;

        // t=0: token opens the gate, session starts.
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);

        // t=30: manual close. The session must survive it.
        advance(Duration::from_secs(30)).await;
        rig.orchestrator.manual_close().await.unwrap();
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Closed);

        // t=31: the token is still right there. No reopen.
        advance(Duration::from_secs(1)).await;
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);

        // t=181: session expired, a fresh detection opens again.
        advance(Duration::from_secs(150)).await;
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_close_fires_and_session_still_debounces() {
        let rig = rig();
        rig.start_closed().await;

        // t=0: open on detection.
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);

        // t=119: not due yet.
        advance(Duration::from_secs(119)).await;
        rig.orchestrator.auto_close_if_due().await;
        assert_eq!(rig.gateway.closes(), 0);

        // t=120: auto-close fires through the normal close path.
        advance(Duration::from_secs(1)).await;
        rig.orchestrator.auto_close_if_due().await;
        assert_eq!(rig.gateway.closes(), 1);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Closed);
        assert!(rig
            .recorder
            .messages(EntryKind::GateClosed)
            .iter()
            .any(|m| m.contains("auto-close")));

        // t=125: token still present, session still active — no reopen.
        advance(Duration::from_secs(5)).await;
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);

        // t=181: session expired, gate reopens.
        advance(Duration::from_secs(56)).await;
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_detections_actuate_once() {
        let mut gateway = MockGateway::default();
        gateway.open_delay = Some(Duration::from_millis(50));
        let rig = rig_with(gateway);
        rig.start_closed().await;

        // Different tokens, same instant: the loser of the decision race
        // must observe Opening and no-op.
        tokio::join!(rig.detect(TOKEN_A), rig.detect(TOKEN_B));

        assert_eq!(rig.gateway.opens(), 1);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);
        assert_eq!(rig.recorder.count(EntryKind::GateOpened), 1);
    }

    // ─── Commands & state machine ─────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn manual_open_ignores_session() {
        let rig = rig();
        rig.start_closed().await;

        rig.detect(TOKEN_A).await;
        advance(Duration::from_secs(30)).await;
        rig.orchestrator.manual_close().await.unwrap();

        // The session only debounces detections, not explicit commands.
        rig.orchestrator.manual_open().await.unwrap();
        assert_eq!(rig.gateway.opens(), 2);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_is_noop_when_already_open() {
        let rig = rig();
        rig.start_closed().await;

        rig.orchestrator.manual_open().await.unwrap();
        rig.orchestrator.manual_open().await.unwrap();

        assert_eq!(rig.gateway.opens(), 1);
        assert_eq!(rig.recorder.count(EntryKind::GateOpened), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_noop_when_already_closed() {
        let rig = rig();
        rig.start_closed().await;

        rig.orchestrator.manual_close().await.unwrap();
        assert_eq!(rig.gateway.closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn open_allowed_from_unknown() {
        let rig = rig();
        // Boot state is Unknown; a manual open must still be accepted.
        rig.orchestrator.manual_open().await.unwrap();
        assert_eq!(rig.gateway.opens(), 1);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);
    }

    // ─── Actuation failures ───────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn auth_expiry_refreshes_once_and_opens() {
        let gateway = MockGateway::default();
        gateway.script_open(vec![Err(ActuationError::AuthExpired), Ok(())]);
        let rig = rig_with(gateway);
        rig.start_closed().await;

        rig.orchestrator.manual_open().await.unwrap();

        assert_eq!(rig.gateway.opens(), 2);
        assert_eq!(rig.gateway.refreshes(), 1);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);
        assert_eq!(rig.recorder.count(EntryKind::Error), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_auth_expiry_fails_with_one_error_entry() {
        let gateway = MockGateway::default();
        gateway.script_open(vec![
            Err(ActuationError::AuthExpired),
            Err(ActuationError::AuthExpired),
        ]);
        let rig = rig_with(gateway);
        rig.start_closed().await;

        let err = rig.orchestrator.manual_open().await.unwrap_err();

        assert_eq!(err, ActuationError::AuthExpired);
        assert_eq!(rig.gateway.refreshes(), 1);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Unknown);
        assert_eq!(rig.recorder.count(EntryKind::Error), 1);
        assert_eq!(rig.recorder.count(EntryKind::GateOpened), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_failure_resolves_to_unknown() {
        let gateway = MockGateway::default();
        gateway.script_open(vec![Err(ActuationError::Device("HTTP 500: boom".into()))]);
        let rig = rig_with(gateway);
        rig.start_closed().await;

        let err = rig.orchestrator.manual_open().await.unwrap_err();

        assert!(matches!(err, ActuationError::Device(_)));
        assert_eq!(rig.gateway.refreshes(), 0);
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Unknown);
        assert_eq!(rig.recorder.count(EntryKind::Error), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_keeps_session_so_retries_wait() {
        let gateway = MockGateway::default();
        gateway.script_open(vec![Err(ActuationError::Network("down".into()))]);
        let rig = rig_with(gateway);
        rig.start_closed().await;

        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);

        // Still inside the session: the failure does not buy an immediate
        // retry against a broken controller.
        advance(Duration::from_secs(10)).await;
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 1);

        advance(Duration::from_secs(175)).await;
        rig.detect(TOKEN_A).await;
        assert_eq!(rig.gateway.opens(), 2);
    }

    // ─── Status reconciliation ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn probe_failure_keeps_known_state() {
        let rig = rig();
        rig.start_closed().await;
        rig.orchestrator.manual_open().await.unwrap();

        rig.gateway.set_status(Err(ActuationError::Network("down".into())));
        rig.orchestrator.reconcile_status().await;
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);

        rig.gateway.set_status(Ok(GateState::Unknown));
        rig.orchestrator.reconcile_status().await;
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn external_close_is_reconciled_and_recorded() {
        let rig = rig();
        rig.start_closed().await;
        rig.orchestrator.manual_open().await.unwrap();

        // Someone closed the gate from the wall panel.
        rig.gateway.set_status(Ok(GateState::Closed));
        rig.orchestrator.reconcile_status().await;

        assert_eq!(rig.orchestrator.snapshot().state, GateState::Closed);
        assert!(rig
            .recorder
            .messages(EntryKind::GateClosed)
            .iter()
            .any(|m| m.contains("external:status-poll")));

        // The cleared deadline must not fire a stale auto-close later.
        advance(Duration::from_secs(600)).await;
        rig.orchestrator.auto_close_if_due().await;
        assert_eq!(rig.gateway.closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_reconciliation_is_silent() {
        let rig = rig();
        rig.start_closed().await;
        // Unknown → Closed is initialization, not an external transition.
        assert_eq!(rig.recorder.count(EntryKind::GateClosed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn externally_opened_gate_is_not_auto_closed() {
        let rig = rig();
        rig.start_closed().await;

        rig.gateway.set_status(Ok(GateState::Open));
        rig.orchestrator.reconcile_status().await;
        assert_eq!(rig.orchestrator.snapshot().state, GateState::Open);

        advance(Duration::from_secs(600)).await;
        rig.orchestrator.auto_close_if_due().await;
        assert_eq!(rig.gateway.closes(), 0);
    }

    // ─── Coalescing & snapshot ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn repeated_detections_coalesce_into_one_entry() {
        let mut tokens = TokenRegistry::default();
        tokens.register(TOKEN_A, "Alex").unwrap();

        let gateway = Arc::new(MockGateway::default());
        let log = Arc::new(ActivityLog::in_memory(
            100,
            RecordingMode::Coalesce {
                window: Duration::from_secs(60),
            },
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&gateway),
            Arc::new(StaticRegistry::new(tokens)),
            Arc::clone(&log) as Arc<dyn Recorder>,
            timings(),
        );
        gateway.set_status(Ok(GateState::Closed));
        orchestrator.reconcile_status().await;

        orchestrator
            .on_detection(DetectionEvent::new(TOKEN_A, "ble").with_signal(-50, None))
            .await;
        advance(Duration::from_secs(1)).await;
        orchestrator
            .on_detection(DetectionEvent::new(TOKEN_A, "ble").with_signal(-55, None))
            .await;

        let detections = log.entries(None, Some(EntryKind::TokenDetected));
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].updates, 1);

        // The transition entry keeps its own unique key and never folds.
        assert_eq!(log.entries(None, Some(EntryKind::GateOpened)).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reflects_session_and_last_open() {
        let rig = rig();
        rig.start_closed().await;

        let before = rig.orchestrator.snapshot();
        assert!(!before.session_active);
        assert_eq!(before.session_remaining_secs, None);
        assert_eq!(before.last_open_time, None);

        rig.detect(TOKEN_A).await;
        advance(Duration::from_secs(30)).await;

        let open = rig.orchestrator.snapshot();
        assert_eq!(open.state, GateState::Open);
        assert!(open.session_active);
        assert_eq!(open.session_remaining_secs, Some(150));
        assert!(open.last_open_time.is_some());

        rig.orchestrator.manual_close().await.unwrap();
        let closed = rig.orchestrator.snapshot();
        assert_eq!(closed.state, GateState::Closed);
        assert!(closed.session_active, "close must not clear the session");
        assert_eq!(closed.last_open_time, None);
    }
}
