use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use warden_core::config::GateConfig;

use crate::actuation::Actuator;
use crate::orchestrator::Orchestrator;
use crate::sources::DetectionSource;

/// How often the auto-close timer re-checks its deadline.
const AUTO_CLOSE_TICK: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Wires the orchestrator to its periodic tasks: one scan loop per
/// detection source, the status poller, and the auto-close timer.
///
/// All tasks share the orchestrator; none of them block the process. On
/// shutdown the loops are aborted at their next await point — in-flight
/// actuator calls resolve through the orchestrator's transient states, so
/// nothing is left half-marked.
pub struct Daemon<A> {
    orchestrator: Arc<Orchestrator<A>>,
    sources: Vec<Arc<dyn DetectionSource>>,
    scan_interval: Duration,
    status_interval: Duration,
    shutdown: watch::Sender<bool>,
}

/// Clonable handle that stops a running [`Daemon`].
#[derive(Clone)]
pub struct ShutdownHandle(watch::Sender<bool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

impl<A: Actuator + 'static> Daemon<A> {
    pub fn new(orchestrator: Arc<Orchestrator<A>>, timing: &GateConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Daemon {
            orchestrator,
            sources: Vec::new(),
            scan_interval: timing.scan_interval(),
            status_interval: timing.status_poll_interval(),
            shutdown,
        }
    }

    pub fn add_source(&mut self, source: Arc<dyn DetectionSource>) {
        self.sources.push(source);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Run until [`ShutdownHandle::shutdown`] is called.
    ///
    /// Performs an initial status probe so the boot-time `Unknown` settles
    /// to the gate's real position before any detection is handled.
    pub async fn run(&self) {
        tracing::info!(sources = self.sources.len(), "starting gate daemon");
        self.orchestrator.reconcile_status().await;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        for source in &self.sources {
            tasks.push(tokio::spawn(scan_loop(
                Arc::clone(&self.orchestrator),
                Arc::clone(source),
                self.scan_interval,
            )));
        }
        tasks.push(tokio::spawn(status_loop(
            Arc::clone(&self.orchestrator),
            self.status_interval,
        )));
        tasks.push(tokio::spawn(auto_close_loop(Arc::clone(
            &self.orchestrator,
        ))));

        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }

        tracing::info!("stopping gate daemon");
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        tracing::info!("gate daemon stopped");
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

async fn scan_loop<A: Actuator>(
    orchestrator: Arc<Orchestrator<A>>,
    source: Arc<dyn DetectionSource>,
    interval: Duration,
) {
    tracing::info!(source = source.id(), "scan loop started");
    loop {
        match source.poll_once().await {
            Ok(events) => {
                for event in events {
                    orchestrator.on_detection(event).await;
                }
            }
            Err(e) => {
                tracing::warn!(source = source.id(), error = %e, "detection poll failed");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn status_loop<A: Actuator>(orchestrator: Arc<Orchestrator<A>>, interval: Duration) {
    tracing::info!("status poll loop started");
    loop {
        tokio::time::sleep(interval).await;
        orchestrator.reconcile_status().await;
    }
}

async fn auto_close_loop<A: Actuator>(orchestrator: Arc<Orchestrator<A>>) {
    tracing::info!("auto-close loop started");
    loop {
        tokio::time::sleep(AUTO_CLOSE_TICK).await;
        orchestrator.auto_close_if_due().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
