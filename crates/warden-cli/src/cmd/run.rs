use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use warden_core::DetectionEvent;
use warden_daemon::{Daemon, DetectionSource, SourceError};

pub fn run(config_override: Option<&Path>, relay_stdin: bool) -> anyhow::Result<()> {
    let (config, path) = super::load(config_override)?;
    super::ensure_valid(&config)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning.message);
    }

    let rt = super::runtime()?;
    rt.block_on(async {
        let orchestrator = Arc::new(super::build_orchestrator(&config, &path)?);
        let mut daemon = Daemon::new(Arc::clone(&orchestrator), &config.gate);
        if relay_stdin {
            daemon.add_source(Arc::new(StdinRelaySource::new()));
        }

        let handle = daemon.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, shutting down");
                handle.shutdown();
            }
        });

        daemon.run().await;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// StdinRelaySource
// ---------------------------------------------------------------------------

/// Detection event as relayed on stdin, one JSON object per line:
/// `{"token_id": "aa:bb:cc:dd:ee:ff", "rssi": -52, "distance_m": 1.2}`.
#[derive(Debug, Deserialize)]
struct RelayLine {
    token_id: String,
    #[serde(default)]
    rssi: Option<i16>,
    #[serde(default)]
    distance_m: Option<f64>,
}

/// Bridges an external scanner process into the daemon: whatever estimates
/// distance and de-duplicates a scan burst pipes its sightings to stdin,
/// one JSON line each.
struct StdinRelaySource {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

const SOURCE_ID: &str = "stdin-relay";

impl StdinRelaySource {
    fn new() -> Self {
        StdinRelaySource {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    fn parse(line: &str) -> Option<DetectionEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<RelayLine>(line) {
            Ok(relay) => {
                let mut event = DetectionEvent::new(relay.token_id, SOURCE_ID);
                event.rssi = relay.rssi;
                event.distance_m = relay.distance_m;
                Some(event)
            }
            Err(e) => {
                tracing::warn!(error = %e, "unparseable relay line");
                None
            }
        }
    }
}

#[async_trait]
impl DetectionSource for StdinRelaySource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn poll_once(&self) -> Result<Vec<DetectionEvent>, SourceError> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            // EOF: the relay went away; the loop keeps polling quietly.
            Ok(None) => Ok(Vec::new()),
            Ok(Some(line)) => Ok(Self::parse(&line).into_iter().collect()),
            Err(e) => Err(SourceError(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
