use std::path::Path;

use anyhow::Context;

use crate::output::print_json;

pub fn open(config_override: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (config, path) = super::load(config_override)?;
    super::ensure_valid(&config)?;
    let rt = super::runtime()?;
    rt.block_on(async {
        let orchestrator = super::build_orchestrator(&config, &path)?;
        orchestrator
            .manual_open()
            .await
            .context("failed to open gate")?;
        if json {
            print_json(&orchestrator.snapshot())?;
        } else {
            println!("Gate opened");
        }
        Ok(())
    })
}

pub fn close(config_override: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (config, path) = super::load(config_override)?;
    super::ensure_valid(&config)?;
    let rt = super::runtime()?;
    rt.block_on(async {
        let orchestrator = super::build_orchestrator(&config, &path)?;
        orchestrator
            .manual_close()
            .await
            .context("failed to close gate")?;
        if json {
            print_json(&orchestrator.snapshot())?;
        } else {
            println!("Gate closed");
        }
        Ok(())
    })
}

pub fn status(config_override: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (config, path) = super::load(config_override)?;
    let rt = super::runtime()?;
    rt.block_on(async {
        let orchestrator = super::build_orchestrator(&config, &path)?;
        orchestrator.reconcile_status().await;
        let snapshot = orchestrator.snapshot();

        if json {
            return print_json(&snapshot);
        }

        println!("State: {}", snapshot.state);
        match snapshot.session_remaining_secs {
            Some(secs) => println!("Session: active ({secs}s remaining)"),
            None => println!("Session: none"),
        }
        match snapshot.last_open_time {
            Some(t) => println!("Last opened: {}", t.to_rfc3339()),
            None => println!("Last opened: never"),
        }
        Ok(())
    })
}
