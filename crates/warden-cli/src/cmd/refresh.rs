use std::path::Path;

use anyhow::Context;
use warden_core::paths;

pub fn run(config_override: Option<&Path>) -> anyhow::Result<()> {
    let (config, path) = super::load(config_override)?;
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::build_client(&config, &path)?;
        client
            .refresh_auth()
            .await
            .context("director token refresh failed")?;
        println!(
            "Director token refreshed and cached under {}",
            paths::credentials_dir(&path).display()
        );
        Ok(())
    })
}
