use std::path::Path;

use warden_core::config::Config;
use warden_core::paths;

pub fn run(config_override: Option<&Path>) -> anyhow::Result<()> {
    let path = match config_override {
        Some(p) => p.to_path_buf(),
        None => paths::user_dir()?.join(paths::CONFIG_FILE),
    };
    if path.exists() {
        anyhow::bail!("configuration already exists: {}", path.display());
    }

    Config::default().save(&path)?;

    println!("Wrote default configuration to {}", path.display());
    println!("Set controller.host and account credentials, then run 'gatewarden run'.");
    Ok(())
}
