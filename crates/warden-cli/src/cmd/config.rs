use std::path::Path;

use clap::Subcommand;
use warden_core::config::WarnLevel;

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check the configuration for problems
    Validate,
}

pub fn run(
    config_override: Option<&Path>,
    subcommand: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcommand {
        ConfigSubcommand::Validate => {
            let (config, path) = super::load(config_override)?;
            let warnings = config.validate();

            if json {
                print_json(&warnings)?;
            } else if warnings.is_empty() {
                println!("{}: OK", path.display());
            } else {
                for w in &warnings {
                    let label = match w.level {
                        WarnLevel::Error => "error",
                        WarnLevel::Warning => "warning",
                    };
                    println!("{label}: {}", w.message);
                }
            }

            if warnings.iter().any(|w| w.level == WarnLevel::Error) {
                anyhow::bail!("configuration has errors");
            }
            Ok(())
        }
    }
}
