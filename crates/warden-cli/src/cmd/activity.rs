use std::path::Path;

use clap::Subcommand;
use warden_core::activity::EntryKind;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum ActivitySubcommand {
    /// Show recent entries, most recent first
    List {
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Filter by kind (gate_opened, gate_closed, token_detected, ...)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Delete all entries
    Clear,
}

pub fn run(
    config_override: Option<&Path>,
    subcommand: ActivitySubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let (config, path) = super::load(config_override)?;
    let log = super::open_log(&config, &path)?;

    match subcommand {
        ActivitySubcommand::List { limit, kind } => {
            let kind = kind.as_deref().map(str::parse::<EntryKind>).transpose()?;
            let entries = log.entries(Some(limit), kind);

            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No activity recorded");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|e| {
                    vec![
                        e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                        e.kind.to_string(),
                        e.message.clone(),
                        if e.updates > 0 {
                            format!("x{}", e.updates + 1)
                        } else {
                            String::new()
                        },
                    ]
                })
                .collect();
            print_table(&["TIME", "KIND", "MESSAGE", "SEEN"], rows);
        }

        ActivitySubcommand::Clear => {
            log.clear();
            println!("Activity log cleared");
        }
    }

    Ok(())
}
