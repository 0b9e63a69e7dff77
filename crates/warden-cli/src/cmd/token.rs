use std::collections::BTreeMap;
use std::path::Path;

use clap::Subcommand;
use serde_json::json;
use warden_core::activity::EntryKind;
use warden_core::tokens::TokenRegistry;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum TokenSubcommand {
    /// Register a new token
    Register {
        /// Token id (BLE address or beacon UUID)
        id: String,
        /// User-friendly name
        #[arg(long)]
        name: String,
    },

    /// Remove a registered token
    Remove { id: String },

    /// List registered tokens
    List,

    /// Rename a registered token
    Rename {
        id: String,
        #[arg(long)]
        name: String,
    },

    /// Pause a token: it stays registered and is logged when seen, but
    /// never opens the gate
    Pause { id: String },

    /// Resume a paused token
    Resume { id: String },
}

pub fn run(
    config_override: Option<&Path>,
    subcommand: TokenSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let (mut config, path) = super::load(config_override)?;
    let mut registry = TokenRegistry::new(config.tokens.registered.clone());

    match subcommand {
        TokenSubcommand::Register { id, name } => {
            registry.register(&id, &name)?;
            config.tokens.registered = registry.into_entries();
            config.save(&path)?;

            let log = super::open_log(&config, &path)?;
            let mut details = BTreeMap::new();
            details.insert("token_id".to_string(), json!(id));
            details.insert("token_name".to_string(), json!(name));
            log.record(
                EntryKind::TokenRegistered,
                format!("Token registered: {name}"),
                details,
                Some(id.to_ascii_lowercase()),
            );

            println!("Registered token: {name} ({id})");
        }

        TokenSubcommand::Remove { id } => {
            let removed = registry.remove(&id)?;
            config.tokens.registered = registry.into_entries();
            config.save(&path)?;

            let log = super::open_log(&config, &path)?;
            let mut details = BTreeMap::new();
            details.insert("token_id".to_string(), json!(removed.id));
            details.insert("token_name".to_string(), json!(removed.name));
            log.record(
                EntryKind::TokenUnregistered,
                format!("Token unregistered: {}", removed.name),
                details,
                Some(removed.id.to_ascii_lowercase()),
            );

            println!("Removed token: {} ({})", removed.name, removed.id);
        }

        TokenSubcommand::List => {
            if json {
                return print_json(&registry.all());
            }
            if registry.is_empty() {
                println!("No tokens registered");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = registry
                .all()
                .iter()
                .map(|t| {
                    vec![
                        t.name.clone(),
                        t.id.clone(),
                        if t.active { "active" } else { "paused" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["NAME", "ID", "STATUS"], rows);
        }

        TokenSubcommand::Rename { id, name } => {
            registry.rename(&id, &name)?;
            config.tokens.registered = registry.into_entries();
            config.save(&path)?;
            println!("Renamed token {id} to {name}");
        }

        TokenSubcommand::Pause { id } => {
            registry.set_active(&id, false)?;
            config.tokens.registered = registry.into_entries();
            config.save(&path)?;
            println!("Paused token: {id}");
        }

        TokenSubcommand::Resume { id } => {
            registry.set_active(&id, true)?;
            config.tokens.registered = registry.into_entries();
            config.save(&path)?;
            println!("Resumed token: {id}");
        }
    }

    Ok(())
}
